/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::fmt;
use crate::common::*;
use crate::error::{DesignError, DesignResult};
use crate::router::ChannelId;

/// Identity of a port receiving a signal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum InPortId {
    /* Driven from the inside of the chip, IO cell in OutputBypass mode */
    IoCell(IoCellId),
    /// Local input of a block, slot is 0-based.
    Local(BlockId, u8),
    Comparator(BlockId),
}

/// Identity of a port driving a signal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum OutPortId {
    /* Drives the inside of the chip, IO cell in InputBypass mode */
    IoCell(IoCellId),
    /// Output of an op-amp, slot is 0-based.
    OpAmp(BlockId, u8),
}

impl InPortId {
    /// Block the port belongs to. IO cells belong to the null block.
    pub fn block(self) -> BlockId {
        match self {
            Self::IoCell(_) => BlockId::NULL,
            Self::Local(block, _) | Self::Comparator(block) => block,
        }
    }
}

impl OutPortId {
    /// Block the signal originates in. IO cells belong to the null block.
    pub fn source(self) -> BlockId {
        match self {
            Self::IoCell(_) => BlockId::NULL,
            Self::OpAmp(block, _) => block,
        }
    }
}

impl fmt::Display for InPortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoCell(cell) => write!(f, "{}.in", cell),
            Self::Local(block, slot) => write!(f, "{}.in{}", block, slot + 1),
            Self::Comparator(block) => write!(f, "{}.comp", block),
        }
    }
}

impl fmt::Display for OutPortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoCell(cell) => write!(f, "{}.out", cell),
            Self::OpAmp(block, slot) => write!(f, "{}.opamp{}", block, slot + 1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InputPort {
    id: InPortId,
    link: Option<LinkId>,
}

impl InputPort {
    pub fn new(id: InPortId) -> Self {
        Self { id, link: None }
    }

    pub fn id(&self) -> InPortId {
        self.id
    }

    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// An input can be driven by a single output only.
    pub fn connect(&mut self, link: LinkId) -> DesignResult<()> {
        if self.link.is_some() {
            return Err(DesignError::AlreadyConnected(format!(
                "{} is already driven, can't connect multiple outputs to a single input",
                self.id
            )));
        }
        self.link = Some(link);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct OutputPort {
    id: OutPortId,
    links: Vec<LinkId>,
}

impl OutputPort {
    pub fn new(id: OutPortId) -> Self {
        Self { id, links: Vec::new() }
    }

    pub fn id(&self) -> OutPortId {
        self.id
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn connect(&mut self, link: LinkId) {
        self.links.push(link);
    }
}

/// A signal edge. `channels` lists the wires realizing it, from the driver to the
/// receiver, and stays empty until the design gets routed.
#[derive(Clone, Debug)]
pub struct PortLink {
    pub input: InPortId,
    pub output: OutPortId,
    pub channels: Vec<ChannelId>,
}

impl PortLink {
    pub fn new(output: OutPortId, input: InPortId) -> Self {
        Self { input, output, channels: Vec::new() }
    }

    pub fn is_routed(&self) -> bool {
        !self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_driver() {
        let mut port = InputPort::new(InPortId::Local(BlockId(1), 0));
        port.connect(LinkId(0)).unwrap();
        assert!(matches!(port.connect(LinkId(1)), Err(DesignError::AlreadyConnected(_))));
        assert_eq!(port.link(), Some(LinkId(0)));
    }

    #[test]
    fn test_fan_out() {
        let mut port = OutputPort::new(OutPortId::OpAmp(BlockId(2), 1));
        port.connect(LinkId(0));
        port.connect(LinkId(3));
        assert_eq!(port.links(), &[LinkId(0), LinkId(3)]);
        assert_eq!(port.id().source(), BlockId(2));
    }

    #[test]
    fn test_names() {
        assert_eq!(InPortId::Local(BlockId(3), 1).to_string(), "CAB3.in2");
        assert_eq!(InPortId::Comparator(BlockId(1)).to_string(), "CAB1.comp");
        assert_eq!(OutPortId::IoCell(IoCellId(2)).to_string(), "IO2.out");
        assert_eq!(InPortId::IoCell(IoCellId(2)).block(), BlockId::NULL);
    }
}
