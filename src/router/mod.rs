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

use std::collections::HashMap;
use std::fmt;
use serde::Serialize;

use crate::common::*;
use crate::error::{DesignError, DesignResult};
use crate::memory::ShadowSram;
use crate::port::OutPortId;
#[allow(unused)]
use crate::log::*;

pub mod route;

pub use self::route::*;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct ChannelId(pub usize);

/// Every kind of wire exists in two physical copies.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub enum Side {
    Primary,
    Secondary,
}

impl Side {
    /* Scan order used everywhere a side gets picked */
    pub const ALL: [Side; 2] = [Side::Primary, Side::Secondary];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    fn nibble(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "P"),
            Self::Secondary => write!(f, "S"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ChannelKind {
    /// Reroutes a global bus into the inputs of a block.
    LocalInput(BlockId),
    /// Reroutes an op-amp of a block onto a global bus.
    LocalOutput(BlockId),
    /// Op-amp feedback loop within a block.
    IntraCab(BlockId),
    InterCab { from: BlockId, to: BlockId },
    /// Bus shared by both IO groups, one per block column.
    GlobalBiIndirect(ColumnGroup),
    GlobalInputDirect { group: IoGroup, block: BlockId },
    GlobalOutputDirect { group: IoGroup, block: BlockId },
}

impl ChannelKind {
    fn is_local(self) -> bool {
        matches!(self, Self::LocalInput(_) | Self::LocalOutput(_))
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalInput(block) => write!(f, "LocalInput({})", block),
            Self::LocalOutput(block) => write!(f, "LocalOutput({})", block),
            Self::IntraCab(block) => write!(f, "IntraCab({})", block),
            Self::InterCab { from, to } => write!(f, "InterCab({}->{})", from, to),
            Self::GlobalBiIndirect(column) => write!(f, "GlobalBiIndirect({})", column),
            Self::GlobalInputDirect { group, block } =>
                write!(f, "GlobalInputDirect({}, {})", group, block),
            Self::GlobalOutputDirect { group, block } =>
                write!(f, "GlobalOutputDirect({}, {})", group, block),
        }
    }
}

/* Switch selector nibbles of the inter-cab wires, indexed [from - 1][to - 1],
 * Primary side. The Secondary side is one less. */
const INTER_CAB_NIBBLES: [[u8; N_BLOCKS_PER_CHIP]; N_BLOCKS_PER_CHIP] = [
    [0x3, 0xB, 0xB, 0xB],
    [0xF, 0x3, 0x9, 0x9],
    [0xB, 0xD, 0x7, 0xD],
    [0xD, 0xF, 0xF, 0x3],
];

const GLOBAL_BUS_TAG: u8 = 0x8;

/// Selector written to the global bus driver registers.
pub fn driver_selector(driver: OutPortId) -> u8 {
    match driver {
        OutPortId::OpAmp(block, slot) => from_nibbles(block.0, slot + 1),
        OutPortId::IoCell(cell) => from_nibbles(GLOBAL_BUS_TAG, cell.0),
    }
}

#[derive(Clone, Debug)]
pub struct Channel {
    kind: ChannelKind,
    side: Side,
    driver: Option<OutPortId>,
    /* Global bus a local channel got rerouted through */
    peer: Option<ChannelId>,
}

impl Channel {
    fn new(kind: ChannelKind, side: Side) -> Self {
        Self { kind, side, driver: None, peer: None }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn driver(&self) -> Option<OutPortId> {
        self.driver
    }

    pub fn peer(&self) -> Option<ChannelId> {
        self.peer
    }

    /// Nibble selecting this channel at the input switches of the block it ends in.
    pub fn input_selector(&self) -> DesignResult<u8> {
        let primary = match self.kind {
            ChannelKind::IntraCab(_) => 0x3,
            ChannelKind::InterCab { from, to } => INTER_CAB_NIBBLES[from.index()][to.index()],
            ChannelKind::GlobalInputDirect { .. } => 0x5,
            ChannelKind::LocalInput(_) => 0x7,
            kind => return Err(DesignError::RoutingConflict(format!(
                "{} does not end at a block input",
                kind
            ))),
        };
        Ok(match self.side {
            Side::Primary => primary,
            Side::Secondary => primary - 1,
        })
    }

    /// Selector of a channel as seen by whatever it feeds from the outside of a
    /// block (IO cells and local reroutes). Zero stands for "nothing".
    pub fn source_selector(&self) -> u8 {
        match self.kind {
            ChannelKind::GlobalBiIndirect(column) =>
                from_nibbles(GLOBAL_BUS_TAG | column.index() as u8, self.side.nibble()),
            ChannelKind::GlobalOutputDirect { block, .. } =>
                from_nibbles(block.0, self.side.nibble()),
            _ => 0x00,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.side)
    }
}

/// All the wires of the chip. Channels are created once, sides next to each other,
/// and handed out by id.
#[derive(Clone, Debug)]
pub struct ChannelPool {
    channels: Vec<Channel>,
    lookup: HashMap<(ChannelKind, Side), ChannelId>,
}

impl ChannelPool {
    pub fn new() -> Self {
        let mut pool = Self { channels: Vec::new(), lookup: HashMap::new() };

        for block in BlockId::all() {
            pool.add(ChannelKind::LocalInput(block));
            pool.add(ChannelKind::LocalOutput(block));
            pool.add(ChannelKind::IntraCab(block));
        }
        for from in BlockId::all() {
            for to in BlockId::all().filter(|to| *to != from) {
                pool.add(ChannelKind::InterCab { from, to });
            }
        }
        pool.add(ChannelKind::GlobalBiIndirect(ColumnGroup::Odd));
        pool.add(ChannelKind::GlobalBiIndirect(ColumnGroup::Even));
        for cell in IoCellId::all().step_by(2) {
            for block in BlockId::all() {
                if is_directly_wired(cell.group(), block) {
                    let group = cell.group();
                    pool.add(ChannelKind::GlobalInputDirect { group, block });
                    pool.add(ChannelKind::GlobalOutputDirect { group, block });
                }
            }
        }

        pool
    }

    fn add(&mut self, kind: ChannelKind) {
        for side in Side::ALL {
            self.lookup.insert((kind, side), ChannelId(self.channels.len()));
            self.channels.push(Channel::new(kind, side));
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &Channel)> {
        self.channels.iter().enumerate().map(|(idx, ch)| (ChannelId(idx), ch))
    }

    pub fn find(&self, kind: ChannelKind, side: Side) -> DesignResult<ChannelId> {
        self.lookup.get(&(kind, side))
            .copied()
            .ok_or_else(|| DesignError::RoutingConflict(
                format!("channel {}.{} does not exist", kind, side)
            ))
    }

    /// Picks a side of `kind` for `driver`. A side already driven by `driver` is
    /// preferred (fan-out shares wires), then a side with no driver at all.
    pub fn find_available(&self, kind: ChannelKind, driver: OutPortId)
        -> DesignResult<ChannelId>
    {
        for side in Side::ALL {
            let id = self.find(kind, side)?;
            if self[id].driver == Some(driver) {
                return Ok(id);
            }
        }

        for side in Side::ALL {
            let id = self.find(kind, side)?;
            if self[id].driver.is_none() {
                return Ok(id);
            }
        }

        Err(DesignError::RoutingConflict(format!(
            "no {} channel left for {} (driven by {} and {})",
            kind,
            driver,
            self.driver_name(kind, Side::Primary),
            self.driver_name(kind, Side::Secondary)
        )))
    }

    fn driver_name(&self, kind: ChannelKind, side: Side) -> String {
        self.find(kind, side).ok()
            .and_then(|id| self[id].driver)
            .map(|driver| driver.to_string())
            .unwrap_or_else(|| "nothing".into())
    }

    pub fn allocate(&mut self, id: ChannelId, driver: OutPortId) -> DesignResult<()> {
        let channel = &mut self.channels[id.0];
        match channel.driver {
            Some(other) if other != driver => Err(DesignError::RoutingConflict(format!(
                "{} is already driven by {}, can't drive it from {}",
                channel, other, driver
            ))),
            _ => {
                channel.driver = Some(driver);
                Ok(())
            }
        }
    }

    pub fn allocate_available(&mut self, kind: ChannelKind, driver: OutPortId)
        -> DesignResult<ChannelId>
    {
        let id = self.find_available(kind, driver)?;
        self.allocate(id, driver)?;
        dbg_log!(DBG_EXTRA, "  {} allocated for {}", self[id], driver);
        Ok(id)
    }

    /// Records the global bus a local channel is rerouted through.
    pub fn set_peer(&mut self, id: ChannelId, bus: ChannelId) -> DesignResult<()> {
        let bus_name = self[bus].to_string();
        let channel = &mut self.channels[id.0];

        if !channel.kind.is_local() {
            return Err(DesignError::RoutingConflict(format!(
                "{} can't be rerouted through {}",
                channel, bus_name
            )));
        }
        match channel.peer {
            Some(other) if other != bus => Err(DesignError::RoutingConflict(format!(
                "{} is already rerouted through another bus, can't use {}",
                channel, bus_name
            ))),
            _ => {
                channel.peer = Some(bus);
                Ok(())
            }
        }
    }

    /// Writes the global bus drivers and the local reroute selectors.
    pub fn compile(&self, ssram: &mut ShadowSram) -> DesignResult<()> {
        for column in [ColumnGroup::Odd, ColumnGroup::Even] {
            for side in Side::ALL {
                let id = self.find(ChannelKind::GlobalBiIndirect(column), side)?;
                let value = self[id].driver.map(driver_selector).unwrap_or(0x00);
                ssram.set(0x01, column.index() * 2 + side.index(), value)?;
            }
        }

        for block in BlockId::all() {
            let bank_a = ShadowSram::block_bank_a(block);
            for side in Side::ALL {
                let input = self.find(ChannelKind::LocalInput(block), side)?;
                let output = self.find(ChannelKind::LocalOutput(block), side)?;
                ssram.set(bank_a, 0x08 + side.index(), self.peer_selector(input))?;
                ssram.set(bank_a, 0x0A + side.index(), self.peer_selector(output))?;
            }
        }

        Ok(())
    }

    fn peer_selector(&self, id: ChannelId) -> u8 {
        self[id].peer
            .map(|bus| self[bus].source_selector())
            .unwrap_or(0x00)
    }
}

impl Default for ChannelPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<ChannelId> for ChannelPool {
    type Output = Channel;

    fn index(&self, id: ChannelId) -> &Self::Output {
        &self.channels[id.0]
    }
}
