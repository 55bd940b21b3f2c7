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

use serde::Deserialize;

use crate::common::*;
use crate::error::{DesignError, DesignResult};
use crate::memory::ShadowSram;
use crate::port::{InPortId, InputPort, OutPortId, OutputPort};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoMode {
    #[default]
    Disabled,
    /// Feeds an external signal into the chip.
    #[serde(alias = "input")]
    InputBypass,
    /// Drives an external pin from the inside of the chip.
    #[serde(alias = "output")]
    OutputBypass,
}

impl IoMode {
    fn byte(self) -> u8 {
        match self {
            Self::Disabled => 0x00,
            Self::InputBypass => 0x40,
            Self::OutputBypass => 0x10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IoCell {
    id: IoCellId,
    mode: IoMode,
    mode_set: bool,
    input: InputPort,
    output: OutputPort,
}

impl IoCell {
    pub fn new(id: IoCellId) -> Self {
        Self {
            id,
            mode: IoMode::Disabled,
            mode_set: false,
            input: InputPort::new(InPortId::IoCell(id)),
            output: OutputPort::new(OutPortId::IoCell(id)),
        }
    }

    pub fn id(&self) -> IoCellId {
        self.id
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: IoMode) -> DesignResult<()> {
        if self.mode_set {
            return Err(DesignError::AlreadyClaimed(format!(
                "mode of {} is already set to {:?}",
                self.id, self.mode
            )));
        }
        self.mode = mode;
        self.mode_set = true;
        Ok(())
    }

    /// The input only exists in OutputBypass mode.
    pub fn input(&self) -> DesignResult<&InputPort> {
        match self.mode {
            IoMode::OutputBypass => Ok(&self.input),
            mode => Err(self.no_port("input", mode)),
        }
    }

    pub(crate) fn input_mut(&mut self) -> DesignResult<&mut InputPort> {
        match self.mode {
            IoMode::OutputBypass => Ok(&mut self.input),
            mode => Err(self.no_port("input", mode)),
        }
    }

    /// The output only exists in InputBypass mode.
    pub fn output(&self) -> DesignResult<&OutputPort> {
        match self.mode {
            IoMode::InputBypass => Ok(&self.output),
            mode => Err(self.no_port("output", mode)),
        }
    }

    pub(crate) fn output_mut(&mut self) -> DesignResult<&mut OutputPort> {
        match self.mode {
            IoMode::InputBypass => Ok(&mut self.output),
            mode => Err(self.no_port("output", mode)),
        }
    }

    fn no_port(&self, what: &str, mode: IoMode) -> DesignError {
        DesignError::InvalidPort(format!("{} in {:?} mode has no {}", self.id, mode, what))
    }

    /// Writes the mode and the selector of the channel driving the cell.
    pub fn compile(&self, ssram: &mut ShadowSram, source_selector: u8) -> DesignResult<()> {
        ssram.set(0x00, 0x08 + self.id.index(), self.mode.byte())?;
        ssram.set(0x01, 0x04 + self.id.index(), source_selector)
    }
}
