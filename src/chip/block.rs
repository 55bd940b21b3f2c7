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

use crate::common::*;
use crate::error::{DesignError, DesignResult};
use crate::memory::{MemoryAddress, ShadowSram};
use crate::port::{InPortId, InputPort, OutPortId, OutputPort};
#[allow(unused)]
use crate::log::*;

use super::clock::ClockSelect;

/// Phase of the two-phase clock a switch closes in. `Static` switches stay closed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Phase {
    Static,
    One,
    Two,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct SwitchConfiguration {
    pub b1: u8,
    pub b2: u8,
}

impl SwitchConfiguration {
    fn with_nibble(n: u8, closed: u8, phase: Phase, select: ClockSelect) -> Self {
        match phase {
            Phase::Static => Self { b1: 0x00, b2: from_nibbles(n, 0x0) },
            Phase::One => Self { b1: select.byte(), b2: from_nibbles(closed, n) },
            Phase::Two => Self { b1: select.byte(), b2: from_nibbles(n, closed) },
        }
    }

    /// Connects a capacitor to a block input, `selector` being the nibble of the
    /// channel the input is fed through.
    pub fn from_input(selector: u8, phase: Phase, select: ClockSelect) -> Self {
        Self::with_nibble(selector, 0x1, phase, select)
    }

    pub fn from_opamp(opamp: u8, phase: Phase, select: ClockSelect) -> Self {
        let n = if opamp == 0 { 0x3 } else { 0x2 };
        Self::with_nibble(n, 0x1, phase, select)
    }

    pub fn to_opamp(opamp: u8, phase: Phase, select: ClockSelect) -> Self {
        let n = if opamp == 0 { 0x1 } else { 0x2 };
        Self::with_nibble(n, 0x8, phase, select)
    }
}

#[derive(Clone, Debug)]
pub struct Capacitor {
    /* 1-based, matches the numbering of the register map */
    id: u8,
    owner: Option<ModuleId>,
    value: u8,
    switch_cfg: [u8; 4],
}

impl Capacitor {
    fn new(id: u8) -> Self {
        Self { id, owner: None, value: 0x00, switch_cfg: [0x00; 4] }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn owner(&self) -> Option<ModuleId> {
        self.owner
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn switch_cfg(&self) -> [u8; 4] {
        self.switch_cfg
    }

    pub fn claim(&mut self, module: ModuleId) -> DesignResult<()> {
        if self.owner.is_some() {
            return Err(DesignError::AlreadyClaimed(format!(
                "capacitor {} is already in use",
                self.id
            )));
        }
        self.owner = Some(module);
        Ok(())
    }

    pub fn set_value(&mut self, value: u8) -> &mut Self {
        self.value = value;
        self
    }

    pub fn set_in(&mut self, cfg: SwitchConfiguration) -> &mut Self {
        self.switch_cfg[0] = cfg.b1;
        self.switch_cfg[1] = cfg.b2;
        self
    }

    pub fn set_out(&mut self, cfg: SwitchConfiguration) -> &mut Self {
        self.switch_cfg[2] = cfg.b1;
        self.switch_cfg[3] = cfg.b2;
        self
    }

    pub fn switch_address(&self, block: BlockId) -> DesignResult<MemoryAddress> {
        let a = ShadowSram::block_bank_a(block);
        let b = ShadowSram::block_bank_b(block);
        let (bank, byte) = match self.id {
            1 => (b, 0x1C),
            2 => (a, 0x1C),
            3 => (b, 0x16),
            4 => (a, 0x18),
            5 => (b, 0x10),
            6 => (a, 0x14),
            7 => (b, 0x0C),
            8 => (a, 0x10),
            id => return Err(DesignError::InvalidParameter(format!(
                "there is no capacitor {}",
                id
            ))),
        };
        Ok(MemoryAddress::new(bank, byte))
    }

    pub fn value_address(&self, block: BlockId) -> MemoryAddress {
        MemoryAddress::new(ShadowSram::block_bank_a(block), 0x08 - self.id as usize)
    }

    fn compile(&self, block: BlockId, ssram: &mut ShadowSram) -> DesignResult<()> {
        ssram.set_at(self.value_address(block), &[self.value])?;
        ssram.set_at(self.switch_address(block)?, &self.switch_cfg)
    }
}

#[derive(Clone, Debug)]
pub struct OpAmp {
    /* 0-based */
    slot: u8,
    owner: Option<ModuleId>,
    output: OutputPort,
}

impl OpAmp {
    fn new(block: BlockId, slot: u8) -> Self {
        Self { slot, owner: None, output: OutputPort::new(OutPortId::OpAmp(block, slot)) }
    }

    pub fn owner(&self) -> Option<ModuleId> {
        self.owner
    }

    pub fn output(&self) -> &OutputPort {
        &self.output
    }

    pub fn claim(&mut self, module: ModuleId) -> DesignResult<()> {
        if self.owner.is_some() {
            return Err(DesignError::AlreadyClaimed(format!(
                "op-amp {} is already in use",
                self.slot + 1
            )));
        }
        self.owner = Some(module);
        Ok(())
    }

    fn compile(&self, block: BlockId, ssram: &mut ShadowSram) -> DesignResult<()> {
        let byte_addr = if self.slot == 0 { 0x1A } else { 0x14 };
        /* All modules run their op-amps in closed loop */
        let cfg: [u8; 2] = match self.owner {
            Some(_) => [0x00, 0x05],
            None => [0x00, 0x00],
        };
        ssram.set_bytes(ShadowSram::block_bank_b(block), byte_addr, &cfg)
    }
}

#[derive(Clone, Debug)]
pub struct Comparator {
    owner: Option<ModuleId>,
    input: InputPort,
    selector: u8,
}

impl Comparator {
    fn new(block: BlockId) -> Self {
        Self { owner: None, input: InputPort::new(InPortId::Comparator(block)), selector: 0x00 }
    }

    pub fn owner(&self) -> Option<ModuleId> {
        self.owner
    }

    pub fn input(&self) -> &InputPort {
        &self.input
    }

    pub fn claim(&mut self, module: ModuleId) -> DesignResult<()> {
        if self.owner.is_some() {
            return Err(DesignError::AlreadyClaimed("comparator is already in use".into()));
        }
        self.owner = Some(module);
        Ok(())
    }

    /// Sets the input selector: the nibble of the channel feeding the comparator and
    /// whether that channel comes straight from a nearby IO cell.
    pub fn set_input(&mut self, selector: u8, near_io_cell: bool) {
        self.selector = from_nibbles(near_io_cell as u8, selector);
    }

    fn compile(&self, block: BlockId, ssram: &mut ShadowSram) -> DesignResult<()> {
        let a = ShadowSram::block_bank_a(block);
        let b = ShadowSram::block_bank_b(block);

        if self.owner.is_some() {
            ssram.set_bytes(b, 0x09, &[0x07, 0xC9])?;
            ssram.set(a, 0x0E, 0x08)?;
            ssram.set(b, 0x06, 0x80)?;
            ssram.set(b, 0x0B, self.selector)
        } else {
            ssram.set_bytes(b, 0x09, &[0x00, 0x00])?;
            ssram.set(a, 0x0E, 0x00)?;
            ssram.set(b, 0x06, 0x00)?;
            ssram.set(b, 0x0B, 0x00)
        }
    }
}

#[derive(Clone, Debug)]
pub struct LocalInput {
    owner: Option<ModuleId>,
    port: InputPort,
}

impl LocalInput {
    pub fn owner(&self) -> Option<ModuleId> {
        self.owner
    }

    pub fn port(&self) -> &InputPort {
        &self.port
    }
}

/// Configurable analog block. Owns the claimable components and the ports they
/// are reached through.
#[derive(Clone, Debug)]
pub struct Block {
    id: BlockId,
    caps: Vec<Capacitor>,
    opamps: Vec<OpAmp>,
    comparator: Comparator,
    local_inputs: Vec<LocalInput>,
    clk_a: ClockId,
    clk_b: ClockId,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            caps: (1 ..= N_CAPACITORS_PER_BLOCK as u8).map(Capacitor::new).collect(),
            opamps: (0 .. N_OPAMPS_PER_BLOCK as u8).map(|slot| OpAmp::new(id, slot)).collect(),
            comparator: Comparator::new(id),
            local_inputs: (0 .. N_LOCAL_INPUTS_PER_BLOCK as u8)
                .map(|slot| LocalInput {
                    owner: None,
                    port: InputPort::new(InPortId::Local(id, slot)),
                })
                .collect(),
            clk_a: ClockId::NULL,
            clk_b: ClockId::NULL,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn setup(&mut self, clk_a: ClockId, clk_b: ClockId) {
        self.clk_a = clk_a;
        self.clk_b = clk_b;
    }

    pub fn clocks(&self) -> (ClockId, ClockId) {
        (self.clk_a, self.clk_b)
    }

    pub fn caps(&self) -> &[Capacitor] {
        &self.caps
    }

    pub fn opamps(&self) -> &[OpAmp] {
        &self.opamps
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    pub fn comparator_mut(&mut self) -> &mut Comparator {
        &mut self.comparator
    }

    pub fn local_inputs(&self) -> &[LocalInput] {
        &self.local_inputs
    }

    pub fn cap_mut(&mut self, slot: usize) -> DesignResult<&mut Capacitor> {
        let id = self.id;
        self.caps.get_mut(slot).ok_or_else(|| DesignError::ResourceExhausted(format!(
            "{} has no capacitor {}",
            id, slot + 1
        )))
    }

    /// First unused capacitor, in slot order.
    pub fn claim_cap(&mut self, module: ModuleId) -> DesignResult<usize> {
        let slot = self.caps.iter()
            .position(|cap| cap.owner.is_none())
            .ok_or_else(|| DesignError::ResourceExhausted(format!(
                "{} has no capacitors left",
                self.id
            )))?;
        self.claim_cap_at(slot, module)?;
        Ok(slot)
    }

    pub fn claim_cap_at(&mut self, slot: usize, module: ModuleId) -> DesignResult<()> {
        let id = self.id;
        self.cap_mut(slot)?.claim(module).map_err(|e| in_block(e, id))
    }

    pub fn claim_opamp(&mut self, module: ModuleId) -> DesignResult<usize> {
        let slot = self.opamps.iter()
            .position(|opamp| opamp.owner.is_none())
            .ok_or_else(|| DesignError::ResourceExhausted(format!(
                "{} has no op-amps left",
                self.id
            )))?;
        self.claim_opamp_at(slot, module)?;
        Ok(slot)
    }

    pub fn claim_opamp_at(&mut self, slot: usize, module: ModuleId) -> DesignResult<()> {
        let id = self.id;
        self.opamps.get_mut(slot)
            .ok_or_else(|| DesignError::ResourceExhausted(format!(
                "{} has no op-amp {}",
                id, slot + 1
            )))?
            .claim(module)
            .map_err(|e| in_block(e, id))
    }

    pub fn claim_comp(&mut self, module: ModuleId) -> DesignResult<()> {
        if self.comparator.owner.is_some() {
            return Err(DesignError::ResourceExhausted(format!(
                "comparator of {} is already in use",
                self.id
            )));
        }
        self.claim_comp_at(0, module)
    }

    /// Blocks have a single comparator, in slot 0.
    pub fn claim_comp_at(&mut self, slot: usize, module: ModuleId) -> DesignResult<()> {
        let id = self.id;
        if slot != 0 {
            return Err(DesignError::ResourceExhausted(format!(
                "{} has no comparator {}",
                id, slot + 1
            )));
        }
        self.comparator.claim(module).map_err(|e| in_block(e, id))
    }

    pub fn claim_local_input(&mut self, module: ModuleId) -> DesignResult<usize> {
        let slot = self.local_inputs.iter()
            .position(|input| input.owner.is_none())
            .ok_or_else(|| DesignError::ResourceExhausted(format!(
                "{} has no local inputs left",
                self.id
            )))?;
        self.local_inputs[slot].owner = Some(module);
        Ok(slot)
    }

    pub(crate) fn input_port_mut(&mut self, port: InPortId) -> DesignResult<&mut InputPort> {
        match port {
            InPortId::Local(_, slot) => {
                match self.local_inputs.get_mut(slot as usize) {
                    Some(input) if input.owner.is_some() => Ok(&mut input.port),
                    _ => Err(DesignError::InvalidPort(format!(
                        "{} is not used by any module",
                        port
                    ))),
                }
            },
            InPortId::Comparator(_) if self.comparator.owner.is_some() => {
                Ok(&mut self.comparator.input)
            },
            _ => Err(DesignError::InvalidPort(format!("{} is not used by any module", port))),
        }
    }

    pub(crate) fn output_port_mut(&mut self, port: OutPortId) -> DesignResult<&mut OutputPort> {
        match port {
            OutPortId::OpAmp(_, slot) => match self.opamps.get_mut(slot as usize) {
                Some(opamp) if opamp.owner.is_some() => Ok(&mut opamp.output),
                _ => Err(DesignError::InvalidPort(format!("{} is not used by any module", port))),
            },
            _ => Err(DesignError::InvalidPort(format!("{} does not belong to {}", port, self.id))),
        }
    }

    /// Writes every component of the block, claimed or not.
    pub fn compile(&self, ssram: &mut ShadowSram) -> DesignResult<()> {
        dbg_log!(DBG_INFO, "Compiling {}", self.id);

        for cap in &self.caps {
            cap.compile(self.id, ssram)?;
        }
        for opamp in &self.opamps {
            opamp.compile(self.id, ssram)?;
        }
        self.comparator.compile(self.id, ssram)?;

        ssram.set(
            ShadowSram::block_bank_a(self.id),
            0x0C,
            from_nibbles(self.clk_a.nibble(), self.clk_b.nibble())
        )
    }
}

fn in_block(e: DesignError, block: BlockId) -> DesignError {
    match e {
        DesignError::AlreadyClaimed(msg) =>
            DesignError::AlreadyClaimed(format!("{} in {}", msg, block)),
        e => e,
    }
}
