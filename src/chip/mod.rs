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

/* Compilation happens in three strictly ordered phases:
 *   1. modules get added and claim their components, ports get connected,
 *   2. finalize: every link gets routed, modules compute their capacitors,
 *   3. everything writes itself into the shadow SRAM.
 * Nothing can be added once phase 2 has run. */

use crate::common::*;
use crate::error::{DesignError, DesignResult};
use crate::memory::{to_data_bytestream, DeviceHeader, ShadowSram};
use crate::port::{InPortId, InputPort, OutPortId, OutputPort, PortLink};
use crate::router::{Channel, ChannelKind, ChannelPool};
#[allow(unused)]
use crate::log::*;

pub mod block;
pub mod clock;
pub mod io_cell;
pub mod module;
#[cfg(test)]
mod tests;

pub use self::block::*;
pub use self::clock::*;
pub use self::io_cell::*;
pub use self::module::*;

#[derive(Clone, Debug)]
pub struct Chip {
    blocks: Vec<Block>,
    io_cells: Vec<IoCell>,
    /* Programmable clocks 1..=6, the null clock is not stored */
    clocks: Vec<Clock>,
    sys_clock_khz: u32,
    header: DeviceHeader,
    modules: Vec<Module>,
    links: Vec<PortLink>,
    channels: ChannelPool,
    finalized: bool,
}

impl Chip {
    pub fn new() -> Self {
        Self::with_system_clock(DEFAULT_SYSTEM_CLOCK_KHZ)
    }

    pub fn with_system_clock(sys_clock_khz: u32) -> Self {
        Self {
            blocks: BlockId::all().map(Block::new).collect(),
            io_cells: IoCellId::all().map(IoCell::new).collect(),
            clocks: (1 ..= N_CLOCKS_PER_CHIP as u8)
                .map(|id| Clock::new(ClockId(id), sys_clock_khz))
                .collect(),
            sys_clock_khz,
            header: DeviceHeader::default(),
            modules: Vec::new(),
            links: Vec::new(),
            channels: ChannelPool::new(),
            finalized: false,
        }
    }

    pub fn system_clock_khz(&self) -> u32 {
        self.sys_clock_khz
    }

    pub fn header(&self) -> DeviceHeader {
        self.header
    }

    pub fn set_header(&mut self, header: DeviceHeader) {
        self.header = header;
    }

    pub fn block(&self, id: BlockId) -> DesignResult<&Block> {
        self.blocks.get(block_index(id)?).ok_or_else(|| no_such_block(id))
    }

    pub fn block_mut(&mut self, id: BlockId) -> DesignResult<&mut Block> {
        self.blocks.get_mut(block_index(id)?).ok_or_else(|| no_such_block(id))
    }

    pub fn io_cell(&self, id: IoCellId) -> DesignResult<&IoCell> {
        io_cell_index(id).and_then(|idx| self.io_cells.get(idx)).ok_or_else(|| no_such_cell(id))
    }

    pub fn io_cell_mut(&mut self, id: IoCellId) -> DesignResult<&mut IoCell> {
        io_cell_index(id)
            .and_then(|idx| self.io_cells.get_mut(idx))
            .ok_or_else(|| no_such_cell(id))
    }

    pub fn clock(&self, id: ClockId) -> DesignResult<&Clock> {
        (id.0 as usize).checked_sub(1)
            .and_then(|idx| self.clocks.get(idx))
            .ok_or_else(|| no_such_clock(id))
    }

    fn clock_mut(&mut self, id: ClockId) -> DesignResult<&mut Clock> {
        (id.0 as usize).checked_sub(1)
            .and_then(|idx| self.clocks.get_mut(idx))
            .ok_or_else(|| no_such_clock(id))
    }

    pub fn set_clock(&mut self, id: ClockId, freq_khz: u32, offset: u32) -> DesignResult<()> {
        let clock = self.clock_mut(id)?;
        clock.configure(freq_khz, offset)?;
        clock.set_is_used(true);
        Ok(())
    }

    pub fn set_io_mode(&mut self, id: IoCellId, mode: IoMode) -> DesignResult<()> {
        self.ensure_not_finalized()?;
        self.io_cell_mut(id)?.set_mode(mode)
    }

    /// Selects the two clocks available to the switches of a block. Either can be
    /// the null clock.
    pub fn setup_block(&mut self, block: BlockId, clk_a: ClockId, clk_b: ClockId)
        -> DesignResult<()>
    {
        for clk in [clk_a, clk_b] {
            if !clk.is_null() {
                self.clock_mut(clk)?.set_is_used(true);
            }
        }
        self.block_mut(block)?.setup(clk_a, clk_b);
        Ok(())
    }

    /// Places a module on a block, claiming everything it needs right away.
    pub fn add_module<S>(&mut self, block: BlockId, name: S, kind: ModuleKind)
        -> DesignResult<ModuleId>
    where
        S: Into<String>
    {
        self.ensure_not_finalized()?;
        kind.validate()?;

        let id = ModuleId(self.modules.len());
        let mut module = Module::new(name.into(), block, kind);
        module.claim_components(id, self.block_mut(block)?)?;
        self.modules.push(module);

        Ok(id)
    }

    pub fn module(&self, id: ModuleId) -> DesignResult<&Module> {
        self.modules.get(id.0).ok_or_else(|| {
            DesignError::InvalidParameter(format!("there is no module no. {}", id.0))
        })
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn links(&self) -> &[PortLink] {
        &self.links
    }

    pub fn channels(&self) -> &ChannelPool {
        &self.channels
    }

    pub fn input_port(&self, port: InPortId) -> DesignResult<&InputPort> {
        match port {
            InPortId::IoCell(cell) => self.io_cell(cell)?.input(),
            InPortId::Local(block, slot) => self.block(block)?
                .local_inputs()
                .get(slot as usize)
                .map(|input| input.port())
                .ok_or_else(|| DesignError::InvalidPort(format!("there is no {}", port))),
            InPortId::Comparator(block) => Ok(self.block(block)?.comparator().input()),
        }
    }

    fn input_port_mut(&mut self, port: InPortId) -> DesignResult<&mut InputPort> {
        match port {
            InPortId::IoCell(cell) => self.io_cell_mut(cell)?.input_mut(),
            InPortId::Local(block, _) | InPortId::Comparator(block) =>
                self.block_mut(block)?.input_port_mut(port),
        }
    }

    fn output_port_mut(&mut self, port: OutPortId) -> DesignResult<&mut OutputPort> {
        match port {
            OutPortId::IoCell(cell) => self.io_cell_mut(cell)?.output_mut(),
            OutPortId::OpAmp(block, _) => self.block_mut(block)?.output_port_mut(port),
        }
    }

    /// Connects `from` to `to`. An output can drive any number of inputs, but an
    /// input takes a single driver.
    pub fn connect(&mut self, from: OutPortId, to: InPortId) -> DesignResult<LinkId> {
        self.ensure_not_finalized()?;

        let link = LinkId(self.links.len());
        self.output_port_mut(from)?;
        self.input_port_mut(to)?.connect(link)?;
        self.output_port_mut(from)?.connect(link);
        self.links.push(PortLink::new(from, to));

        dbg_log!(DBG_EXTRA, "Connected {} -> {}", from, to);

        Ok(link)
    }

    fn ensure_not_finalized(&self) -> DesignResult<()> {
        if self.finalized {
            return Err(DesignError::InvalidParameter(
                "the design is already finalized".into()
            ));
        }
        Ok(())
    }

    /* Routing order: local inputs of every block, then its comparator, then the
     * IO cells. Side assignment depends on it. */
    fn routing_order(&self) -> Vec<LinkId> {
        let mut order = Vec::new();

        for block in &self.blocks {
            order.extend(block.local_inputs().iter()
                .filter(|input| input.owner().is_some())
                .filter_map(|input| input.port().link()));
            order.extend(block.comparator().input().link());
        }
        for cell in &self.io_cells {
            order.extend(cell.input().ok().and_then(InputPort::link));
        }

        order
    }

    /// Channel a connected input is reached through.
    fn terminating_channel(&self, port: InPortId) -> DesignResult<&Channel> {
        let link = self.input_port(port)?.link().ok_or_else(|| {
            DesignError::InvalidPort(format!("{} is not connected", port))
        })?;
        let last = self.links[link.0].channels.last().ok_or_else(|| {
            DesignError::RoutingConflict(format!("link to {} has not been routed", port))
        })?;
        Ok(&self.channels[*last])
    }

    fn finalize(&mut self) -> DesignResult<()> {
        let order = self.routing_order();
        dbg_log!(DBG_INFO, "Routing {} links", order.len());

        for link in order {
            let PortLink { output, input, .. } = self.links[link.0];
            self.links[link.0].channels = self.channels.route(output, input)?;
        }

        for block in BlockId::all() {
            let comparator = self.block(block)?.comparator();
            if comparator.owner().is_none() {
                continue;
            }
            let channel = self.terminating_channel(InPortId::Comparator(block))?;
            let selector = channel.input_selector()?;
            let near = matches!(channel.kind(), ChannelKind::GlobalInputDirect { .. });
            self.block_mut(block)?.comparator_mut().set_input(selector, near);
        }

        let mut selectors = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let module_selectors = (0 .. module.n_inputs())
                .map(|idx| self.terminating_channel(module.input(idx)?)?.input_selector())
                .collect::<DesignResult<Vec<u8>>>()?;
            selectors.push(module_selectors);
        }
        for (module, selectors) in self.modules.iter().zip(selectors) {
            let block = self.blocks.get_mut(module.block().index())
                .ok_or_else(|| no_such_block(module.block()))?;
            module.finalize(block, &selectors)?;
        }

        self.finalized = true;
        Ok(())
    }

    /// Routes the design (on first use) and builds the configuration memory image.
    pub fn compile(&mut self) -> DesignResult<ShadowSram> {
        if !self.finalized {
            self.finalize()?;
        }

        let mut ssram = ShadowSram::new();

        for clock in self.clocks.iter().filter(|clock| clock.is_used()) {
            clock.compile(&mut ssram, self.sys_clock_khz)?;
        }
        for cell in &self.io_cells {
            let source = match cell.input() {
                Ok(input) if input.is_connected() =>
                    self.terminating_channel(input.id())?.source_selector(),
                _ => 0x00,
            };
            cell.compile(&mut ssram, source)?;
        }
        self.channels.compile(&mut ssram)?;
        for block in &self.blocks {
            block.compile(&mut ssram)?;
        }

        Ok(ssram)
    }

    pub fn to_header_bytestream(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.header.to_bytes());
    }

    /// Device header followed by the compressed memory image.
    pub fn to_bytestream(&mut self) -> DesignResult<Vec<u8>> {
        let ssram = self.compile()?;
        let mut out = Vec::new();
        self.to_header_bytestream(&mut out);
        to_data_bytestream(&ssram, &mut out)
            .map_err(|e| DesignError::MemoryConflict(e.to_string()))?;
        Ok(out)
    }
}

impl Default for Chip {
    fn default() -> Self {
        Self::new()
    }
}

fn block_index(id: BlockId) -> DesignResult<usize> {
    if id.is_null() {
        return Err(DesignError::InvalidParameter(
            "the null block has no components".into()
        ));
    }
    Ok(id.index())
}

fn io_cell_index(id: IoCellId) -> Option<usize> {
    (id.0 as usize).checked_sub(1)
}

fn no_such_block(id: BlockId) -> DesignError {
    DesignError::InvalidParameter(format!("there is no {}", id))
}

fn no_such_cell(id: IoCellId) -> DesignError {
    DesignError::InvalidParameter(format!("there is no {}", id))
}

fn no_such_clock(id: ClockId) -> DesignError {
    DesignError::InvalidParameter(format!("there is no programmable clock {}", id.0))
}
