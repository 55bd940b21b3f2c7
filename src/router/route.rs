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
use crate::port::{InPortId, OutPortId};
#[allow(unused)]
use crate::log::*;

use super::{ChannelId, ChannelKind, ChannelPool, Side};

/* IO groups and block columns with dedicated wires between them */
const DIRECT_WIRING: &[(IoGroup, ColumnGroup)] = &[
    (IoGroup(0), ColumnGroup::Odd),
    (IoGroup(1), ColumnGroup::Even),
];

/* Blocks whose op-amp to input loop is missing from the silicon. A loop within
 * these goes out to the global bus and back in through the local channels.
 * Known from measurements only, so it stays a plain list. */
const LOOPBACK_VIA_GLOBAL: &[BlockId] = &[BlockId(3)];

pub fn is_directly_wired(group: IoGroup, block: BlockId) -> bool {
    DIRECT_WIRING.iter().any(|(g, column)| *g == group && *column == block.column())
}

pub fn loops_back_via_global(block: BlockId) -> bool {
    LOOPBACK_VIA_GLOBAL.contains(&block)
}

impl ChannelPool {
    /// Picks and allocates the wires connecting `output` to `input`, in the order
    /// the signal travels through them.
    pub fn route(&mut self, output: OutPortId, input: InPortId) -> DesignResult<Vec<ChannelId>> {
        dbg_log!(DBG_INFO, "Routing {} -> {}", output, input);

        match (output, input) {
            (OutPortId::OpAmp(from, slot), InPortId::Local(to, _))
            | (OutPortId::OpAmp(from, slot), InPortId::Comparator(to)) => {
                if from != to {
                    let id = self.allocate_available(ChannelKind::InterCab { from, to }, output)?;
                    Ok(vec![id])
                } else if loops_back_via_global(from) {
                    self.route_loopback_via_global(output, from)
                } else {
                    /* Each op-amp owns one side of the loop */
                    let side = if slot == 0 { Side::Primary } else { Side::Secondary };
                    let id = self.find(ChannelKind::IntraCab(from), side)?;
                    self.allocate(id, output)?;
                    Ok(vec![id])
                }
            },
            (OutPortId::IoCell(cell), InPortId::Local(block, _))
            | (OutPortId::IoCell(cell), InPortId::Comparator(block)) => {
                let group = cell.group();
                if is_directly_wired(group, block) {
                    let kind = ChannelKind::GlobalInputDirect { group, block };
                    Ok(vec![self.allocate_available(kind, output)?])
                } else {
                    let bus = self.allocate_available(
                        ChannelKind::GlobalBiIndirect(block.column()),
                        output
                    )?;
                    let local = self.allocate_available(ChannelKind::LocalInput(block), output)?;
                    self.set_peer(local, bus)?;
                    Ok(vec![bus, local])
                }
            },
            (OutPortId::OpAmp(block, _), InPortId::IoCell(cell)) => {
                let group = cell.group();
                if is_directly_wired(group, block) {
                    let kind = ChannelKind::GlobalOutputDirect { group, block };
                    Ok(vec![self.allocate_available(kind, output)?])
                } else {
                    let local = self.allocate_available(ChannelKind::LocalOutput(block), output)?;
                    let bus = self.allocate_available(
                        ChannelKind::GlobalBiIndirect(block.column()),
                        output
                    )?;
                    self.set_peer(local, bus)?;
                    Ok(vec![local, bus])
                }
            },
            (OutPortId::IoCell(_), InPortId::IoCell(_)) => {
                Err(DesignError::RoutingConflict(format!(
                    "{} can't be connected to {}, IO cells have no path between each other",
                    output, input
                )))
            },
        }
    }

    fn route_loopback_via_global(&mut self, output: OutPortId, block: BlockId)
        -> DesignResult<Vec<ChannelId>>
    {
        dbg_log!(DBG_WARN, "  {} can't loop back locally, going through a global bus", block);

        let local_out = self.allocate_available(ChannelKind::LocalOutput(block), output)?;
        let bus = self.allocate_available(ChannelKind::GlobalBiIndirect(block.column()), output)?;
        let local_in = self.allocate_available(ChannelKind::LocalInput(block), output)?;
        self.set_peer(local_out, bus)?;
        self.set_peer(local_in, bus)?;

        Ok(vec![local_out, bus, local_in])
    }
}
