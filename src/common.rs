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
use serde::Serialize;

pub const N_CAPACITORS_PER_BLOCK: usize = 8;
pub const N_OPAMPS_PER_BLOCK: usize = 2;
pub const N_LOCAL_INPUTS_PER_BLOCK: usize = 8;
pub const N_IO_CELLS_PER_CHIP: usize = 4;
pub const N_BLOCKS_PER_CHIP: usize = 4;
/* Clock 0 is the null clock */
pub const N_CLOCKS_PER_CHIP: usize = 6;

pub const fn from_nibbles(n1: u8, n2: u8) -> u8 {
    (n1 << 4) | (n2 & 0x0F)
}

/// Identifies one of the analog blocks (CABs). Id 0 is the null block which is used
/// by everything that does not live inside of a block, like IO cells.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct BlockId(pub u8);

impl BlockId {
    pub const NULL: BlockId = BlockId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Blocks are placed on a 2x2 grid. Odd blocks sit in the first column.
    pub fn column(self) -> ColumnGroup {
        if self.0 % 2 == 1 { ColumnGroup::Odd } else { ColumnGroup::Even }
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize - 1
    }

    pub fn all() -> impl Iterator<Item = BlockId> {
        (1 ..= N_BLOCKS_PER_CHIP as u8).map(BlockId)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "CAB<null>")
        } else {
            write!(f, "CAB{}", self.0)
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct IoCellId(pub u8);

impl IoCellId {
    /// IO cells 1 and 2 share the first group, 3 and 4 the second one.
    pub fn group(self) -> IoGroup {
        IoGroup((self.0 - 1) / 2)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize - 1
    }

    pub fn all() -> impl Iterator<Item = IoCellId> {
        (1 ..= N_IO_CELLS_PER_CHIP as u8).map(IoCellId)
    }
}

impl fmt::Display for IoCellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IO{}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct IoGroup(pub u8);

impl fmt::Display for IoGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iogroup{}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub enum ColumnGroup {
    Odd,
    Even,
}

impl ColumnGroup {
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Odd => 0,
            Self::Even => 1,
        }
    }
}

impl fmt::Display for ColumnGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Odd => write!(f, "odd"),
            Self::Even => write!(f, "even"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct ClockId(pub u8);

impl ClockId {
    pub const NULL: ClockId = ClockId(0);
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ModuleId(pub usize);

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LinkId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles() {
        assert_eq!(from_nibbles(0x1, 0x3), 0x13);
        assert_eq!(from_nibbles(0xC, 0x0), 0xC0);
    }

    #[test]
    fn test_grouping() {
        assert_eq!(BlockId(1).column(), ColumnGroup::Odd);
        assert_eq!(BlockId(3).column(), ColumnGroup::Odd);
        assert_eq!(BlockId(2).column(), ColumnGroup::Even);
        assert_eq!(BlockId(4).column(), ColumnGroup::Even);

        assert_eq!(IoCellId(1).group(), IoGroup(0));
        assert_eq!(IoCellId(2).group(), IoGroup(0));
        assert_eq!(IoCellId(3).group(), IoGroup(1));
        assert_eq!(IoCellId(4).group(), IoGroup(1));
    }
}
