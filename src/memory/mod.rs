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
use crate::error::{DesignError, DesignResult};
use crate::common::BlockId;

pub mod bytestream;
#[cfg(test)]
mod tests;

pub use self::bytestream::*;

/// A single byte of configuration memory. Cells start unset and can be written
/// exactly once.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum MemoryCell {
    #[default]
    Unset,
    Set(u8),
}

impl MemoryCell {
    /// Value of the cell as it ends up on the device. Unset cells are zero.
    pub fn value(&self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Set(v) => *v,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MemoryAddress {
    pub bank_addr: usize,
    pub byte_addr: usize,
}

impl MemoryAddress {
    pub fn new(bank_addr: usize, byte_addr: usize) -> Self {
        Self { bank_addr, byte_addr }
    }
}

/// Bank-addressed, write-once memory. Writing a cell twice is always a bug
/// somewhere above (two components believing they own the same configuration
/// bits), so it is reported as an error.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MemoryBase {
    bank_size: usize,
    n_banks: usize,
    bank_addr_start: usize,
    cells: Vec<MemoryCell>,
}

impl MemoryBase {
    pub fn new(bank_size: usize, n_banks: usize, bank_addr_start: usize) -> Self {
        Self {
            bank_size,
            n_banks,
            bank_addr_start,
            cells: vec![MemoryCell::Unset; bank_size * n_banks],
        }
    }

    pub fn bank_size(&self) -> usize {
        self.bank_size
    }

    pub fn n_banks(&self) -> usize {
        self.n_banks
    }

    pub fn bank_addr_start(&self) -> usize {
        self.bank_addr_start
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn includes(&self, bank_addr: usize, byte_addr: usize) -> bool {
        bank_addr >= self.bank_addr_start
            && bank_addr < self.bank_addr_start + self.n_banks
            && byte_addr < self.bank_size
    }

    fn translate(&self, bank_addr: usize, byte_addr: usize) -> DesignResult<usize> {
        if !self.includes(bank_addr, byte_addr) {
            return Err(DesignError::MemoryConflict(format!(
                "illegal access to bank {:02X}, byte {:02X}",
                bank_addr, byte_addr
            )));
        }
        Ok((bank_addr - self.bank_addr_start) * self.bank_size + byte_addr)
    }

    pub fn get(&self, bank_addr: usize, byte_addr: usize) -> DesignResult<MemoryCell> {
        Ok(self.cells[self.translate(bank_addr, byte_addr)?])
    }

    pub fn set(&mut self, bank_addr: usize, byte_addr: usize, value: u8) -> DesignResult<()> {
        let idx = self.translate(bank_addr, byte_addr)?;
        if self.cells[idx].is_set() {
            return Err(DesignError::MemoryConflict(format!(
                "memory at {:02X}:{:02X} already written",
                bank_addr, byte_addr
            )));
        }
        self.cells[idx] = MemoryCell::Set(value);
        Ok(())
    }

    /// Writes consecutive bytes starting at the given address.
    pub fn set_bytes(&mut self, bank_addr: usize, byte_addr: usize, values: &[u8])
        -> DesignResult<()>
    {
        for (i, value) in values.iter().enumerate() {
            self.set(bank_addr, byte_addr + i, *value)?;
        }
        Ok(())
    }

    pub fn set_at(&mut self, addr: MemoryAddress, values: &[u8]) -> DesignResult<()> {
        self.set_bytes(addr.bank_addr, addr.byte_addr, values)
    }

    /// Cells in bank-major, byte-minor order.
    pub fn cells(&self) -> &[MemoryCell] {
        &self.cells
    }

    /// Values of all cells, with unset cells read as zero.
    pub fn values(&self) -> Vec<u8> {
        self.cells.iter().map(MemoryCell::value).collect()
    }
}

impl fmt::Display for MemoryBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "    ")?;
        for i in 0 .. self.bank_size {
            write!(f, "{:02X} ", i)?;
        }

        for bank in 0 .. self.n_banks {
            write!(f, "\n{:02X}: ", self.bank_addr_start + bank)?;
            for byte in 0 .. self.bank_size {
                match self.cells[bank * self.bank_size + byte] {
                    MemoryCell::Set(v) => write!(f, "{:02X} ", v)?,
                    MemoryCell::Unset => write!(f, ".. ")?,
                }
            }
        }

        Ok(())
    }
}

pub const SSRAM_BANK_SIZE: usize = 0x20;
pub const SSRAM_N_BANKS: usize = 0x0B;

/// Mirror of the configuration SRAM of the device. Bank 0 holds the clock
/// dividers and IO cell modes, bank 1 the global routing, and every block owns
/// a pair of banks starting at bank 3.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ShadowSram(MemoryBase);

impl ShadowSram {
    pub fn new() -> Self {
        Self(MemoryBase::new(SSRAM_BANK_SIZE, SSRAM_N_BANKS, 0x00))
    }

    pub fn block_bank_a(block: BlockId) -> usize {
        2 * block.0 as usize + 1
    }

    pub fn block_bank_b(block: BlockId) -> usize {
        Self::block_bank_a(block) + 1
    }
}

impl Default for ShadowSram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for ShadowSram {
    type Target = MemoryBase;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for ShadowSram {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl fmt::Display for ShadowSram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
