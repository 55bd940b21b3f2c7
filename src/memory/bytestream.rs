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

/* Wire format understood by the device's program loader:
 *
 *   header:  D5 <device id: 4 bytes> <address> <control>
 *   section: <ctrl|byte addr> <bank addr> <length> <data: length bytes> 2A
 *
 * The two top bits of the first section byte tell whether more sections follow.
 * Bit 5 would request a CRC instead of the terminator byte; it is never emitted
 * by the compiler, but the parser understands it. A length of 0 stands for 256.
 */

use serde::{Deserialize, Serialize};
use super::MemoryBase;
#[allow(unused)]
use crate::log::*;

pub const SYNC_BYTE: u8 = 0xD5;
pub const SECTION_TERMINATOR: u8 = 0x2A;
pub const SECTION_MORE_FOLLOWS: u8 = 0b1100_0000;
pub const SECTION_LAST: u8 = 0b1000_0000;
pub const SECTION_MAX_LEN: usize = 256;
/* Number of consecutive zero bytes that may be absorbed into a section */
pub const SECTION_ZERO_TOLERANCE: usize = 4;

const SECTION_BYTE_ADDR_MASK: u8 = 0x1F;
const SECTION_CRC_BIT: u8 = 5;
const SECTION_FOLLOWS_BIT: u8 = 6;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceHeader {
    pub device_id: u32,
    pub address: u8,
    pub control: u8,
}

impl DeviceHeader {
    pub const SIZE: usize = 7;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let id = self.device_id.to_be_bytes();
        [SYNC_BYTE, id[0], id[1], id[2], id[3], self.address, self.control]
    }
}

impl Default for DeviceHeader {
    fn default() -> Self {
        Self {
            device_id: 0x0001_2001,
            address: 0x01,
            control: 0x05,
        }
    }
}

/// A contiguous run of memory starting at a linear memory index.
#[derive(Clone, PartialEq, Eq, Debug)]
struct Section {
    start: usize,
    data: Vec<u8>,
}

fn gather_sections(values: &[u8]) -> Vec<Section> {
    let mut sections = Vec::new();

    let mut i = 0;
    while i < values.len() {
        if values[i] == 0 {
            i += 1;
            continue;
        }

        let start = i;
        let mut data = Vec::new();
        let mut null_count = 0;

        let mut j = i;
        while j < values.len()
            && null_count <= SECTION_ZERO_TOLERANCE
            && data.len() < SECTION_MAX_LEN
        {
            if values[j] == 0 {
                null_count += 1;
            } else {
                null_count = 0;
            }
            data.push(values[j]);
            j += 1;
        }

        while data.last() == Some(&0) {
            data.pop();
        }

        sections.push(Section { start, data });

        i = j;
    }

    sections
}

/// Compresses the memory image into a chain of sections, skipping zero regions.
/// Unset cells are treated as zero. Fails for memories whose addresses don't fit
/// into section headers (banks over 32 bytes or bank addresses over 0xFF).
pub fn to_data_bytestream(mem: &MemoryBase, out: &mut Vec<u8>)
    -> Result<(), BytestreamError>
{
    let max_bank_size = SECTION_BYTE_ADDR_MASK as usize + 1;
    if mem.bank_size() == 0
        || mem.bank_size() > max_bank_size
        || mem.bank_addr_start() + mem.n_banks() > 0x100
    {
        return Err(BytestreamError::UnencodableGeometry {
            bank_size: mem.bank_size(),
            n_banks: mem.n_banks(),
            start: mem.bank_addr_start(),
        });
    }

    let sections = gather_sections(&mem.values());
    let section_cnt = sections.len();

    dbg_log!(DBG_INFO, "Emitting {} memory sections", section_cnt);

    for (idx, section) in sections.into_iter().enumerate() {
        let byte_addr = (section.start % mem.bank_size()) as u8;
        let bank_addr = (section.start / mem.bank_size() + mem.bank_addr_start()) as u8;
        let len = section.data.len();

        let flags = if idx + 1 == section_cnt {
            SECTION_LAST
        } else {
            SECTION_MORE_FOLLOWS
        };

        dbg_log!(
            DBG_EXTRA,
            "  section {:02X}:{:02X}, {} bytes",
            bank_addr, byte_addr, len
        );

        out.push((byte_addr & SECTION_BYTE_ADDR_MASK) | flags);
        out.push(bank_addr);
        out.push(if len == SECTION_MAX_LEN { 0 } else { len as u8 });
        out.extend_from_slice(&section.data);
        out.push(SECTION_TERMINATOR);
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BytestreamError {
    #[error("expected SYNC byte, found {0:#04X}")]
    MissingSync(u8),
    #[error("unexpected end of data at offset {0}")]
    Truncated(usize),
    #[error("expected DATA BLOCK END byte at offset {0}")]
    MissingTerminator(usize),
    #[error("section writes outside of memory (bank {bank:02X}, byte {byte:02X})")]
    OutOfRange { bank: usize, byte: usize },
    #[error(
        "{n_banks} banks of {bank_size} bytes from bank {start:02X} can't be addressed by sections"
    )]
    UnencodableGeometry { bank_size: usize, n_banks: usize, start: usize },
}

/// Configuration decoded from a bytestream, the way the device loader sees it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ConfigurationData {
    pub header: DeviceHeader,
    pub memory: MemoryBase,
    pub section_count: usize,
}

struct Cursor<'d> {
    data: &'d [u8],
    pos: usize,
}

impl<'d> Cursor<'d> {
    fn next(&mut self) -> Result<u8, BytestreamError> {
        let byte = *self.data.get(self.pos)
            .ok_or(BytestreamError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn next_n(&mut self, n: usize) -> Result<u32, BytestreamError> {
        let mut x = 0u32;
        for _ in 0 .. n {
            x = x << 8 | self.next()? as u32;
        }
        Ok(x)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl ConfigurationData {
    /// Parses a bytestream produced by the compiler (header included) into a memory
    /// image with the given geometry. Cells written by a section are set, all
    /// others are left unset.
    pub fn parse(
        data: &[u8],
        bank_size: usize,
        n_banks: usize,
        bank_addr_start: usize
    )
        -> Result<Self, BytestreamError>
    {
        let mut cursor = Cursor { data, pos: 0 };

        let sync = cursor.next()?;
        if sync != SYNC_BYTE {
            return Err(BytestreamError::MissingSync(sync));
        }
        let header = DeviceHeader {
            device_id: cursor.next_n(4)?,
            address: cursor.next()?,
            control: cursor.next()?,
        };

        let mut memory = MemoryBase::new(bank_size, n_banks, bank_addr_start);
        let mut section_count = 0;

        /* An image without a single non-zero byte compiles to a bare header */
        let mut data_follows = !cursor.at_end();
        while data_follows {
            let ctrl = cursor.next()?;
            let byte_addr = (ctrl & SECTION_BYTE_ADDR_MASK) as usize;
            let use_crc = (ctrl >> SECTION_CRC_BIT) & 1 != 0;
            data_follows = (ctrl >> SECTION_FOLLOWS_BIT) & 1 != 0;

            let bank_addr = cursor.next()? as usize;
            let cnt = match cursor.next()? {
                0 => SECTION_MAX_LEN,
                cnt => cnt as usize,
            };

            for i in 0 .. cnt {
                let value = cursor.next()?;
                /* Sections may cross bank boundaries */
                let linear = byte_addr + i;
                let bank = bank_addr + linear / bank_size;
                let byte = linear % bank_size;
                memory.set(bank, byte, value)
                    .map_err(|_| BytestreamError::OutOfRange { bank, byte })?;
            }

            if use_crc {
                let _crc = cursor.next_n(2)?;
            } else if cursor.next()? != SECTION_TERMINATOR {
                return Err(BytestreamError::MissingTerminator(cursor.pos - 1));
            }

            section_count += 1;
        }

        Ok(Self { header, memory, section_count })
    }
}
