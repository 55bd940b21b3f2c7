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
use crate::memory::ShadowSram;

pub const DEFAULT_SYSTEM_CLOCK_KHZ: u32 = 16_000;

impl ClockId {
    /// Nibble selecting the clock in the block clock register.
    pub fn nibble(self) -> u8 {
        match self.0 {
            1 => 0xC,
            2 => 0xD,
            3 => 0xE,
            4 => 0xF,
            5 => 0xA,
            6 => 0xB,
            _ => 0x0,
        }
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Which of the two clocks of a block drives a switch.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ClockSelect {
    A,
    B,
}

impl ClockSelect {
    pub(crate) fn byte(self) -> u8 {
        match self {
            Self::A => 0x01,
            Self::B => 0x02,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Clock {
    id: ClockId,
    freq_khz: u32,
    offset: u32,
    is_used: bool,
}

impl Clock {
    /// An unconfigured clock runs at the system clock.
    pub fn new(id: ClockId, sys_khz: u32) -> Self {
        Self { id, freq_khz: sys_khz, offset: 0, is_used: false }
    }

    pub fn id(&self) -> ClockId {
        self.id
    }

    pub fn freq_khz(&self) -> u32 {
        self.freq_khz
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn is_used(&self) -> bool {
        self.is_used
    }

    pub fn configure(&mut self, freq_khz: u32, offset: u32) -> DesignResult<()> {
        if freq_khz == 0 {
            return Err(DesignError::InvalidParameter(format!(
                "clock {} can't run at 0 kHz",
                self.id.0
            )));
        }
        self.freq_khz = freq_khz;
        self.offset = offset;
        Ok(())
    }

    pub fn set_is_used(&mut self, is_used: bool) {
        self.is_used = is_used;
    }

    /// Divider of the system clock, which the hardware applies twice.
    pub fn divider(&self, sys_khz: u32) -> DesignResult<u8> {
        if self.freq_khz == sys_khz {
            return Ok(0);
        }
        let realizable = self.freq_khz.checked_mul(2)
            .map(|period| sys_khz % period == 0)
            .unwrap_or(false);
        if !realizable {
            return Err(DesignError::UnrealizableValue(format!(
                "clock {} can't run at {} kHz with a {} kHz system clock",
                self.id.0, self.freq_khz, sys_khz
            )));
        }

        u8::try_from(sys_khz / self.freq_khz / 2).map_err(|_| {
            DesignError::UnrealizableValue(format!(
                "clock {} at {} kHz needs a divider wider than 8 bits",
                self.id.0, self.freq_khz
            ))
        })
    }

    pub fn compile(&self, ssram: &mut ShadowSram, sys_khz: u32) -> DesignResult<()> {
        let divider = self.divider(sys_khz)?;

        match self.id.0 {
            1 ..= 4 => ssram.set(0x00, 0x08 - self.id.0 as usize, divider),
            5 => ssram.set_bytes(0x00, 0x02, &[0x00, divider]),
            6 => ssram.set_bytes(0x00, 0x00, &[0x00, divider]),
            _ => Err(DesignError::InvalidParameter(format!(
                "there is no programmable clock {}",
                self.id.0
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(id: u8, freq_khz: u32) -> Clock {
        let mut clock = Clock::new(ClockId(id), DEFAULT_SYSTEM_CLOCK_KHZ);
        clock.configure(freq_khz, 0).unwrap();
        clock
    }

    #[test]
    fn test_nibbles() {
        let nibbles: Vec<u8> = (0 ..= 6).map(|id| ClockId(id).nibble()).collect();
        assert_eq!(nibbles, vec![0x0, 0xC, 0xD, 0xE, 0xF, 0xA, 0xB]);
    }

    #[test]
    fn test_divider() {
        assert_eq!(clock(1, 16_000).divider(16_000).unwrap(), 0);
        assert_eq!(clock(1, 250).divider(16_000).unwrap(), 32);
        assert_eq!(clock(1, 1000).divider(16_000).unwrap(), 8);
        assert!(matches!(
            clock(1, 3000).divider(16_000),
            Err(DesignError::UnrealizableValue(_))
        ));
        assert!(matches!(
            clock(1, 1).divider(16_000),
            Err(DesignError::UnrealizableValue(_))
        ));
        assert!(matches!(
            clock(2, 3_000_000_000).divider(16_000),
            Err(DesignError::UnrealizableValue(_))
        ));
        assert!(matches!(
            clock(2, u32::MAX).divider(16_000),
            Err(DesignError::UnrealizableValue(_))
        ));
    }

    #[test]
    fn test_defaults_to_system_clock() {
        let clock = Clock::new(ClockId(1), 24_000);
        assert_eq!(clock.freq_khz(), 24_000);
        assert_eq!(clock.divider(24_000).unwrap(), 0);
    }

    #[test]
    fn test_compile() {
        let mut ssram = ShadowSram::new();
        clock(1, 250).compile(&mut ssram, 16_000).unwrap();
        clock(4, 500).compile(&mut ssram, 16_000).unwrap();
        clock(5, 1000).compile(&mut ssram, 16_000).unwrap();
        clock(6, 16_000).compile(&mut ssram, 16_000).unwrap();

        let bank0: Vec<_> = (0 .. 8).map(|byte| ssram.get(0, byte).unwrap()).collect();
        use crate::memory::MemoryCell::*;
        assert_eq!(bank0, vec![Set(0), Set(0), Set(0), Set(8), Set(16), Unset, Unset, Set(32)]);
    }
}
