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

/* Analog modules are built from switched capacitors around a single op-amp. Every
 * input is sampled twice, once per clock phase, by a pair of equal capacitors. All
 * of them feed the op-amp, whose feedback (reference) capacitor sets the common
 * denominator of the module's gains. */

use serde::{Deserialize, Serialize};

use crate::common::*;
use crate::error::{DesignError, DesignResult};
use crate::port::{InPortId, OutPortId};
use crate::ratio::{approximate_ratio, approximate_ratios};
#[allow(unused)]
use crate::log::*;

use super::block::{Block, Phase, SwitchConfiguration as Sw};
use super::clock::ClockSelect;

fn unity() -> f64 {
    1.0
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleKind {
    GainInv {
        gain: f64,
    },
    SumInv {
        lgain: f64,
        ugain: f64,
    },
    Integrator {
        integ_const: f64,
        #[serde(default)]
        reset: bool,
    },
    GainSwitch {
        #[serde(default = "unity")]
        ugain: f64,
        #[serde(default = "unity")]
        lgain: f64,
    },
    SampleAndHold,
}

/// Components a module claims from its block.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Requirements {
    pub caps: usize,
    pub opamps: usize,
    pub comparator: bool,
    pub inputs: usize,
}

impl ModuleKind {
    pub fn requirements(&self) -> Requirements {
        let (caps, comparator, inputs) = match self {
            Self::GainInv { .. } => (4, false, 1),
            Self::SumInv { .. } => (6, false, 2),
            Self::Integrator { reset, .. } => (3, *reset, 1),
            Self::GainSwitch { .. } => (5, true, 2),
            Self::SampleAndHold => (2, false, 1),
        };
        Requirements { caps, opamps: 1, comparator, inputs }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GainInv { .. } => "GainInv",
            Self::SumInv { .. } => "SumInv",
            Self::Integrator { .. } => "Integrator",
            Self::GainSwitch { .. } => "GainSwitch",
            Self::SampleAndHold => "SampleAndHold",
        }
    }

    fn parameters(&self) -> Vec<(&'static str, f64)> {
        match self {
            Self::GainInv { gain } => vec![("gain", *gain)],
            Self::SumInv { lgain, ugain } => vec![("lgain", *lgain), ("ugain", *ugain)],
            Self::Integrator { integ_const, .. } => vec![("integ_const", *integ_const)],
            Self::GainSwitch { ugain, lgain } => vec![("ugain", *ugain), ("lgain", *lgain)],
            Self::SampleAndHold => vec![],
        }
    }

    /// Gains are realized as capacitor ratios, so they have to be non-negative.
    pub fn validate(&self) -> DesignResult<()> {
        for (name, value) in self.parameters() {
            if !value.is_finite() || value < 0.0 {
                return Err(DesignError::InvalidParameter(format!(
                    "{} of {} must be a non-negative number, got {}",
                    name, self.name(), value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Module {
    name: String,
    block: BlockId,
    kind: ModuleKind,
    caps: Vec<usize>,
    opamps: Vec<usize>,
    comparator: bool,
    inputs: Vec<u8>,
}

impl Module {
    pub fn new(name: String, block: BlockId, kind: ModuleKind) -> Self {
        Self {
            name,
            block,
            kind,
            caps: Vec::new(),
            opamps: Vec::new(),
            comparator: false,
            inputs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn claimed_caps(&self) -> &[usize] {
        &self.caps
    }

    pub fn claimed_opamps(&self) -> &[usize] {
        &self.opamps
    }

    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub(crate) fn claim_components(&mut self, id: ModuleId, block: &mut Block)
        -> DesignResult<()>
    {
        let req = self.kind.requirements();

        dbg_log!(
            DBG_INFO,
            "{} {} claims {} capacitors, {} op-amps{} on {}",
            self.kind.name(),
            self.name,
            req.caps,
            req.opamps,
            if req.comparator { " and the comparator" } else { "" },
            block.id()
        );

        for _ in 0 .. req.caps {
            self.caps.push(block.claim_cap(id)?);
        }
        for _ in 0 .. req.opamps {
            self.opamps.push(block.claim_opamp(id)?);
        }
        if req.comparator {
            block.claim_comp(id)?;
            self.comparator = true;
        }
        for _ in 0 .. req.inputs {
            self.inputs.push(block.claim_local_input(id)? as u8);
        }

        Ok(())
    }

    /// Capacitor slot behind the module's `idx`-th capacitor.
    pub fn cap(&self, idx: usize) -> DesignResult<usize> {
        self.caps.get(idx).copied().ok_or_else(|| DesignError::ResourceExhausted(format!(
            "{} {} never claimed a capacitor no. {}",
            self.kind.name(), self.name, idx + 1
        )))
    }

    pub fn opamp(&self, idx: usize) -> DesignResult<usize> {
        self.opamps.get(idx).copied().ok_or_else(|| DesignError::ResourceExhausted(format!(
            "{} {} never claimed an op-amp no. {}",
            self.kind.name(), self.name, idx + 1
        )))
    }

    pub fn input(&self, idx: usize) -> DesignResult<InPortId> {
        self.inputs.get(idx)
            .map(|slot| InPortId::Local(self.block, *slot))
            .ok_or_else(|| DesignError::InvalidPort(format!(
                "{} {} has no input no. {}",
                self.kind.name(), self.name, idx + 1
            )))
    }

    pub fn comparator_input(&self) -> DesignResult<InPortId> {
        if !self.comparator {
            return Err(DesignError::InvalidPort(format!(
                "{} {} does not use a comparator",
                self.kind.name(), self.name
            )));
        }
        Ok(InPortId::Comparator(self.block))
    }

    pub fn output(&self) -> DesignResult<OutPortId> {
        Ok(OutPortId::OpAmp(self.block, self.opamp(0)? as u8))
    }

    /// Computes capacitor values and switches. `selectors` holds the channel nibble
    /// of every input of the module, in input order.
    pub(crate) fn finalize(&self, block: &mut Block, selectors: &[u8]) -> DesignResult<()> {
        use ClockSelect::*;

        let selector = |idx: usize| selectors.get(idx).copied().ok_or_else(|| {
            DesignError::InvalidPort(format!(
                "input no. {} of {} {} is not connected",
                idx + 1, self.kind.name(), self.name
            ))
        });
        let op = self.opamp(0)? as u8;

        match &self.kind {
            ModuleKind::GainInv { gain } => {
                let (nums, den) = approximate_ratios(&[*gain]);
                self.sample(block, [0, 1], Source::Input(selector(0)?), nums[0], A)?;
                self.sample(block, [2, 3], Source::OpAmp(op), den, A)?;
            },
            ModuleKind::SumInv { lgain, ugain } => {
                let (nums, den) = approximate_ratios(&[*lgain, *ugain]);
                self.sample(block, [0, 1], Source::Input(selector(0)?), nums[0], A)?;
                self.sample(block, [2, 3], Source::Input(selector(1)?), nums[1], A)?;
                self.sample(block, [4, 5], Source::OpAmp(op), den, A)?;
            },
            ModuleKind::Integrator { integ_const, .. } => {
                let (num, den) = approximate_ratio(*integ_const);
                self.sample(block, [0, 1], Source::Input(selector(0)?), num, A)?;
                self.hold(block, 2, den)?;
            },
            ModuleKind::GainSwitch { ugain, lgain } => {
                /* The comparator gates clock B, switching between the two gains */
                let (nums, den) = approximate_ratios(&[*ugain, *lgain]);
                self.sample(block, [0, 1], Source::Input(selector(0)?), nums[0], A)?;
                self.sample(block, [2, 3], Source::Input(selector(1)?), nums[1], B)?;
                self.hold(block, 4, den)?;
            },
            ModuleKind::SampleAndHold => {
                let (num, den) = approximate_ratio(1.0);
                let cap = self.cap(0)?;
                block.cap_mut(cap)?
                    .set_value(num)
                    .set_in(Sw::from_input(selector(0)?, Phase::One, A))
                    .set_out(Sw::to_opamp(op, Phase::One, A));
                self.hold(block, 1, den)?;
            },
        }

        Ok(())
    }

    /* A pair of capacitors charged from `source` in alternating phases */
    fn sample(
        &self,
        block: &mut Block,
        caps: [usize; 2],
        source: Source,
        value: u8,
        clock: ClockSelect
    )
        -> DesignResult<()>
    {
        let op = self.opamp(0)? as u8;

        for (idx, phase) in caps.into_iter().zip([Phase::One, Phase::Two]) {
            let cap = self.cap(idx)?;
            let input = match source {
                Source::Input(selector) => Sw::from_input(selector, phase, clock),
                Source::OpAmp(opamp) => Sw::from_opamp(opamp, phase, clock),
            };
            block.cap_mut(cap)?
                .set_value(value)
                .set_in(input)
                .set_out(Sw::to_opamp(op, phase, clock));
        }

        Ok(())
    }

    /* Capacitor permanently across the op-amp */
    fn hold(&self, block: &mut Block, idx: usize, value: u8) -> DesignResult<()> {
        let op = self.opamp(0)? as u8;
        let cap = self.cap(idx)?;
        block.cap_mut(cap)?
            .set_value(value)
            .set_in(Sw::from_opamp(op, Phase::Static, ClockSelect::A))
            .set_out(Sw::to_opamp(op, Phase::Static, ClockSelect::A));
        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
enum Source {
    Input(u8),
    OpAmp(u8),
}
