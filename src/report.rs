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

use std::collections::BTreeMap;
use serde::Serialize;

use crate::chip::Chip;
use crate::port::{InPortId, OutPortId};

#[derive(Clone, Debug, Serialize)]
pub struct LinkReport {
    pub from: String,
    pub to: String,
    pub channels: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModuleReport {
    pub kind: &'static str,
    pub block: String,
    /* 1-based, as in the register map */
    pub capacitors: Vec<usize>,
    pub opamps: Vec<usize>,
}

/// What ended up where: modules with the components they claimed and links with
/// the channels they were routed through.
#[derive(Clone, Debug, Serialize)]
pub struct RoutingReport {
    pub modules: BTreeMap<String, ModuleReport>,
    pub links: Vec<LinkReport>,
}

impl RoutingReport {
    pub fn new(chip: &Chip) -> Self {
        let modules = chip.modules().iter()
            .map(|module| (module.name().to_string(), ModuleReport {
                kind: module.kind().name(),
                block: module.block().to_string(),
                capacitors: module.claimed_caps().iter().map(|slot| slot + 1).collect(),
                opamps: module.claimed_opamps().iter().map(|slot| slot + 1).collect(),
            }))
            .collect();

        let links = chip.links().iter()
            .map(|link| LinkReport {
                from: describe_output(chip, link.output),
                to: describe_input(chip, link.input),
                channels: link.channels.iter()
                    .map(|id| chip.channels()[*id].to_string())
                    .collect(),
            })
            .collect();

        Self { modules, links }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn describe_output(chip: &Chip, port: OutPortId) -> String {
    let owner = chip.modules().iter()
        .find(|module| module.output().ok() == Some(port));
    match owner {
        Some(module) => format!("{} ({})", module.name(), port),
        None => port.to_string(),
    }
}

fn describe_input(chip: &Chip, port: InPortId) -> String {
    let owner = chip.modules().iter().find_map(|module| {
        if module.comparator_input().ok() == Some(port) {
            return Some(format!("{}:comp", module.name()));
        }
        (0 .. module.n_inputs())
            .find(|idx| module.input(*idx).ok() == Some(port))
            .map(|idx| format!("{}:{}", module.name(), idx + 1))
    });
    match owner {
        Some(name) => format!("{} ({})", name, port),
        None => port.to_string(),
    }
}
