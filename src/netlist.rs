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

/* Serialized description of a design: what the circuit language front end hands
 * over to the compiler. Example (YAML):
 *
 *   clocks:
 *     - { id: 1, freq_khz: 250 }
 *   io_cells:
 *     - { id: 1, mode: input }
 *     - { id: 3, mode: output }
 *   blocks:
 *     - id: 1
 *       clocks: [1, 0]
 *       modules:
 *         - { name: amp, type: gain_inv, gain: 0.5 }
 *   connections:
 *     - IO1 -> amp
 *     - { from: amp, to: IO3 }
 *
 * Ports are referred to as `IO<n>` for IO cells, `<module>[:<n>]` for the n-th
 * (1-based) input or the output of a module and `<module>:comp` for the input of
 * its comparator. */

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::chip::{Chip, IoMode, ModuleKind, DEFAULT_SYSTEM_CLOCK_KHZ};
use crate::common::*;
use crate::error::DesignError;
use crate::memory::DeviceHeader;
use crate::port::{InPortId, OutPortId};
#[allow(unused)]
use crate::log::*;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("can't read netlist: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON netlist: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed YAML netlist: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("malformed port reference `{0}`")]
    BadPortReference(String),
    #[error("unknown module `{0}`")]
    UnknownModule(String),
    #[error("module `{0}` is defined more than once")]
    DuplicateModule(String),
    #[error(transparent)]
    Design(#[from] DesignError),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Guesses the format from a file name, ignoring a trailing `.gz`.
    pub fn from_file_name(name: &str) -> Self {
        let name = name.strip_suffix(".gz").unwrap_or(name);
        if name.ends_with(".yaml") || name.ends_with(".yml") {
            Self::Yaml
        } else {
            Self::Json
        }
    }
}

fn default_system_clock() -> u32 {
    DEFAULT_SYSTEM_CLOCK_KHZ
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockDesc {
    pub id: u8,
    pub freq_khz: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoCellDesc {
    pub id: u8,
    pub mode: IoMode,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ModuleDesc {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModuleKind,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDesc {
    pub id: u8,
    /// Clock A and clock B, 0 being the null clock.
    #[serde(default)]
    pub clocks: (u8, u8),
    #[serde(default)]
    pub modules: Vec<ModuleDesc>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ConnectionDesc {
    Arrow(String),
    Pair { from: String, to: String },
}

impl ConnectionDesc {
    fn endpoints(&self) -> Result<(&str, &str), LoadError> {
        match self {
            Self::Arrow(conn) => conn.split_once("->")
                .map(|(from, to)| (from.trim(), to.trim()))
                .ok_or_else(|| LoadError::BadPortReference(conn.clone())),
            Self::Pair { from, to } => Ok((from.trim(), to.trim())),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Netlist {
    #[serde(default = "default_system_clock")]
    pub system_clock_khz: u32,
    #[serde(default)]
    pub header: Option<DeviceHeader>,
    #[serde(default)]
    pub clocks: Vec<ClockDesc>,
    #[serde(default)]
    pub io_cells: Vec<IoCellDesc>,
    #[serde(default)]
    pub blocks: Vec<BlockDesc>,
    #[serde(default)]
    pub connections: Vec<ConnectionDesc>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum PortRef<'s> {
    IoCell(u8),
    Module { name: &'s str, index: usize },
    Comparator(&'s str),
}

fn parse_port_ref(port: &str) -> Result<PortRef<'_>, LoadError> {
    let bad = || LoadError::BadPortReference(port.to_string());

    if let Some(id) = port.strip_prefix("IO") {
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            return id.parse().map(PortRef::IoCell).map_err(|_| bad());
        }
    }

    match port.split_once(':') {
        None if !port.is_empty() => Ok(PortRef::Module { name: port, index: 1 }),
        Some((name, "comp")) if !name.is_empty() => Ok(PortRef::Comparator(name)),
        Some((name, index)) if !name.is_empty() => match index.parse() {
            Ok(index) if index >= 1 => Ok(PortRef::Module { name, index }),
            _ => Err(bad()),
        },
        _ => Err(bad()),
    }
}

impl Netlist {
    pub fn from_str(data: &str, format: Format) -> Result<Self, LoadError> {
        Ok(match format {
            Format::Json => serde_json::from_str(data)?,
            Format::Yaml => serde_yaml::from_str(data)?,
        })
    }

    /// Reads a netlist file. Files ending with `.gz` get decompressed on the fly.
    pub fn open<P>(path: P) -> Result<Self, LoadError> where
        P: AsRef<Path>
    {
        let path = path.as_ref();
        let name = path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = BufReader::new(File::open(path)?);
        let mut contents = String::new();
        if name.ends_with(".gz") {
            GzDecoder::new(file).read_to_string(&mut contents)?;
        } else {
            let mut file = file;
            file.read_to_string(&mut contents)?;
        }

        dbg_log!(DBG_INFO, "Loaded netlist {} ({} bytes)", path.display(), contents.len());

        Self::from_str(&contents, Format::from_file_name(&name))
    }

    /// Builds the chip: clocks and IO cells first, then the modules block by block
    /// (which claims their components) and finally the connections.
    pub fn build(&self) -> Result<Chip, LoadError> {
        let mut chip = Chip::with_system_clock(self.system_clock_khz);
        if let Some(header) = self.header {
            chip.set_header(header);
        }

        for clock in &self.clocks {
            chip.set_clock(ClockId(clock.id), clock.freq_khz, clock.offset)?;
        }
        for cell in &self.io_cells {
            chip.set_io_mode(IoCellId(cell.id), cell.mode)?;
        }

        let mut modules = HashMap::new();
        for block in &self.blocks {
            let id = BlockId(block.id);
            let (clk_a, clk_b) = block.clocks;
            chip.setup_block(id, ClockId(clk_a), ClockId(clk_b))?;

            for module in &block.modules {
                if modules.contains_key(module.name.as_str()) {
                    return Err(LoadError::DuplicateModule(module.name.clone()));
                }
                let module_id = chip.add_module(id, module.name.clone(), module.kind.clone())?;
                modules.insert(module.name.as_str(), module_id);
            }
        }

        for conn in &self.connections {
            let (from, to) = conn.endpoints()?;
            let from = resolve_output(&chip, &modules, from)?;
            let to = resolve_input(&chip, &modules, to)?;
            chip.connect(from, to)?;
        }

        Ok(chip)
    }
}

fn lookup<'c>(
    chip: &'c Chip,
    modules: &HashMap<&str, ModuleId>,
    name: &str
)
    -> Result<&'c crate::chip::Module, LoadError>
{
    let id = modules.get(name).ok_or_else(|| LoadError::UnknownModule(name.to_string()))?;
    Ok(chip.module(*id)?)
}

fn resolve_output(chip: &Chip, modules: &HashMap<&str, ModuleId>, port: &str)
    -> Result<OutPortId, LoadError>
{
    match parse_port_ref(port)? {
        PortRef::IoCell(id) => Ok(OutPortId::IoCell(IoCellId(id))),
        /* Every module has a single output */
        PortRef::Module { name, index: 1 } => Ok(lookup(chip, modules, name)?.output()?),
        _ => Err(LoadError::BadPortReference(port.to_string())),
    }
}

fn resolve_input(chip: &Chip, modules: &HashMap<&str, ModuleId>, port: &str)
    -> Result<InPortId, LoadError>
{
    match parse_port_ref(port)? {
        PortRef::IoCell(id) => Ok(InPortId::IoCell(IoCellId(id))),
        PortRef::Module { name, index } => Ok(lookup(chip, modules, name)?.input(index - 1)?),
        PortRef::Comparator(name) => Ok(lookup(chip, modules, name)?.comparator_input()?),
    }
}
