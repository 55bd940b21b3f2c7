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

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use obc::chip::Chip;
use obc::error::DesignError;
use obc::memory::{ShadowSram, SSRAM_BANK_SIZE, SSRAM_N_BANKS};
use obc::memory::bytestream::{to_data_bytestream, BytestreamError, ConfigurationData};
use obc::netlist::{LoadError, Netlist};
use obc::report::RoutingReport;

const CHECK_VALUE: u32 = 1337;
const C_ARRAY_NAME: &str = "an_FPAA1_PrimaryConfigInfo";

#[derive(Parser, Debug)]
#[clap(
    author = "Antmicro",
    version = "0.0.1",
    about = "OBC - Analog FPAA configuration compiler",
    long_about = None
)]
struct Args {
    #[clap(subcommand)]
    command: SubCommands,
}

#[derive(Parser, Debug)]
struct CompileCmd {
    #[clap(help = "Netlist file (.json, .yaml or .yml, optionally gzipped)")]
    netlist: PathBuf,
    #[clap(help = "Configuration output file")]
    output: PathBuf,
    #[clap(short, long, help = "Print the memory image and progress to stderr")]
    verbose: bool,
    #[clap(
        short,
        long,
        help = "Write every byte of the memory image instead of a bytestream"
    )]
    raw: bool,
    #[clap(short = 's', long, help = "Prepend the size of the bytestream")]
    add_size: bool,
    #[clap(short = 'c', long, help = "Append a check value to the bytestream")]
    add_check: bool,
    #[clap(long, help = "Write the bytestream as a C array")]
    c_array: bool,
    #[clap(long, help = "Write a JSON report of placed modules and routed links")]
    routes: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DumpCmd {
    #[clap(help = "Bytestream written by `compile`")]
    bytestream: PathBuf,
    #[clap(short = 's', long, help = "The bytestream starts with its size")]
    add_size: bool,
    #[clap(short = 'c', long, help = "The bytestream ends with a check value")]
    add_check: bool,
}

#[derive(Subcommand, Debug)]
enum SubCommands {
    /// Compile a netlist into a configuration bytestream
    Compile(CompileCmd),
    /// Decode a configuration bytestream and print the memory it writes
    Dump(DumpCmd),
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Design(#[from] DesignError),
    #[error("malformed bytestream: {0}")]
    Bytestream(#[from] BytestreamError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("can't serialize routing report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: `{text}` is not a byte")]
    BadLine { line: usize, text: String },
    #[error("{0}")]
    BadFraming(String),
}

fn write_lines(out: &mut String, values: impl IntoIterator<Item = u32>) {
    for value in values {
        let _ = writeln!(out, "{}", value);
    }
}

fn format_c_array(data: &[u8]) -> String {
    let mut out = format!("const unsigned char {}[] = {{\n", C_ARRAY_NAME);
    for byte in data {
        let _ = writeln!(out, "  0x{:02X},", byte);
    }
    out.push_str("};\n");
    out
}

fn format_bytestream(chip: &Chip, ssram: &ShadowSram, args: &CompileCmd)
    -> Result<String, AppError>
{
    let mut data = Vec::new();
    chip.to_header_bytestream(&mut data);
    to_data_bytestream(ssram, &mut data)?;

    if args.verbose {
        eprintln!("Bytestream length: {}", data.len());
    }

    if args.c_array {
        return Ok(format_c_array(&data));
    }

    let mut out = String::new();
    if args.add_size {
        write_lines(&mut out, [data.len() as u32]);
    }
    write_lines(&mut out, data.iter().map(|byte| *byte as u32));
    if args.add_check {
        write_lines(&mut out, [CHECK_VALUE]);
    }
    Ok(out)
}

fn compile(args: CompileCmd) -> Result<(), AppError> {
    let mut chip = Netlist::open(&args.netlist)?.build()?;
    let ssram = chip.compile()?;

    if args.verbose {
        eprintln!("{}", ssram);
    }

    /* Nothing gets written unless the whole design compiled */
    let out = if args.raw {
        if args.verbose {
            eprintln!("Writing raw data...");
        }
        let mut out = String::new();
        write_lines(&mut out, ssram.values().into_iter().map(|byte| byte as u32));
        out
    } else {
        if args.verbose {
            eprintln!("Writing configuration...");
        }
        format_bytestream(&chip, &ssram, &args)?
    };

    std::fs::write(&args.output, out)?;

    if let Some(path) = &args.routes {
        let report = RoutingReport::new(&chip);
        std::fs::write(path, report.to_json()?)?;
    }

    Ok(())
}

fn read_bytestream(path: &Path, args: &DumpCmd) -> Result<Vec<u8>, AppError> {
    let text = std::fs::read_to_string(path)?;
    let mut values = text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            line.trim().parse::<u32>()
                .map_err(|_| AppError::BadLine { line: idx + 1, text: line.to_string() })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if args.add_check {
        match values.pop() {
            Some(CHECK_VALUE) => (),
            other => return Err(AppError::BadFraming(format!(
                "expected check value {}, found {:?}",
                CHECK_VALUE, other
            ))),
        }
    }
    if args.add_size {
        if values.is_empty() {
            return Err(AppError::BadFraming("missing size".into()));
        }
        let size = values.remove(0) as usize;
        if size != values.len() {
            return Err(AppError::BadFraming(format!(
                "size says {} bytes, found {}",
                size, values.len()
            )));
        }
    }

    values.into_iter()
        .enumerate()
        .map(|(idx, value)| u8::try_from(value).map_err(|_| AppError::BadLine {
            line: idx + 1,
            text: value.to_string(),
        }))
        .collect()
}

fn dump(args: DumpCmd) -> Result<(), AppError> {
    let data = read_bytestream(&args.bytestream, &args)?;
    let config = ConfigurationData::parse(&data, SSRAM_BANK_SIZE, SSRAM_N_BANKS, 0x00)?;

    println!(concat!(
        "Device id: {:#010X}\n",
        "Address:   {:#04X}\n",
        "Control:   {:#04X}\n",
        "Sections:  {}"
        ),
        config.header.device_id,
        config.header.address,
        config.header.control,
        config.section_count
    );
    println!("{}", config.memory);

    Ok(())
}

fn main() {
    let args = Args::parse();

    let result = match args.command {
        SubCommands::Compile(cargs) => compile(cargs),
        SubCommands::Dump(dargs) => dump(dargs),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
