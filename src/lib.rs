#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde;

#[macro_use]
pub mod log;
pub mod common;
pub mod error;
pub mod ratio;
pub mod memory;
pub mod port;
pub mod router;
pub mod chip;
pub mod netlist;
pub mod report;
