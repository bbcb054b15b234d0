//! Intcode library.
//!
//! Provides the Intcode virtual machine, multi-instance pipelines and the
//! command-line configuration used by the `intcode` binary.

pub mod cli;
pub mod utils;
pub mod virtual_machine;
