//! Intcode virtual machine.
//!
//! Programs are flat vectors of signed integers that double as the VM's
//! memory, so a running program may rewrite its own instructions.
//!
//! # Architecture
//!
//! - **Instruction format**: `word % 100` is the opcode, the remaining digits
//!   are per-parameter addressing modes read least significant first
//! - **Addressing modes**: position (`0`, the parameter is an address) and
//!   immediate (`1`, the parameter is the value)
//! - **Memory**: fixed size and bounds checked; it never grows
//! - **I/O**: `store` pops from an input queue and suspends the VM when the
//!   queue is empty, `output` pushes to an output queue
//! - **Tracing**: every executed instruction is recorded with a readable
//!   description of what it did
//!
//! # Modules
//!
//! - [`errors`]: Execution error and fault types
//! - [`io`]: Input and output endpoints, including channel-backed ones
//! - [`isa`]: Opcode table and instruction word decoding
//! - [`operand`]: Addressing modes and operand resolution
//! - [`pipeline`]: Chains of VMs connected output to input
//! - [`program`]: Program text parsing and the noun/verb probe
//! - [`vm`]: The fetch-decode-execute loop

pub mod errors;
pub mod io;
pub mod isa;
pub mod operand;
pub mod pipeline;
pub mod program;
pub mod vm;
