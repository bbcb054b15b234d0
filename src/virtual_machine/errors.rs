use crate::virtual_machine::vm::Instruction;
use thiserror::Error;

/// Errors that can occur while decoding or executing an Intcode program.
///
/// Every variant is fatal to the VM instance that raised it: a corrupted
/// instruction stream cannot safely continue.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VMError {
    /// A parameter slot, or the address stored in it, lies outside memory.
    #[error("instruction at {position} accessed address {address} outside memory of length {len}")]
    AddressOutOfBounds {
        position: usize,
        address: i64,
        len: usize,
    },
    /// A write target was encoded in immediate mode.
    #[error("instruction at {position} writes through an immediate operand")]
    ImmediateWriteTarget { position: usize },
    /// The low two digits of the instruction word name no known opcode.
    #[error("program reached invalid opcode {opcode} at position {position}")]
    UnknownOpcode { opcode: i64, position: usize },
    /// A parameter mode digit other than 0 (position) or 1 (immediate).
    #[error("instruction at {position} uses unsupported parameter mode {mode}")]
    InvalidMode { mode: i64, position: usize },
    /// A single-shot run needs input that was never supplied.
    #[error("instruction at {position} needs input but the input queue is empty")]
    InputExhausted { position: usize },
    /// A piped run needs input but every producer has gone away.
    #[error("instruction at {position} needs input but the input channel is closed")]
    InputClosed { position: usize },
    /// Execution was cut off by the caller's step budget.
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: usize },
}

impl VMError {
    /// Returns true for the address family of faults (bad slot, bad pointer,
    /// write through an immediate).
    pub fn is_address_error(&self) -> bool {
        matches!(
            self,
            VMError::AddressOutOfBounds { .. } | VMError::ImmediateWriteTarget { .. }
        )
    }
}

/// A VM fault together with the trace recorded up to the faulting instruction.
#[derive(Clone, Debug, Error)]
#[error("{error}")]
pub struct Fault {
    #[source]
    pub error: VMError,
    pub trace: Vec<Instruction>,
}

impl Fault {
    pub fn new(error: VMError, trace: Vec<Instruction>) -> Self {
        Self { error, trace }
    }

    /// Renders the fault message followed by one line per executed instruction.
    pub fn report(&self) -> String {
        let mut out = self.error.to_string();
        for instruction in &self.trace {
            out.push('\n');
            out.push_str(&instruction.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_family() {
        let oob = VMError::AddressOutOfBounds {
            position: 0,
            address: 9,
            len: 4,
        };
        assert!(oob.is_address_error());
        assert!(VMError::ImmediateWriteTarget { position: 3 }.is_address_error());
        assert!(
            !VMError::UnknownOpcode {
                opcode: 42,
                position: 0
            }
            .is_address_error()
        );
    }

    #[test]
    fn report_without_trace_is_just_the_message() {
        let fault = Fault::new(
            VMError::UnknownOpcode {
                opcode: 42,
                position: 7,
            },
            vec![],
        );
        assert_eq!(
            fault.report(),
            "program reached invalid opcode 42 at position 7"
        );
        assert_eq!(fault.to_string(), fault.report());
    }
}
