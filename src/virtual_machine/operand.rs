use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::Memory;
use std::fmt;

/// Addressing mode of a single parameter.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    /// The parameter is an address; the operand is the word stored there.
    Position = 0,
    /// The parameter is the operand itself.
    Immediate = 1,
}

impl Mode {
    /// Decodes one mode digit, reporting `position` on failure.
    pub fn from_digit(digit: i64, position: usize) -> Result<Self, VMError> {
        match digit {
            0 => Ok(Mode::Position),
            1 => Ok(Mode::Immediate),
            _ => Err(VMError::InvalidMode {
                mode: digit,
                position,
            }),
        }
    }
}

/// A resolved instruction operand.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    /// Read through one level of indirection: `address` was stored in the
    /// parameter slot and `value` is the word currently at `address`.
    Reference { address: usize, value: i64 },
    /// Literal taken directly from the parameter slot.
    Immediate(i64),
}

impl Operand {
    pub const fn value(&self) -> i64 {
        match self {
            Operand::Reference { value, .. } => *value,
            Operand::Immediate(value) => *value,
        }
    }

    /// Returns the address to write through, rejecting immediate operands.
    pub fn target(&self, position: usize) -> Result<usize, VMError> {
        match self {
            Operand::Reference { address, .. } => Ok(*address),
            Operand::Immediate(_) => Err(VMError::ImmediateWriteTarget { position }),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reference { address, value } => write!(f, "{value}@{address}"),
            Operand::Immediate(value) => write!(f, "{value}"),
        }
    }
}

/// Resolves `count` operands whose parameter slots start at `first`.
///
/// Mode digits are consumed least significant first; missing digits mean
/// position mode. `position` is the address of the instruction word and is
/// only used for error reporting.
pub fn resolve(
    memory: &Memory<'_>,
    position: usize,
    first: usize,
    mut mode: i64,
    count: usize,
) -> Result<Vec<Operand>, VMError> {
    let mut operands = Vec::with_capacity(count);
    for slot in first..first + count {
        let digit = mode % 10;
        mode /= 10;
        let word = memory.read(slot, position)?;
        let operand = match Mode::from_digit(digit, position)? {
            Mode::Position => {
                let address = memory.address(word, position)?;
                Operand::Reference {
                    address,
                    value: memory.read(address, position)?,
                }
            }
            Mode::Immediate => Operand::Immediate(word),
        };
        operands.push(operand);
    }
    Ok(operands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_digit() {
        assert_eq!(Mode::from_digit(0, 0).unwrap(), Mode::Position);
        assert_eq!(Mode::from_digit(1, 0).unwrap(), Mode::Immediate);
        assert!(matches!(
            Mode::from_digit(2, 5),
            Err(VMError::InvalidMode { mode: 2, position: 5 })
        ));
    }

    #[test]
    fn resolve_position_mode() {
        let mut words = [1, 4, 0, 0, 99];
        let memory = Memory::new(&mut words);
        let ops = resolve(&memory, 0, 1, 0, 3).unwrap();
        assert_eq!(
            ops,
            vec![
                Operand::Reference {
                    address: 4,
                    value: 99
                },
                Operand::Reference {
                    address: 0,
                    value: 1
                },
                Operand::Reference {
                    address: 0,
                    value: 1
                },
            ]
        );
    }

    #[test]
    fn resolve_mixed_modes_least_significant_first() {
        // 1002: multiply, first param position, second immediate, third defaulted
        let mut words = [1002, 4, 3, 4, 33];
        let memory = Memory::new(&mut words);
        let ops = resolve(&memory, 0, 1, 10, 3).unwrap();
        assert_eq!(ops[0].value(), 33);
        assert_eq!(ops[1], Operand::Immediate(3));
        assert_eq!(ops[2].target(0).unwrap(), 4);
    }

    #[test]
    fn resolve_slot_out_of_bounds() {
        let mut words = [1, 0];
        let memory = Memory::new(&mut words);
        let err = resolve(&memory, 0, 1, 111, 3).unwrap_err();
        assert!(matches!(
            err,
            VMError::AddressOutOfBounds { address: 2, len: 2, .. }
        ));
    }

    #[test]
    fn resolve_pointer_out_of_bounds() {
        let mut words = [4, 7, 99];
        let memory = Memory::new(&mut words);
        let err = resolve(&memory, 0, 1, 0, 1).unwrap_err();
        assert!(matches!(
            err,
            VMError::AddressOutOfBounds { address: 7, len: 3, .. }
        ));
    }

    #[test]
    fn resolve_negative_pointer() {
        let mut words = [4, -1, 99];
        let memory = Memory::new(&mut words);
        assert!(resolve(&memory, 0, 1, 0, 1).unwrap_err().is_address_error());
    }

    #[test]
    fn immediate_target_is_rejected() {
        assert!(matches!(
            Operand::Immediate(3).target(8),
            Err(VMError::ImmediateWriteTarget { position: 8 })
        ));
    }

    #[test]
    fn display() {
        assert_eq!(
            Operand::Reference {
                address: 3,
                value: 7
            }
            .to_string(),
            "7@3"
        );
        assert_eq!(Operand::Immediate(-4).to_string(), "-4");
    }
}
