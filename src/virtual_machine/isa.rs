//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode table and invokes a callback macro for code generation, so the
//! opcode numbers, mnemonics and parameter lists are written down exactly once.
//!
//! This module generates:
//! - The [`Opcode`] enum with its numeric values
//! - `TryFrom<i64>` for decoding the low two digits of an instruction word
//! - [`Opcode::mnemonic`] and [`Opcode::params`]
//!
//! # Instruction word format
//!
//! An instruction word is `mode * 100 + opcode`. The mode part holds one
//! decimal digit per parameter, least significant digit first:
//! - `0`: position mode, the parameter is an address
//! - `1`: immediate mode, the parameter is a literal

use crate::virtual_machine::errors::VMError;

/// Role of an instruction parameter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Param {
    /// The operand value is read.
    Read,
    /// The operand is a write target and must be in position mode.
    Write,
}

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            /// add a, b, dst ; dst = a + b
            Add = 1, "add" => [a: Read, b: Read, dst: Write],
            /// multiply a, b, dst ; dst = a * b
            Multiply = 2, "multiply" => [a: Read, b: Read, dst: Write],
            /// store dst ; dst = next input (suspends while the input is empty)
            Store = 3, "store" => [dst: Write],
            /// output a ; push a to the output
            Output = 4, "output" => [a: Read],
            /// jump-if-true cond, target ; if cond != 0 then ip = target
            JumpIfTrue = 5, "jump-if-true" => [cond: Read, target: Read],
            /// jump-if-false cond, target ; if cond == 0 then ip = target
            JumpIfFalse = 6, "jump-if-false" => [cond: Read, target: Read],
            /// less-than a, b, dst ; dst = (a < b) as 1 or 0
            LessThan = 7, "less-than" => [a: Read, b: Read, dst: Write],
            /// equals a, b, dst ; dst = (a == b) as 1 or 0
            Equals = 8, "equals" => [a: Read, b: Read, dst: Write],
            /// halt ; stop execution
            Halt = 99, "halt" => [],
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        /// Intcode operation, decoded from the low two digits of an instruction word.
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<i64> for Opcode {
            type Error = VMError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::UnknownOpcode {
                        opcode: value,
                        position: 0,
                    }),
                }
            }
        }

        impl Opcode {
            /// Returns the mnemonic used in traces.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the role of each parameter, in encoding order.
            pub const fn params(&self) -> &'static [Param] {
                match self {
                    $( Opcode::$name => &[$( Param::$kind ),*], )*
                }
            }

            /// Returns the number of parameters following the instruction word.
            pub const fn param_count(&self) -> usize {
                self.params().len()
            }
        }
    };
}

for_each_opcode!(define_opcodes);

/// Splits an instruction word into its opcode digits and mode word.
pub const fn split_word(word: i64) -> (i64, i64) {
    (word % 100, word / 100)
}
