//! Intcode program text and the noun/verb probe.
//!
//! Programs are written as comma separated integers, usually on a single
//! line. [`Program`] keeps the pristine words; every run works on a fresh
//! copy so the same program can be probed many times.

use crate::debug;
use crate::virtual_machine::errors::{Fault, VMError};
use crate::virtual_machine::vm::{self, Memory};
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// Address of the noun written by [`Program::patch`].
pub const NOUN_ADDRESS: usize = 1;
/// Address of the verb written by [`Program::patch`].
pub const VERB_ADDRESS: usize = 2;

/// Errors raised while parsing program text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("program text is empty")]
    Empty,
    #[error("word {index} is not an integer: '{token}'")]
    InvalidInteger { index: usize, token: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    words: Vec<i64>,
}

impl Program {
    pub fn new(words: Vec<i64>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[i64] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns a fresh, mutable copy of the program to run.
    pub fn to_memory(&self) -> Vec<i64> {
        self.words.clone()
    }

    /// Writes `noun` and `verb` into a copy of the program.
    ///
    /// Returns [`VMError::AddressOutOfBounds`] if the program is too short to
    /// hold them.
    pub fn patch(&self, noun: i64, verb: i64) -> Result<Vec<i64>, VMError> {
        let mut words = self.to_memory();
        let mut memory = Memory::new(&mut words);
        memory.write(NOUN_ADDRESS, noun, 0)?;
        memory.write(VERB_ADDRESS, verb, 0)?;
        Ok(words)
    }

    /// Patches the noun and verb, runs without input and returns the word at
    /// address 0.
    pub fn probe(&self, noun: i64, verb: i64) -> Result<i64, Fault> {
        let mut memory = self
            .patch(noun, verb)
            .map_err(|error| Fault::new(error, Vec::new()))?;
        vm::run(&mut memory, 0, VecDeque::new(), Vec::new())?;
        Ok(memory[0])
    }

    /// Finds the first noun/verb pair in `range` whose probe yields `target`.
    ///
    /// Nouns are tried in the outer loop. Pairs whose run faults are skipped.
    pub fn search_noun_verb(
        &self,
        target: i64,
        range: RangeInclusive<i64>,
    ) -> Option<(i64, i64)> {
        for noun in range.clone() {
            for verb in range.clone() {
                match self.probe(noun, verb) {
                    Ok(value) if value == target => return Some((noun, verb)),
                    Ok(_) => {}
                    Err(fault) => debug!("noun {noun} verb {verb} faulted: {fault}"),
                }
            }
        }
        None
    }
}

impl From<Vec<i64>> for Program {
    fn from(words: Vec<i64>) -> Self {
        Self::new(words)
    }
}

impl FromStr for Program {
    type Err = ProgramError;

    /// Parses comma separated integers; surrounding whitespace and line
    /// breaks are ignored.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProgramError::Empty);
        }
        let words = text
            .split(',')
            .enumerate()
            .map(|(index, token)| {
                let token = token.trim();
                token.parse::<i64>().map_err(|_| ProgramError::InvalidInteger {
                    index,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { words })
    }
}
