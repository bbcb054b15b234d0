//! Test utilities for VM testing.

#[cfg(test)]
pub mod utils {
    use crate::virtual_machine::program::Program;
    use std::collections::VecDeque;

    /// Builds an input queue holding `values` in order.
    pub fn queue(values: &[i64]) -> VecDeque<i64> {
        values.iter().copied().collect()
    }

    /// Parses comma separated program text, panicking on malformed input.
    pub fn program(text: &str) -> Vec<i64> {
        text.parse::<Program>()
            .expect("test program must parse")
            .to_memory()
    }
}
