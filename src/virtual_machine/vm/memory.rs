use crate::virtual_machine::errors::VMError;

/// Bounds-checked view over the caller's program buffer.
///
/// Intcode programs modify themselves, so the VM borrows the buffer mutably
/// and every write lands in the caller's memory. Addresses at or beyond the
/// initial length are invalid: memory never grows.
pub struct Memory<'m> {
    words: &'m mut [i64],
}

impl<'m> Memory<'m> {
    pub fn new(words: &'m mut [i64]) -> Self {
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Converts a word into a valid address.
    ///
    /// Returns [`VMError::AddressOutOfBounds`] for negative values or values
    /// `>= len`. `position` is the instruction being executed.
    pub fn address(&self, word: i64, position: usize) -> Result<usize, VMError> {
        usize::try_from(word)
            .ok()
            .filter(|&address| address < self.words.len())
            .ok_or(VMError::AddressOutOfBounds {
                position,
                address: word,
                len: self.words.len(),
            })
    }

    /// Reads the word at `address`.
    pub fn read(&self, address: usize, position: usize) -> Result<i64, VMError> {
        self.words
            .get(address)
            .copied()
            .ok_or(VMError::AddressOutOfBounds {
                position,
                address: address as i64,
                len: self.words.len(),
            })
    }

    /// Stores `value` at `address`.
    pub fn write(&mut self, address: usize, value: i64, position: usize) -> Result<(), VMError> {
        let len = self.words.len();
        let slot = self
            .words
            .get_mut(address)
            .ok_or(VMError::AddressOutOfBounds {
                position,
                address: address as i64,
                len,
            })?;
        *slot = value;
        Ok(())
    }

    pub fn as_slice(&self) -> &[i64] {
        &*self.words
    }
}
