use std::fmt;

/// Record of one executed instruction.
///
/// Kept only for diagnostics: the VM appends one record per executed step and
/// hands the list back on halt or alongside a fault.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    /// Address of the instruction word.
    pub position: usize,
    /// Opcode digits with the mode stripped.
    pub opcode: i64,
    /// Mode word (instruction word divided by 100).
    pub mode: i64,
    pub mnemonic: &'static str,
    /// Operands and result, e.g. `3@9 + 4 = 7 -> @0`.
    pub detail: String,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}@{:03} [{:03}]: {}",
            self.opcode, self.position, self.mode, self.mnemonic
        )?;
        if !self.detail.is_empty() {
            write!(f, "{:pad$}: {}", "", self.detail, pad = 13 - self.mnemonic.len().min(13))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_detail() {
        let instruction = Instruction {
            position: 4,
            opcode: 1,
            mode: 10,
            mnemonic: "add",
            detail: "3@9 + 4 = 7 -> @0".to_string(),
        };
        assert_eq!(
            instruction.to_string(),
            "01@004 [010]: add          : 3@9 + 4 = 7 -> @0"
        );
    }

    #[test]
    fn display_without_detail() {
        let instruction = Instruction {
            position: 12,
            opcode: 99,
            mode: 0,
            mnemonic: "halt",
            detail: String::new(),
        };
        assert_eq!(instruction.to_string(), "99@012 [000]: halt");
    }
}
