//! Register file readout

use std::fmt;

/// Snapshot of the engine registers
///
/// The engine does not keep a flat register block; these values are derived
/// from the instruction pointer, stack and heap on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterFile {
    /// Instruction pointer (byte offset into the code section)
    pub ip: usize,
    /// Stack pointer (slots in use)
    pub sp: usize,
    /// Base pointer of the current frame
    pub bp: usize,
    /// Heap register (allocation cursor, in blocks)
    pub hr: usize,
    /// Heap pointer (bytes in use)
    pub hp: usize,
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IP: 0x{:X}", self.ip)?;
        writeln!(f, "SP: 0x{:X}", self.sp)?;
        writeln!(f, "BP: 0x{:X}", self.bp)?;
        writeln!(f, "HR: 0x{:X}", self.hr)?;
        write!(f, "HP: 0x{:X}", self.hp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_dump_format() {
        let regs = RegisterFile {
            ip: 0x1f,
            sp: 3,
            bp: 0,
            hr: 2,
            hp: 255,
        };
        assert_eq!(
            regs.to_string(),
            "IP: 0x1F\nSP: 0x3\nBP: 0x0\nHR: 0x2\nHP: 0xFF"
        );
    }
}
