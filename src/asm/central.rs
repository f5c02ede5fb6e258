//! Central-memory instruction words.
//!
//! A word is `COPMA << ra_bits | RA`: an unsigned opcode/addressing-mode
//! field on top of a signed operand. COPMA values index a fixed instruction
//! table generated from the instruction families below.

use std::sync::OnceLock;
use crate::asm::program::ProgramError;
use crate::bits::BitInteger;
use crate::sim::SimulationConfig;

/// Addressing modes, in table order.
pub const ADDRESSING_MODES: [&str; 10] = [
    "Immediate",
    "Direct",
    "Indirect",
    "Relative",
    "Indexed",
    "Extended Immediate",
    "Extended Direct",
    "Extended Indirect",
    "Extended Relative",
    "Extended Indexed",
];

const REGISTERS: [&str; 4] = ["A", "B", "C", "X"];
const CONDITIONS: [&str; 6] = ["A == 0", "B == 0", "A > 0", "B > 0", "A%2 == 0", "B%2 == 0"];

/// One row of the instruction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionInfo {
    pub copma: u64,
    pub operation: String,
    /// Empty for instructions without an operand mode.
    pub mode: &'static str,
}

impl std::fmt::Display for InstructionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.mode.is_empty() {
            f.write_str(&self.operation)
        } else {
            write!(f, "{} {}", self.operation, self.mode)
        }
    }
}

/// Modes usable by jumps and calls: no plain immediates.
fn branch_modes() -> impl Iterator<Item = &'static str> {
    ADDRESSING_MODES[1..5].iter().chain(&ADDRESSING_MODES[6..]).copied()
}

fn build_table() -> Vec<InstructionInfo> {
    let mut rows: Vec<(String, &'static str)> = vec![("NOOP".into(), "")];

    for reg in REGISTERS {
        rows.extend(ADDRESSING_MODES.iter().map(|m| (format!("LOAD {}", reg), *m)));
    }
    for reg in REGISTERS {
        rows.extend(ADDRESSING_MODES[1..].iter().map(|m| (format!("STORE {}", reg), *m)));
    }
    rows.extend(REGISTERS.iter().map(|reg| (format!("INC {}", reg), "")));
    for reg in &REGISTERS[..2] {
        rows.extend(ADDRESSING_MODES.iter().map(|m| (format!("ADD {}", reg), *m)));
    }
    rows.extend(REGISTERS[..3].iter().map(|reg| (format!("A+B -> {}", reg), "")));
    for op in ["CALL", "RETURN", "JUMP"] {
        rows.extend(branch_modes().map(|m| (op.to_string(), m)));
    }
    for mode in branch_modes() {
        rows.extend(CONDITIONS.iter().map(|c| (format!("JUMPC ({})", c), mode)));
    }

    rows.into_iter()
        .enumerate()
        .map(|(copma, (operation, mode))| InstructionInfo { copma: copma as u64, operation, mode })
        .collect()
}

/// The full instruction table, indexed by COPMA.
pub fn instruction_table() -> &'static [InstructionInfo] {
    static TABLE: OnceLock<Vec<InstructionInfo>> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

pub fn lookup(copma: u64) -> Option<&'static InstructionInfo> {
    instruction_table().get(copma as usize)
}

/// COPMA of an instruction by its table text, e.g. `LOAD A Immediate`.
pub fn find(text: &str) -> Option<u64> {
    let wanted = text.split_whitespace().collect::<Vec<_>>().join(" ");
    instruction_table()
        .iter()
        .find(|info| info.to_string().eq_ignore_ascii_case(&wanted))
        .map(|info| info.copma)
}

/// Field widths of a central-memory word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordLayout {
    pub arch_bits: usize,
    pub copma_bits: usize,
}

impl Default for WordLayout {
    fn default() -> Self {
        (&SimulationConfig::default()).into()
    }
}

impl From<&SimulationConfig> for WordLayout {
    fn from(config: &SimulationConfig) -> Self {
        Self { arch_bits: config.arch_bits, copma_bits: config.copma_bits }
    }
}

impl WordLayout {
    #[inline]
    pub fn ra_bits(&self) -> usize {
        self.arch_bits - self.copma_bits
    }

    /// Build a signed word from its opcode and operand.
    pub fn encode(&self, copma: u64, ra: i64) -> Result<BitInteger, ProgramError> {
        let copma_max = (1u64 << self.copma_bits) - 1;
        if copma > copma_max {
            return Err(ProgramError::FieldOutOfRange { field: "COPMA", value: copma as i128 });
        }
        let ra_field = BitInteger::int(ra as i128, 64);
        if !ra_field.fits(self.ra_bits(), true) {
            return Err(ProgramError::FieldOutOfRange { field: "RA", value: ra as i128 });
        }
        let copma = BitInteger::uint(copma as u128, self.arch_bits).shl(self.ra_bits());
        let ra = BitInteger::int(ra as i128, self.ra_bits()).resize(self.arch_bits, false);
        Ok(copma.or(&ra).cast(self.arch_bits, true))
    }

    /// Split a word into `(COPMA, RA)`.
    pub fn decode(&self, word: &BitInteger) -> (u64, i64) {
        let word = word.resize(self.arch_bits, word.is_signed());
        let copma = word.slice(self.ra_bits(), self.copma_bits).resize(self.copma_bits, false);
        let ra = word.slice(0, self.ra_bits()).resize(self.ra_bits(), true);
        (copma.to_u64(), ra.to_i64())
    }

    /// Human-readable form of a word: `LOAD A Immediate 10`. COPMA 0 is plain
    /// data and prints the operand; an opcode outside the table prints the
    /// raw word.
    pub fn translate(&self, word: &BitInteger) -> String {
        let (copma, ra) = self.decode(word);
        if copma == 0 {
            return ra.to_string();
        }
        match lookup(copma) {
            Some(info) => format!("{} {}", info, ra),
            None => word.to_i128().to_string(),
        }
    }
}

/// [`WordLayout::encode`] with the reference layout.
pub fn encode(copma: u64, ra: i64) -> Result<BitInteger, ProgramError> {
    WordLayout::default().encode(copma, ra)
}

/// [`WordLayout::decode`] with the reference layout.
pub fn decode(word: &BitInteger) -> (u64, i64) {
    WordLayout::default().decode(word)
}

/// [`WordLayout::translate`] with the reference layout.
pub fn translate(word: &BitInteger) -> String {
    WordLayout::default().translate(word)
}

/// Listing of a program, one `address: word ; text` line per word.
pub fn disassemble(words: &[BitInteger]) -> String {
    let layout = WordLayout::default();
    let mut output = String::new();
    for (address, word) in words.iter().enumerate() {
        output.push_str(&format!("{:04}: {:>11}  ; {}\n", address, word.to_i128(), layout.translate(word)));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        let table = instruction_table();
        assert_eq!(table.len(), 176);
        assert_eq!(table[0].to_string(), "NOOP");
        assert_eq!(find("LOAD A Immediate"), Some(1));
        assert_eq!(find("load b immediate"), Some(11));
        assert_eq!(find("STORE A Direct"), Some(41));
        assert_eq!(find("INC A"), Some(77));
        assert_eq!(find("A+B -> C"), Some(103));
        assert_eq!(find("CALL Direct"), Some(104));
        assert_eq!(find("JUMPC (A == 0) Direct"), Some(128));
        assert_eq!(table[175].to_string(), "JUMPC (B%2 == 0) Extended Indexed");
        assert!(table.iter().enumerate().all(|(i, info)| info.copma == i as u64));
    }

    #[test]
    fn test_encode_decode() {
        let word = encode(1, 10).unwrap();
        assert_eq!(word.to_i128(), (1 << 24) + 10);
        assert_eq!(decode(&word), (1, 10));

        let word = encode(11, -2).unwrap();
        assert_eq!(decode(&word), (11, -2));

        // Top opcode bit set: the word is negative.
        let word = encode(0b1001_0110, 73).unwrap();
        assert!(word.is_negative());
        assert_eq!(decode(&word), (150, 73));
    }

    #[test]
    fn test_encode_rejects_wide_fields() {
        assert!(matches!(encode(256, 0), Err(ProgramError::FieldOutOfRange { field: "COPMA", .. })));
        assert!(matches!(encode(1, 1 << 23), Err(ProgramError::FieldOutOfRange { field: "RA", .. })));
        assert!(encode(1, -(1 << 23)).is_ok());
    }

    #[test]
    fn test_translate() {
        assert_eq!(translate(&encode(1, 10).unwrap()), "LOAD A Immediate 10");
        assert_eq!(translate(&encode(103, 0).unwrap()), "A+B -> C 0");
        assert_eq!(translate(&encode(0, -5).unwrap()), "-5");
        assert_eq!(translate(&encode(0b1001_0110, 73).unwrap()), "JUMPC (A%2 == 0) Indexed 73");

        let unknown = encode(200, 1).unwrap();
        assert_eq!(translate(&unknown), unknown.to_i128().to_string());
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = disassemble(&[encode(1, 10).unwrap(), encode(0, 7).unwrap()]);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000:"));
        assert!(lines[0].ends_with("; LOAD A Immediate 10"));
        assert!(lines[1].ends_with("; 7"));
    }
}
