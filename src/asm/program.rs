//! Central-memory program files.
//!
//! A simple text format, one word per line from address 0:
//! - `COPMA RA`: opcode and operand, e.g. `1 10`
//! - a single integer: the raw word (decimal, `0x` hex or `0b` binary)
//! - an instruction from the table followed by its operand, e.g.
//!   `LOAD A Immediate 10`
//! - `;` starts a comment; blank lines are ignored

use std::path::Path;
use std::io::Write;
use thiserror::Error;
use crate::asm::central::{self, WordLayout};
use crate::bits::BitInteger;

/// A parsed program.
#[derive(Debug, Clone, Default)]
pub struct ProgramFile {
    pub words: Vec<BitInteger>,
    /// Source line of each word.
    pub source_lines: Vec<String>,
}

impl ProgramFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, word: BitInteger, source: &str) {
        self.words.push(word);
        self.source_lines.push(source.to_string());
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// The three-instruction demo: `RA <- 10`, `RB <- 12`, `RC <- RA + RB`.
pub fn demo_program() -> ProgramFile {
    let mut program = ProgramFile::new();
    for (copma, ra, text) in [(1, 10, "LOAD A Immediate 10"), (11, 12, "LOAD B Immediate 12"), (103, 0, "A+B -> C 0")] {
        if let Ok(word) = central::encode(copma, ra) {
            program.push(word, text);
        }
    }
    program
}

fn parse_int(token: &str) -> Option<i128> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i128::from_str_radix(&bin.replace('_', ""), 2).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -value } else { value })
}

fn parse_line(layout: &WordLayout, text: &str, line: usize) -> Result<BitInteger, ProgramError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let parse_error = |message: String| ProgramError::Parse { line, message };

    match tokens.as_slice() {
        [raw] => {
            let value = parse_int(raw).ok_or_else(|| parse_error(format!("invalid word '{}'", raw)))?;
            let fits_signed = BitInteger::int(value, 128).fits(layout.arch_bits, true);
            let fits_unsigned = value >= 0 && BitInteger::int(value, 128).fits(layout.arch_bits, false);
            if !fits_signed && !fits_unsigned {
                return Err(parse_error(format!("{} does not fit in {} bits", value, layout.arch_bits)));
            }
            Ok(BitInteger::int(value, layout.arch_bits))
        }
        [copma, ra] if parse_int(copma).is_some() => {
            let copma = parse_int(copma)
                .and_then(|c| u64::try_from(c).ok())
                .ok_or_else(|| parse_error(format!("invalid COPMA '{}'", copma)))?;
            let ra = parse_int(ra)
                .and_then(|r| i64::try_from(r).ok())
                .ok_or_else(|| parse_error(format!("invalid operand '{}'", ra)))?;
            layout.encode(copma, ra).map_err(|e| parse_error(e.to_string()))
        }
        [instruction @ .., operand] if !instruction.is_empty() => {
            let text = instruction.join(" ");
            let copma = central::find(&text)
                .ok_or_else(|| parse_error(format!("unknown instruction '{}'", text)))?;
            let ra = parse_int(operand)
                .and_then(|r| i64::try_from(r).ok())
                .ok_or_else(|| parse_error(format!("invalid operand '{}'", operand)))?;
            layout.encode(copma, ra).map_err(|e| parse_error(e.to_string()))
        }
        _ => Err(parse_error("empty word".into())),
    }
}

/// Parse program text with the given word layout.
pub fn parse_program(source: &str, layout: &WordLayout) -> Result<ProgramFile, ProgramError> {
    let mut program = ProgramFile::new();
    for (index, line) in source.lines().enumerate() {
        let text = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();
        if text.is_empty() {
            continue;
        }
        let word = parse_line(layout, text, index + 1)?;
        program.push(word, line.trim());
    }
    Ok(program)
}

/// Load a program file from disk.
pub fn load_program<P: AsRef<Path>>(path: P, layout: &WordLayout) -> Result<ProgramFile, ProgramError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ProgramError::Io(e.to_string()))?;
    parse_program(&text, layout)
}

/// Write words as `COPMA RA ; translation` lines.
pub fn save_program<P: AsRef<Path>>(path: P, words: &[BitInteger], layout: &WordLayout) -> Result<(), ProgramError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ProgramError::Io(e.to_string()))?;
    writeln!(file, "; {} words", words.len()).map_err(|e| ProgramError::Io(e.to_string()))?;
    for (address, word) in words.iter().enumerate() {
        let (copma, ra) = layout.decode(word);
        writeln!(file, "{} {} ; {:04} {}", copma, ra, address, layout.translate(word))
            .map_err(|e| ProgramError::Io(e.to_string()))?;
    }
    Ok(())
}

/// Errors reading or building central-memory programs.
#[derive(Debug, Clone, Error)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("{field} value {value} does not fit its field")]
    FieldOutOfRange { field: &'static str, value: i128 },
}
