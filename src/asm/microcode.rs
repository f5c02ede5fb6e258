//! Microprogram word codec.
//!
//! A microinstruction is stored most significant field first:
//!
//! ```text
//! | next address (10) | selMS (2) | condition (4) | signal bits (48) | padding |
//! ```
//!
//! Signal bit `i` is the signal whose microcode index is `i` (see
//! [`Signal::microcode_bit`]); only the first 36 of the 48 signal positions
//! are assigned. The fields sit at the top of the memory word and the low
//! bits are zero.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::bits::BitInteger;
use crate::sim::{Signal, SignalKind, SimError};

/// Width of the next-address field.
pub const ADDRESS_BITS: usize = 10;
/// Width of the multiplexer selector field.
pub const SELMS_BITS: usize = 2;
/// Width of the condition index field.
pub const CONDITION_BITS: usize = 4;
/// Width reserved for signal bits.
pub const SIGNAL_BITS: usize = 48;
/// Bits occupied by one microinstruction.
pub const LAYOUT_BITS: usize = ADDRESS_BITS + SELMS_BITS + CONDITION_BITS + SIGNAL_BITS;

/// `selMS` values: which address the sequencer goes to next.
pub mod sel_ms {
    /// Current address + 1.
    pub const NEXT: u8 = 0;
    /// Next address if the selected condition holds, otherwise current + 1.
    pub const CONDITIONAL: u8 = 1;
    /// The routine of the current instruction's COPMA.
    pub const COPMA: u8 = 2;
    /// The next-address field.
    pub const JUMP: u8 = 3;
}

/// One decoded microprogram word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroInstruction {
    pub next_address: u64,
    pub sel_ms: u8,
    pub condition: u8,
    /// Active signals, in microcode bit order.
    pub signals: Vec<Signal>,
}

impl MicroInstruction {
    pub fn new(next_address: u64, sel_ms: u8, condition: u8, signals: &[Signal]) -> Self {
        let mut signals = signals.to_vec();
        signals.sort();
        signals.dedup();
        Self { next_address, sel_ms, condition, signals }
    }

    /// Active signals of the given kind.
    pub fn signals_of(&self, kind: SignalKind) -> impl Iterator<Item = Signal> + '_ {
        self.signals.iter().copied().filter(move |s| s.kind() == kind)
    }

    /// Encode into a `word_bits`-wide unsigned word.
    pub fn encode(&self, word_bits: usize) -> Result<BitInteger, MicrocodeError> {
        if word_bits < LAYOUT_BITS {
            return Err(MicrocodeError::WordTooNarrow { width: word_bits, needed: LAYOUT_BITS });
        }
        check_field("next address", self.next_address, ADDRESS_BITS)?;
        check_field("selMS", self.sel_ms as u64, SELMS_BITS)?;
        check_field("condition", self.condition as u64, CONDITION_BITS)?;

        let mut bits = vec![false; word_bits];
        let top = word_bits - 1;
        let mut put = |offset: usize, value: u64, width: usize| {
            for i in 0..width {
                bits[top - offset - i] = (value >> (width - 1 - i)) & 1 == 1;
            }
        };
        put(0, self.next_address, ADDRESS_BITS);
        put(ADDRESS_BITS, self.sel_ms as u64, SELMS_BITS);
        put(ADDRESS_BITS + SELMS_BITS, self.condition as u64, CONDITION_BITS);

        let signal_top = top - (ADDRESS_BITS + SELMS_BITS + CONDITION_BITS);
        for signal in &self.signals {
            let bit = signal.microcode_bit().ok_or(MicrocodeError::NotMicrocode(*signal))?;
            bits[signal_top - bit] = true;
        }
        Ok(BitInteger::from_bits(&bits, false)?)
    }

    /// Decode a word laid out by [`MicroInstruction::encode`]. Unassigned
    /// signal positions and padding are ignored.
    pub fn decode(word: &BitInteger) -> Result<Self, MicrocodeError> {
        let width = word.width();
        if width < LAYOUT_BITS {
            return Err(MicrocodeError::WordTooNarrow { width, needed: LAYOUT_BITS });
        }
        let top = width - 1;
        let get = |offset: usize, len: usize| -> u64 {
            (0..len).fold(0, |acc, i| (acc << 1) | word.bit(top - offset - i) as u64)
        };

        let signal_top = top - (ADDRESS_BITS + SELMS_BITS + CONDITION_BITS);
        let signals = (0..Signal::MICROCODE_COUNT)
            .filter(|bit| word.bit(signal_top - bit))
            .filter_map(Signal::from_microcode_bit)
            .collect();

        Ok(Self {
            next_address: get(0, ADDRESS_BITS),
            sel_ms: get(ADDRESS_BITS, SELMS_BITS) as u8,
            condition: get(ADDRESS_BITS + SELMS_BITS, CONDITION_BITS) as u8,
            signals,
        })
    }
}

fn check_field(field: &'static str, value: u64, width: usize) -> Result<(), MicrocodeError> {
    let max = (1u64 << width) - 1;
    if value > max {
        return Err(MicrocodeError::FieldOutOfRange { field, value, max });
    }
    Ok(())
}

/// Same layout as the microprogram assembler reads:
/// `NEXT SELMS COND SIG SIG ...`.
impl std::fmt::Display for MicroInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.next_address, self.sel_ms, self.condition)?;
        for signal in &self.signals {
            write!(f, " {}", signal)?;
        }
        Ok(())
    }
}

// ============================================================================
// Built-in microprogram
// ============================================================================

/// Microprogram address of the shared instruction epilogue.
pub const EPILOGUE_ADDRESS: u64 = 512;

/// The three-word fetch routine, to be placed at the fetch address.
///
/// 1. `CO -> RAM` through the ALU
/// 2. read central memory into `RE`
/// 3. `RE -> RI`, then jump to the instruction's COPMA routine
pub fn fetch_routine() -> [MicroInstruction; 3] {
    [
        MicroInstruction::new(0, sel_ms::NEXT, 0, &[Signal::Cob1, Signal::Xs, Signal::ERam]),
        MicroInstruction::new(0, sel_ms::NEXT, 0, &[Signal::SM]),
        MicroInstruction::new(0, sel_ms::COPMA, 0, &[Signal::Reb1, Signal::Xs, Signal::ERi]),
    ]
}

/// Fetch routine plus the routines for `LOAD A Immediate` (1),
/// `LOAD B Immediate` (11) and `A+B -> C` (103), all ending in the
/// `CO + 1` epilogue that raises `FIN`.
pub fn builtin_microprogram(fetch_address: u64) -> Vec<(u64, MicroInstruction)> {
    let mut program: Vec<(u64, MicroInstruction)> = fetch_routine()
        .into_iter()
        .enumerate()
        .map(|(i, mi)| (fetch_address + i as u64, mi))
        .collect();

    let jump = |signals: &[Signal]| MicroInstruction::new(EPILOGUE_ADDRESS, sel_ms::JUMP, 0, signals);
    program.push((1, jump(&[Signal::Rib1, Signal::Xs, Signal::ERa])));
    program.push((11, jump(&[Signal::Rib1, Signal::Xs, Signal::ERb])));
    program.push((103, jump(&[Signal::Rab1, Signal::Rbb2, Signal::Add, Signal::ERc])));
    program.push((
        EPILOGUE_ADDRESS,
        MicroInstruction::new(0, sel_ms::NEXT, 0, &[Signal::Cob1, Signal::Xp1, Signal::ECo, Signal::Fin]),
    ));
    program
}

/// Errors building, decoding or assembling microcode.
#[derive(Debug, Clone, Error)]
pub enum MicrocodeError {
    #[error("{field} value {value} out of range (max {max})")]
    FieldOutOfRange { field: &'static str, value: u64, max: u64 },

    #[error("signal {0} cannot be stored in microcode")]
    NotMicrocode(Signal),

    #[error("{width}-bit word cannot hold the {needed}-bit microinstruction layout")]
    WordTooNarrow { width: usize, needed: usize },

    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unknown signal on line {line}: {name}")]
    UnknownSignal { line: usize, name: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("address {address} defined twice (line {line})")]
    DuplicateAddress { line: usize, address: u64 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Bits(#[from] crate::bits::BitsError),

    #[error(transparent)]
    Memory(#[from] SimError),
}
