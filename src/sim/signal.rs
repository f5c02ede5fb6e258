//! Named control signals and their decay ledger.
//!
//! The signal set is closed: every line the control unit can raise is a
//! [`Signal`] variant. Microcode-visible signals come first so that their
//! discriminant is their bit index in the microprogram word:
//! - pulses (bits 0-10): register load strobes and the memory strobes
//! - levels (bits 11-35): bus output enables, ALU operations and `FIN`
//! - internal: clock and sequencing lines never stored in microcode

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use crate::sim::SimError;

/// Emission class of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Short strobe, emitted at the end of the microinstruction.
    Pulse,
    /// Long enable, held while pulses fire.
    Level,
    /// Driven by the sequencer itself.
    Internal,
}

/// One control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Signal {
    // Pulses
    ERe,
    ERa,
    ERb,
    ERc,
    ERi,
    ERx,
    ECo,
    ERam,
    ESp,
    EM,
    SM,
    // Levels
    Reb1,
    Reb2,
    Rab1,
    Rab2,
    Rbb1,
    Rbb2,
    Rcb1,
    Rcb2,
    Rib1,
    Rib2,
    Rxb1,
    Rxb2,
    Cob1,
    Cob2,
    Spb1,
    Spb2,
    Xs,
    Xp1,
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Fin,
    // Internal
    RegClock,
    SendLevels,
    SendPulses,
    SwitchRamm,
    SwitchRemm,
    ERamm,
    ERemm,
}

impl Signal {
    /// Number of signals.
    pub const COUNT: usize = 43;

    /// Number of signals with a microcode bit.
    pub const MICROCODE_COUNT: usize = 36;

    /// Every signal, in discriminant order.
    pub const ALL: [Signal; Signal::COUNT] = [
        Signal::ERe, Signal::ERa, Signal::ERb, Signal::ERc, Signal::ERi, Signal::ERx,
        Signal::ECo, Signal::ERam, Signal::ESp, Signal::EM, Signal::SM,
        Signal::Reb1, Signal::Reb2, Signal::Rab1, Signal::Rab2, Signal::Rbb1, Signal::Rbb2,
        Signal::Rcb1, Signal::Rcb2, Signal::Rib1, Signal::Rib2, Signal::Rxb1, Signal::Rxb2,
        Signal::Cob1, Signal::Cob2, Signal::Spb1, Signal::Spb2,
        Signal::Xs, Signal::Xp1, Signal::Add, Signal::Sub, Signal::Mul,
        Signal::And, Signal::Or, Signal::Xor, Signal::Fin,
        Signal::RegClock, Signal::SendLevels, Signal::SendPulses,
        Signal::SwitchRamm, Signal::SwitchRemm, Signal::ERamm, Signal::ERemm,
    ];

    /// Position in [`Signal::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit index inside the microprogram word's signal field, if the signal
    /// can be stored in microcode.
    #[inline]
    pub fn microcode_bit(self) -> Option<usize> {
        let index = self.index();
        (index < Self::MICROCODE_COUNT).then_some(index)
    }

    /// Signal stored at a microcode bit index.
    #[inline]
    pub fn from_microcode_bit(bit: usize) -> Option<Signal> {
        (bit < Self::MICROCODE_COUNT).then(|| Self::ALL[bit])
    }

    pub fn kind(self) -> SignalKind {
        match self.index() {
            0..=10 => SignalKind::Pulse,
            11..=35 => SignalKind::Level,
            _ => SignalKind::Internal,
        }
    }

    /// Canonical mnemonic.
    pub fn name(self) -> &'static str {
        match self {
            Signal::ERe => "eRE",
            Signal::ERa => "eRA",
            Signal::ERb => "eRB",
            Signal::ERc => "eRC",
            Signal::ERi => "eRI",
            Signal::ERx => "eRX",
            Signal::ECo => "eCO",
            Signal::ERam => "eRAM",
            Signal::ESp => "eSP",
            Signal::EM => "eM",
            Signal::SM => "sM",
            Signal::Reb1 => "REB1",
            Signal::Reb2 => "REB2",
            Signal::Rab1 => "RAB1",
            Signal::Rab2 => "RAB2",
            Signal::Rbb1 => "RBB1",
            Signal::Rbb2 => "RBB2",
            Signal::Rcb1 => "RCB1",
            Signal::Rcb2 => "RCB2",
            Signal::Rib1 => "RIB1",
            Signal::Rib2 => "RIB2",
            Signal::Rxb1 => "RXB1",
            Signal::Rxb2 => "RXB2",
            Signal::Cob1 => "COB1",
            Signal::Cob2 => "COB2",
            Signal::Spb1 => "SPB1",
            Signal::Spb2 => "SPB2",
            Signal::Xs => "XS",
            Signal::Xp1 => "XP1",
            Signal::Add => "ADD",
            Signal::Sub => "SUB",
            Signal::Mul => "MUL",
            Signal::And => "AND",
            Signal::Or => "OR",
            Signal::Xor => "XOR",
            Signal::Fin => "FIN",
            Signal::RegClock => "REGSIGCLOCK",
            Signal::SendLevels => "SENDLEVELS",
            Signal::SendPulses => "SENDPULSES",
            Signal::SwitchRamm => "SWITCH_RAMM",
            Signal::SwitchRemm => "SWITCH_REMM",
            Signal::ERamm => "eRAMM",
            Signal::ERemm => "eREMM",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = SimError;

    /// Exact mnemonic first, then a case-insensitive match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Signal::ALL
            .iter()
            .find(|sig| sig.name() == s)
            .or_else(|| Signal::ALL.iter().find(|sig| sig.name().eq_ignore_ascii_case(s)))
            .copied()
            .ok_or_else(|| SimError::UnknownSignal(s.to_string()))
    }
}

// ============================================================================
// Signal table
// ============================================================================

/// Remaining active duration of every signal, in ATU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTable {
    remaining: [u64; Signal::COUNT],
}

impl SignalTable {
    pub fn new() -> Self {
        Self { remaining: [0; Signal::COUNT] }
    }

    /// Raise `signal` for `duration` ATU. Never shortens a longer activation.
    pub fn emit(&mut self, signal: Signal, duration: u64) {
        let slot = &mut self.remaining[signal.index()];
        *slot = (*slot).max(duration);
    }

    /// Raise a signal given by mnemonic.
    pub fn emit_named(&mut self, name: &str, duration: u64) -> Result<Signal, SimError> {
        let signal: Signal = name.parse()?;
        self.emit(signal, duration);
        Ok(signal)
    }

    /// Age every signal by `elapsed` ATU, flooring at zero.
    pub fn decay(&mut self, elapsed: u64) {
        for slot in self.remaining.iter_mut() {
            *slot = slot.saturating_sub(elapsed);
        }
    }

    #[inline]
    pub fn remaining(&self, signal: Signal) -> u64 {
        self.remaining[signal.index()]
    }

    /// Immutable copy handed to subscribers.
    #[inline]
    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot { remaining: self.remaining }
    }
}

impl Default for SignalTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal state as of the start of a dispatched interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSnapshot {
    remaining: [u64; Signal::COUNT],
}

impl SignalSnapshot {
    #[inline]
    pub fn is_active(&self, signal: Signal) -> bool {
        self.remaining[signal.index()] > 0
    }

    #[inline]
    pub fn remaining(&self, signal: Signal) -> u64 {
        self.remaining[signal.index()]
    }

    /// Active signals in discriminant order.
    pub fn active(&self) -> impl Iterator<Item = Signal> + '_ {
        Signal::ALL.iter().copied().filter(|s| self.is_active(*s))
    }
}
