//! Errors raised while wiring or running a simulation.

use thiserror::Error;
use crate::sim::Level;

/// Everything the simulator can report.
///
/// Errors detected inside a clock tick go to the debug log through
/// [`crate::sim::Context::report`]; operations with a direct caller also
/// return them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    #[error("register {register}: inputs {first} and {second} are both driving it")]
    DriverConflict { register: String, first: String, second: String },

    #[error("wire {wire}: value {value} does not fit in {width} {kind} bits")]
    WireOverflow { wire: String, value: String, width: usize, kind: &'static str },

    #[error("register {register}: value {value} does not fit in {width} {kind} bits")]
    RegisterOverflow { register: String, value: String, width: usize, kind: &'static str },

    #[error("{component}: {bits}-bit index gives more cells than the host can address")]
    CapacityTooLarge { component: &'static str, bits: usize },

    #[error("memory: address {address} out of range (0-{max})")]
    AddressOutOfRange { address: String, max: usize },

    #[error("memory: cell {0} read before being written")]
    UninitializedRead(usize),

    #[error("memory: value {value} does not fit in a {width}-bit cell")]
    MemoryOverflow { value: String, width: usize },

    #[error("flag register: condition {index} out of range (0-{max})")]
    ConditionOutOfRange { index: String, max: usize },

    #[error("multiplexer {name}: {given} inputs for a {width}-bit selector (expected {expected})")]
    MuxInputCount { name: String, given: usize, width: usize, expected: usize },

    #[error("multiplexer {0} is not wired and ignores updates")]
    MuxInert(String),

    #[error("multiplexer {name}: selector {selector} has no input")]
    MuxSelectorOutOfRange { name: String, selector: String },

    #[error("ALU: operations {first} and {second} active in the same tick")]
    OperationConflict { first: String, second: String },
}

impl SimError {
    /// Debug log level this error is reported at.
    pub fn severity(&self) -> Level {
        match self {
            SimError::UnknownSignal(_) => Level::Warn,
            SimError::DriverConflict { .. } => Level::Error,
            SimError::WireOverflow { .. } => Level::Crit,
            SimError::RegisterOverflow { .. } => Level::Crit,
            SimError::CapacityTooLarge { .. } => Level::Crit,
            SimError::AddressOutOfRange { .. } => Level::Crit,
            SimError::UninitializedRead(_) => Level::Warn,
            SimError::MemoryOverflow { .. } => Level::Crit,
            SimError::ConditionOutOfRange { .. } => Level::Error,
            SimError::MuxInputCount { given, expected, .. } => {
                if given > expected { Level::Crit } else { Level::Warn }
            }
            SimError::MuxInert(_) => Level::Warn,
            SimError::MuxSelectorOutOfRange { .. } => Level::Warn,
            SimError::OperationConflict { .. } => Level::Crit,
        }
    }
}
