//! # vonsim
//!
//! A signal-level simulator of a microprogrammed von Neumann computer.
//!
//! The machine is built from small components (buses, registers,
//! insulators, an ALU, multiplexers, memories) that react to named control
//! signals on every tick of a discrete clock. A microprogrammed sequencer
//! reads 64-bit microinstructions and raises their signals, so instruction
//! execution can be followed one signal at a time.

pub mod bits;
pub mod sim;
pub mod cpu;
pub mod asm;

// Re-export commonly used types
pub use bits::{BitInteger, BitsError};
pub use sim::{DebugLog, Level, Signal, SimError, SimulationConfig, SimulationWorld};
pub use cpu::{Architecture, ArchitectureError, ArchitectureSnapshot, CyclePhase};
pub use asm::{MicroInstruction, MicrocodeError, ProgramError};
