//! Components of the simulated von Neumann machine.
//!
//! Everything here is a clock [`Subscriber`](crate::sim::Subscriber) or is
//! owned by one:
//! - buses ([`Wire`]) and registers with their insulators
//! - the ALU, flag register, multiplexers and memories
//! - the microprogrammed sequencer
//! - [`Architecture`], which wires them into the complete machine

pub mod wire;
pub mod registers;
pub mod alu;
pub mod flags;
pub mod memory;
pub mod mux;
pub mod counter;
pub mod instruction;
pub mod remm;
pub mod sequencer;
pub mod architecture;

pub use wire::{Wire, WireRef};
pub use registers::{ClockGated, Insulated, Insulator, OutputSink, Register, RegisterInput, RegisterModel};
pub use alu::Alu;
pub use flags::FlagRegister;
pub use memory::{Memory, MemoryReader, MemoryRef, MemoryWriter};
pub use mux::{Multiplexer, Plus1};
pub use counter::PhaseCounter;
pub use instruction::InstructionRegister;
pub use remm::MicroprogramRegister;
pub use sequencer::{CyclePhase, Sequencer, SequencerBuses};
pub use architecture::{Architecture, ArchitectureError, ArchitectureSnapshot, REGISTER_NAMES};
