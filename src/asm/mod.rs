//! Program and microprogram formats.
//!
//! This module provides:
//! - The microprogram word codec and the built-in microprogram
//! - A microprogram assembler (text → `(address, microinstruction)` pairs)
//! - The central-memory word codec and instruction table
//! - A loader for central-memory program files

pub mod microcode;
pub mod microasm;
pub mod central;
pub mod program;

pub use microcode::{MicroInstruction, MicrocodeError, builtin_microprogram, fetch_routine};
pub use microasm::{assemble_microprogram, format_microprogram};
pub use central::{WordLayout, disassemble, instruction_table, translate};
pub use program::{ProgramError, ProgramFile, demo_program, load_program, parse_program};
