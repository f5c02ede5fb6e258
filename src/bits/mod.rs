//! Binary number primitives.
//!
//! This module provides the value type every simulated component carries:
//! - [`BitInteger`] - an arbitrary-width signed or unsigned two's-complement integer
//! - [`arith`] - ripple-carry arithmetic, division and shifts
//! - bitwise logic and std operator traits (in `ops`)

mod integer;
mod ops;
pub mod arith;

pub use integer::{BitInteger, BitsError};
