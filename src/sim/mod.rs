//! Simulation kernel.
//!
//! This module provides the time and signalling machinery every component
//! shares:
//! - [`Signal`] and [`SignalTable`] - the closed set of control lines and their decay
//! - [`Clock`] and [`Subscriber`] - discrete time and ordered tick dispatch
//! - [`SimulationWorld`] and [`Context`] - one isolated simulation instance
//! - [`DebugLog`] - the per-severity message log
//! - [`SimulationConfig`] - timing and sizing parameters

mod signal;
mod clock;
mod world;
mod debug;
mod error;
pub mod config;

pub use signal::{Signal, SignalKind, SignalSnapshot, SignalTable};
pub use clock::{Clock, Subscriber, SubscriberRef};
pub use world::{Context, SimulationWorld};
pub use debug::{DebugLog, Level};
pub use error::SimError;
pub use config::{ConfigError, SimulationConfig};
