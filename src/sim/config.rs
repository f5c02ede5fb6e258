//! Simulation parameters.
//!
//! The defaults describe the reference machine: 32-bit data path, 8-bit
//! opcode field, 1024-word central memory and a 1024-word, 64-bit
//! microprogram memory. A configuration can be loaded from JSON; missing
//! fields take their default.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::asm::microcode;

/// Timing and sizing of one simulated machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// ATU a wire keeps its value without being refreshed.
    pub bus_power_time: u64,
    /// Emission length of level signals.
    pub level_duration: u64,
    /// Emission length of pulse signals.
    pub pulse_duration: u64,
    /// Width of the data path and of central memory cells.
    pub arch_bits: usize,
    /// Width of the opcode/addressing-mode field of an instruction.
    pub copma_bits: usize,
    /// log2 of the central memory size.
    pub memory_address_bits: usize,
    /// log2 of the microprogram memory size.
    pub microprogram_address_bits: usize,
    /// Width of a microprogram memory cell.
    pub microprogram_word_bits: usize,
    /// Width of the flag register's condition index.
    pub condition_bits: usize,
    /// Microprogram address of the three-word fetch routine.
    pub fetch_address: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bus_power_time: 5,
            level_duration: 5,
            pulse_duration: 1,
            arch_bits: 32,
            copma_bits: 8,
            memory_address_bits: 10,
            microprogram_address_bits: 10,
            microprogram_word_bits: 64,
            condition_bits: 4,
            fetch_address: 1021,
        }
    }
}

impl SimulationConfig {
    /// Width of the operand field of an instruction.
    #[inline]
    pub fn ra_bits(&self) -> usize {
        self.arch_bits - self.copma_bits
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json(e.to_string()))
    }

    /// Reject parameter combinations the machine cannot be wired with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.copma_bits == 0 || self.copma_bits >= self.arch_bits {
            return Err(ConfigError::Invalid(format!(
                "copma_bits ({}) must be between 1 and arch_bits - 1 ({})",
                self.copma_bits,
                self.arch_bits.saturating_sub(1)
            )));
        }
        if self.microprogram_address_bits != microcode::ADDRESS_BITS {
            return Err(ConfigError::Invalid(format!(
                "microprogram_address_bits must be {} to match the microword layout",
                microcode::ADDRESS_BITS
            )));
        }
        if self.condition_bits != microcode::CONDITION_BITS {
            return Err(ConfigError::Invalid(format!(
                "condition_bits must be {} to match the microword layout",
                microcode::CONDITION_BITS
            )));
        }
        if self.microprogram_word_bits < microcode::LAYOUT_BITS {
            return Err(ConfigError::Invalid(format!(
                "microprogram_word_bits ({}) is narrower than the {}-bit microword layout",
                self.microprogram_word_bits,
                microcode::LAYOUT_BITS
            )));
        }
        if self.memory_address_bits == 0 || self.memory_address_bits > 24 {
            return Err(ConfigError::Invalid(format!(
                "memory_address_bits ({}) must be between 1 and 24",
                self.memory_address_bits
            )));
        }
        if self.fetch_address + 3 > 1 << self.microprogram_address_bits {
            return Err(ConfigError::Invalid(format!(
                "fetch routine at {} does not fit in microprogram memory",
                self.fetch_address
            )));
        }
        if self.pulse_duration == 0 {
            return Err(ConfigError::Invalid("pulse_duration must be at least 1".into()));
        }
        if self.level_duration < self.pulse_duration {
            return Err(ConfigError::Invalid(
                "level_duration must not be shorter than pulse_duration".into(),
            ));
        }
        Ok(())
    }
}

/// Errors loading a configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
