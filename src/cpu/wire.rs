//! Power-decaying buses.
//!
//! A [`Wire`] carries one [`BitInteger`] between components. It keeps its
//! value only while someone refreshes it: after more than
//! `bus_power_time` ATU without a write it loses power and falls back to
//! zero.

use std::cell::RefCell;
use std::rc::Rc;
use crate::bits::BitInteger;
use crate::sim::{Context, SignalSnapshot, SimError, Subscriber};

/// Shared wire handle.
pub type WireRef = Rc<RefCell<Wire>>;

/// A named bus of fixed width and signedness.
pub struct Wire {
    name: String,
    value: BitInteger,
    powered: bool,
    ticks_since_refresh: u64,
    max_power_time: u64,
    ctx: Context,
}

impl Wire {
    /// Create an unpowered wire. Use [`crate::sim::SimulationWorld::wire`] to
    /// also register it with the clock.
    pub fn new(ctx: &Context, name: &str, width: usize, signed: bool) -> Self {
        Self {
            name: name.to_string(),
            value: BitInteger::zero(width, signed),
            powered: false,
            ticks_since_refresh: 0,
            max_power_time: ctx.config().bus_power_time,
            ctx: ctx.clone(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.value.width()
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        self.value.is_signed()
    }

    /// Raw value, whether or not the wire is powered.
    #[inline]
    pub fn value(&self) -> &BitInteger {
        &self.value
    }

    #[inline]
    pub fn has_power(&self) -> bool {
        self.powered
    }

    /// Drive the wire.
    ///
    /// The value is re-encoded at the wire's width and signedness; if that
    /// changes the number, the write is rejected and reported at CRIT.
    pub fn set_value(&mut self, value: &BitInteger) -> Result<(), SimError> {
        let (width, signed) = (self.width(), self.is_signed());
        if !value.fits(width, signed) {
            let err = SimError::WireOverflow {
                wire: self.name.clone(),
                value: value.to_string(),
                width,
                kind: if signed { "signed" } else { "unsigned" },
            };
            self.ctx.report(&err);
            return Err(err);
        }
        self.value = value.cast(width, signed);
        self.powered = true;
        self.ticks_since_refresh = 0;
        Ok(())
    }

    /// Drive the wire with a native integer.
    pub fn set_int(&mut self, value: i128) -> Result<(), SimError> {
        let encoded = BitInteger::from_i128(value, 128, true);
        self.set_value(&encoded)
    }

    /// Age the wire by `elapsed` ATU.
    pub fn update(&mut self, elapsed: u64) {
        self.ticks_since_refresh += elapsed;
        if self.ticks_since_refresh > self.max_power_time {
            self.powered = false;
            self.value = BitInteger::zero(self.width(), self.is_signed());
        }
    }
}

impl Subscriber for Wire {
    fn on_tick(&mut self, elapsed: u64, _signals: &SignalSnapshot) {
        self.update(elapsed);
    }
}

impl std::fmt::Debug for Wire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wire")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("powered", &self.powered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Level, SimulationWorld};

    #[test]
    fn test_decay_boundary() {
        let mut world = SimulationWorld::default();
        let bus = world.wire("bus", 8, true);
        bus.borrow_mut().set_int(42).unwrap();

        world.wait_and_tick(5, 1);
        assert!(bus.borrow().has_power());
        assert_eq!(bus.borrow().value().to_i128(), 42);

        world.wait_and_tick(1, 1);
        assert!(!bus.borrow().has_power());
        assert!(bus.borrow().value().is_zero());
        assert_eq!(bus.borrow().value().width(), 8);
    }

    #[test]
    fn test_refresh_resets_decay() {
        let mut world = SimulationWorld::default();
        let bus = world.wire("bus", 8, false);
        bus.borrow_mut().set_int(1).unwrap();
        world.wait_and_tick(4, 1);
        bus.borrow_mut().set_int(2).unwrap();
        world.wait_and_tick(4, 1);
        assert!(bus.borrow().has_power());
        assert_eq!(bus.borrow().value().to_i128(), 2);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut world = SimulationWorld::default();
        let bus = world.wire("bus", 4, false);
        bus.borrow_mut().set_int(9).unwrap();

        assert!(bus.borrow_mut().set_int(16).is_err());
        assert!(bus.borrow_mut().set_int(-1).is_err());
        assert_eq!(bus.borrow().value().to_i128(), 9);
        assert_eq!(world.log().count(Level::Crit), 2);
    }

    #[test]
    fn test_reencodes_at_wire_width() {
        let mut world = SimulationWorld::default();
        let bus = world.wire("bus", 32, true);
        bus.borrow_mut().set_value(&BitInteger::int(-5, 24)).unwrap();
        let value = bus.borrow().value().clone();
        assert_eq!(value.width(), 32);
        assert_eq!(value.to_i128(), -5);
    }

    #[test]
    fn test_unregistered_wire_never_decays() {
        let mut world = SimulationWorld::default();
        let mut wire = Wire::new(world.context(), "loose", 8, true);
        wire.set_int(3).unwrap();
        world.wait_and_tick(20, 1);
        assert!(wire.has_power());
        wire.update(6);
        assert!(!wire.has_power());
    }
}
