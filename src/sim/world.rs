//! One simulation instance.
//!
//! A [`SimulationWorld`] owns the clock, the signal table, the debug log and
//! the configuration. Components receive a [`Context`] at wiring time: a
//! cheap handle onto the shared table, log and configuration, without access
//! to the clock. Nothing is global, so two worlds never observe each other.

use std::cell::RefCell;
use std::rc::Rc;
use crate::cpu::wire::{Wire, WireRef};
use crate::sim::{
    Clock, DebugLog, Signal, SignalSnapshot, SignalTable, SimError, SimulationConfig, Subscriber,
};

/// Shared state handed to every component.
#[derive(Clone)]
pub struct Context {
    signals: Rc<RefCell<SignalTable>>,
    log: DebugLog,
    config: Rc<SimulationConfig>,
}

impl Context {
    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[inline]
    pub fn log(&self) -> &DebugLog {
        &self.log
    }

    /// Raise a signal. Takes effect from the next tick's snapshot.
    pub fn emit(&self, signal: Signal, duration: u64) {
        self.signals.borrow_mut().emit(signal, duration);
    }

    /// Record an error in the debug log.
    #[inline]
    pub fn report(&self, error: &SimError) {
        self.log.report(error);
    }
}

/// Clock, signals, log and configuration of one simulated machine.
pub struct SimulationWorld {
    ctx: Context,
    clock: Clock,
}

impl SimulationWorld {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            ctx: Context {
                signals: Rc::new(RefCell::new(SignalTable::new())),
                log: DebugLog::new(),
                config: Rc::new(config),
            },
            clock: Clock::new(),
        }
    }

    #[inline]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        self.ctx.config()
    }

    #[inline]
    pub fn log(&self) -> &DebugLog {
        self.ctx.log()
    }

    /// Register a component with the clock and return a shared handle to it.
    pub fn attach<T: Subscriber + 'static>(&mut self, component: T) -> Rc<RefCell<T>> {
        let shared = Rc::new(RefCell::new(component));
        self.clock.register(shared.clone());
        shared
    }

    /// Create a wire and register it with the clock.
    pub fn wire(&mut self, name: &str, width: usize, signed: bool) -> WireRef {
        let wire = Wire::new(self.context(), name, width, signed);
        self.attach(wire)
    }

    pub fn emit(&self, signal: Signal, duration: u64) {
        self.ctx.emit(signal, duration);
    }

    /// Raise a signal by mnemonic. Unknown names are logged and returned.
    pub fn emit_named(&self, name: &str, duration: u64) -> Result<Signal, SimError> {
        let result = self.ctx.signals.borrow_mut().emit_named(name, duration);
        if let Err(e) = &result {
            self.ctx.report(e);
        }
        result
    }

    /// Current signal state.
    pub fn snapshot(&self) -> SignalSnapshot {
        self.ctx.signals.borrow().snapshot()
    }

    #[inline]
    pub fn wait(&mut self, atu: u64) {
        self.clock.wait(atu);
    }

    pub fn tick(&mut self) {
        self.clock.tick(&self.ctx.signals);
    }

    pub fn wait_and_tick(&mut self, total: u64, step: u64) {
        self.clock.wait_and_tick(total, step, &self.ctx.signals);
    }

    #[inline]
    pub fn time_since_start(&self) -> u64 {
        self.clock.time_since_start()
    }
}

impl Default for SimulationWorld {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}
