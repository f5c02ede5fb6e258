//! Master/slave registers and their decorators.
//!
//! A [`Register`] samples its inputs into a hidden `next` value and only
//! exposes it as `current` on a tick where its clock signal is active, the
//! way a master/slave flip-flop pair does. Two decorators adjust a register
//! without duplicating it:
//! - [`ClockGated`] binds the clock to the architecture register clock
//! - [`Insulated`] routes every gated output through an [`Insulator`]
//!
//! Both implement [`RegisterModel`] and can wrap each other in either order.

use std::fmt;
use crate::bits::BitInteger;
use crate::cpu::wire::WireRef;
use crate::sim::{Context, Signal, SignalSnapshot, SimError, Subscriber};

// ============================================================================
// Inputs and outputs
// ============================================================================

/// A wire the register may sample, optionally only while a signal is active.
#[derive(Clone)]
pub struct RegisterInput {
    pub source: WireRef,
    pub gate: Option<Signal>,
}

impl RegisterInput {
    /// Sampled whenever the wire is powered.
    pub fn always(source: &WireRef) -> Self {
        Self { source: source.clone(), gate: None }
    }

    /// Sampled while `gate` is active and the wire is powered.
    pub fn gated(source: &WireRef, gate: Signal) -> Self {
        Self { source: source.clone(), gate: Some(gate) }
    }
}

/// Where a register's value goes.
#[derive(Clone)]
pub enum OutputSink {
    /// Driven every tick. The gate only matters once [`Insulated`] turns the
    /// sink into an insulator.
    Wire { wire: WireRef, gate: Option<Signal> },
    /// Driven only while the insulator's gate is active.
    Insulator(Insulator),
}

impl OutputSink {
    pub fn wire(wire: &WireRef) -> Self {
        OutputSink::Wire { wire: wire.clone(), gate: None }
    }

    pub fn gated(wire: &WireRef, gate: Signal) -> Self {
        OutputSink::Wire { wire: wire.clone(), gate: Some(gate) }
    }

    /// The wire this sink ends on.
    pub fn target(&self) -> &WireRef {
        match self {
            OutputSink::Wire { wire, .. } => wire,
            OutputSink::Insulator(ins) => ins.output(),
        }
    }

    fn deliver(&mut self, value: &BitInteger, signals: &SignalSnapshot) {
        match self {
            OutputSink::Wire { wire, .. } => {
                // Overflow is already reported by the wire.
                let _ = wire.borrow_mut().set_value(value);
            }
            OutputSink::Insulator(ins) => ins.pass(value, signals),
        }
    }
}

// ============================================================================
// Insulator
// ============================================================================

/// Gated pass-through between a stored value and a shared wire.
#[derive(Clone)]
pub struct Insulator {
    stored: BitInteger,
    output: WireRef,
    gate: Signal,
}

impl Insulator {
    pub fn new(output: &WireRef, gate: Signal) -> Self {
        let stored = {
            let wire = output.borrow();
            BitInteger::zero(wire.width(), wire.is_signed())
        };
        Self { stored, output: output.clone(), gate }
    }

    #[inline]
    pub fn stored_value(&self) -> &BitInteger {
        &self.stored
    }

    #[inline]
    pub fn output(&self) -> &WireRef {
        &self.output
    }

    #[inline]
    pub fn gate(&self) -> Signal {
        self.gate
    }

    pub fn set_stored(&mut self, value: &BitInteger) {
        self.stored = value.clone();
    }

    /// Store `value` and drive it out if the gate is open.
    pub fn pass(&mut self, value: &BitInteger, signals: &SignalSnapshot) {
        self.set_stored(value);
        self.drive(signals);
    }

    /// Drive the stored value if the gate is open.
    pub fn drive(&mut self, signals: &SignalSnapshot) {
        if signals.is_active(self.gate) {
            let _ = self.output.borrow_mut().set_value(&self.stored);
        }
    }
}

impl Subscriber for Insulator {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        self.drive(signals);
    }
}

// ============================================================================
// Register
// ============================================================================

/// Accessors shared by registers and their decorators.
pub trait RegisterModel: Subscriber {
    fn name(&self) -> &str;
    fn current_value(&self) -> &BitInteger;
    fn next_value(&self) -> &BitInteger;
    fn outputs(&self) -> &[OutputSink];
    fn set_outputs(&mut self, outputs: Vec<OutputSink>);
    fn clock_tick_signal(&self) -> Option<Signal>;
    fn set_clock_tick_signal(&mut self, signal: Signal);
}

/// A clocked storage element.
pub struct Register {
    name: String,
    current: BitInteger,
    next: BitInteger,
    inputs: Vec<RegisterInput>,
    outputs: Vec<OutputSink>,
    clock_tick: Option<Signal>,
    ctx: Context,
}

impl Register {
    /// An unclocked register holding zero, with no inputs or outputs.
    pub fn new(ctx: &Context, name: &str, width: usize, signed: bool) -> Self {
        Self {
            name: name.to_string(),
            current: BitInteger::zero(width, signed),
            next: BitInteger::zero(width, signed),
            inputs: Vec::new(),
            outputs: Vec::new(),
            clock_tick: None,
            ctx: ctx.clone(),
        }
    }

    pub fn with_input(mut self, input: RegisterInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_clock(mut self, signal: Signal) -> Self {
        self.clock_tick = Some(signal);
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.current.width()
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        self.current.is_signed()
    }

    pub fn inputs(&self) -> &[RegisterInput] {
        &self.inputs
    }

    /// Load both halves at once, bypassing the clock.
    pub fn preset(&mut self, value: &BitInteger) {
        self.current = value.cast(self.width(), self.is_signed());
        self.next = self.current.clone();
    }

    /// Steps 1 and 2 of a tick: clock `next` into `current`, then sample the
    /// single active input into `next`. Returns whether the clock fired.
    ///
    /// A value too wide for the register is reported and leaves `next`
    /// unchanged.
    pub fn latch(&mut self, signals: &SignalSnapshot) -> bool {
        let clocked = self.clock_tick.is_some_and(|sig| signals.is_active(sig));
        if clocked {
            self.current = self.next.clone();
        }

        let mut driver: Option<String> = None;
        for input in &self.inputs {
            let source = input.source.borrow();
            let open = input.gate.map_or(true, |sig| signals.is_active(sig));
            if !source.has_power() || !open {
                continue;
            }
            match &driver {
                Some(first) => {
                    self.ctx.report(&SimError::DriverConflict {
                        register: self.name.clone(),
                        first: first.clone(),
                        second: source.name().to_string(),
                    });
                }
                None => {
                    let value = source.value();
                    let (width, signed) = (self.current.width(), self.current.is_signed());
                    if value.fits(width, signed) {
                        self.next = value.cast(width, signed);
                    } else {
                        self.ctx.report(&SimError::RegisterOverflow {
                            register: self.name.clone(),
                            value: value.to_string(),
                            width,
                            kind: if signed { "signed" } else { "unsigned" },
                        });
                    }
                    driver = Some(source.name().to_string());
                }
            }
        }
        clocked
    }

    /// Step 3 of a tick: send `value` to every output sink.
    pub fn fan_out(&mut self, value: &BitInteger, signals: &SignalSnapshot) {
        for sink in self.outputs.iter_mut() {
            sink.deliver(value, signals);
        }
    }
}

impl Subscriber for Register {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        self.latch(signals);
        let value = self.current.clone();
        self.fan_out(&value, signals);
    }
}

impl RegisterModel for Register {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_value(&self) -> &BitInteger {
        &self.current
    }

    fn next_value(&self) -> &BitInteger {
        &self.next
    }

    fn outputs(&self) -> &[OutputSink] {
        &self.outputs
    }

    fn set_outputs(&mut self, outputs: Vec<OutputSink>) {
        self.outputs = outputs;
    }

    fn clock_tick_signal(&self) -> Option<Signal> {
        self.clock_tick
    }

    fn set_clock_tick_signal(&mut self, signal: Signal) {
        self.clock_tick = Some(signal);
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Register")
            .field("name", &self.name)
            .field("current", &self.current)
            .field("next", &self.next)
            .field("clock", &self.clock_tick)
            .finish()
    }
}

// ============================================================================
// Decorators
// ============================================================================

macro_rules! forward_register_model {
    ($wrapper:ident) => {
        impl<R: RegisterModel> Subscriber for $wrapper<R> {
            fn on_tick(&mut self, elapsed: u64, signals: &SignalSnapshot) {
                self.inner.on_tick(elapsed, signals);
            }
        }

        impl<R: RegisterModel> RegisterModel for $wrapper<R> {
            fn name(&self) -> &str {
                self.inner.name()
            }

            fn current_value(&self) -> &BitInteger {
                self.inner.current_value()
            }

            fn next_value(&self) -> &BitInteger {
                self.inner.next_value()
            }

            fn outputs(&self) -> &[OutputSink] {
                self.inner.outputs()
            }

            fn set_outputs(&mut self, outputs: Vec<OutputSink>) {
                self.inner.set_outputs(outputs);
            }

            fn clock_tick_signal(&self) -> Option<Signal> {
                self.inner.clock_tick_signal()
            }

            fn set_clock_tick_signal(&mut self, signal: Signal) {
                self.inner.set_clock_tick_signal(signal);
            }
        }

        impl<R> $wrapper<R> {
            pub fn inner(&self) -> &R {
                &self.inner
            }

            pub fn inner_mut(&mut self) -> &mut R {
                &mut self.inner
            }
        }
    };
}

/// Clocks the wrapped register on the architecture register clock.
pub struct ClockGated<R> {
    inner: R,
}

impl<R: RegisterModel> ClockGated<R> {
    pub fn new(mut inner: R) -> Self {
        inner.set_clock_tick_signal(Signal::RegClock);
        Self { inner }
    }
}

/// Puts an [`Insulator`] between the wrapped register and each gated output.
///
/// Outputs without a gate stay plain wires driven every tick.
pub struct Insulated<R> {
    inner: R,
}

impl<R: RegisterModel> Insulated<R> {
    pub fn new(mut inner: R) -> Self {
        let outputs = inner
            .outputs()
            .iter()
            .map(|sink| match sink {
                OutputSink::Wire { wire, gate: Some(gate) } => {
                    OutputSink::Insulator(Insulator::new(wire, *gate))
                }
                other => other.clone(),
            })
            .collect();
        inner.set_outputs(outputs);
        Self { inner }
    }
}

forward_register_model!(ClockGated);
forward_register_model!(Insulated);
