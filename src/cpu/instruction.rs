//! The instruction register (RI).
//!
//! A central-memory word holds two fields:
//! - the high `copma_bits`: opcode and addressing mode (COPMA), unsigned
//! - the low `arch_bits - copma_bits`: the operand (RA), signed
//!
//! [`InstructionRegister`] stores the whole word like any register, but only
//! the operand reaches its bus outputs; the opcode goes to the sequencer.

use std::fmt;
use crate::bits::BitInteger;
use crate::cpu::registers::{OutputSink, Register, RegisterInput, RegisterModel};
use crate::cpu::wire::WireRef;
use crate::sim::{Context, Signal, SignalSnapshot, Subscriber};

pub struct InstructionRegister {
    register: Register,
    copma: WireRef,
    ra_bits: usize,
    copma_bits: usize,
}

impl InstructionRegister {
    /// An `arch_bits`-wide signed register splitting its value per the
    /// context's configuration. `copma` receives the opcode field.
    pub fn new(ctx: &Context, name: &str, copma: &WireRef) -> Self {
        let config = ctx.config();
        Self {
            register: Register::new(ctx, name, config.arch_bits, true),
            copma: copma.clone(),
            ra_bits: config.ra_bits(),
            copma_bits: config.copma_bits,
        }
    }

    pub fn with_input(mut self, input: RegisterInput) -> Self {
        self.register = self.register.with_input(input);
        self
    }

    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.register = self.register.with_output(output);
        self
    }

    /// Opcode and addressing mode of the current instruction.
    pub fn copma(&self) -> BitInteger {
        self.register
            .current_value()
            .slice(self.ra_bits, self.copma_bits)
            .resize(self.copma_bits, false)
    }

    /// Operand of the current instruction.
    pub fn ra(&self) -> BitInteger {
        self.register.current_value().slice(0, self.ra_bits).resize(self.ra_bits, true)
    }

    pub fn preset(&mut self, value: &BitInteger) {
        self.register.preset(value);
    }
}

impl Subscriber for InstructionRegister {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        self.register.latch(signals);
        let ra = self.ra();
        self.register.fan_out(&ra, signals);
        let _ = self.copma.borrow_mut().set_value(&self.copma());
    }
}

impl RegisterModel for InstructionRegister {
    fn name(&self) -> &str {
        self.register.name()
    }

    fn current_value(&self) -> &BitInteger {
        self.register.current_value()
    }

    fn next_value(&self) -> &BitInteger {
        self.register.next_value()
    }

    fn outputs(&self) -> &[OutputSink] {
        self.register.outputs()
    }

    fn set_outputs(&mut self, outputs: Vec<OutputSink>) {
        self.register.set_outputs(outputs);
    }

    fn clock_tick_signal(&self) -> Option<Signal> {
        self.register.clock_tick_signal()
    }

    fn set_clock_tick_signal(&mut self, signal: Signal) {
        self.register.set_clock_tick_signal(signal);
    }
}

impl fmt::Debug for InstructionRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionRegister")
            .field("name", &self.register.name())
            .field("copma", &self.copma().to_u64())
            .field("ra", &self.ra().to_i64())
            .finish()
    }
}
