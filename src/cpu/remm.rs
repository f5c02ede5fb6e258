//! Microprogram exchange register (REMM).

use std::fmt;
use crate::asm::microcode::MicroInstruction;
use crate::bits::BitInteger;
use crate::cpu::registers::{Register, RegisterInput, RegisterModel};
use crate::cpu::wire::WireRef;
use crate::sim::{Context, Signal, SignalKind, SignalSnapshot, Subscriber};

/// Output wires of the REMM.
pub struct RemmOutputs {
    pub next_address: WireRef,
    pub sel_ms: WireRef,
    pub condition: WireRef,
}

/// Holds the current microprogram word and turns it into control signals.
///
/// On its clock edge the word is decoded: the next-address, selMS and
/// condition fields go to their wires every tick, and the signal bits are
/// buffered as pending pulses and levels. The buffers are only emitted when
/// the sequencer raises `SENDLEVELS` or `SENDPULSES`, and are emptied once
/// sent.
pub struct MicroprogramRegister {
    register: Register,
    outputs: RemmOutputs,
    decoded: MicroInstruction,
    levels: Vec<Signal>,
    pulses: Vec<Signal>,
    ctx: Context,
}

impl MicroprogramRegister {
    /// A `microprogram_word_bits`-wide register loading `input` while `load`
    /// is active and clocked by `clock`.
    pub fn new(ctx: &Context, input: &WireRef, load: Signal, clock: Signal, outputs: RemmOutputs) -> Self {
        let register = Register::new(ctx, "REMM", ctx.config().microprogram_word_bits, false)
            .with_input(RegisterInput::gated(input, load))
            .with_clock(clock);
        Self {
            register,
            outputs,
            decoded: MicroInstruction::default(),
            levels: Vec::new(),
            pulses: Vec::new(),
            ctx: ctx.clone(),
        }
    }

    pub fn current_value(&self) -> &BitInteger {
        self.register.current_value()
    }

    /// The microinstruction decoded at the last clock edge.
    pub fn instruction(&self) -> &MicroInstruction {
        &self.decoded
    }

    pub fn pending_levels(&self) -> &[Signal] {
        &self.levels
    }

    pub fn pending_pulses(&self) -> &[Signal] {
        &self.pulses
    }

    fn decode(&mut self) {
        match MicroInstruction::decode(self.register.current_value()) {
            Ok(mi) => {
                self.levels = mi.signals_of(SignalKind::Level).collect();
                self.pulses = mi.signals_of(SignalKind::Pulse).collect();
                self.decoded = mi;
            }
            Err(e) => self.ctx.log().error(format!("REMM: {}", e)),
        }
    }

    fn drive_fields(&self) {
        let fields = [
            (&self.outputs.next_address, self.decoded.next_address),
            (&self.outputs.sel_ms, self.decoded.sel_ms as u64),
            (&self.outputs.condition, self.decoded.condition as u64),
        ];
        for (wire, value) in fields {
            let _ = wire.borrow_mut().set_value(&BitInteger::uint(value as u128, 64));
        }
    }

    fn flush(&self, signals: &[Signal], duration: u64) {
        for signal in signals {
            self.ctx.emit(*signal, duration);
        }
    }
}

impl Subscriber for MicroprogramRegister {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        if self.register.latch(signals) {
            self.decode();
        }
        self.drive_fields();

        let (level_duration, pulse_duration) = {
            let config = self.ctx.config();
            (config.level_duration, config.pulse_duration)
        };
        if signals.is_active(Signal::SendLevels) {
            self.flush(&self.levels, level_duration);
            self.levels.clear();
        }
        if signals.is_active(Signal::SendPulses) {
            self.flush(&self.pulses, pulse_duration);
            self.pulses.clear();
        }
    }
}

impl fmt::Debug for MicroprogramRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicroprogramRegister")
            .field("instruction", &self.decoded)
            .field("levels", &self.levels)
            .field("pulses", &self.pulses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulationWorld;

    fn setup(world: &mut SimulationWorld) -> (WireRef, RemmOutputs) {
        let input = world.wire("MM out", 64, false);
        let outputs = RemmOutputs {
            next_address: world.wire("next", 10, false),
            sel_ms: world.wire("selMS", 2, false),
            condition: world.wire("cond", 4, false),
        };
        (input, outputs)
    }

    fn load(world: &mut SimulationWorld, input: &WireRef, word: &BitInteger) {
        input.borrow_mut().set_value(word).unwrap();
        world.emit(Signal::ERemm, 1);
        world.wait_and_tick(2, 1);
        world.emit(Signal::SwitchRemm, 1);
        world.wait_and_tick(2, 1);
    }

    #[test]
    fn test_decodes_fields() {
        let mut world = SimulationWorld::default();
        let (input, outputs) = setup(&mut world);
        let (next, sel, cond) =
            (outputs.next_address.clone(), outputs.sel_ms.clone(), outputs.condition.clone());
        let remm = MicroprogramRegister::new(world.context(), &input, Signal::ERemm, Signal::SwitchRemm, outputs);
        let remm = world.attach(remm);

        let word = BitInteger::from_binary(
            "0111110010100011000010110000001011000100000100000100100000001000",
            false,
        )
        .unwrap();
        load(&mut world, &input, &word);

        assert_eq!(next.borrow().value().to_u64(), 498);
        assert_eq!(sel.borrow().value().to_u64(), 2);
        assert_eq!(cond.borrow().value().to_u64(), 3);
        assert_eq!(remm.borrow().current_value(), &word);
    }

    #[test]
    fn test_buffers_until_sent() {
        let mut world = SimulationWorld::default();
        let (input, outputs) = setup(&mut world);
        let remm = world.attach(MicroprogramRegister::new(
            world.context(),
            &input,
            Signal::ERemm,
            Signal::SwitchRemm,
            outputs,
        ));

        let mi = MicroInstruction::new(0, 0, 0, &[Signal::Rib1, Signal::Xs, Signal::ERa, Signal::Fin]);
        load(&mut world, &input, &mi.encode(64).unwrap());
        assert_eq!(remm.borrow().pending_levels(), &[Signal::Rib1, Signal::Xs, Signal::Fin]);
        assert_eq!(remm.borrow().pending_pulses(), &[Signal::ERa]);
        assert_eq!(world.snapshot().active().count(), 0);

        world.emit(Signal::SendLevels, 1);
        world.wait_and_tick(1, 1);
        let snapshot = world.snapshot();
        assert_eq!(snapshot.remaining(Signal::Xs), 5);
        assert_eq!(snapshot.remaining(Signal::Fin), 5);
        assert!(!snapshot.is_active(Signal::ERa));
        assert!(remm.borrow().pending_levels().is_empty());

        world.emit(Signal::SendPulses, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(world.snapshot().remaining(Signal::ERa), 1);
        assert!(remm.borrow().pending_pulses().is_empty());

        // Buffers were emptied: a second trigger sends nothing new.
        world.wait_and_tick(10, 1);
        world.emit(Signal::SendLevels, 1);
        world.emit(Signal::SendPulses, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(world.snapshot().active().count(), 0);
    }
}
