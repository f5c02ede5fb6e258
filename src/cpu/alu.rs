//! Signal-selected combinational unit.
//!
//! The [`Alu`] maps operation signals to pure functions over its input wire
//! values. Each tick, every active operation is evaluated and its result is
//! driven onto all output wires. Operations are visited in signal order, so
//! when two are (wrongly) active together the later signal's result stays.

use std::collections::BTreeMap;
use crate::bits::BitInteger;
use crate::cpu::wire::WireRef;
use crate::sim::{Context, Signal, SignalSnapshot, SimError, Subscriber};

/// An n-ary function over the input wire values, in input order.
pub type Operation = Box<dyn Fn(&[BitInteger]) -> BitInteger>;

pub struct Alu {
    inputs: Vec<WireRef>,
    outputs: Vec<WireRef>,
    operations: BTreeMap<Signal, Operation>,
    last_output: Option<BitInteger>,
    ctx: Context,
}

impl Alu {
    pub fn new(ctx: &Context, inputs: &[WireRef], outputs: &[WireRef]) -> Self {
        Self {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            operations: BTreeMap::new(),
            last_output: None,
            ctx: ctx.clone(),
        }
    }

    /// An ALU with the architecture's micro-operations:
    /// `XS` (pass X), `XP1` (X + 1), `ADD`, `SUB`, `MUL`, `AND`, `OR`, `XOR`.
    pub fn with_standard_operations(ctx: &Context, inputs: &[WireRef], outputs: &[WireRef]) -> Self {
        let mut alu = Self::new(ctx, inputs, outputs);
        alu.add_operation(Signal::Xs, |v| operand(v, 0));
        alu.add_operation(Signal::Xp1, |v| operand(v, 0).add_int(1));
        alu.add_operation(Signal::Add, |v| operand(v, 0).add(&operand(v, 1)));
        alu.add_operation(Signal::Sub, |v| operand(v, 0).sub(&operand(v, 1)));
        alu.add_operation(Signal::Mul, |v| operand(v, 0).mult(&operand(v, 1)));
        alu.add_operation(Signal::And, |v| operand(v, 0).and(&operand(v, 1)));
        alu.add_operation(Signal::Or, |v| operand(v, 0).or(&operand(v, 1)));
        alu.add_operation(Signal::Xor, |v| operand(v, 0).xor(&operand(v, 1)));
        alu
    }

    /// Map `signal` to `operation`, replacing (with a warning) any previous one.
    pub fn add_operation<F>(&mut self, signal: Signal, operation: F)
    where
        F: Fn(&[BitInteger]) -> BitInteger + 'static,
    {
        if self.operations.insert(signal, Box::new(operation)).is_some() {
            self.ctx.log().warn(format!("ALU: operation {} overwritten", signal));
        }
    }

    pub fn has_operation(&self, signal: Signal) -> bool {
        self.operations.contains_key(&signal)
    }

    /// Result of the most recent evaluation.
    pub fn last_output(&self) -> Option<&BitInteger> {
        self.last_output.as_ref()
    }

    /// Evaluate every active operation.
    pub fn compute(&mut self, signals: &SignalSnapshot) {
        let values: Vec<BitInteger> = self.inputs.iter().map(|w| w.borrow().value().clone()).collect();

        let mut first: Option<Signal> = None;
        for (signal, operation) in &self.operations {
            if !signals.is_active(*signal) {
                continue;
            }
            match first {
                Some(active) => self.ctx.report(&SimError::OperationConflict {
                    first: active.to_string(),
                    second: signal.to_string(),
                }),
                None => first = Some(*signal),
            }

            let result = operation(&values);
            for output in &self.outputs {
                let _ = output.borrow_mut().set_value(&result);
            }
            self.last_output = Some(result);
        }
    }
}

/// Input `index`, or zero when the ALU has fewer inputs.
fn operand(values: &[BitInteger], index: usize) -> BitInteger {
    values
        .get(index)
        .cloned()
        .unwrap_or_else(|| BitInteger::zero(1, true))
}

impl Subscriber for Alu {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        self.compute(signals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Level, SimulationWorld};

    fn setup(world: &mut SimulationWorld) -> (WireRef, WireRef, WireRef) {
        let x = world.wire("x", 8, true);
        let y = world.wire("y", 8, true);
        let out = world.wire("out", 8, true);
        (x, y, out)
    }

    #[test]
    fn test_add_scenario() {
        let mut world = SimulationWorld::default();
        let (x, y, out) = setup(&mut world);
        let alu = Alu::with_standard_operations(world.context(), &[x.clone(), y.clone()], &[out.clone()]);
        let alu = world.attach(alu);

        x.borrow_mut().set_int(5).unwrap();
        y.borrow_mut().set_int(3).unwrap();
        world.emit(Signal::Add, 1);
        world.wait_and_tick(1, 1);

        assert_eq!(out.borrow().value().to_i128(), 8);
        assert_eq!(alu.borrow().last_output().map(|v| v.to_i128()), Some(8));
    }

    #[test]
    fn test_idle_without_signal() {
        let mut world = SimulationWorld::default();
        let (x, y, out) = setup(&mut world);
        let alu = world.attach(Alu::with_standard_operations(world.context(), &[x.clone(), y], &[out.clone()]));
        x.borrow_mut().set_int(5).unwrap();
        world.wait_and_tick(1, 1);
        assert!(!out.borrow().has_power());
        assert!(alu.borrow().last_output().is_none());
    }

    #[test]
    fn test_standard_operations() {
        let cases = [
            (Signal::Xs, 6),
            (Signal::Xp1, 7),
            (Signal::Sub, 4),
            (Signal::Mul, 12),
            (Signal::And, 2),
            (Signal::Or, 6),
            (Signal::Xor, 4),
        ];
        for (signal, expected) in cases {
            let mut world = SimulationWorld::default();
            let (x, y, out) = setup(&mut world);
            world.attach(Alu::with_standard_operations(world.context(), &[x.clone(), y.clone()], &[out.clone()]));
            x.borrow_mut().set_int(6).unwrap();
            y.borrow_mut().set_int(2).unwrap();
            world.emit(signal, 1);
            world.wait_and_tick(1, 1);
            assert_eq!(out.borrow().value().to_i128(), expected, "{}", signal);
        }
    }

    #[test]
    fn test_conflict_keeps_last_result() {
        let mut world = SimulationWorld::default();
        let (x, y, out) = setup(&mut world);
        let alu = world.attach(Alu::with_standard_operations(world.context(), &[x.clone(), y.clone()], &[out.clone()]));
        x.borrow_mut().set_int(6).unwrap();
        y.borrow_mut().set_int(2).unwrap();
        world.emit(Signal::Add, 1);
        world.emit(Signal::Sub, 1);
        world.wait_and_tick(1, 1);

        assert_eq!(world.log().count(Level::Crit), 1);
        assert_eq!(alu.borrow().last_output().map(|v| v.to_i128()), Some(4));
        assert_eq!(out.borrow().value().to_i128(), 4);
    }

    #[test]
    fn test_overwrite_warns() {
        let world = SimulationWorld::default();
        let mut alu = Alu::new(world.context(), &[], &[]);
        alu.add_operation(Signal::Add, |_| BitInteger::zero(1, true));
        assert_eq!(world.log().count(Level::Warn), 0);
        alu.add_operation(Signal::Add, |_| BitInteger::int(1, 4));
        assert_eq!(world.log().count(Level::Warn), 1);
        assert!(alu.has_operation(Signal::Add));
    }

    #[test]
    fn test_unary_operation_on_single_input() {
        let mut world = SimulationWorld::default();
        let x = world.wire("x", 8, true);
        let out = world.wire("out", 8, true);
        let mut alu = Alu::new(world.context(), &[x.clone()], &[out.clone()]);
        alu.add_operation(Signal::Xor, |v| v[0].not());
        world.attach(alu);
        x.borrow_mut().set_int(0).unwrap();
        world.emit(Signal::Xor, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(out.borrow().value().to_i128(), -1);
    }
}
