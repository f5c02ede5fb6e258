//! Address-path combinational parts of the sequencer.
//!
//! - [`Multiplexer`] forwards `inputs[selector]` to its output every tick
//! - [`Plus1`] drives `input + 1` every tick

use crate::cpu::wire::WireRef;
use crate::sim::{Context, SignalSnapshot, SimError, Subscriber};

struct MuxWiring {
    inputs: Vec<WireRef>,
    output: WireRef,
    selector: WireRef,
}

/// Selects one of `2^selector_width` input wires.
///
/// Fewer inputs than selector values is tolerated with a warning. More inputs
/// than the selector can address leaves the multiplexer inert: every update
/// is a reported no-op.
pub struct Multiplexer {
    name: String,
    wiring: Option<MuxWiring>,
    ctx: Context,
}

impl Multiplexer {
    pub fn new(
        ctx: &Context,
        name: &str,
        inputs: &[WireRef],
        output: &WireRef,
        selector: &WireRef,
    ) -> Self {
        let width = selector.borrow().width();
        let expected = 1usize.checked_shl(width as u32).unwrap_or(usize::MAX);
        let given = inputs.len();

        let mut mux = Self { name: name.to_string(), wiring: None, ctx: ctx.clone() };
        if given != expected {
            ctx.report(&SimError::MuxInputCount { name: mux.name.clone(), given, width, expected });
            if given > expected {
                return mux;
            }
        }
        mux.wiring = Some(MuxWiring {
            inputs: inputs.to_vec(),
            output: output.clone(),
            selector: selector.clone(),
        });
        mux
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether construction succeeded.
    pub fn is_functional(&self) -> bool {
        self.wiring.is_some()
    }

    /// Copy the selected input to the output.
    pub fn update(&mut self) {
        let Some(wiring) = &self.wiring else {
            self.ctx.report(&SimError::MuxInert(self.name.clone()));
            return;
        };

        let selector = wiring.selector.borrow().value().clone();
        let Some(input) = selector.to_index().and_then(|i| wiring.inputs.get(i)) else {
            self.ctx.report(&SimError::MuxSelectorOutOfRange {
                name: self.name.clone(),
                selector: selector.to_string(),
            });
            return;
        };
        let value = input.borrow().value().clone();
        let _ = wiring.output.borrow_mut().set_value(&value);
    }
}

impl Subscriber for Multiplexer {
    fn on_tick(&mut self, _elapsed: u64, _signals: &SignalSnapshot) {
        self.update();
    }
}

/// Incrementer feeding the next sequential microprogram address.
pub struct Plus1 {
    input: WireRef,
    output: WireRef,
}

impl Plus1 {
    pub fn new(input: &WireRef, output: &WireRef) -> Self {
        Self { input: input.clone(), output: output.clone() }
    }

    pub fn update(&mut self) {
        let next = self.input.borrow().value().add_int(1);
        let _ = self.output.borrow_mut().set_value(&next);
    }
}

impl Subscriber for Plus1 {
    fn on_tick(&mut self, _elapsed: u64, _signals: &SignalSnapshot) {
        self.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Level, SimulationWorld};

    fn inputs(world: &mut SimulationWorld, count: usize) -> Vec<WireRef> {
        (0..count)
            .map(|i| {
                let wire = world.wire(&format!("in{}", i), 8, false);
                wire.borrow_mut().set_int(10 * (i as i128 + 1)).unwrap();
                wire
            })
            .collect()
    }

    #[test]
    fn test_selects_input() {
        let mut world = SimulationWorld::default();
        let ins = inputs(&mut world, 4);
        let selector = world.wire("sel", 2, false);
        let output = world.wire("out", 8, false);
        let mut mux = Multiplexer::new(world.context(), "mux", &ins, &output, &selector);
        assert!(mux.is_functional());

        selector.borrow_mut().set_int(2).unwrap();
        mux.update();
        assert_eq!(output.borrow().value().to_i128(), 30);

        selector.borrow_mut().set_int(0).unwrap();
        mux.update();
        assert_eq!(output.borrow().value().to_i128(), 10);
        assert_eq!(world.log().count_at_least(Level::Log), 0);
    }

    #[test]
    fn test_too_few_inputs_warns() {
        let mut world = SimulationWorld::default();
        let ins = inputs(&mut world, 3);
        let selector = world.wire("sel", 2, false);
        let output = world.wire("out", 8, false);
        let mut mux = Multiplexer::new(world.context(), "mux", &ins, &output, &selector);
        assert!(mux.is_functional());
        assert_eq!(world.log().count(Level::Warn), 1);

        selector.borrow_mut().set_int(3).unwrap();
        mux.update();
        assert_eq!(world.log().count(Level::Warn), 2);
        assert!(!output.borrow().has_power());
    }

    #[test]
    fn test_too_many_inputs_is_inert() {
        let mut world = SimulationWorld::default();
        let ins = inputs(&mut world, 3);
        let selector = world.wire("sel", 1, false);
        let output = world.wire("out", 8, false);
        let mut mux = Multiplexer::new(world.context(), "mux", &ins, &output, &selector);
        assert!(!mux.is_functional());
        assert_eq!(world.log().count(Level::Crit), 1);

        mux.update();
        mux.update();
        assert_eq!(world.log().count(Level::Warn), 2);
        assert!(!output.borrow().has_power());
    }

    #[test]
    fn test_plus1_on_tick() {
        let mut world = SimulationWorld::default();
        let input = world.wire("in", 10, false);
        let output = world.wire("out", 10, false);
        world.attach(Plus1::new(&input, &output));

        input.borrow_mut().set_int(10).unwrap();
        world.wait_and_tick(5, 1);
        assert_eq!(output.borrow().value().to_i128(), 11);
    }
}
