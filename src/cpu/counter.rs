//! Microinstruction phase tracking.

use crate::bits::BitInteger;
use crate::cpu::wire::WireRef;
use crate::sim::{Signal, SignalSnapshot, Subscriber};

/// Counts register clock pulses since the last end-of-microprogram signal.
///
/// Phase 1 is the first microinstruction of the fetch routine. The output
/// wire is 1 while in phase 1 and 0 otherwise, which steers the sequencer
/// towards the fetch address or the computed next address.
pub struct PhaseCounter {
    phase: u32,
    end_seen: bool,
    switched: bool,
    output: WireRef,
}

impl PhaseCounter {
    pub fn new(output: &WireRef) -> Self {
        Self { phase: 1, end_seen: false, switched: false, output: output.clone() }
    }

    #[inline]
    pub fn phase(&self) -> u32 {
        self.phase
    }

    #[inline]
    pub fn is_first_phase(&self) -> bool {
        self.phase == 1
    }

    /// Advance on a `REGSIGCLOCK` edge; `FIN` schedules a return to phase 1
    /// on the next edge.
    pub fn update(&mut self, signals: &SignalSnapshot) {
        if signals.is_active(Signal::RegClock) {
            if self.end_seen {
                self.phase = 1;
                self.end_seen = false;
            } else if !self.switched {
                self.phase += 1;
                self.switched = true;
            }
        } else {
            self.switched = false;
        }

        if signals.is_active(Signal::Fin) {
            self.end_seen = true;
        }

        let first = BitInteger::uint(self.is_first_phase() as u128, 1);
        let _ = self.output.borrow_mut().set_value(&first);
    }
}

impl Subscriber for PhaseCounter {
    fn on_tick(&mut self, _elapsed: u64, signals: &SignalSnapshot) {
        self.update(signals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulationWorld;

    #[test]
    fn test_phase_sequence() {
        let mut world = SimulationWorld::default();
        let output = world.wire("phase", 1, false);
        let counter = world.attach(PhaseCounter::new(&output));

        world.wait_and_tick(1, 1);
        assert_eq!(output.borrow().value().to_i128(), 1);

        world.emit(Signal::RegClock, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(output.borrow().value().to_i128(), 0);
        assert_eq!(counter.borrow().phase(), 2);

        world.emit(Signal::Fin, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(counter.borrow().phase(), 2);

        world.emit(Signal::RegClock, 1);
        world.wait_and_tick(1, 1);
        assert_eq!(output.borrow().value().to_i128(), 1);
        assert!(counter.borrow().is_first_phase());
    }

    #[test]
    fn test_long_clock_counts_once() {
        let mut world = SimulationWorld::default();
        let output = world.wire("phase", 1, false);
        let counter = world.attach(PhaseCounter::new(&output));

        world.emit(Signal::RegClock, 3);
        world.wait_and_tick(5, 1);
        assert_eq!(counter.borrow().phase(), 2);

        world.emit(Signal::RegClock, 1);
        world.wait_and_tick(2, 1);
        assert_eq!(counter.borrow().phase(), 3);
    }
}
