//! Discrete time and tick dispatch.
//!
//! Time only moves forward through [`Clock::wait`]. A [`Clock::tick`] hands
//! the time elapsed since the previous tick to every subscriber, together
//! with the signal state as it was at the start of that interval.

use std::cell::RefCell;
use std::rc::Rc;
use crate::sim::{SignalSnapshot, SignalTable};

/// Anything that reacts to clock ticks.
pub trait Subscriber {
    /// Called once per tick, in registration order.
    fn on_tick(&mut self, elapsed: u64, signals: &SignalSnapshot);
}

impl<F: FnMut(u64, &SignalSnapshot)> Subscriber for F {
    fn on_tick(&mut self, elapsed: u64, signals: &SignalSnapshot) {
        self(elapsed, signals)
    }
}

/// Shared subscriber handle as stored by the clock.
pub type SubscriberRef = Rc<RefCell<dyn Subscriber>>;

/// Global simulated time and the ordered subscriber list.
#[derive(Default)]
pub struct Clock {
    total_atu: u64,
    last_dispatched_atu: u64,
    subscribers: Vec<SubscriberRef>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. Dispatch follows registration order.
    pub fn register(&mut self, subscriber: SubscriberRef) {
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Advance time without dispatching.
    #[inline]
    pub fn wait(&mut self, atu: u64) {
        self.total_atu += atu;
    }

    /// Dispatch the interval since the previous tick.
    ///
    /// Subscribers see the signals as they were before this interval decayed
    /// them, so even a signal shorter than the interval is seen once.
    pub fn tick(&mut self, signals: &RefCell<SignalTable>) {
        let elapsed = self.total_atu - self.last_dispatched_atu;
        self.last_dispatched_atu = self.total_atu;

        let snapshot = {
            let mut table = signals.borrow_mut();
            let snapshot = table.snapshot();
            table.decay(elapsed);
            snapshot
        };

        log::trace!(
            "tick at {} ATU (elapsed {}, {} active signals)",
            self.total_atu,
            elapsed,
            snapshot.active().count()
        );

        for subscriber in &self.subscribers {
            subscriber.borrow_mut().on_tick(elapsed, &snapshot);
        }
    }

    /// `wait(step); tick()` while more than `step` remains, then one final
    /// partial step for the remainder. A zero step is one single step.
    pub fn wait_and_tick(&mut self, total: u64, step: u64, signals: &RefCell<SignalTable>) {
        let step = if step == 0 { total.max(1) } else { step };
        let mut remaining = total;
        while remaining > step {
            remaining -= step;
            self.wait(step);
            self.tick(signals);
        }
        if remaining > 0 {
            self.wait(remaining);
            self.tick(signals);
        }
    }

    /// Total simulated time.
    #[inline]
    pub fn time_since_start(&self) -> u64 {
        self.total_atu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Signal;

    fn counter() -> (Rc<RefCell<Vec<u64>>>, SubscriberRef) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        let sub: SubscriberRef = Rc::new(RefCell::new(move |elapsed: u64, _: &SignalSnapshot| {
            sink.borrow_mut().push(elapsed);
        }));
        (calls, sub)
    }

    #[test]
    fn test_call_counts() {
        let table = RefCell::new(SignalTable::new());
        let mut clock = Clock::new();
        let (calls, sub) = counter();
        clock.register(sub);

        clock.wait(3);
        clock.tick(&table);
        assert_eq!(calls.borrow().len(), 1);

        clock.wait_and_tick(10, 2, &table);
        assert_eq!(calls.borrow().len(), 6);

        clock.wait_and_tick(10, 4, &table);
        assert_eq!(calls.borrow().len(), 9);
        assert_eq!(*calls.borrow(), vec![3, 2, 2, 2, 2, 2, 4, 4, 2]);
        assert_eq!(clock.time_since_start(), 23);
    }

    #[test]
    fn test_tick_without_wait_has_zero_elapsed() {
        let table = RefCell::new(SignalTable::new());
        let mut clock = Clock::new();
        let (calls, sub) = counter();
        clock.register(sub);
        clock.tick(&table);
        assert_eq!(*calls.borrow(), vec![0]);
    }

    #[test]
    fn test_short_signal_seen_once() {
        let table = RefCell::new(SignalTable::new());
        let mut clock = Clock::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        clock.register(Rc::new(RefCell::new(move |_: u64, s: &SignalSnapshot| {
            sink.borrow_mut().push(s.remaining(Signal::ERa));
        })));

        table.borrow_mut().emit(Signal::ERa, 1);
        clock.wait_and_tick(10, 5, &table);
        assert_eq!(*seen.borrow(), vec![1, 0]);
    }

    #[test]
    fn test_subscribers_run_in_registration_order() {
        let table = RefCell::new(SignalTable::new());
        let mut clock = Clock::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for id in 0..3 {
            let sink = order.clone();
            clock.register(Rc::new(RefCell::new(move |_: u64, _: &SignalSnapshot| {
                sink.borrow_mut().push(id);
            })));
        }
        clock.tick(&table);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert_eq!(clock.subscriber_count(), 3);
    }
}
