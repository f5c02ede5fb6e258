//! Condition evaluation for conditional microcode branches.
//!
//! The [`FlagRegister`] holds one predicate per condition code. While the
//! condition-index wire is powered it evaluates the selected predicate and
//! drives the 1-bit result that steers the sequencer's condition multiplexer.

use crate::bits::BitInteger;
use crate::cpu::memory::capacity;
use crate::cpu::wire::WireRef;
use crate::sim::{Context, SignalSnapshot, SimError, Subscriber};

/// A zero-argument condition, typically closing over register handles.
pub type Condition = Box<dyn Fn() -> bool>;

pub struct FlagRegister {
    conditions: Vec<Option<Condition>>,
    input: WireRef,
    output: WireRef,
    ctx: Context,
}

impl FlagRegister {
    /// A flag register with `2^condition_bits` conditions, all false.
    /// `condition_bits` is at most [`crate::cpu::memory::MAX_INDEX_BITS`].
    pub fn new(ctx: &Context, condition_bits: usize, input: &WireRef, output: &WireRef) -> Result<Self, SimError> {
        let count = capacity("flag register", condition_bits)?;
        Ok(Self {
            conditions: (0..count).map(|_| None).collect(),
            input: input.clone(),
            output: output.clone(),
            ctx: ctx.clone(),
        })
    }

    pub fn size(&self) -> usize {
        self.conditions.len()
    }

    /// Install the predicate for condition `index`.
    pub fn set_condition<F>(&mut self, index: usize, condition: F) -> Result<(), SimError>
    where
        F: Fn() -> bool + 'static,
    {
        match self.conditions.get_mut(index) {
            Some(slot) => {
                *slot = Some(Box::new(condition));
                Ok(())
            }
            None => Err(self.out_of_range(index.to_string())),
        }
    }

    /// Evaluate condition `index`. Unset conditions are false; an index out of
    /// range is reported and reads as false.
    pub fn condition(&self, index: usize) -> bool {
        match self.conditions.get(index) {
            Some(Some(predicate)) => predicate(),
            Some(None) => false,
            None => {
                self.out_of_range(index.to_string());
                false
            }
        }
    }

    fn out_of_range(&self, index: String) -> SimError {
        let err = SimError::ConditionOutOfRange { index, max: self.conditions.len() - 1 };
        self.ctx.report(&err);
        err
    }
}

impl Subscriber for FlagRegister {
    fn on_tick(&mut self, _elapsed: u64, _signals: &SignalSnapshot) {
        let index = {
            let input = self.input.borrow();
            if !input.has_power() {
                return;
            }
            input.value().to_index()
        };
        let flag = match index {
            Some(i) => self.condition(i),
            None => {
                let shown = self.input.borrow().value().to_string();
                self.out_of_range(shown);
                false
            }
        };
        let _ = self.output.borrow_mut().set_value(&BitInteger::uint(flag as u128, 1));
    }
}
