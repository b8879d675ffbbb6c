use crate::runtime::value::Value;
use std::cell::RefCell;

#[derive(Debug, Default)]
pub enum BranchSignal {
    #[default]
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Per-invocation state machine for break/continue/return. Blocks stop
/// early whenever the state leaves `Normal`; loops consume `Break`, clear
/// `Continue`, and let `Return` propagate to the outermost invoke.
#[derive(Debug, Default)]
pub struct BranchContext {
    pending: RefCell<BranchSignal>,
}

impl BranchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        *self.pending.borrow_mut() = BranchSignal::Normal;
    }

    pub fn is_normal(&self) -> bool {
        matches!(*self.pending.borrow(), BranchSignal::Normal)
    }

    pub fn is_return(&self) -> bool {
        matches!(*self.pending.borrow(), BranchSignal::Return(_))
    }

    pub fn is_break(&self) -> bool {
        matches!(*self.pending.borrow(), BranchSignal::Break)
    }

    pub fn is_continue(&self) -> bool {
        matches!(*self.pending.borrow(), BranchSignal::Continue)
    }

    pub fn set_break(&self) {
        *self.pending.borrow_mut() = BranchSignal::Break;
    }

    pub fn set_continue(&self) {
        *self.pending.borrow_mut() = BranchSignal::Continue;
    }

    pub fn set_return(&self, value: Value) {
        *self.pending.borrow_mut() = BranchSignal::Return(value);
    }

    /// Consumes a pending `Break` at a loop boundary so it cannot
    /// terminate an enclosing loop.
    pub fn consume_break(&self) -> bool {
        let mut pending = self.pending.borrow_mut();
        if matches!(*pending, BranchSignal::Break) {
            *pending = BranchSignal::Normal;
            true
        } else {
            false
        }
    }

    /// Clears a pending `Continue` after the loop honors it.
    pub fn consume_continue(&self) -> bool {
        let mut pending = self.pending.borrow_mut();
        if matches!(*pending, BranchSignal::Continue) {
            *pending = BranchSignal::Normal;
            true
        } else {
            false
        }
    }

    pub fn take_return(&self) -> Option<Value> {
        let mut pending = self.pending.borrow_mut();
        if matches!(*pending, BranchSignal::Return(_)) {
            match std::mem::take(&mut *pending) {
                BranchSignal::Return(value) => Some(value),
                _ => unreachable!(),
            }
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_normal_and_resets() {
        let branch = BranchContext::new();
        assert!(branch.is_normal());
        branch.set_break();
        branch.reset();
        assert!(branch.is_normal());
    }

    #[test]
    fn break_is_consumed_at_loop_boundary() {
        let branch = BranchContext::new();
        branch.set_break();
        assert!(branch.consume_break());
        assert!(branch.is_normal());
        assert!(!branch.consume_break());
    }

    #[test]
    fn return_survives_break_and_continue_consumption() {
        let branch = BranchContext::new();
        branch.set_return(Value::Int(7));
        assert!(!branch.consume_break());
        assert!(!branch.consume_continue());
        assert!(branch.is_return());
        assert!(matches!(branch.take_return(), Some(Value::Int(7))));
        assert!(branch.is_normal());
    }
}
