//! Call context stack.
//!
//! One frame per in-flight contract call, bottom frame first. The dispatcher
//! keeps pushes and pops balanced around every call, faulting ones included,
//! so the stack only ever shows calls that are still running.

use bytes::Bytes;
use polyvm_types::Address;

/// A single frame in the call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Contract address being executed
    pub contract_address: Address,
    /// Bytecode of the contract; empty for native contracts
    pub code: Bytes,
}

impl CallContext {
    pub fn new(contract_address: Address, code: Bytes) -> Self {
        Self {
            contract_address,
            code,
        }
    }

    pub fn native(contract_address: Address) -> Self {
        Self::new(contract_address, Bytes::new())
    }
}

/// Ordered frames of the current top-level invocation.
///
/// No depth limit is applied here: recursion is bounded by gas alone.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    frames: Vec<CallContext>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new call frame, returning its depth.
    pub fn push(&mut self, frame: CallContext) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    /// Exit the current call frame.
    pub fn pop(&mut self) -> Option<CallContext> {
        self.frames.pop()
    }

    /// Frame of the contract now executing.
    pub fn current(&self) -> Option<&CallContext> {
        self.frames.last()
    }

    /// Frame directly beneath the current one. `None` for the outermost call.
    pub fn calling(&self) -> Option<&CallContext> {
        self.frames
            .len()
            .checked_sub(2)
            .and_then(|index| self.frames.get(index))
    }

    /// Bottom frame: the call that started the invocation.
    pub fn entry(&self) -> Option<&CallContext> {
        self.frames.first()
    }

    /// Get the current call depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get the full call stack, bottom first.
    pub fn frames(&self) -> &[CallContext] {
        &self.frames
    }

    /// Check if an address is anywhere in the current call stack.
    pub fn contains(&self, address: &Address) -> bool {
        self.frames.iter().any(|frame| frame.contract_address == *address)
    }
}
