//! Engine boundary.
//!
//! Interpreters live outside this crate and plug in through two traits, one
//! per bytecode family. Both receive borrowed host state for the duration of
//! a single call and never keep it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use polyvm_types::{Address, Hash};

use crate::error::VmError;
use crate::imports::ImportHandler;

/// A loaded program, opaque to the host.
pub struct EngineHandle(Box<dyn Any + Send + Sync>);

impl EngineHandle {
    pub fn new<T: Any + Send + Sync>(program: T) -> Self {
        Self(Box::new(program))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Borrow the program as `T`, faulting if the handle came from another engine.
    pub fn program<T: Any>(&self) -> Result<&T, VmError> {
        self.downcast_ref::<T>()
            .ok_or_else(|| VmError::EngineFault("engine handle holds a foreign program".into()))
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EngineHandle(..)")
    }
}

/// Engine for sandboxed bytecode over a linear memory.
///
/// The engine owns its memory and hands it to the host on each import call.
/// Input is read through `get_input`; output is set by `ret`, which answers
/// with [`crate::imports::HostFlow::Halt`]. A halted run is a success.
pub trait LinearMemoryEngine: Send + Sync {
    fn load(&self, code: &[u8]) -> Result<EngineHandle, VmError>;

    fn execute(
        &self,
        handle: &EngineHandle,
        entry: &str,
        imports: &mut dyn ImportHandler,
    ) -> Result<(), VmError>;
}

/// Engine for stack-machine bytecode.
///
/// `input` is a codec-encoded parameter buffer that has already been
/// validated; the returned bytes are the call's output.
pub trait StackMachineEngine: Send + Sync {
    fn load(&self, code: &[u8]) -> Result<EngineHandle, VmError>;

    fn execute(
        &self,
        handle: &EngineHandle,
        method: &str,
        input: &[u8],
        host: &mut dyn StackHost,
    ) -> Result<Vec<u8>, VmError>;
}

/// Host services offered to stack-machine engines. Every method charges its
/// scheduled gas before doing any work.
pub trait StackHost {
    fn timestamp(&mut self) -> Result<u64, VmError>;
    fn block_height(&mut self) -> Result<u32, VmError>;
    fn current_block_hash(&mut self) -> Result<Hash, VmError>;
    fn current_tx_hash(&mut self) -> Result<Hash, VmError>;

    fn self_address(&mut self) -> Result<Address, VmError>;
    fn caller_address(&mut self) -> Result<Address, VmError>;
    fn entry_address(&mut self) -> Result<Address, VmError>;
    fn check_witness(&mut self, address: &Address) -> Result<bool, VmError>;

    // Events
    fn notify(&mut self, payload: Vec<u8>) -> Result<(), VmError>;

    // Storage, scoped to the executing contract
    fn storage_read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, VmError>;
    fn storage_write(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError>;
    fn storage_delete(&mut self, key: &[u8]) -> Result<(), VmError>;

    fn call_contract(
        &mut self,
        target: &Address,
        method: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, VmError>;
}

/// Engines available to the dispatcher. A missing engine makes contracts of
/// that kind unsupported.
#[derive(Clone, Default)]
pub struct Engines {
    pub linear_memory: Option<Arc<dyn LinearMemoryEngine>>,
    pub stack_machine: Option<Arc<dyn StackMachineEngine>>,
}

impl Engines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linear_memory(mut self, engine: Arc<dyn LinearMemoryEngine>) -> Self {
        self.linear_memory = Some(engine);
        self
    }

    pub fn with_stack_machine(mut self, engine: Arc<dyn StackMachineEngine>) -> Self {
        self.stack_machine = Some(engine);
        self
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines")
            .field("linear_memory", &self.linear_memory.is_some())
            .field("stack_machine", &self.stack_machine.is_some())
            .finish()
    }
}
