//! Native contracts.
//!
//! Built-in contracts are plain Rust handlers registered at reserved system
//! addresses. The registry is assembled once and injected immutably through
//! [`crate::ExecutionEnv`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use polyvm_types::Address;

use crate::codec::{self, Parameter};
use crate::error::VmError;
use crate::imports::HostFunc;
use crate::invoke::CallRequest;
use crate::runtime::Runtime;

pub type NativeHandler =
    Arc<dyn Fn(&mut NativeContext<'_, '_>) -> Result<Vec<u8>, VmError> + Send + Sync>;

/// Method table of one native contract.
#[derive(Clone, Default)]
pub struct NativeContract {
    methods: HashMap<String, NativeHandler>,
}

impl NativeContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut NativeContext<'_, '_>) -> Result<Vec<u8>, VmError> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn handler(&self, method: &str) -> Option<&NativeHandler> {
        self.methods.get(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl fmt::Debug for NativeContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods().collect();
        methods.sort_unstable();
        f.debug_struct("NativeContract").field("methods", &methods).finish()
    }
}

/// Native contracts by address.
#[derive(Debug, Clone, Default)]
pub struct NativeRegistry {
    contracts: HashMap<Address, NativeContract>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `contract` at a reserved system address.
    pub fn register(&mut self, address: Address, contract: NativeContract) -> Result<(), VmError> {
        if !address.is_system() {
            return Err(VmError::UnsupportedContractType(format!(
                "native contract at non-system address {address:x}"
            )));
        }
        self.contracts.insert(address, contract);
        Ok(())
    }

    pub fn with_contract(mut self, address: Address, contract: NativeContract) -> Result<Self, VmError> {
        self.register(address, contract)?;
        Ok(self)
    }

    pub fn lookup(&self, address: &Address) -> Option<&NativeContract> {
        self.contracts.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// What a native handler sees of its call.
///
/// Storage access is scoped to the native contract's own address. Gas is
/// charged once on entry; operations here are not metered individually,
/// except nested calls.
pub struct NativeContext<'r, 'a> {
    runtime: &'r mut Runtime<'a>,
    request: &'r CallRequest,
    contract: Address,
}

impl<'r, 'a> NativeContext<'r, 'a> {
    pub(crate) fn new(runtime: &'r mut Runtime<'a>, request: &'r CallRequest, contract: Address) -> Self {
        Self {
            runtime,
            request,
            contract,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn version(&self) -> u8 {
        self.request.version
    }

    /// Raw argument bytes.
    pub fn args(&self) -> &[u8] {
        &self.request.args
    }

    /// Decoded arguments. Empty arguments decode to an empty sequence.
    pub fn params(&self) -> Result<Vec<Parameter>, VmError> {
        if self.request.args.is_empty() {
            return Ok(Vec::new());
        }
        codec::decode_with_limit(&self.request.args, self.runtime.limits().max_param_length)
    }

    pub fn caller(&self) -> Address {
        self.runtime.caller_or_zero()
    }

    pub fn block_height(&self) -> u32 {
        self.runtime.block().height
    }

    pub fn timestamp(&self) -> u64 {
        self.runtime.block().timestamp
    }

    pub fn check_witness(&self, address: &Address) -> bool {
        self.runtime.witnessed(address)
    }

    pub fn storage_read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VmError> {
        self.runtime.read_storage(&self.contract, key)
    }

    pub fn storage_write(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError> {
        self.runtime.write_storage(&self.contract, key, value)
    }

    pub fn storage_delete(&mut self, key: &[u8]) -> Result<(), VmError> {
        self.runtime.delete_storage(&self.contract, key)
    }

    pub fn notify(&mut self, payload: Vec<u8>) {
        self.runtime.push_notification(self.contract, payload);
    }

    /// Call another contract. Charged like `call_contract` from bytecode.
    pub fn call_contract(&mut self, target: &Address, request: &CallRequest) -> Result<Vec<u8>, VmError> {
        self.runtime.charge(HostFunc::CallContract)?;
        self.runtime.dispatch(target, request)
    }
}
