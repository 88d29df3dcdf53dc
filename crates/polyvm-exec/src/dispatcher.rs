//! Cross-VM dispatcher.
//!
//! Resolves a target address to a native handler or a stored contract, runs
//! it under a fresh call frame and normalizes the result to bytes. The target
//! is classified before the frame is pushed, so an unknown address leaves the
//! stack untouched.

use bytes::Bytes;
use polyvm_types::{Address, ContractDescriptor, VmKind};
use tracing::{debug, warn};

use crate::codec;
use crate::context::CallContext;
use crate::error::VmError;
use crate::host::HostCall;
use crate::imports::LINEAR_MEMORY_ENTRY;
use crate::invoke::CallRequest;
use crate::native::{NativeContext, NativeContract};
use crate::runtime::Runtime;

/// Result of one dispatched call, tagged by the engine kind that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    Native(Vec<u8>),
    StackMachine(Vec<u8>),
    LinearMemory(Vec<u8>),
}

impl CallResult {
    pub fn vm_kind(&self) -> VmKind {
        match self {
            CallResult::Native(_) => VmKind::Native,
            CallResult::StackMachine(_) => VmKind::StackMachine,
            CallResult::LinearMemory(_) => VmKind::LinearMemory,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CallResult::Native(bytes)
            | CallResult::StackMachine(bytes)
            | CallResult::LinearMemory(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            CallResult::Native(bytes)
            | CallResult::StackMachine(bytes)
            | CallResult::LinearMemory(bytes) => bytes,
        }
    }
}

enum Target<'e> {
    Native(&'e NativeContract),
    Bytecode(ContractDescriptor),
}

impl Target<'_> {
    fn vm_kind(&self) -> VmKind {
        match self {
            Target::Native(_) => VmKind::Native,
            Target::Bytecode(descriptor) => descriptor.vm_kind(),
        }
    }
}

impl<'a> Runtime<'a> {
    /// Call `target` and return its output bytes.
    pub fn dispatch(&mut self, target: &Address, request: &CallRequest) -> Result<Vec<u8>, VmError> {
        self.dispatch_call(target, request).map(CallResult::into_bytes)
    }

    /// Call `target`, keeping the engine kind on the result.
    pub fn dispatch_call(&mut self, target: &Address, request: &CallRequest) -> Result<CallResult, VmError> {
        let resolved = self.resolve(target).map_err(|err| {
            warn!(contract = %target, %err, "call target not resolved");
            err
        })?;
        let kind = resolved.vm_kind();
        let depth = self.contexts.depth();
        debug!(contract = %target, method = %request.method, vm = %kind, depth, "dispatch");

        let result = match resolved {
            Target::Native(contract) => self.with_frame(CallContext::native(*target), |rt| {
                rt.run_native(contract, target, request)
            }),
            Target::Bytecode(descriptor) => {
                let code = Bytes::from(descriptor.code);
                let frame = CallContext::new(*target, code.clone());
                match kind {
                    VmKind::LinearMemory => {
                        self.with_frame(frame, |rt| rt.run_linear_memory(&code, request))
                    }
                    _ => self.with_frame(frame, |rt| rt.run_stack_machine(&code, request)),
                }
            }
        };

        match &result {
            Ok(output) => debug!(
                contract = %target,
                vm = %kind,
                depth,
                output_len = output.as_bytes().len(),
                gas_remaining = self.gas().remaining(),
                "dispatch complete"
            ),
            Err(err) => warn!(contract = %target, vm = %kind, depth, %err, "dispatch faulted"),
        }
        result
    }

    fn resolve(&self, target: &Address) -> Result<Target<'a>, VmError> {
        let env = self.env;
        if let Some(contract) = env.natives.lookup(target) {
            return Ok(Target::Native(contract));
        }
        match self.lookup_contract(target)? {
            Some(descriptor) => Ok(Target::Bytecode(descriptor)),
            None => Err(VmError::ContractNotFound(*target)),
        }
    }

    /// Run `f` with `frame` pushed, popping it whether or not `f` succeeds.
    fn with_frame<T>(
        &mut self,
        frame: CallContext,
        f: impl FnOnce(&mut Self) -> Result<T, VmError>,
    ) -> Result<T, VmError> {
        self.contexts.push(frame);
        let result = f(self);
        self.contexts.pop();
        result
    }

    fn run_native(
        &mut self,
        contract: &NativeContract,
        address: &Address,
        request: &CallRequest,
    ) -> Result<CallResult, VmError> {
        self.gas_mut().charge_native_invoke()?;
        let handler = contract
            .handler(&request.method)
            .ok_or_else(|| VmError::NativeMethodNotFound {
                contract: *address,
                method: request.method.clone(),
            })?;
        let mut ctx = NativeContext::new(self, request, *address);
        handler(&mut ctx).map(CallResult::Native)
    }

    fn run_linear_memory(&mut self, code: &[u8], request: &CallRequest) -> Result<CallResult, VmError> {
        let env = self.env;
        let engine = env.engines.linear_memory.as_deref().ok_or_else(|| {
            VmError::UnsupportedContractType("no linear-memory engine configured".into())
        })?;
        let handle = engine.load(code)?;
        let mut host = HostCall::new(self, request.linear_memory_input());
        engine.execute(&handle, LINEAR_MEMORY_ENTRY, &mut host)?;
        Ok(CallResult::LinearMemory(host.into_output()))
    }

    fn run_stack_machine(&mut self, code: &[u8], request: &CallRequest) -> Result<CallResult, VmError> {
        let env = self.env;
        let engine = env.engines.stack_machine.as_deref().ok_or_else(|| {
            VmError::UnsupportedContractType("no stack-machine engine configured".into())
        })?;
        if !request.args.is_empty() {
            codec::decode_with_limit(&request.args, self.limits().max_param_length)?;
        }
        let handle = engine.load(code)?;
        let output = engine.execute(&handle, &request.method, &request.args, self)?;
        Ok(CallResult::StackMachine(output))
    }
}
