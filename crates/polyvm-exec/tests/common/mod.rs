//! Scripted engines and fixtures shared by the integration tests.
//!
//! Contract "bytecode" here is JSON: a list of steps the scripted engines
//! replay against the host, so each test spells out exactly which host
//! operations a contract performs.

#![allow(dead_code)]

use std::sync::Arc;

use polyvm_exec::imports::{self, HostFlow, ImportHandler, Value, HOST_MODULE};
use polyvm_exec::{
    CallRequest, ContractInvokeParam, EngineHandle, Engines, ExecConfig, ExecutionEnv,
    InvocationSession, LinearMemory, LinearMemoryEngine, NativeRegistry, SessionReport,
    StackHost, StackMachineEngine, VmError,
};
use polyvm_exec::memory::GuestMemory;
use polyvm_storage::MemoryStore;
use polyvm_types::{Address, BlockContext, Hash, TxContext};
use serde::{Deserialize, Serialize};

pub const BLOCK_HEIGHT: u32 = 100;
pub const BLOCK_TIMESTAMP: u64 = 1_700_000_000;
pub const GAS: u64 = 1_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One step of a linear-memory script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Copy literal bytes into memory.
    Data { offset: u32, bytes: Vec<u8> },
    /// Call a host import. A returned value is stored little-endian at
    /// `result_at` when given.
    Call {
        import: String,
        args: Vec<u32>,
        result_at: Option<u32>,
    },
    /// Fail the contract.
    Trap { message: String },
}

/// Builder for linear-memory contract code.
#[derive(Debug, Clone, Default)]
pub struct Script {
    ops: Vec<Op>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, offset: u32, bytes: impl AsRef<[u8]>) -> Self {
        self.ops.push(Op::Data {
            offset,
            bytes: bytes.as_ref().to_vec(),
        });
        self
    }

    pub fn call(mut self, import: &str, args: &[u32]) -> Self {
        self.ops.push(Op::Call {
            import: import.to_string(),
            args: args.to_vec(),
            result_at: None,
        });
        self
    }

    pub fn call_into(mut self, import: &str, args: &[u32], result_at: u32) -> Self {
        self.ops.push(Op::Call {
            import: import.to_string(),
            args: args.to_vec(),
            result_at: Some(result_at),
        });
        self
    }

    pub fn trap(mut self, message: &str) -> Self {
        self.ops.push(Op::Trap {
            message: message.to_string(),
        });
        self
    }

    /// Place `bytes` at `offset` and return them.
    pub fn ret_bytes(self, offset: u32, bytes: impl AsRef<[u8]>) -> Self {
        let len = bytes.as_ref().len() as u32;
        self.data(offset, bytes).call("ret", &[offset, len])
    }

    /// Call `target` with `request`, staging the address at `at` and the
    /// payload right after it. The output length lands at `result_at`.
    pub fn call_contract(self, at: u32, target: &Address, request: &CallRequest, result_at: u32) -> Self {
        let payload = request.to_call_payload();
        let payload_at = at + Address::LEN as u32;
        let len = payload.len() as u32;
        self.data(at, target.as_bytes())
            .data(payload_at, payload)
            .call_into("call_contract", &[at, payload_at, len], result_at)
    }

    pub fn code(&self) -> Vec<u8> {
        serde_json::to_vec(&self.ops).unwrap()
    }
}

/// Linear-memory engine replaying [`Script`]s over one page of memory.
pub struct ScriptedLinearEngine;

impl LinearMemoryEngine for ScriptedLinearEngine {
    fn load(&self, code: &[u8]) -> Result<EngineHandle, VmError> {
        let ops: Vec<Op> = serde_json::from_slice(code)
            .map_err(|e| VmError::EngineFault(format!("invalid script: {e}")))?;
        for op in &ops {
            if let Op::Call { import, .. } = op {
                if imports::resolve(HOST_MODULE, import).is_none() {
                    return Err(VmError::EngineFault(format!("unknown import {import}")));
                }
            }
        }
        Ok(EngineHandle::new(ops))
    }

    fn execute(
        &self,
        handle: &EngineHandle,
        entry: &str,
        host: &mut dyn ImportHandler,
    ) -> Result<(), VmError> {
        if entry != imports::LINEAR_MEMORY_ENTRY {
            return Err(VmError::EngineFault(format!("no export {entry}")));
        }
        let ops = handle.program::<Vec<Op>>()?;
        let mut memory = LinearMemory::new(1, 1);
        for op in ops {
            match op {
                Op::Data { offset, bytes } => memory.write(*offset, bytes)?,
                Op::Call {
                    import,
                    args,
                    result_at,
                } => {
                    let import = imports::resolve(HOST_MODULE, import)
                        .ok_or_else(|| VmError::EngineFault(format!("unknown import {import}")))?;
                    let values: Vec<Value> = args.iter().map(|a| Value::I32(*a)).collect();
                    match host.call(import.func, &mut memory, &values)? {
                        HostFlow::Halt => return Ok(()),
                        HostFlow::Value(Some(value)) => {
                            if let Some(at) = result_at {
                                match value {
                                    Value::I32(v) => memory.write(*at, &v.to_le_bytes())?,
                                    Value::I64(v) => memory.write(*at, &v.to_le_bytes())?,
                                }
                            }
                        }
                        HostFlow::Value(None) => {}
                    }
                }
                Op::Trap { message } => return Err(VmError::EngineFault(message.clone())),
            }
        }
        Ok(())
    }
}

/// One step of a stack-machine program. Steps that produce bytes append
/// them to the program output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StackOp {
    Emit { bytes: Vec<u8> },
    EmitInput,
    EmitMethod,
    EmitSelf,
    EmitCaller,
    EmitEntry,
    EmitHeight,
    Witness { address: [u8; 20] },
    Notify { payload: Vec<u8> },
    Write { key: Vec<u8>, value: Vec<u8> },
    Read { key: Vec<u8> },
    Delete { key: Vec<u8> },
    Call {
        target: [u8; 20],
        method: String,
        args: Vec<u8>,
    },
    Fail { message: String },
}

pub fn stack_code(ops: &[StackOp]) -> Vec<u8> {
    serde_json::to_vec(ops).unwrap()
}

/// Stack-machine engine replaying [`StackOp`] programs.
pub struct ScriptedStackEngine;

impl StackMachineEngine for ScriptedStackEngine {
    fn load(&self, code: &[u8]) -> Result<EngineHandle, VmError> {
        let ops: Vec<StackOp> = serde_json::from_slice(code)
            .map_err(|e| VmError::EngineFault(format!("invalid program: {e}")))?;
        Ok(EngineHandle::new(ops))
    }

    fn execute(
        &self,
        handle: &EngineHandle,
        method: &str,
        input: &[u8],
        host: &mut dyn StackHost,
    ) -> Result<Vec<u8>, VmError> {
        let ops = handle.program::<Vec<StackOp>>()?;
        let mut output = Vec::new();
        for op in ops {
            match op {
                StackOp::Emit { bytes } => output.extend_from_slice(bytes),
                StackOp::EmitInput => output.extend_from_slice(input),
                StackOp::EmitMethod => output.extend_from_slice(method.as_bytes()),
                StackOp::EmitSelf => output.extend_from_slice(host.self_address()?.as_bytes()),
                StackOp::EmitCaller => output.extend_from_slice(host.caller_address()?.as_bytes()),
                StackOp::EmitEntry => output.extend_from_slice(host.entry_address()?.as_bytes()),
                StackOp::EmitHeight => output.extend_from_slice(&host.block_height()?.to_le_bytes()),
                StackOp::Witness { address } => {
                    let witnessed = host.check_witness(&Address::from_bytes(*address))?;
                    output.push(u8::from(witnessed));
                }
                StackOp::Notify { payload } => host.notify(payload.clone())?,
                StackOp::Write { key, value } => host.storage_write(key, value)?,
                StackOp::Read { key } => {
                    if let Some(value) = host.storage_read(key)? {
                        output.extend_from_slice(&value);
                    }
                }
                StackOp::Delete { key } => host.storage_delete(key)?,
                StackOp::Call {
                    target,
                    method,
                    args,
                } => {
                    let returned = host.call_contract(&Address::from_bytes(*target), method, args)?;
                    output.extend_from_slice(&returned);
                }
                StackOp::Fail { message } => return Err(VmError::EngineFault(message.clone())),
            }
        }
        Ok(output)
    }
}

pub fn engines() -> Engines {
    Engines::new()
        .with_linear_memory(Arc::new(ScriptedLinearEngine))
        .with_stack_machine(Arc::new(ScriptedStackEngine))
}

pub fn env() -> ExecutionEnv {
    ExecutionEnv::new(ExecConfig::default()).with_engines(engines())
}

pub fn env_with_natives(natives: NativeRegistry) -> ExecutionEnv {
    env().with_natives(natives)
}

pub fn block() -> BlockContext {
    BlockContext::new(BLOCK_HEIGHT, BLOCK_TIMESTAMP, Hash::compute(b"block"))
}

pub fn tx(signers: Vec<Address>) -> TxContext {
    TxContext::new(Hash::compute(b"tx"), signers)
}

/// Run one invocation against `store` with no signers.
pub fn invoke<'s>(
    env: &ExecutionEnv,
    store: &'s mut MemoryStore,
    target: Address,
    method: &str,
    args: Vec<u8>,
    gas: u64,
) -> SessionReport<&'s mut MemoryStore> {
    invoke_signed(env, store, target, method, args, gas, Vec::new())
}

pub fn invoke_signed<'s>(
    env: &ExecutionEnv,
    store: &'s mut MemoryStore,
    target: Address,
    method: &str,
    args: Vec<u8>,
    gas: u64,
    signers: Vec<Address>,
) -> SessionReport<&'s mut MemoryStore> {
    let session = InvocationSession::new(env, store, block(), tx(signers), gas).unwrap();
    session.execute(&ContractInvokeParam::new(target, method, args))
}
