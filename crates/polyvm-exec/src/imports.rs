//! Static host import table.
//!
//! Linear-memory engines resolve every import against [`IMPORTS`] once at
//! load time and route calls through [`ImportHandler::call`].

use crate::error::VmError;
use crate::memory::GuestMemory;
use ValType::{I32, I64};

/// Module name host imports live under.
pub const HOST_MODULE: &str = "env";

/// Export every linear-memory contract is entered through.
pub const LINEAR_MEMORY_ENTRY: &str = "invoke";

/// Returned by `storage_read` when the key is absent.
pub const STORAGE_ABSENT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    I32(u32),
    I64(u64),
}

impl Value {
    pub fn ty(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::I32(v) => Some(*v),
            Value::I64(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::I32(v) => Some(u64::from(*v)),
        }
    }
}

/// Outcome of a host call as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFlow {
    /// Continue execution, pushing the value if any.
    Value(Option<Value>),
    /// Stop the current contract successfully; raised by `ret`.
    Halt,
}

impl HostFlow {
    pub const NONE: HostFlow = HostFlow::Value(None);

    pub fn i32(v: u32) -> Self {
        HostFlow::Value(Some(Value::I32(v)))
    }

    pub fn i64(v: u64) -> Self {
        HostFlow::Value(Some(Value::I64(v)))
    }
}

/// Every operation the host exposes to contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFunc {
    Timestamp,
    BlockHeight,
    InputLength,
    CallOutputLength,
    SelfAddress,
    CallerAddress,
    EntryAddress,
    GetInput,
    GetCallOutput,
    CheckWitness,
    CurrentBlockHash,
    CurrentTxHash,
    Ret,
    Notify,
    CallContract,
    StorageRead,
    StorageWrite,
    StorageDelete,
    ContractCreate,
    ContractMigrate,
    ContractDelete,
}

impl HostFunc {
    pub fn import(&self) -> &'static HostImport {
        &IMPORTS[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.import().name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub params: &'static [ValType],
    pub result: Option<ValType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostImport {
    pub name: &'static str,
    pub func: HostFunc,
    pub signature: Signature,
}

const fn import(
    name: &'static str,
    func: HostFunc,
    params: &'static [ValType],
    result: Option<ValType>,
) -> HostImport {
    HostImport {
        name,
        func,
        signature: Signature { params, result },
    }
}

/// Indexed by `HostFunc as usize`.
pub static IMPORTS: [HostImport; 21] = [
    import("timestamp", HostFunc::Timestamp, &[], Some(I64)),
    import("block_height", HostFunc::BlockHeight, &[], Some(I32)),
    import("input_length", HostFunc::InputLength, &[], Some(I32)),
    import("call_output_length", HostFunc::CallOutputLength, &[], Some(I32)),
    import("self_address", HostFunc::SelfAddress, &[I32], None),
    import("caller_address", HostFunc::CallerAddress, &[I32], None),
    import("entry_address", HostFunc::EntryAddress, &[I32], None),
    import("get_input", HostFunc::GetInput, &[I32], None),
    import("get_call_output", HostFunc::GetCallOutput, &[I32], None),
    import("check_witness", HostFunc::CheckWitness, &[I32], Some(I32)),
    import("current_block_hash", HostFunc::CurrentBlockHash, &[I32], Some(I32)),
    import("current_tx_hash", HostFunc::CurrentTxHash, &[I32], Some(I32)),
    import("ret", HostFunc::Ret, &[I32, I32], None),
    import("notify", HostFunc::Notify, &[I32, I32], None),
    import("call_contract", HostFunc::CallContract, &[I32, I32, I32], Some(I32)),
    import("storage_read", HostFunc::StorageRead, &[I32, I32, I32, I32, I32], Some(I32)),
    import("storage_write", HostFunc::StorageWrite, &[I32, I32, I32, I32], None),
    import("storage_delete", HostFunc::StorageDelete, &[I32, I32], None),
    import("contract_create", HostFunc::ContractCreate, &[I32, I32, I32, I32, I32, I32], Some(I32)),
    import("contract_migrate", HostFunc::ContractMigrate, &[I32, I32, I32, I32, I32, I32], Some(I32)),
    import("contract_delete", HostFunc::ContractDelete, &[], None),
];

/// Look up an import by module and field name.
pub fn resolve(module: &str, name: &str) -> Option<&'static HostImport> {
    if module != HOST_MODULE {
        return None;
    }
    IMPORTS.iter().find(|import| import.name == name)
}

/// Check `args` against the import signature and return them as u32 slots.
pub(crate) fn check_args(func: HostFunc, args: &[Value]) -> Result<Vec<u32>, VmError> {
    let signature = func.import().signature;
    if args.len() != signature.params.len() {
        return Err(VmError::EngineFault(format!(
            "{} expects {} arguments, got {}",
            func.name(),
            signature.params.len(),
            args.len()
        )));
    }
    args.iter()
        .zip(signature.params)
        .map(|(arg, ty)| match (arg, ty) {
            (Value::I32(v), ValType::I32) => Ok(*v),
            _ => Err(VmError::EngineFault(format!(
                "{} argument type mismatch: expected {ty:?}, got {:?}",
                func.name(),
                arg.ty()
            ))),
        })
        .collect()
}

/// Host side of the import boundary. Engines hand over their own memory on
/// every call; the host never retains it.
pub trait ImportHandler {
    fn call(
        &mut self,
        func: HostFunc,
        memory: &mut dyn GuestMemory,
        args: &[Value],
    ) -> Result<HostFlow, VmError>;
}
