use polyvm_storage::StorageError;
use polyvm_types::Address;
use thiserror::Error;

/// Faults raised while executing an invocation.
///
/// Every variant is fatal to the whole top-level invocation: nested calls
/// cannot catch a fault raised below them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Insufficient gas: required {required}, remaining {remaining}")]
    InsufficientGas { required: u64, remaining: u64 },

    #[error("Contract not found: {0:x}")]
    ContractNotFound(Address),

    #[error("Memory fault: {len} bytes at offset {offset} outside memory of {size} bytes")]
    MemoryFault { offset: u64, len: u64, size: u64 },

    #[error("Engine fault: {0}")]
    EngineFault(String),

    #[error("Unsupported contract type: {0}")]
    UnsupportedContractType(String),

    #[error("Native method not found: {method} on {contract:x}")]
    NativeMethodNotFound { contract: Address, method: String },

    #[error("Invalid gas limit: {limit} exceeds maximum {max}")]
    InvalidGasLimit { limit: u64, max: u64 },

    #[error("Code size exceeded: {size} > {limit}")]
    CodeSizeExceeded { size: usize, limit: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl VmError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        VmError::MalformedEncoding(msg.into())
    }
}
