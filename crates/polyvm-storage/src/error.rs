use polyvm_types::Address;
use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("Contract already exists: {0:x}")]
    ContractExists(Address),

    #[error("Contract not found: {0:x}")]
    ContractNotFound(Address),
}
