//! PolyVM Types - Core type definitions shared by the execution host.
//!
//! This crate provides:
//! - Addresses (20-byte, Bech32m encoded)
//! - Hashes (32-byte, blake3 digests)
//! - U256 (256-bit value carried as raw bytes)
//! - Contract descriptors and VM kinds
//! - Block and transaction context views

pub mod address;
pub mod hash;
pub mod u256;
pub mod contract;
pub mod context;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use u256::U256;
pub use contract::{
    ContractDescriptor, ContractMetadata, VmKind, LINEAR_MEMORY_STORAGE_FLAG,
    STACK_MACHINE_STORAGE_FLAG,
};
pub use context::{BlockContext, TxContext};
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Address, BlockContext, ContractDescriptor, ContractMetadata, Hash, TxContext,
        TypesError, VmKind, U256,
    };
}
