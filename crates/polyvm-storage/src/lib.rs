//! PolyVM Storage - the contract registry and storage collaborator.
//!
//! The execution host only ever sees a [`ContractStore`]: a transaction-scoped
//! view that can look up contracts and read/write their storage. Isolation
//! between concurrently processed transactions is the store's concern:
//! [`MemoryStore`] is the shared base and [`CacheStore`] buffers one
//! transaction's writes until `commit`.

pub mod cache;
pub mod error;
pub mod memory;

pub use cache::CacheStore;
pub use error::StorageError;
pub use memory::MemoryStore;

use polyvm_types::{Address, ContractDescriptor};

/// Derive the physical storage key of a contract entry.
///
/// `scoped_key = address || key`: plain concatenation, no separator and no
/// length prefix on the fixed-width address.
pub fn scoped_key(contract: &Address, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(Address::LEN + key.len());
    out.extend_from_slice(contract.as_bytes());
    out.extend_from_slice(key);
    out
}

/// Transaction-scoped contract registry and storage.
///
/// Implementors provide the primitive operations; contract lifecycle
/// (`create`, `migrate`, `delete_contract`) is built on top of them.
pub trait ContractStore {
    /// Look up a deployed contract.
    fn lookup(&self, address: &Address) -> Result<Option<ContractDescriptor>, StorageError>;

    /// Read a storage entry of `contract`.
    fn read(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a storage entry of `contract`.
    fn write(&mut self, contract: &Address, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Delete a storage entry of `contract`. Deleting a missing key is a no-op.
    fn delete(&mut self, contract: &Address, key: &[u8]) -> Result<(), StorageError>;

    /// All storage entries of `contract` as `(key, value)`, keys without the address prefix.
    fn scan(&self, contract: &Address) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Record a contract under `address`, replacing any previous descriptor.
    fn put_contract(
        &mut self,
        address: Address,
        descriptor: ContractDescriptor,
    ) -> Result<(), StorageError>;

    /// Drop the contract descriptor at `address` (storage untouched).
    fn remove_contract(&mut self, address: &Address) -> Result<(), StorageError>;

    /// Deploy a new contract; its address is derived from the code.
    fn create(&mut self, descriptor: ContractDescriptor) -> Result<Address, StorageError> {
        let address = descriptor.address();
        if self.lookup(&address)?.is_some() {
            return Err(StorageError::ContractExists(address));
        }
        self.put_contract(address, descriptor)?;
        Ok(address)
    }

    /// Replace the contract at `from` with new code, carrying its storage over.
    fn migrate(
        &mut self,
        from: &Address,
        descriptor: ContractDescriptor,
    ) -> Result<Address, StorageError> {
        if self.lookup(from)?.is_none() {
            return Err(StorageError::ContractNotFound(*from));
        }
        let items = self.scan(from)?;
        let address = self.create(descriptor)?;
        for (key, value) in &items {
            self.write(&address, key, value)?;
        }
        self.delete_contract(from)?;
        Ok(address)
    }

    /// Remove a contract together with all of its storage.
    fn delete_contract(&mut self, address: &Address) -> Result<(), StorageError> {
        if self.lookup(address)?.is_none() {
            return Err(StorageError::ContractNotFound(*address));
        }
        for (key, _) in self.scan(address)? {
            self.delete(address, &key)?;
        }
        self.remove_contract(address)
    }
}

impl<T: ContractStore + ?Sized> ContractStore for &mut T {
    fn lookup(&self, address: &Address) -> Result<Option<ContractDescriptor>, StorageError> {
        (**self).lookup(address)
    }

    fn read(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read(contract, key)
    }

    fn write(&mut self, contract: &Address, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        (**self).write(contract, key, value)
    }

    fn delete(&mut self, contract: &Address, key: &[u8]) -> Result<(), StorageError> {
        (**self).delete(contract, key)
    }

    fn scan(&self, contract: &Address) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        (**self).scan(contract)
    }

    fn put_contract(
        &mut self,
        address: Address,
        descriptor: ContractDescriptor,
    ) -> Result<(), StorageError> {
        (**self).put_contract(address, descriptor)
    }

    fn remove_contract(&mut self, address: &Address) -> Result<(), StorageError> {
        (**self).remove_contract(address)
    }
}
