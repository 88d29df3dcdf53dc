//! Shared in-memory contract registry and storage.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use polyvm_types::{Address, ContractDescriptor};

use crate::{scoped_key, ContractStore, StorageError};

#[derive(Debug, Default)]
struct StoreState {
    contracts: HashMap<Address, ContractDescriptor>,
    /// Keyed by `scoped_key(address, key)`
    items: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Committed state shared across concurrently processed transactions.
///
/// All access goes through an internal lock, so a `MemoryStore` can sit
/// behind an `Arc` while each transaction works on its own [`crate::CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a deployed contract.
    pub fn contract(&self, address: &Address) -> Option<ContractDescriptor> {
        self.state.read().contracts.get(address).cloned()
    }

    /// Get a storage value by its physical key.
    pub fn get(&self, scoped: &[u8]) -> Option<Vec<u8>> {
        self.state.read().items.get(scoped).cloned()
    }

    /// Entries whose physical key starts with `prefix`.
    pub fn get_prefixed(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let state = self.state.read();
        state
            .items
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of contracts deployed.
    pub fn contract_count(&self) -> usize {
        self.state.read().contracts.len()
    }

    /// Apply a batch of buffered changes atomically.
    pub(crate) fn apply(
        &self,
        contracts: HashMap<Address, Option<ContractDescriptor>>,
        items: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    ) {
        let mut state = self.state.write();
        for (address, descriptor) in contracts {
            match descriptor {
                Some(d) => {
                    state.contracts.insert(address, d);
                }
                None => {
                    state.contracts.remove(&address);
                }
            }
        }
        for (key, value) in items {
            match value {
                Some(v) => {
                    state.items.insert(key, v);
                }
                None => {
                    state.items.remove(&key);
                }
            }
        }
    }
}

impl ContractStore for MemoryStore {
    fn lookup(&self, address: &Address) -> Result<Option<ContractDescriptor>, StorageError> {
        Ok(self.contract(address))
    }

    fn read(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get(&scoped_key(contract, key)))
    }

    fn write(&mut self, contract: &Address, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.state
            .write()
            .items
            .insert(scoped_key(contract, key), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, contract: &Address, key: &[u8]) -> Result<(), StorageError> {
        self.state.write().items.remove(&scoped_key(contract, key));
        Ok(())
    }

    fn scan(&self, contract: &Address) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .get_prefixed(contract.as_bytes())
            .into_iter()
            .map(|(k, v)| (k[Address::LEN..].to_vec(), v))
            .collect())
    }

    fn put_contract(
        &mut self,
        address: Address,
        descriptor: ContractDescriptor,
    ) -> Result<(), StorageError> {
        self.state.write().contracts.insert(address, descriptor);
        Ok(())
    }

    fn remove_contract(&mut self, address: &Address) -> Result<(), StorageError> {
        self.state.write().contracts.remove(address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut store = MemoryStore::new();
        let addr = Address::system(1);

        store.write(&addr, b"k", b"v").unwrap();
        assert_eq!(store.read(&addr, b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get(&scoped_key(&addr, b"k")), Some(b"v".to_vec()));
    }

    #[test]
    fn test_storage_is_scoped_per_contract() {
        let mut store = MemoryStore::new();
        let a = Address::system(1);
        let b = Address::system(2);

        store.write(&a, b"k", b"from-a").unwrap();
        assert_eq!(store.read(&b, b"k").unwrap(), None);
    }

    #[test]
    fn test_delete() {
        let mut store = MemoryStore::new();
        let addr = Address::system(1);

        store.write(&addr, b"k", b"v").unwrap();
        store.delete(&addr, b"k").unwrap();
        assert_eq!(store.read(&addr, b"k").unwrap(), None);

        // Deleting again is harmless
        store.delete(&addr, b"k").unwrap();
    }

    #[test]
    fn test_create_rejects_duplicate_code() {
        let mut store = MemoryStore::new();
        let d = ContractDescriptor::stack_machine(vec![1, 2, 3]);

        let addr = store.create(d.clone()).unwrap();
        assert_eq!(addr, Address::from_code(&[1, 2, 3]));
        assert_eq!(store.create(d), Err(StorageError::ContractExists(addr)));
    }

    #[test]
    fn test_scan_strips_address_prefix() {
        let mut store = MemoryStore::new();
        let a = Address::from_bytes([5u8; 20]);
        let b = Address::from_bytes([6u8; 20]);

        store.write(&a, b"x", b"1").unwrap();
        store.write(&a, b"y", b"2").unwrap();
        store.write(&b, b"z", b"3").unwrap();

        let items = store.scan(&a).unwrap();
        assert_eq!(
            items,
            vec![(b"x".to_vec(), b"1".to_vec()), (b"y".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn test_migrate_moves_storage() {
        let mut store = MemoryStore::new();
        let old = store.create(ContractDescriptor::linear_memory(b"v1".to_vec())).unwrap();
        store.write(&old, b"owner", b"alice").unwrap();

        let new = store
            .migrate(&old, ContractDescriptor::linear_memory(b"v2".to_vec()))
            .unwrap();

        assert_ne!(old, new);
        assert!(store.lookup(&old).unwrap().is_none());
        assert_eq!(store.read(&old, b"owner").unwrap(), None);
        assert_eq!(store.read(&new, b"owner").unwrap(), Some(b"alice".to_vec()));
    }

    #[test]
    fn test_delete_contract_clears_storage() {
        let mut store = MemoryStore::new();
        let addr = store.create(ContractDescriptor::stack_machine(b"code".to_vec())).unwrap();
        store.write(&addr, b"a", b"1").unwrap();

        store.delete_contract(&addr).unwrap();
        assert!(store.lookup(&addr).unwrap().is_none());
        assert!(store.scan(&addr).unwrap().is_empty());
        assert_eq!(
            store.delete_contract(&addr),
            Err(StorageError::ContractNotFound(addr))
        );
    }
}
