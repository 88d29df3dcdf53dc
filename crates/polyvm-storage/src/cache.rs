//! Transaction-scoped write buffer over a shared [`MemoryStore`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use polyvm_types::{Address, ContractDescriptor};

use crate::{scoped_key, ContractStore, MemoryStore, StorageError};

/// Buffers one transaction's changes; the base store is untouched until
/// [`CacheStore::commit`]. Dropping the cache discards everything.
#[derive(Debug)]
pub struct CacheStore {
    base: Arc<MemoryStore>,
    /// `None` marks a deletion
    contracts: HashMap<Address, Option<ContractDescriptor>>,
    /// Keyed by `scoped_key(address, key)`; `None` marks a deletion
    items: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl CacheStore {
    pub fn new(base: Arc<MemoryStore>) -> Self {
        Self {
            base,
            contracts: HashMap::new(),
            items: BTreeMap::new(),
        }
    }

    /// Whether any change is buffered.
    pub fn is_dirty(&self) -> bool {
        !self.contracts.is_empty() || !self.items.is_empty()
    }

    /// Flush all buffered changes into the base store.
    pub fn commit(self) {
        tracing::debug!(
            contracts = self.contracts.len(),
            items = self.items.len(),
            "Committing cached storage changes"
        );
        self.base.apply(self.contracts, self.items);
    }
}

impl ContractStore for CacheStore {
    fn lookup(&self, address: &Address) -> Result<Option<ContractDescriptor>, StorageError> {
        match self.contracts.get(address) {
            Some(cached) => Ok(cached.clone()),
            None => Ok(self.base.contract(address)),
        }
    }

    fn read(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let scoped = scoped_key(contract, key);
        match self.items.get(&scoped) {
            Some(cached) => Ok(cached.clone()),
            None => Ok(self.base.get(&scoped)),
        }
    }

    fn write(&mut self, contract: &Address, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.items
            .insert(scoped_key(contract, key), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, contract: &Address, key: &[u8]) -> Result<(), StorageError> {
        self.items.insert(scoped_key(contract, key), None);
        Ok(())
    }

    fn scan(&self, contract: &Address) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let prefix = contract.as_bytes().to_vec();
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.base.get_prefixed(&prefix).into_iter().collect();

        for (key, value) in self
            .items
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
        {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(k, v)| (k[Address::LEN..].to_vec(), v))
            .collect())
    }

    fn put_contract(
        &mut self,
        address: Address,
        descriptor: ContractDescriptor,
    ) -> Result<(), StorageError> {
        self.contracts.insert(address, Some(descriptor));
        Ok(())
    }

    fn remove_contract(&mut self, address: &Address) -> Result<(), StorageError> {
        self.contracts.insert(*address, None);
        Ok(())
    }
}
