use crate::{Address, Hash};

/// Read-only view of the block being processed.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockContext {
    pub height: u32,
    pub timestamp: u64,
    pub block_hash: Hash,
}

impl BlockContext {
    pub fn new(height: u32, timestamp: u64, block_hash: Hash) -> Self {
        Self {
            height,
            timestamp,
            block_hash,
        }
    }
}

/// Read-only view of the enclosing transaction.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TxContext {
    pub tx_hash: Hash,
    /// Addresses that co-signed the transaction.
    pub signers: Vec<Address>,
}

impl TxContext {
    pub fn new(tx_hash: Hash, signers: Vec<Address>) -> Self {
        Self { tx_hash, signers }
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }
}
