//! Per-invocation execution state.
//!
//! A [`Runtime`] lives for exactly one top-level invocation. It owns the gas
//! meter, the call context stack and the notification log, and borrows the
//! store and block/transaction context from the session driving it.

use polyvm_storage::ContractStore;
use polyvm_types::{Address, BlockContext, ContractDescriptor, Hash, TxContext};
use tracing::debug;

use crate::config::LimitsConfig;
use crate::context::ContextStack;
use crate::engine::StackHost;
use crate::env::ExecutionEnv;
use crate::error::VmError;
use crate::gas_metering::GasMeter;
use crate::imports::HostFunc;
use crate::invoke::CallRequest;

/// An event emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Contract that emitted the event
    pub contract: Address,
    pub payload: Vec<u8>,
}

pub struct Runtime<'a> {
    pub(crate) env: &'a ExecutionEnv,
    store: &'a mut dyn ContractStore,
    block: &'a BlockContext,
    tx: &'a TxContext,
    gas: GasMeter,
    pub(crate) contexts: ContextStack,
    notifications: Vec<Notification>,
}

impl<'a> Runtime<'a> {
    pub fn new(
        env: &'a ExecutionEnv,
        store: &'a mut dyn ContractStore,
        block: &'a BlockContext,
        tx: &'a TxContext,
        gas: GasMeter,
    ) -> Self {
        Self {
            env,
            store,
            block,
            tx,
            gas,
            contexts: ContextStack::new(),
            notifications: Vec::new(),
        }
    }

    pub fn gas(&self) -> &GasMeter {
        &self.gas
    }

    pub(crate) fn gas_mut(&mut self) -> &mut GasMeter {
        &mut self.gas
    }

    pub fn contexts(&self) -> &ContextStack {
        &self.contexts
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn block(&self) -> &BlockContext {
        self.block
    }

    pub fn tx(&self) -> &TxContext {
        self.tx
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.env.config.limits
    }

    /// Charge the scheduled cost of `func`.
    pub(crate) fn charge(&mut self, func: HostFunc) -> Result<(), VmError> {
        self.gas.charge_host(func).map_err(|err| {
            debug!(func = func.name(), %err, "host call out of gas");
            err
        })
    }

    /// Address of the executing contract.
    pub(crate) fn current_address(&self) -> Result<Address, VmError> {
        self.contexts
            .current()
            .map(|frame| frame.contract_address)
            .ok_or_else(|| VmError::EngineFault("host call outside of a contract call".into()))
    }

    /// Address of the contract that called the executing one, or the zero
    /// address for the outermost call.
    pub(crate) fn caller_or_zero(&self) -> Address {
        self.contexts
            .calling()
            .map(|frame| frame.contract_address)
            .unwrap_or(Address::ZERO)
    }

    pub(crate) fn entry_or_zero(&self) -> Address {
        self.contexts
            .entry()
            .map(|frame| frame.contract_address)
            .unwrap_or(Address::ZERO)
    }

    /// An address witnesses the call if it signed the transaction or is the
    /// contract that made the call.
    pub(crate) fn witnessed(&self, address: &Address) -> bool {
        self.tx.is_signer(address)
            || self
                .contexts
                .calling()
                .is_some_and(|frame| frame.contract_address == *address)
    }

    pub(crate) fn push_notification(&mut self, contract: Address, payload: Vec<u8>) {
        self.notifications.push(Notification { contract, payload });
    }

    pub(crate) fn read_storage(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, VmError> {
        Ok(self.store.read(contract, key)?)
    }

    pub(crate) fn write_storage(&mut self, contract: &Address, key: &[u8], value: &[u8]) -> Result<(), VmError> {
        Ok(self.store.write(contract, key, value)?)
    }

    pub(crate) fn delete_storage(&mut self, contract: &Address, key: &[u8]) -> Result<(), VmError> {
        Ok(self.store.delete(contract, key)?)
    }

    pub(crate) fn lookup_contract(&self, address: &Address) -> Result<Option<ContractDescriptor>, VmError> {
        Ok(self.store.lookup(address)?)
    }

    fn check_code_size(&self, code: &[u8]) -> Result<(), VmError> {
        let limit = self.limits().max_code_size;
        if code.len() > limit {
            return Err(VmError::CodeSizeExceeded {
                size: code.len(),
                limit,
            });
        }
        Ok(())
    }

    pub(crate) fn create_contract(&mut self, descriptor: ContractDescriptor) -> Result<Address, VmError> {
        self.check_code_size(&descriptor.code)?;
        let address = self.store.create(descriptor)?;
        debug!(contract = %address, "contract created");
        Ok(address)
    }

    /// Replace the executing contract, carrying its storage to the new address.
    pub(crate) fn migrate_contract(&mut self, descriptor: ContractDescriptor) -> Result<Address, VmError> {
        self.check_code_size(&descriptor.code)?;
        let from = self.current_address()?;
        let address = self.store.migrate(&from, descriptor)?;
        debug!(from = %from, to = %address, "contract migrated");
        Ok(address)
    }

    pub(crate) fn delete_current_contract(&mut self) -> Result<(), VmError> {
        let address = self.current_address()?;
        self.store.delete_contract(&address)?;
        debug!(contract = %address, "contract deleted");
        Ok(())
    }
}

impl StackHost for Runtime<'_> {
    fn timestamp(&mut self) -> Result<u64, VmError> {
        self.charge(HostFunc::Timestamp)?;
        Ok(self.block.timestamp)
    }

    fn block_height(&mut self) -> Result<u32, VmError> {
        self.charge(HostFunc::BlockHeight)?;
        Ok(self.block.height)
    }

    fn current_block_hash(&mut self) -> Result<Hash, VmError> {
        self.charge(HostFunc::CurrentBlockHash)?;
        Ok(self.block.block_hash)
    }

    fn current_tx_hash(&mut self) -> Result<Hash, VmError> {
        self.charge(HostFunc::CurrentTxHash)?;
        Ok(self.tx.tx_hash)
    }

    fn self_address(&mut self) -> Result<Address, VmError> {
        self.charge(HostFunc::SelfAddress)?;
        self.current_address()
    }

    fn caller_address(&mut self) -> Result<Address, VmError> {
        self.charge(HostFunc::CallerAddress)?;
        Ok(self.caller_or_zero())
    }

    fn entry_address(&mut self) -> Result<Address, VmError> {
        self.charge(HostFunc::EntryAddress)?;
        Ok(self.entry_or_zero())
    }

    fn check_witness(&mut self, address: &Address) -> Result<bool, VmError> {
        self.charge(HostFunc::CheckWitness)?;
        Ok(self.witnessed(address))
    }

    fn notify(&mut self, payload: Vec<u8>) -> Result<(), VmError> {
        self.charge(HostFunc::Notify)?;
        let contract = self.current_address()?;
        self.push_notification(contract, payload);
        Ok(())
    }

    fn storage_read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, VmError> {
        self.charge(HostFunc::StorageRead)?;
        let contract = self.current_address()?;
        self.read_storage(&contract, key)
    }

    fn storage_write(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError> {
        self.charge(HostFunc::StorageWrite)?;
        let contract = self.current_address()?;
        self.write_storage(&contract, key, value)
    }

    fn storage_delete(&mut self, key: &[u8]) -> Result<(), VmError> {
        self.charge(HostFunc::StorageDelete)?;
        let contract = self.current_address()?;
        self.delete_storage(&contract, key)
    }

    fn call_contract(&mut self, target: &Address, method: &str, args: &[u8]) -> Result<Vec<u8>, VmError> {
        self.charge(HostFunc::CallContract)?;
        let request = CallRequest::new(method, args.to_vec());
        self.dispatch(target, &request)
    }
}
