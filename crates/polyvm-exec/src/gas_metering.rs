use serde::{Deserialize, Serialize};

use crate::error::VmError;
use crate::imports::HostFunc;

/// Static gas cost of every host operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    // Block and call identity
    pub timestamp: u64,
    pub block_height: u64,
    pub self_address: u64,
    pub caller_address: u64,
    pub entry_address: u64,
    pub current_block_hash: u64,
    pub current_tx_hash: u64,
    pub check_witness: u64,

    // Buffers
    pub input_length: u64,
    pub get_input: u64,
    pub call_output_length: u64,
    pub get_call_output: u64,
    pub ret: u64,

    // Events
    pub notify: u64,

    // Storage
    pub storage_read: u64,
    pub storage_write: u64,
    pub storage_delete: u64,

    // Calls
    pub call_contract: u64,
    pub native_invoke: u64,

    // Contract lifecycle
    pub contract_create: u64,
    pub contract_migrate: u64,
    pub contract_delete: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            timestamp: 1,
            block_height: 1,
            self_address: 1,
            caller_address: 1,
            entry_address: 1,
            current_block_hash: 100,
            current_tx_hash: 100,
            check_witness: 200,

            input_length: 1,
            get_input: 1,
            call_output_length: 1,
            get_call_output: 1,
            ret: 1,

            notify: 100,

            storage_read: 200,
            storage_write: 4_000,
            storage_delete: 100,

            call_contract: 10,
            native_invoke: 1_000,

            contract_create: 20_000_000,
            contract_migrate: 20_000_000,
            contract_delete: 1,
        }
    }
}

impl GasSchedule {
    /// Cost of one call to `func`.
    pub fn cost(&self, func: HostFunc) -> u64 {
        match func {
            HostFunc::Timestamp => self.timestamp,
            HostFunc::BlockHeight => self.block_height,
            HostFunc::InputLength => self.input_length,
            HostFunc::CallOutputLength => self.call_output_length,
            HostFunc::SelfAddress => self.self_address,
            HostFunc::CallerAddress => self.caller_address,
            HostFunc::EntryAddress => self.entry_address,
            HostFunc::GetInput => self.get_input,
            HostFunc::GetCallOutput => self.get_call_output,
            HostFunc::CheckWitness => self.check_witness,
            HostFunc::CurrentBlockHash => self.current_block_hash,
            HostFunc::CurrentTxHash => self.current_tx_hash,
            HostFunc::Ret => self.ret,
            HostFunc::Notify => self.notify,
            HostFunc::CallContract => self.call_contract,
            HostFunc::StorageRead => self.storage_read,
            HostFunc::StorageWrite => self.storage_write,
            HostFunc::StorageDelete => self.storage_delete,
            HostFunc::ContractCreate => self.contract_create,
            HostFunc::ContractMigrate => self.contract_migrate,
            HostFunc::ContractDelete => self.contract_delete,
        }
    }
}

/// Gas accounting for one top-level invocation, shared by every nested call.
#[derive(Debug, Clone)]
pub struct GasMeter {
    /// Gas limit for this invocation
    limit: u64,
    /// Gas still available
    remaining: u64,
    /// Price per unit, carried for fee reporting
    price: u64,
    /// Gas schedule
    schedule: GasSchedule,
}

impl GasMeter {
    /// Create a new gas meter.
    pub fn new(limit: u64, price: u64, schedule: GasSchedule) -> Self {
        Self {
            limit,
            remaining: limit,
            price,
            schedule,
        }
    }

    /// Create with default schedule and zero price.
    pub fn with_default_schedule(limit: u64) -> Self {
        Self::new(limit, 0, GasSchedule::default())
    }

    /// Get gas limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Get remaining gas.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Get gas used.
    pub fn used(&self) -> u64 {
        self.limit - self.remaining
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    /// Fee owed for the gas used so far.
    pub fn fee(&self) -> u64 {
        self.used().saturating_mul(self.price)
    }

    /// Charge gas. On failure nothing is deducted.
    pub fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        if amount > self.remaining {
            return Err(VmError::InsufficientGas {
                required: amount,
                remaining: self.remaining,
            });
        }
        self.remaining -= amount;
        Ok(())
    }

    /// Charge the scheduled cost of a host operation.
    pub fn charge_host(&mut self, func: HostFunc) -> Result<(), VmError> {
        self.charge(self.schedule.cost(func))
    }

    /// Charge the fixed cost of entering a native contract.
    pub fn charge_native_invoke(&mut self) -> Result<(), VmError> {
        self.charge(self.schedule.native_invoke)
    }

    /// Get gas schedule.
    pub fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }
}
