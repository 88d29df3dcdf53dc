use crate::address::Address;

/// `storage_flag` value marking code for the linear-memory VM.
/// Any other value is stack-machine code.
pub const LINEAR_MEMORY_STORAGE_FLAG: u8 = 3;

/// Default `storage_flag` for stack-machine deployments.
pub const STACK_MACHINE_STORAGE_FLAG: u8 = 1;

/// Which engine services a contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VmKind {
    /// In-process handler set, no bytecode sandbox.
    Native,
    /// Evaluation-stack bytecode interpreter.
    StackMachine,
    /// Bytecode interpreter with one flat addressable memory region.
    LinearMemory,
}

impl VmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmKind::Native => "native",
            VmKind::StackMachine => "stack_machine",
            VmKind::LinearMemory => "linear_memory",
        }
    }
}

impl std::fmt::Display for VmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive fields recorded alongside deployed code.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContractMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub email: String,
    pub description: String,
}

/// A deployed contract as held by the contract registry.
///
/// Read-only to the execution host: it is looked up by address, never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContractDescriptor {
    pub code: Vec<u8>,
    pub storage_flag: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: ContractMetadata,
}

impl ContractDescriptor {
    pub fn new(code: Vec<u8>, storage_flag: u8) -> Self {
        Self {
            code,
            storage_flag,
            metadata: ContractMetadata::default(),
        }
    }

    pub fn stack_machine(code: Vec<u8>) -> Self {
        Self::new(code, STACK_MACHINE_STORAGE_FLAG)
    }

    pub fn linear_memory(code: Vec<u8>) -> Self {
        Self::new(code, LINEAR_MEMORY_STORAGE_FLAG)
    }

    pub fn with_metadata(mut self, metadata: ContractMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Engine kind selected by the storage flag.
    pub fn vm_kind(&self) -> VmKind {
        if self.storage_flag == LINEAR_MEMORY_STORAGE_FLAG {
            VmKind::LinearMemory
        } else {
            VmKind::StackMachine
        }
    }

    /// Address this descriptor deploys to.
    pub fn address(&self) -> Address {
        Address::from_code(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_flag_selects_vm_kind() {
        assert_eq!(
            ContractDescriptor::linear_memory(vec![0x00, 0x61]).vm_kind(),
            VmKind::LinearMemory
        );
        assert_eq!(
            ContractDescriptor::stack_machine(vec![0x51]).vm_kind(),
            VmKind::StackMachine
        );
        assert_eq!(ContractDescriptor::new(vec![1], 0).vm_kind(), VmKind::StackMachine);
    }

    #[test]
    fn test_descriptor_address_follows_code() {
        let d = ContractDescriptor::linear_memory(b"wasm".to_vec());
        assert_eq!(d.address(), Address::from_code(b"wasm"));
    }
}
