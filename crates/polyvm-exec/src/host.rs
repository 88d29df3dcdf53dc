//! Host function surface for linear-memory contracts.
//!
//! Every import charges its scheduled gas before touching memory or state.
//! Memory faults abort the whole invocation; they are never handed back to
//! the contract as a status code.

use polyvm_types::{ContractDescriptor, ContractMetadata};
use tracing::trace;

use crate::codec::{self, Parameter};
use crate::error::VmError;
use crate::imports::{check_args, HostFlow, HostFunc, ImportHandler, Value, STORAGE_ABSENT};
use crate::invoke::CallRequest;
use crate::memory::GuestMemory;
use crate::runtime::Runtime;

/// Host state for one linear-memory contract call.
///
/// Holds the call's input, the output set by `ret` and the output of the
/// most recent nested call.
pub struct HostCall<'r, 'a> {
    runtime: &'r mut Runtime<'a>,
    input: Vec<u8>,
    output: Option<Vec<u8>>,
    call_output: Vec<u8>,
}

impl<'r, 'a> HostCall<'r, 'a> {
    pub fn new(runtime: &'r mut Runtime<'a>, input: Vec<u8>) -> Self {
        Self {
            runtime,
            input,
            output: None,
            call_output: Vec::new(),
        }
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn call_output(&self) -> &[u8] {
        &self.call_output
    }

    /// Output of the call; empty if the contract never called `ret`.
    pub fn into_output(self) -> Vec<u8> {
        self.output.unwrap_or_default()
    }

    fn contract_descriptor(
        &self,
        memory: &dyn GuestMemory,
        args: &[u32],
    ) -> Result<ContractDescriptor, VmError> {
        let code = memory.read(args[0], args[1])?.to_vec();
        let storage_flag = u8::try_from(args[2])
            .map_err(|_| VmError::malformed(format!("storage flag {} out of range", args[2])))?;
        let metadata = if args[4] == 0 {
            ContractMetadata::default()
        } else {
            decode_metadata(
                memory.read(args[3], args[4])?,
                self.runtime.limits().max_param_length,
            )?
        };
        Ok(ContractDescriptor::new(code, storage_flag).with_metadata(metadata))
    }
}

impl ImportHandler for HostCall<'_, '_> {
    fn call(
        &mut self,
        func: HostFunc,
        memory: &mut dyn GuestMemory,
        args: &[Value],
    ) -> Result<HostFlow, VmError> {
        let args = check_args(func, args)?;
        self.runtime.charge(func)?;
        trace!(func = func.name(), ?args, "host call");

        match func {
            HostFunc::Timestamp => Ok(HostFlow::i64(self.runtime.block().timestamp)),
            HostFunc::BlockHeight => Ok(HostFlow::i32(self.runtime.block().height)),
            HostFunc::InputLength => Ok(HostFlow::i32(self.input.len() as u32)),
            HostFunc::CallOutputLength => Ok(HostFlow::i32(self.call_output.len() as u32)),
            HostFunc::SelfAddress => {
                let address = self.runtime.current_address()?;
                memory.write_address(args[0], &address)?;
                Ok(HostFlow::NONE)
            }
            HostFunc::CallerAddress => {
                memory.write_address(args[0], &self.runtime.caller_or_zero())?;
                Ok(HostFlow::NONE)
            }
            HostFunc::EntryAddress => {
                memory.write_address(args[0], &self.runtime.entry_or_zero())?;
                Ok(HostFlow::NONE)
            }
            HostFunc::GetInput => {
                memory.write(args[0], &self.input)?;
                Ok(HostFlow::NONE)
            }
            HostFunc::GetCallOutput => {
                memory.write(args[0], &self.call_output)?;
                Ok(HostFlow::NONE)
            }
            HostFunc::CheckWitness => {
                let address = memory.read_address(args[0])?;
                Ok(HostFlow::i32(u32::from(self.runtime.witnessed(&address))))
            }
            HostFunc::CurrentBlockHash => {
                let hash = self.runtime.block().block_hash;
                memory.write_hash(args[0], &hash)?;
                Ok(HostFlow::i32(hash.as_bytes().len() as u32))
            }
            HostFunc::CurrentTxHash => {
                let hash = self.runtime.tx().tx_hash;
                memory.write_hash(args[0], &hash)?;
                Ok(HostFlow::i32(hash.as_bytes().len() as u32))
            }
            HostFunc::Ret => {
                self.output = Some(memory.read(args[0], args[1])?.to_vec());
                Ok(HostFlow::Halt)
            }
            HostFunc::Notify => {
                let payload = memory.read(args[0], args[1])?.to_vec();
                let contract = self.runtime.current_address()?;
                self.runtime.push_notification(contract, payload);
                Ok(HostFlow::NONE)
            }
            HostFunc::CallContract => {
                let target = memory.read_address(args[0])?;
                let request = CallRequest::from_call_payload(memory.read(args[1], args[2])?)?;
                self.call_output = self.runtime.dispatch(&target, &request)?;
                Ok(HostFlow::i32(self.call_output.len() as u32))
            }
            HostFunc::StorageRead => {
                let key = memory.read(args[0], args[1])?.to_vec();
                let contract = self.runtime.current_address()?;
                match self.runtime.read_storage(&contract, &key)? {
                    None => Ok(HostFlow::i32(STORAGE_ABSENT)),
                    Some(value) => {
                        let start = (args[4] as usize).min(value.len());
                        let tail = &value[start..];
                        let copied = tail.len().min(args[3] as usize);
                        memory.write(args[2], &tail[..copied])?;
                        Ok(HostFlow::i32(value.len() as u32))
                    }
                }
            }
            HostFunc::StorageWrite => {
                let key = memory.read(args[0], args[1])?.to_vec();
                let value = memory.read(args[2], args[3])?.to_vec();
                let contract = self.runtime.current_address()?;
                self.runtime.write_storage(&contract, &key, &value)?;
                Ok(HostFlow::NONE)
            }
            HostFunc::StorageDelete => {
                let key = memory.read(args[0], args[1])?.to_vec();
                let contract = self.runtime.current_address()?;
                self.runtime.delete_storage(&contract, &key)?;
                Ok(HostFlow::NONE)
            }
            HostFunc::ContractCreate => {
                let descriptor = self.contract_descriptor(memory, &args)?;
                let address = self.runtime.create_contract(descriptor)?;
                memory.write_address(args[5], &address)?;
                Ok(HostFlow::i32(address.as_bytes().len() as u32))
            }
            HostFunc::ContractMigrate => {
                let descriptor = self.contract_descriptor(memory, &args)?;
                let address = self.runtime.migrate_contract(descriptor)?;
                memory.write_address(args[5], &address)?;
                Ok(HostFlow::i32(address.as_bytes().len() as u32))
            }
            HostFunc::ContractDelete => {
                self.runtime.delete_current_contract()?;
                Ok(HostFlow::NONE)
            }
        }
    }
}

/// Encode contract metadata as a parameter list of five byte arrays:
/// name, version, author, email, description.
pub fn encode_metadata(metadata: &ContractMetadata) -> Vec<u8> {
    let fields = [
        &metadata.name,
        &metadata.version,
        &metadata.author,
        &metadata.email,
        &metadata.description,
    ];
    let list = fields
        .iter()
        .map(|field| Parameter::from(field.as_str()))
        .collect::<Vec<_>>();
    codec::encode(&[Parameter::List(list)])
}

pub fn decode_metadata(bytes: &[u8], max_len: usize) -> Result<ContractMetadata, VmError> {
    let values = codec::decode_with_limit(bytes, max_len)?;
    let fields = match values.as_slice() {
        [Parameter::List(items)] if items.len() == 5 => items,
        _ => return Err(VmError::malformed("metadata must be a list of five byte arrays")),
    };
    let strings = fields
        .iter()
        .map(|field| {
            let bytes = field
                .as_bytes()
                .ok_or_else(|| VmError::malformed("metadata field is not a byte array"))?;
            String::from_utf8(bytes.to_vec())
                .map_err(|_| VmError::malformed("metadata field is not valid UTF-8"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let [name, version, author, email, description]: [String; 5] = strings
        .try_into()
        .map_err(|_| VmError::malformed("metadata must have five fields"))?;
    Ok(ContractMetadata {
        name,
        version,
        author,
        email,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_roundtrip() {
        let metadata = ContractMetadata {
            name: "token".into(),
            version: "1.0".into(),
            author: "alice".into(),
            email: "alice@example.com".into(),
            description: "fungible token".into(),
        };
        let encoded = encode_metadata(&metadata);
        assert_eq!(decode_metadata(&encoded, 1024).unwrap(), metadata);
    }

    #[test]
    fn test_metadata_rejects_wrong_shape() {
        let four = codec::encode(&[Parameter::List(vec![Parameter::from("a"); 4])]);
        assert!(decode_metadata(&four, 1024).is_err());

        let flat = codec::encode(&vec![Parameter::from("a"); 5]);
        assert!(decode_metadata(&flat, 1024).is_err());

        let mut fields = vec![Parameter::from("a"); 4];
        fields.push(Parameter::U32(1));
        let typed = codec::encode(&[Parameter::List(fields)]);
        assert!(matches!(
            decode_metadata(&typed, 1024),
            Err(VmError::MalformedEncoding(_))
        ));
    }
}
