//! Parameter codec.
//!
//! A parameter buffer is one version byte followed by a flat sequence of
//! tagged values. Lists nest; the top level does not wrap its values in one.
//!
//! ```text
//! 0x00 | tag value | tag value | ...
//! ```

use bytes::{Buf, BufMut};
use polyvm_types::{Address, U256};

use crate::error::VmError;

/// Only supported parameter format version.
pub const PARAM_VERSION: u8 = 0;
/// Largest parameter buffer accepted by [`decode`].
pub const MAX_PARAM_LENGTH: usize = 1024;
/// Deepest list nesting the decoder accepts. Unreachable within
/// [`MAX_PARAM_LENGTH`] bytes; bounds decoding under larger limits.
pub const MAX_LIST_DEPTH: usize = 256;

pub const BYTE_ARRAY_TAG: u8 = 0x00;
pub const ADDRESS_TAG: u8 = 0x01;
pub const BOOL_TAG: u8 = 0x02;
pub const U32_TAG: u8 = 0x03;
pub const I64_TAG: u8 = 0x04;
pub const U64_TAG: u8 = 0x05;
pub const U256_TAG: u8 = 0x06;
pub const LIST_TAG: u8 = 0x07;

/// A typed value carried between contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    ByteArray(Vec<u8>),
    Address(Address),
    Bool(bool),
    U32(u32),
    I64(i64),
    U64(u64),
    U256(U256),
    List(Vec<Parameter>),
}

impl Parameter {
    pub fn tag(&self) -> u8 {
        match self {
            Parameter::ByteArray(_) => BYTE_ARRAY_TAG,
            Parameter::Address(_) => ADDRESS_TAG,
            Parameter::Bool(_) => BOOL_TAG,
            Parameter::U32(_) => U32_TAG,
            Parameter::I64(_) => I64_TAG,
            Parameter::U64(_) => U64_TAG,
            Parameter::U256(_) => U256_TAG,
            Parameter::List(_) => LIST_TAG,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Parameter::ByteArray(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Parameter::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Parameter::U64(v) => Some(*v),
            Parameter::U32(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Parameter]> {
        match self {
            Parameter::List(items) => Some(items),
            _ => None,
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u8(self.tag());
        match self {
            Parameter::ByteArray(bytes) => {
                buf.put_u32_le(bytes.len() as u32);
                buf.put_slice(bytes);
            }
            Parameter::Address(address) => buf.put_slice(address.as_bytes()),
            Parameter::Bool(b) => buf.put_u8(u8::from(*b)),
            Parameter::U32(v) => buf.put_u32_le(*v),
            Parameter::I64(v) => buf.put_i64_le(*v),
            Parameter::U64(v) => buf.put_u64_le(*v),
            Parameter::U256(v) => buf.put_slice(v.as_ref()),
            Parameter::List(items) => {
                buf.put_u32_le(items.len() as u32);
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }
}

impl From<Vec<u8>> for Parameter {
    fn from(bytes: Vec<u8>) -> Self {
        Parameter::ByteArray(bytes)
    }
}

impl From<&[u8]> for Parameter {
    fn from(bytes: &[u8]) -> Self {
        Parameter::ByteArray(bytes.to_vec())
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Parameter::ByteArray(s.as_bytes().to_vec())
    }
}

impl From<Address> for Parameter {
    fn from(address: Address) -> Self {
        Parameter::Address(address)
    }
}

impl From<bool> for Parameter {
    fn from(b: bool) -> Self {
        Parameter::Bool(b)
    }
}

impl From<u32> for Parameter {
    fn from(v: u32) -> Self {
        Parameter::U32(v)
    }
}

impl From<i64> for Parameter {
    fn from(v: i64) -> Self {
        Parameter::I64(v)
    }
}

impl From<u64> for Parameter {
    fn from(v: u64) -> Self {
        Parameter::U64(v)
    }
}

impl From<U256> for Parameter {
    fn from(v: U256) -> Self {
        Parameter::U256(v)
    }
}

impl From<Vec<Parameter>> for Parameter {
    fn from(items: Vec<Parameter>) -> Self {
        Parameter::List(items)
    }
}

/// Encode `values` as a versioned top-level sequence.
pub fn encode(values: &[Parameter]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + values.len() * 9);
    buf.put_u8(PARAM_VERSION);
    for value in values {
        value.encode_into(&mut buf);
    }
    buf
}

/// Decode a parameter buffer of at most [`MAX_PARAM_LENGTH`] bytes.
pub fn decode(input: &[u8]) -> Result<Vec<Parameter>, VmError> {
    decode_with_limit(input, MAX_PARAM_LENGTH)
}

/// Decode a parameter buffer of at most `max_len` bytes.
pub fn decode_with_limit(input: &[u8], max_len: usize) -> Result<Vec<Parameter>, VmError> {
    if input.is_empty() {
        return Err(VmError::malformed("empty parameter buffer"));
    }
    if input.len() > max_len {
        return Err(VmError::malformed(format!(
            "parameter buffer of {} bytes exceeds limit of {max_len}",
            input.len()
        )));
    }

    let mut reader = Reader::new(input);
    let version = reader.u8("version")?;
    if version != PARAM_VERSION {
        return Err(VmError::malformed(format!(
            "unsupported parameter version {version}"
        )));
    }

    let mut values = Vec::new();
    while !reader.is_empty() {
        values.push(reader.parameter(0)?);
    }
    Ok(values)
}

/// Left-to-right reader over a borrowed buffer. Every read is bounds-checked.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, n: usize, what: &str) -> Result<(), VmError> {
        if self.buf.len() < n {
            return Err(VmError::malformed(format!(
                "truncated {what}: need {n} bytes, {} remain",
                self.buf.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], VmError> {
        self.ensure(n, what)?;
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    pub(crate) fn u8(&mut self, what: &str) -> Result<u8, VmError> {
        self.ensure(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn u16_le(&mut self, what: &str) -> Result<u16, VmError> {
        self.ensure(2, what)?;
        Ok(self.buf.get_u16_le())
    }

    pub(crate) fn u32_le(&mut self, what: &str) -> Result<u32, VmError> {
        self.ensure(4, what)?;
        Ok(self.buf.get_u32_le())
    }

    pub(crate) fn u64_le(&mut self, what: &str) -> Result<u64, VmError> {
        self.ensure(8, what)?;
        Ok(self.buf.get_u64_le())
    }

    pub(crate) fn address(&mut self) -> Result<Address, VmError> {
        let bytes = self.take(Address::LEN, "address")?;
        Address::from_slice(bytes).map_err(|e| VmError::malformed(e.to_string()))
    }

    fn parameter(&mut self, depth: usize) -> Result<Parameter, VmError> {
        let tag = self.u8("type tag")?;
        let value = match tag {
            BYTE_ARRAY_TAG => {
                let len = self.u32_le("byte array length")? as usize;
                Parameter::ByteArray(self.take(len, "byte array")?.to_vec())
            }
            ADDRESS_TAG => Parameter::Address(self.address()?),
            BOOL_TAG => Parameter::Bool(self.u8("boolean")? == 1),
            U32_TAG => Parameter::U32(self.u32_le("u32")?),
            I64_TAG => {
                self.ensure(8, "i64")?;
                Parameter::I64(self.buf.get_i64_le())
            }
            U64_TAG => Parameter::U64(self.u64_le("u64")?),
            U256_TAG => {
                let bytes = self.take(U256::LEN, "u256")?;
                Parameter::U256(U256::from_slice(bytes).map_err(|e| VmError::malformed(e.to_string()))?)
            }
            LIST_TAG => {
                if depth >= MAX_LIST_DEPTH {
                    return Err(VmError::malformed(format!(
                        "lists nested deeper than {MAX_LIST_DEPTH}"
                    )));
                }
                let count = self.u32_le("list count")? as usize;
                // Every element occupies at least its tag byte.
                if count > self.remaining() {
                    return Err(VmError::malformed(format!(
                        "truncated list: {count} elements claimed, {} bytes remain",
                        self.remaining()
                    )));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.parameter(depth + 1)?);
                }
                Parameter::List(items)
            }
            other => {
                return Err(VmError::malformed(format!("unknown type tag 0x{other:02x}")));
            }
        };
        Ok(value)
    }
}
