//! Invocation wire formats.
//!
//! Variable-length fields use a compact var-uint prefix: values below `0xfd`
//! take one byte, larger ones a marker byte (`0xfd`, `0xfe`, `0xff`) followed
//! by a little-endian u16, u32 or u64.

use bytes::BufMut;
use polyvm_types::Address;

use crate::codec::Reader;
use crate::error::VmError;

/// Longest method name accepted on the wire.
pub const MAX_METHOD_LENGTH: usize = 1024;

pub fn write_var_uint(buf: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        buf.put_u8(value as u8);
    } else if value <= u64::from(u16::MAX) {
        buf.put_u8(0xfd);
        buf.put_u16_le(value as u16);
    } else if value <= u64::from(u32::MAX) {
        buf.put_u8(0xfe);
        buf.put_u32_le(value as u32);
    } else {
        buf.put_u8(0xff);
        buf.put_u64_le(value);
    }
}

pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_var_uint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

impl<'a> Reader<'a> {
    pub(crate) fn var_uint(&mut self) -> Result<u64, VmError> {
        match self.u8("var-uint")? {
            0xfd => Ok(u64::from(self.u16_le("var-uint")?)),
            0xfe => Ok(u64::from(self.u32_le("var-uint")?)),
            0xff => self.u64_le("var-uint"),
            small => Ok(u64::from(small)),
        }
    }

    pub(crate) fn var_bytes(&mut self, what: &str) -> Result<&'a [u8], VmError> {
        let len = self.var_uint()?;
        if len > self.remaining() as u64 {
            return Err(VmError::malformed(format!(
                "truncated {what}: need {len} bytes, {} remain",
                self.remaining()
            )));
        }
        self.take(len as usize, what)
    }

    pub(crate) fn method(&mut self) -> Result<String, VmError> {
        let bytes = self.var_bytes("method")?;
        if bytes.len() > MAX_METHOD_LENGTH {
            return Err(VmError::malformed(format!(
                "method name of {} bytes exceeds limit of {MAX_METHOD_LENGTH}",
                bytes.len()
            )));
        }
        String::from_utf8(bytes.to_vec())
            .map_err(|_| VmError::malformed("method name is not valid UTF-8"))
    }

    fn finish(&self, what: &str) -> Result<(), VmError> {
        if !self.is_empty() {
            return Err(VmError::malformed(format!(
                "{} trailing bytes after {what}",
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// What a caller asks of a contract: a method, its argument bytes and the
/// protocol version the caller speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub version: u8,
    pub method: String,
    pub args: Vec<u8>,
}

impl CallRequest {
    pub fn new(method: impl Into<String>, args: Vec<u8>) -> Self {
        Self {
            version: 0,
            method: method.into(),
            args,
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Parse the payload a linear-memory contract hands to `call_contract`:
    /// `version: u32 LE || var_bytes(method) || var_bytes(args)`.
    pub fn from_call_payload(payload: &[u8]) -> Result<Self, VmError> {
        let mut reader = Reader::new(payload);
        let version = reader.u32_le("call version")?;
        let version = u8::try_from(version)
            .map_err(|_| VmError::malformed(format!("call version {version} out of range")))?;
        let method = reader.method()?;
        let args = reader.var_bytes("call arguments")?.to_vec();
        reader.finish("call payload")?;
        Ok(Self { version, method, args })
    }

    pub fn to_call_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.method.len() + self.args.len());
        buf.put_u32_le(u32::from(self.version));
        write_var_bytes(&mut buf, self.method.as_bytes());
        write_var_bytes(&mut buf, &self.args);
        buf
    }

    /// Input buffer a linear-memory contract reads through `get_input`:
    /// `var_bytes(method) || args`.
    pub fn linear_memory_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + self.method.len() + self.args.len());
        write_var_bytes(&mut buf, self.method.as_bytes());
        buf.put_slice(&self.args);
        buf
    }
}

/// Serialized top-level invocation:
/// `version: u8 || address: 20 bytes || var_bytes(method) || var_bytes(args)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInvokeParam {
    pub version: u8,
    pub address: Address,
    pub method: String,
    pub args: Vec<u8>,
}

impl ContractInvokeParam {
    pub fn new(address: Address, method: impl Into<String>, args: Vec<u8>) -> Self {
        Self {
            version: 0,
            address,
            method: method.into(),
            args,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VmError> {
        let mut reader = Reader::new(bytes);
        let version = reader.u8("invoke version")?;
        let address = reader.address()?;
        let method = reader.method()?;
        let args = reader.var_bytes("invoke arguments")?.to_vec();
        reader.finish("invoke record")?;
        Ok(Self {
            version,
            address,
            method,
            args,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.method.len() + self.args.len());
        buf.put_u8(self.version);
        buf.put_slice(self.address.as_bytes());
        write_var_bytes(&mut buf, self.method.as_bytes());
        write_var_bytes(&mut buf, &self.args);
        buf
    }

    pub fn request(&self) -> CallRequest {
        CallRequest {
            version: self.version,
            method: self.method.clone(),
            args: self.args.clone(),
        }
    }
}
