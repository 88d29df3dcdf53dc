//! PolyVM execution host.
//!
//! This crate provides:
//! - Parameter codec and invocation wire formats
//! - Gas metering with a static per-operation schedule
//! - Call context stack and cross-VM dispatch
//! - Host function surface for linear-memory engines
//! - Native contract registry
//! - Invocation sessions

pub mod codec;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod env;
pub mod error;
pub mod gas_metering;
pub mod host;
pub mod imports;
pub mod invoke;
pub mod memory;
pub mod native;
pub mod runtime;
pub mod session;
pub mod telemetry;

pub use codec::{decode, encode, Parameter};
pub use config::{ExecConfig, LimitsConfig, LoggingConfig};
pub use context::{CallContext, ContextStack};
pub use dispatcher::CallResult;
pub use engine::{EngineHandle, Engines, LinearMemoryEngine, StackHost, StackMachineEngine};
pub use env::ExecutionEnv;
pub use error::VmError;
pub use gas_metering::{GasMeter, GasSchedule};
pub use host::HostCall;
pub use imports::{HostFlow, HostFunc, ImportHandler, ValType, Value, IMPORTS};
pub use invoke::{CallRequest, ContractInvokeParam};
pub use memory::{GuestMemory, LinearMemory};
pub use native::{NativeContext, NativeContract, NativeRegistry};
pub use runtime::{Notification, Runtime};
pub use session::{Execution, InvocationSession, SessionReport, SessionState};

/// Execution host version
pub const EXEC_VERSION: u32 = 1;
