//! Invocation sessions.
//!
//! A session drives exactly one top-level invocation: `Ready` on
//! construction, `Running` while the dispatcher executes inside
//! [`InvocationSession::execute`], then `Completed` or `Faulted`. A record
//! that fails to decode goes straight from `Ready` to `Faulted`. Executing
//! consumes the session. On a fault the output and
//! notifications collected so far are dropped; gas already consumed stays
//! consumed.

use polyvm_storage::ContractStore;
use polyvm_types::{BlockContext, TxContext};
use tracing::{debug, info, trace, warn};

use crate::env::ExecutionEnv;
use crate::error::VmError;
use crate::gas_metering::GasMeter;
use crate::invoke::ContractInvokeParam;
use crate::runtime::{Notification, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Running,
    Completed,
    Faulted,
}

impl SessionState {
    /// Whether a session may move from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::{Completed, Faulted, Ready, Running};
        matches!(
            (self, next),
            (Ready, Running) | (Ready, Faulted) | (Running, Completed) | (Running, Faulted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Faulted)
    }
}

/// Output of a completed invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub output: Vec<u8>,
    pub notifications: Vec<Notification>,
}

/// Everything a finished session hands back, including the store so the
/// caller can commit or discard its writes.
#[derive(Debug)]
pub struct SessionReport<S> {
    pub state: SessionState,
    pub outcome: Result<Execution, VmError>,
    pub gas_used: u64,
    pub gas_remaining: u64,
    /// Gas used times gas price
    pub fee: u64,
    /// Call frames still on the stack when execution ended
    pub context_depth: usize,
    pub store: S,
}

impl<S> SessionReport<S> {
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }

    pub fn output(&self) -> Option<&[u8]> {
        self.outcome.as_ref().ok().map(|execution| execution.output.as_slice())
    }

    pub fn notifications(&self) -> &[Notification] {
        self.outcome
            .as_ref()
            .map(|execution| execution.notifications.as_slice())
            .unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&VmError> {
        self.outcome.as_ref().err()
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

pub struct InvocationSession<'e, S> {
    env: &'e ExecutionEnv,
    store: S,
    block: BlockContext,
    tx: TxContext,
    gas_limit: u64,
    gas_price: u64,
    state: SessionState,
}

impl<'e, S: ContractStore> InvocationSession<'e, S> {
    /// Bind a store, block and transaction context and a gas budget.
    pub fn new(
        env: &'e ExecutionEnv,
        store: S,
        block: BlockContext,
        tx: TxContext,
        gas_limit: u64,
    ) -> Result<Self, VmError> {
        let max = env.config.limits.max_gas_limit;
        if gas_limit > max {
            return Err(VmError::InvalidGasLimit { limit: gas_limit, max });
        }
        Ok(Self {
            env,
            store,
            block,
            tx,
            gas_limit,
            gas_price: 0,
            state: SessionState::Ready,
        })
    }

    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Decode a serialized invoke record and execute it. A malformed record
    /// faults the session without running anything.
    pub fn execute_raw(mut self, raw: &[u8]) -> SessionReport<S> {
        match ContractInvokeParam::from_bytes(raw) {
            Ok(param) => self.execute(&param),
            Err(err) => {
                warn!(%err, "malformed invoke record");
                self.transition(SessionState::Faulted);
                SessionReport {
                    state: self.state,
                    outcome: Err(err),
                    gas_used: 0,
                    gas_remaining: self.gas_limit,
                    fee: 0,
                    context_depth: 0,
                    store: self.store,
                }
            }
        }
    }

    pub fn execute(mut self, param: &ContractInvokeParam) -> SessionReport<S> {
        self.transition(SessionState::Running);
        debug!(
            contract = %param.address,
            method = %param.method,
            gas_limit = self.gas_limit,
            "invocation running"
        );

        let env = self.env;
        let gas = GasMeter::new(self.gas_limit, self.gas_price, env.config.gas);
        let mut runtime = Runtime::new(env, &mut self.store, &self.block, &self.tx, gas);
        let result = runtime.dispatch(&param.address, &param.request());

        let gas_used = runtime.gas().used();
        let gas_remaining = runtime.gas().remaining();
        let fee = runtime.gas().fee();
        let context_depth = runtime.contexts().depth();
        let notifications = runtime.take_notifications();
        drop(runtime);

        let (next, outcome) = match result {
            Ok(output) => {
                info!(
                    contract = %param.address,
                    method = %param.method,
                    gas_used,
                    output_len = output.len(),
                    notifications = notifications.len(),
                    "invocation completed"
                );
                (
                    SessionState::Completed,
                    Ok(Execution {
                        output,
                        notifications,
                    }),
                )
            }
            Err(err) => {
                warn!(
                    contract = %param.address,
                    method = %param.method,
                    gas_used,
                    %err,
                    "invocation faulted"
                );
                (SessionState::Faulted, Err(err))
            }
        };

        self.transition(next);

        SessionReport {
            state: self.state,
            outcome,
            gas_used,
            gas_remaining,
            fee,
            context_depth,
            store: self.store,
        }
    }
}
