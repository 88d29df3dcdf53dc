use crate::config::ExecConfig;
use crate::engine::Engines;
use crate::native::NativeRegistry;

/// Everything a session needs besides its store and request: configuration,
/// native contracts and engines. Built once, shared read-only by every
/// session.
#[derive(Debug, Clone, Default)]
pub struct ExecutionEnv {
    pub config: ExecConfig,
    pub natives: NativeRegistry,
    pub engines: Engines,
}

impl ExecutionEnv {
    pub fn new(config: ExecConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_natives(mut self, natives: NativeRegistry) -> Self {
        self.natives = natives;
        self
    }

    pub fn with_engines(mut self, engines: Engines) -> Self {
        self.engines = engines;
        self
    }
}
