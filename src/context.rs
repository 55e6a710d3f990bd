use std::fmt;
use std::sync::Arc;

use crate::config::RunOptions;
use crate::host::{Host, SystemHost};
use crate::platform::{self, Platform};

/// Read-only snapshot consulted by marker predicates.
/// Built once per test session; host lookups stay live.
#[derive(Clone)]
pub struct EvaluationContext {
    host: Arc<dyn Host>,
    options: RunOptions,
}

impl EvaluationContext {
    pub fn new<H: Host + 'static>(host: H, options: RunOptions) -> Self {
        Self::shared(Arc::new(host), options)
    }

    /// Keeps a handle on the host, e.g. a [`FakeHost`](crate::testing::FakeHost)
    /// the test mutates later.
    pub fn shared(host: Arc<dyn Host>, options: RunOptions) -> Self {
        Self { host, options }
    }

    pub fn system(options: RunOptions) -> Self {
        Self::new(SystemHost, options)
    }

    /// The real machine with run options taken from the environment.
    pub fn from_env() -> Self {
        Self::system(RunOptions::from_env())
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Recomputed on every call.
    pub fn platform(&self) -> Option<Platform> {
        platform::current_platform(self.host())
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::system(RunOptions::default())
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("os", &self.host.os())
            .field("options", &self.options)
            .finish()
    }
}
