//! Run-mode configuration.
//!
//! Destructive and expensive tests are opt-in. The opt-ins come from the
//! `skipmark` CLI flags or, for plain `cargo test` runs, from environment
//! variables (a `.env` file in the working directory is honoured).
use std::env;

/// Enables tests marked `destructive_test`.
pub const RUN_DESTRUCTIVE_ENV: &str = "SKIP_MARKERS_RUN_DESTRUCTIVE";
/// Enables tests marked `expensive_test`.
pub const RUN_EXPENSIVE_ENV: &str = "SKIP_MARKERS_RUN_EXPENSIVE";

/// Which opt-in gate a marker consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Destructive,
    Expensive,
}

/// Session-wide run options. Immutable once the session context is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub run_destructive: bool,
    pub run_expensive: bool,
}

impl RunOptions {
    /// Loads `.env` (if any) and reads the opt-in variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            run_destructive: env_flag(RUN_DESTRUCTIVE_ENV),
            run_expensive: env_flag(RUN_EXPENSIVE_ENV),
        }
    }

    pub fn with_destructive(mut self, enabled: bool) -> Self {
        self.run_destructive = enabled;
        self
    }

    pub fn with_expensive(mut self, enabled: bool) -> Self {
        self.run_expensive = enabled;
        self
    }

    pub fn allows(&self, mode: RunMode) -> bool {
        match mode {
            RunMode::Destructive => self.run_destructive,
            RunMode::Expensive => self.run_expensive,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|v| is_truthy(&v)).unwrap_or(false)
}

pub(crate) fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
