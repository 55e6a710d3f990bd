//! In-memory [`Host`] for tests.
//!
//! State lives behind a lock and can be changed through `&self`, so a test
//! can share the host with an [`EvaluationContext`](crate::EvaluationContext)
//! and then flip platform or environment state between evaluations.
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::host::Host;

#[derive(Debug, Clone, Default)]
struct State {
    os: String,
    machine: String,
    kernel_version: Option<String>,
    os_release_name: Option<String>,
    env: HashMap<String, String>,
    privileged: bool,
    binaries: HashSet<String>,
    fips: bool,
    local_network: bool,
    remote_network: bool,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    state: RwLock<State>,
}

impl FakeHost {
    /// An unprivileged x86_64 host with networking and an empty environment.
    pub fn new(os: &str) -> Self {
        Self {
            state: RwLock::new(State {
                os: os.to_string(),
                machine: "x86_64".to_string(),
                local_network: true,
                remote_network: true,
                ..State::default()
            }),
        }
    }

    pub fn linux() -> Self {
        Self::new("linux")
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_machine(self, machine: &str) -> Self {
        self.write().machine = machine.to_string();
        self
    }

    pub fn with_kernel_version(self, version: &str) -> Self {
        self.set_kernel_version(Some(version));
        self
    }

    pub fn with_os_release_name(self, name: &str) -> Self {
        self.write().os_release_name = Some(name.to_string());
        self
    }

    pub fn with_env(self, name: &str, value: &str) -> Self {
        self.set_env(name, value);
        self
    }

    pub fn with_binary(self, name: &str) -> Self {
        self.write().binaries.insert(name.to_string());
        self
    }

    pub fn privileged(self, privileged: bool) -> Self {
        self.write().privileged = privileged;
        self
    }

    pub fn fips(self, enabled: bool) -> Self {
        self.write().fips = enabled;
        self
    }

    pub fn network(self, local: bool, remote: bool) -> Self {
        {
            let mut state = self.write();
            state.local_network = local;
            state.remote_network = remote;
        }
        self
    }

    pub fn set_os(&self, os: &str) {
        self.write().os = os.to_string();
    }

    pub fn set_kernel_version(&self, version: Option<&str>) {
        self.write().kernel_version = version.map(str::to_string);
    }

    pub fn set_env(&self, name: &str, value: &str) {
        self.write().env.insert(name.to_string(), value.to_string());
    }

    pub fn remove_env(&self, name: &str) {
        self.write().env.remove(name);
    }
}

impl Host for FakeHost {
    fn os(&self) -> String {
        self.read().os.clone()
    }

    fn machine(&self) -> String {
        self.read().machine.clone()
    }

    fn kernel_version(&self) -> Option<String> {
        self.read().kernel_version.clone()
    }

    fn os_release_name(&self) -> Option<String> {
        self.read().os_release_name.clone()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.read().env.get(name).cloned()
    }

    fn is_privileged(&self) -> bool {
        self.read().privileged
    }

    fn which(&self, binary: &str) -> Option<PathBuf> {
        self.read()
            .binaries
            .contains(binary)
            .then(|| PathBuf::from("/usr/bin").join(binary))
    }

    fn fips_enabled(&self) -> bool {
        self.read().fips
    }

    fn has_local_network(&self) -> bool {
        self.read().local_network
    }

    fn has_remote_network(&self) -> bool {
        self.read().remote_network
    }
}
