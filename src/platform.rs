//! Platform identity checks.
//!
//! Each check takes a [`Host`] and recomputes from it; results are `None`
//! when the host state cannot be classified.
use serde::Serialize;
use std::fmt;

use crate::host::Host;

const PHOTON_OS_NAME: &str = "VMware Photon OS";

/// Operating system family, resolved from the host's platform string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Darwin,
    SunOs,
    FreeBsd,
    NetBsd,
    OpenBsd,
    Aix,
}

impl Platform {
    /// Prefix match, so `win32`, `linux2` and `sunos5` resolve like
    /// `windows`, `linux` and `sunos`.
    pub fn from_os(os: &str) -> Option<Self> {
        let os = os.trim().to_ascii_lowercase();
        let table: [(&[&str], Platform); 8] = [
            (&["win"], Platform::Windows),
            (&["linux"], Platform::Linux),
            (&["darwin", "macos"], Platform::Darwin),
            (&["sunos", "solaris", "illumos"], Platform::SunOs),
            (&["freebsd"], Platform::FreeBsd),
            (&["netbsd"], Platform::NetBsd),
            (&["openbsd"], Platform::OpenBsd),
            (&["aix"], Platform::Aix),
        ];
        table
            .iter()
            .find(|(prefixes, _)| prefixes.iter().any(|p| os.starts_with(p)))
            .map(|(_, platform)| *platform)
    }

    /// Whether child processes default to being spawned rather than forked.
    pub fn spawns_by_default(self) -> bool {
        matches!(self, Platform::Windows | Platform::Darwin)
    }
}

/// Anything a platform marker can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Windows,
    Linux,
    Darwin,
    SunOs,
    SmartOs,
    FreeBsd,
    NetBsd,
    OpenBsd,
    Aix,
    Aarch64,
    PhotonOs,
    Spawning,
}

impl Target {
    pub const ALL: [Target; 12] = [
        Target::Windows,
        Target::Linux,
        Target::Darwin,
        Target::SunOs,
        Target::SmartOs,
        Target::FreeBsd,
        Target::NetBsd,
        Target::OpenBsd,
        Target::Aix,
        Target::Aarch64,
        Target::PhotonOs,
        Target::Spawning,
    ];

    /// Keyword used in marker names and in the platform combinators.
    pub fn keyword(self) -> &'static str {
        match self {
            Target::Windows => "windows",
            Target::Linux => "linux",
            Target::Darwin => "darwin",
            Target::SunOs => "sunos",
            Target::SmartOs => "smartos",
            Target::FreeBsd => "freebsd",
            Target::NetBsd => "netbsd",
            Target::OpenBsd => "openbsd",
            Target::Aix => "aix",
            Target::Aarch64 => "aarch64",
            Target::PhotonOs => "photonos",
            Target::Spawning => "spawning",
        }
    }

    /// `Some(true)` when the host is this target, `None` when the host's
    /// platform string is not one we recognize.
    pub fn matches(self, host: &dyn Host) -> Option<bool> {
        let on = |p: Platform| current_platform(host).map(|cur| cur == p);
        match self {
            Target::Windows => on(Platform::Windows),
            Target::Linux => on(Platform::Linux),
            Target::Darwin => on(Platform::Darwin),
            Target::SunOs => on(Platform::SunOs),
            Target::FreeBsd => on(Platform::FreeBsd),
            Target::NetBsd => on(Platform::NetBsd),
            Target::OpenBsd => on(Platform::OpenBsd),
            Target::Aix => on(Platform::Aix),
            Target::SmartOs => is_smartos(host),
            Target::PhotonOs => is_photonos(host),
            Target::Aarch64 => is_aarch64(host),
            Target::Spawning => current_platform(host).map(Platform::spawns_by_default),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Target::Windows => "Windows",
            Target::Linux => "Linux",
            Target::Darwin => "Darwin",
            Target::SunOs => "SunOS",
            Target::SmartOs => "SmartOS",
            Target::FreeBsd => "FreeBSD",
            Target::NetBsd => "NetBSD",
            Target::OpenBsd => "OpenBSD",
            Target::Aix => "AIX",
            Target::Aarch64 => "AArch64",
            Target::PhotonOs => "PhotonOS",
            Target::Spawning => "spawning platforms",
        };
        f.write_str(name)
    }
}

pub fn current_platform(host: &dyn Host) -> Option<Platform> {
    Platform::from_os(&host.os())
}

/// SmartOS (Illumos) reports a `joyent_` kernel version.
fn is_smartos(host: &dyn Host) -> Option<bool> {
    match current_platform(host)? {
        Platform::SunOs => Some(
            host.kernel_version()
                .map(|v| v.starts_with("joyent_"))
                .unwrap_or(false),
        ),
        _ => Some(false),
    }
}

fn is_photonos(host: &dyn Host) -> Option<bool> {
    match current_platform(host)? {
        Platform::Linux => Some(host.os_release_name().as_deref() == Some(PHOTON_OS_NAME)),
        _ => Some(false),
    }
}

fn is_aarch64(host: &dyn Host) -> Option<bool> {
    let machine = host.machine();
    if machine.trim().is_empty() {
        return None;
    }
    Some(machine.starts_with("aarch64"))
}
