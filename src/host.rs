//! Live probes of the machine the tests run on.
//!
//! Every method recomputes its answer; nothing is cached, so a host whose
//! state changes mid-session is observed as it changes.
use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::debug;

/// Source of system state consulted by marker predicates.
pub trait Host: Send + Sync {
    /// Platform identity string (`linux`, `windows`, `macos`, `win32`, `sunos5`, ...).
    fn os(&self) -> String;
    /// Machine architecture (`x86_64`, `aarch64`, ...).
    fn machine(&self) -> String;
    /// Kernel version string as reported by `uname -v`, where available.
    fn kernel_version(&self) -> Option<String>;
    /// The `NAME` field of `/etc/os-release`.
    fn os_release_name(&self) -> Option<String>;
    fn env_var(&self, name: &str) -> Option<String>;
    /// Root on unix, an elevated Administrator on windows.
    fn is_privileged(&self) -> bool;
    /// Resolves a binary name against the search path.
    fn which(&self, binary: &str) -> Option<PathBuf>;
    fn fips_enabled(&self) -> bool;
    fn has_local_network(&self) -> bool;
    fn has_remote_network(&self) -> bool;
}

/// The real machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn os(&self) -> String {
        env::consts::OS.to_string()
    }

    /// `uname -m`, so Apple Silicon reports `arm64` rather than `aarch64`.
    fn machine(&self) -> String {
        uname("-m").unwrap_or_else(|| env::consts::ARCH.to_string())
    }

    fn kernel_version(&self) -> Option<String> {
        uname("-v")
    }

    fn os_release_name(&self) -> Option<String> {
        let raw = fs::read_to_string("/etc/os-release").ok()?;
        parse_os_release_name(&raw)
    }

    fn env_var(&self, name: &str) -> Option<String> {
        env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }

    fn is_privileged(&self) -> bool {
        current_user_is_privileged()
    }

    fn which(&self, binary: &str) -> Option<PathBuf> {
        let found = which_in(binary, env::var_os("PATH"));
        debug!(binary, found = ?found, "binary lookup");
        found
    }

    fn fips_enabled(&self) -> bool {
        if Path::new("/etc/system-fips").exists() {
            return true;
        }
        if let Ok(raw) = fs::read_to_string("/proc/sys/crypto/fips_enabled") {
            if raw.trim() == "1" {
                return true;
            }
        }
        let Some(sysctl) = self.which("sysctl") else {
            return false;
        };
        match Command::new(sysctl).arg("crypto.fips_enabled").output() {
            Ok(output) if output.status.success() => {
                parse_sysctl_fips(&String::from_utf8_lossy(&output.stdout))
            }
            _ => false,
        }
    }

    fn has_local_network(&self) -> bool {
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).is_ok()
            || TcpListener::bind(("::", 0)).is_ok()
    }

    fn has_remote_network(&self) -> bool {
        // Numeric addresses, no DNS.
        const PROBES: [[u8; 4]; 6] = [
            [172, 217, 17, 14],
            [172, 217, 16, 238],
            [173, 194, 41, 198],
            [173, 194, 41, 199],
            [173, 194, 41, 200],
            [216, 58, 201, 174],
        ];
        PROBES.iter().any(|octets| {
            let addr = SocketAddr::new(IpAddr::from(*octets), 80);
            TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
        })
    }
}

fn uname(flag: &str) -> Option<String> {
    if cfg!(windows) {
        return None;
    }
    let output = Command::new("uname").arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

#[cfg(unix)]
fn current_user_is_privileged() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(windows)]
fn current_user_is_privileged() -> bool {
    // `net session` only succeeds from an elevated token.
    Command::new("net")
        .arg("session")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
fn current_user_is_privileged() -> bool {
    false
}

/// Reads `NAME=` out of an os-release document.
pub(crate) fn parse_os_release_name(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("NAME="))
        .map(|value| value.trim_matches('"').trim_matches('\'').to_string())
}

/// `sysctl crypto.fips_enabled` prints `crypto.fips_enabled = 1` when enabled.
pub(crate) fn parse_sysctl_fips(output: &str) -> bool {
    let stripped = output.trim();
    if stripped.is_empty() || !stripped.contains('=') {
        return false;
    }
    stripped.rsplit('=').next().map(str::trim) == Some("1")
}

/// PATH search in the manner of `which(1)`.
pub(crate) fn which_in(binary: &str, path: Option<std::ffi::OsString>) -> Option<PathBuf> {
    if binary.is_empty() {
        return None;
    }
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path = path?;
    env::split_paths(&path)
        .flat_map(|dir| executable_names(binary).into_iter().map(move |n| dir.join(n)))
        .find(|full| is_executable(full))
}

#[cfg(windows)]
fn executable_names(binary: &str) -> Vec<String> {
    let exts = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    let mut names = vec![binary.to_string()];
    names.extend(exts.split(';').filter(|e| !e.is_empty()).map(|e| format!("{binary}{e}")));
    names
}

#[cfg(not(windows))]
fn executable_names(binary: &str) -> Vec<String> {
    vec![binary.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
