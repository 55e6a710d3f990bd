//! The stock marker library.
use itertools::Itertools;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Arguments, Marker, MarkerSpec, Outcome, ParamKind, ParamSpec};
use crate::config::RunMode;
use crate::context::EvaluationContext;
use crate::errors::{Result, SkipError};
use crate::platform::{Platform, Target};

/// Opt-out switch for network-dependent tests.
pub const NO_INTERNET_ENV: &str = "NO_INTERNET";

/// Every built-in marker, in no particular order.
pub fn all() -> Vec<Arc<dyn Marker>> {
    let mut markers: Vec<Arc<dyn Marker>> = vec![
        Arc::new(RunModeGate(RunMode::Destructive)),
        Arc::new(RunModeGate(RunMode::Expensive)),
        Arc::new(SkipIfNotRoot),
        Arc::new(SkipIfBinariesMissing),
        Arc::new(RequiresNetwork),
        Arc::new(SkipOnFipsEnabledPlatform),
        Arc::new(SkipOnEnv),
        Arc::new(OnPlatforms { mode: Mode::On }),
        Arc::new(OnPlatforms { mode: Mode::Unless }),
    ];
    for target in Target::ALL {
        markers.push(Arc::new(PlatformMarker { target, mode: Mode::On }));
        markers.push(Arc::new(PlatformMarker { target, mode: Mode::Unless }));
    }
    markers
}

/// `destructive_test` / `expensive_test`
pub struct RunModeGate(pub RunMode);

impl Marker for RunModeGate {
    fn spec(&self) -> MarkerSpec {
        let spec = match self.0 {
            RunMode::Destructive => MarkerSpec::new(
                "destructive_test",
                "Run destructive tests. These tests can include adding or removing users from your system for example.",
            ),
            RunMode::Expensive => MarkerSpec::new(
                "expensive_test",
                "Run expensive tests. These tests can include starting resources which cost money, like VMs, for example.",
            ),
        };
        spec.with_reason()
    }

    fn check(&self, _args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        let reason = match self.0 {
            RunMode::Destructive => "Destructive tests are disabled",
            RunMode::Expensive => "Expensive tests are disabled",
        };
        Ok(Outcome::when(!ctx.options().allows(self.0), reason))
    }
}

pub struct SkipIfNotRoot;

impl Marker for SkipIfNotRoot {
    fn spec(&self) -> MarkerSpec {
        MarkerSpec::new(
            "skip_if_not_root",
            "Skip if the current user is not root on non windows platforms or not Administrator on windows platforms",
        )
        .with_reason()
    }

    fn check(&self, _args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        let reason = if ctx.platform() == Some(Platform::Windows) {
            "You must be logged in as an Administrator to run this test"
        } else {
            "You must be logged in as root to run this test"
        };
        Ok(Outcome::when(!ctx.host().is_privileged(), reason))
    }
}

pub struct SkipIfBinariesMissing;

impl Marker for SkipIfBinariesMissing {
    fn spec(&self) -> MarkerSpec {
        MarkerSpec::new(
            "skip_if_binaries_missing",
            "If 'check_all' is true, all binaries must exist. If 'check_all' is false, then only one of the \
             passed binaries needs to be found. Useful when, for example, passing a list of python \
             interpreter names(python3.5, python3, python), where only one needs to exist.",
        )
        .param(ParamSpec::variadic("binaries"))
        .param(ParamSpec::keyword("check_all", ParamKind::Bool, json!(true)))
        .param(ParamSpec::keyword("message", ParamKind::OptStr, Value::Null))
        .with_reason()
    }

    fn validate(&self, args: &Arguments) -> Result<()> {
        if args.strings("binaries").is_empty() {
            return Err(SkipError::invalid(
                "The 'skip_if_binaries_missing' marker needs at least one binary name to be passed",
            ));
        }
        Ok(())
    }

    fn check(&self, args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        let binaries = args.strings("binaries");
        let message = args.opt_str("message");
        if let Some(message) = message {
            warn!(
                marker = args.marker(),
                "Please stop passing 'message=\"{message}\"' and instead pass 'reason=\"{message}\"'"
            );
        }
        let host = ctx.host();
        let missing = |binary: &str| host.which(binary).is_none();

        if args.bool("check_all") {
            if let Some(binary) = binaries.iter().copied().find(|b| missing(*b)) {
                let reason = message
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("The '{binary}' binary was not found"));
                return Ok(Outcome::skip(reason));
            }
        } else if binaries.iter().copied().all(missing) {
            let reason = message.map(str::to_owned).unwrap_or_else(|| {
                format!("None of the following binaries was found: {}", binaries.iter().join(", "))
            });
            return Ok(Outcome::skip(reason));
        }
        debug!("All binaries found. Searched for: {}", binaries.iter().join(", "));
        Ok(Outcome::pass(format!("Found binaries: {}", binaries.iter().join(", "))))
    }
}

pub struct RequiresNetwork;

impl Marker for RequiresNetwork {
    fn spec(&self) -> MarkerSpec {
        MarkerSpec::new(
            "requires_network",
            "Skip if no networking is set up. If 'only_local_network' is 'true', only the local network is checked.",
        )
        .param(ParamSpec::keyword("only_local_network", ParamKind::Bool, json!(false)))
        .with_reason()
    }

    fn check(&self, args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        let host = ctx.host();
        let opted_out = host
            .env_var(NO_INTERNET_ENV)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if opted_out {
            return Ok(Outcome::skip(
                "Network access was disabled through the NO_INTERNET environment variable",
            ));
        }
        if !host.has_local_network() {
            return Ok(Outcome::skip("No local network was detected"));
        }
        if !args.bool("only_local_network") && !host.has_remote_network() {
            return Ok(Outcome::skip("No internet network connection was detected"));
        }
        Ok(Outcome::pass("Network is available"))
    }
}

pub struct SkipOnFipsEnabledPlatform;

impl Marker for SkipOnFipsEnabledPlatform {
    fn spec(&self) -> MarkerSpec {
        MarkerSpec::new(
            "skip_on_fips_enabled_platform",
            "Skip test on FIPS enabled platforms",
        )
        .with_reason()
    }

    fn check(&self, _args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        Ok(Outcome::when(ctx.host().fips_enabled(), "Skipped on FIPS enabled platform"))
    }
}

pub struct SkipOnEnv;

impl Marker for SkipOnEnv {
    fn spec(&self) -> MarkerSpec {
        MarkerSpec::new(
            "skip_on_env",
            "Skip if the environment variable is present (or absent when 'present' is false), \
             optionally comparing its value with 'eq' or 'ne'.",
        )
        .param(ParamSpec::required("envvar"))
        .param(ParamSpec::keyword("present", ParamKind::Bool, json!(true)))
        .param(ParamSpec::keyword("eq", ParamKind::OptStr, Value::Null))
        .param(ParamSpec::keyword("ne", ParamKind::OptStr, Value::Null))
        .with_reason()
    }

    fn validate(&self, args: &Arguments) -> Result<()> {
        let present = args.bool("present");
        let eq = args.opt_str("eq");
        let ne = args.opt_str("ne");

        if args.str("envvar").is_empty() {
            return Err(SkipError::invalid("The skip_on_env marker needs a non-empty 'envvar'"));
        }
        if !present && (eq.is_some() || ne.is_some()) {
            return Err(SkipError::invalid(
                "The skip_on_env marker does not accept 'eq' or 'ne' when 'present' is false",
            ));
        }
        if eq.is_some() && ne.is_some() {
            return Err(SkipError::invalid(
                "The skip_on_env marker does not accept 'eq' and 'ne' at the same time",
            ));
        }
        Ok(())
    }

    fn check(&self, args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        let envvar = args.str("envvar");
        let present = args.bool("present");
        let eq = args.opt_str("eq");
        let ne = args.opt_str("ne");

        let value = ctx.host().env_var(envvar);
        let outcome = match (present, eq, ne) {
            (false, _, _) => Outcome::when(
                value.is_none(),
                format!("Environment variable '{envvar}' is not present"),
            ),
            (true, Some(eq), _) => Outcome::when(
                value.as_deref() == Some(eq),
                format!("Environment variable '{envvar}' is present and equals '{eq}'"),
            ),
            (true, None, Some(ne)) => Outcome::when(
                value.as_deref().map(|v| v != ne).unwrap_or(false),
                format!("Environment variable '{envvar}' is present and does not equal '{ne}'"),
            ),
            (true, None, None) => Outcome::when(
                value.is_some(),
                format!("Environment variable '{envvar}' is present"),
            ),
        };
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Skip when the host matches.
    On,
    /// Skip when the host does not match.
    Unless,
}

impl Mode {
    /// An unknown host state (`None`) never triggers either mode.
    fn triggers(self, matched: Option<bool>) -> bool {
        matches!((self, matched), (Mode::On, Some(true)) | (Mode::Unless, Some(false)))
    }
}

/// `skip_on_<target>` / `skip_unless_on_<target>`
pub struct PlatformMarker {
    pub target: Target,
    pub mode: Mode,
}

impl PlatformMarker {
    fn name(&self) -> &'static str {
        use Target::*;
        match (self.mode, self.target) {
            (Mode::On, Windows) => "skip_on_windows",
            (Mode::On, Linux) => "skip_on_linux",
            (Mode::On, Darwin) => "skip_on_darwin",
            (Mode::On, SunOs) => "skip_on_sunos",
            (Mode::On, SmartOs) => "skip_on_smartos",
            (Mode::On, FreeBsd) => "skip_on_freebsd",
            (Mode::On, NetBsd) => "skip_on_netbsd",
            (Mode::On, OpenBsd) => "skip_on_openbsd",
            (Mode::On, Aix) => "skip_on_aix",
            (Mode::On, Aarch64) => "skip_on_aarch64",
            (Mode::On, PhotonOs) => "skip_on_photonos",
            (Mode::On, Spawning) => "skip_on_spawning_platform",
            (Mode::Unless, Windows) => "skip_unless_on_windows",
            (Mode::Unless, Linux) => "skip_unless_on_linux",
            (Mode::Unless, Darwin) => "skip_unless_on_darwin",
            (Mode::Unless, SunOs) => "skip_unless_on_sunos",
            (Mode::Unless, SmartOs) => "skip_unless_on_smartos",
            (Mode::Unless, FreeBsd) => "skip_unless_on_freebsd",
            (Mode::Unless, NetBsd) => "skip_unless_on_netbsd",
            (Mode::Unless, OpenBsd) => "skip_unless_on_openbsd",
            (Mode::Unless, Aix) => "skip_unless_on_aix",
            (Mode::Unless, Aarch64) => "skip_unless_on_aarch64",
            (Mode::Unless, PhotonOs) => "skip_unless_on_photonos",
            (Mode::Unless, Spawning) => "skip_unless_on_spawning_platform",
        }
    }

    fn default_reason(&self) -> String {
        match (self.mode, self.target) {
            (Mode::On, target) => format!("Skipped on {target}"),
            (Mode::Unless, Target::Spawning) => {
                "Platform does not default multiprocessing to spawn, skipped".to_string()
            }
            (Mode::Unless, target) => format!("Platform is not {target}, skipped"),
        }
    }
}

impl Marker for PlatformMarker {
    fn spec(&self) -> MarkerSpec {
        let help = match self.mode {
            Mode::On => "Skip test on the named platform",
            Mode::Unless => "Skip test unless on the named platform",
        };
        MarkerSpec::new(self.name(), help).with_reason()
    }

    fn check(&self, _args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        let matched = self.target.matches(ctx.host());
        debug!(target_platform = %self.target, ?matched, "platform check");
        Ok(Outcome::when(self.mode.triggers(matched), self.default_reason()))
    }
}

/// `skip_on_platforms(...)` / `skip_unless_on_platforms(...)`
pub struct OnPlatforms {
    pub mode: Mode,
}

impl OnPlatforms {
    fn name(&self) -> &'static str {
        match self.mode {
            Mode::On => "skip_on_platforms",
            Mode::Unless => "skip_unless_on_platforms",
        }
    }
}

impl Marker for OnPlatforms {
    fn spec(&self) -> MarkerSpec {
        let help = match self.mode {
            Mode::On => "Pass true to one or more platform keywords to get the test skipped.",
            Mode::Unless => {
                "Pass true to one or more platform keywords to get the test skipped unless matched."
            }
        };
        Target::ALL
            .into_iter()
            .fold(MarkerSpec::new(self.name(), help), |spec, target| {
                spec.param(ParamSpec::keyword(target.keyword(), ParamKind::Bool, json!(false)))
            })
            .with_reason()
    }

    fn validate(&self, args: &Arguments) -> Result<()> {
        let name = self.name();
        if !Target::ALL.iter().any(|t| args.is_explicit(t.keyword())) {
            return Err(SkipError::invalid(format!(
                "Pass at least one platform to {name} as a keyword argument"
            )));
        }
        if !Target::ALL.iter().any(|t| args.bool(t.keyword())) {
            return Err(SkipError::invalid(format!(
                "Pass at least one platform with a True value to {name} as a keyword argument"
            )));
        }
        Ok(())
    }

    fn check(&self, args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        let selected: Vec<Target> = Target::ALL
            .into_iter()
            .filter(|t| args.bool(t.keyword()))
            .collect();

        let host = ctx.host();
        let results: Vec<Option<bool>> = selected.iter().map(|t| t.matches(host)).collect();
        // Any match is a match; otherwise unknown only when some check could not tell.
        let on_platforms = if results.contains(&Some(true)) {
            Some(true)
        } else if results.iter().all(Option::is_some) {
            Some(false)
        } else {
            None
        };
        let reason = match self.mode {
            Mode::On => "Skipped on platform match",
            Mode::Unless => "Platform(s) do not match, skipped",
        };
        Ok(Outcome::when(self.mode.triggers(on_platforms), reason))
    }
}
