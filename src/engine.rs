use serde::Serialize;
use std::fmt;
use std::panic::Location;
use tracing::{debug, info};

use crate::context::EvaluationContext;
use crate::errors::{Result, SkipError};
use crate::expression::{IntoMarker, MarkerInstance};
use crate::markers::{Arguments, Registry, RegisteredMarker};

/// Where a skip is reported: the test, never this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub const fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Location of the nearest caller not marked `#[track_caller]`.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = Location::caller();
        Self::new(loc.file(), loc.line(), loc.column())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Run or skip, for one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub skip: bool,
    pub reason: Option<String>,
    /// The marker whose predicate fired.
    pub marker: Option<String>,
    pub location: SourceLocation,
}

impl Decision {
    pub fn run(location: SourceLocation) -> Self {
        Self { skip: false, reason: None, marker: None, location }
    }

    pub fn skipped(marker: &str, reason: String, location: SourceLocation) -> Self {
        Self { skip: true, reason: Some(reason), marker: Some(marker.to_string()), location }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.skip, &self.reason) {
            (true, Some(reason)) => write!(f, "SKIPPED [{}]: {}", self.location, reason),
            (true, None) => write!(f, "SKIPPED [{}]", self.location),
            (false, _) => write!(f, "RUN [{}]", self.location),
        }
    }
}

/// Evaluates the markers attached to a test against one session context.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: Registry,
    ctx: EvaluationContext,
}

impl Evaluator {
    pub fn new(registry: Registry, ctx: EvaluationContext) -> Self {
        Self { registry, ctx }
    }

    /// Built-in markers against the real machine, options from the environment.
    pub fn from_env() -> Self {
        Self::new(Registry::with_builtins(), EvaluationContext::from_env())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.ctx
    }

    /// The Decision's location is the caller of this method.
    #[track_caller]
    pub fn evaluate(&self, markers: &[MarkerInstance]) -> Result<Decision> {
        self.evaluate_at(markers, SourceLocation::caller())
    }

    /// Parses each expression, then evaluates like [`Evaluator::evaluate`].
    #[track_caller]
    pub fn evaluate_exprs<M: IntoMarker + Copy>(&self, exprs: &[M]) -> Result<Decision> {
        let location = SourceLocation::caller();
        let markers = exprs
            .iter()
            .map(|m| (*m).into_marker())
            .collect::<Result<Vec<_>>>()?;
        self.evaluate_at(&markers, location)
    }

    /// Every marker is resolved, bound and validated before any predicate
    /// runs, so an unknown or malformed marker is reported even if an earlier
    /// one skips.
    /// Then predicates run in declaration order and the first that triggers
    /// decides; its `reason` keyword, when given, replaces the default reason.
    pub fn evaluate_at(&self, markers: &[MarkerInstance], location: SourceLocation) -> Result<Decision> {
        let bound = markers
            .iter()
            .map(|m| self.bind(m))
            .collect::<Result<Vec<_>>>()?;

        for (entry, args) in bound {
            let outcome = entry.check(&args, &self.ctx)?;
            debug!(marker = args.marker(), triggered = outcome.triggered, reason = %outcome.reason, "evaluated");
            if outcome.triggered {
                let reason = args.reason().map(str::to_owned).unwrap_or(outcome.reason);
                info!(marker = args.marker(), %location, %reason, "skipping");
                return Ok(Decision::skipped(args.marker(), reason, location));
            }
        }
        Ok(Decision::run(location))
    }

    fn bind(&self, marker: &MarkerInstance) -> Result<(&RegisteredMarker, Arguments)> {
        let entry = self
            .registry
            .get(&marker.name)
            .ok_or_else(|| SkipError::UnknownMarker(marker.name.clone()))?;
        Ok((entry, entry.bind(marker)?))
    }
}
