use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::EvaluationContext;
use crate::errors::{Result, SkipError};
use crate::expression::MarkerInstance;

pub mod builtins;

/// Accepted shape of one marker parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Required string.
    Str,
    /// String or null.
    OptStr,
    Bool,
    /// Collects every remaining positional argument; each must be a string.
    VarStr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    /// `None` marks a required parameter.
    pub default: Option<Value>,
    pub keyword_only: bool,
}

impl ParamSpec {
    pub fn required(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Str, default: None, keyword_only: false }
    }

    pub fn variadic(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::VarStr,
            default: Some(Value::Array(Vec::new())),
            keyword_only: false,
        }
    }

    pub fn keyword(name: &'static str, kind: ParamKind, default: Value) -> Self {
        Self { name, kind, default: Some(default), keyword_only: true }
    }

    fn render(&self) -> String {
        match (&self.kind, &self.default) {
            (ParamKind::VarStr, _) => format!("*{}", self.name),
            (_, None) => self.name.to_string(),
            (_, Some(default)) => format!("{}={}", self.name, default),
        }
    }
}

/// Static description of a marker: its name, help line and parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub params: Vec<ParamSpec>,
}

impl MarkerSpec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, params: Vec::new() }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Adds the keyword-only `reason` override every built-in marker takes.
    pub fn with_reason(self) -> Self {
        self.param(ParamSpec::keyword("reason", ParamKind::OptStr, Value::Null))
    }

    /// `skip_on_env(envvar, present=true, eq=null, ne=null, reason=null)`
    pub fn signature(&self) -> String {
        if self.params.is_empty() {
            return self.name.to_string();
        }
        format!("{}({})", self.name, self.params.iter().map(ParamSpec::render).join(", "))
    }
}

/// A predicate's verdict plus the reason it would report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub triggered: bool,
    pub reason: String,
}

impl Outcome {
    pub fn when(triggered: bool, reason: impl Into<String>) -> Self {
        Self { triggered, reason: reason.into() }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self::when(true, reason)
    }

    pub fn pass(reason: impl Into<String>) -> Self {
        Self::when(false, reason)
    }
}

/// Trait for pluggable skip predicates.
pub trait Marker: Send + Sync {
    fn spec(&self) -> MarkerSpec;

    /// Rejects argument combinations a [`MarkerSpec`] cannot express. Runs for
    /// every marker on a test before any predicate does.
    fn validate(&self, _args: &Arguments) -> Result<()> {
        Ok(())
    }

    /// Must not cache anything derived from `ctx` between calls.
    fn check(&self, args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome>;
}

/// A [`MarkerInstance`] bound against its [`MarkerSpec`], defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Arguments {
    marker: &'static str,
    values: HashMap<&'static str, Value>,
    explicit: Vec<&'static str>,
}

impl Arguments {
    pub fn bind(spec: &MarkerSpec, instance: &MarkerInstance) -> Result<Self> {
        let name = spec.name;
        let mut values: HashMap<&'static str, Value> = HashMap::new();
        let mut explicit: Vec<&'static str> = Vec::new();

        let positional_params: Vec<&ParamSpec> =
            spec.params.iter().filter(|p| !p.keyword_only).collect();
        let mut positional = instance.args.iter();
        for param in &positional_params {
            if param.kind == ParamKind::VarStr {
                let rest: Vec<Value> = positional.by_ref().cloned().collect();
                if !rest.is_empty() {
                    explicit.push(param.name);
                }
                values.insert(param.name, Value::Array(rest));
                break;
            }
            match positional.next() {
                Some(value) => {
                    values.insert(param.name, value.clone());
                    explicit.push(param.name);
                }
                None => break,
            }
        }
        if positional.next().is_some() {
            return Err(match positional_params.len() {
                0 => SkipError::invalid(format!("The {name} marker does not accept any arguments")),
                n => SkipError::invalid(format!(
                    "The {name} marker accepts at most {n} positional argument(s)"
                )),
            });
        }

        for (key, value) in &instance.kwargs {
            let param = spec
                .params
                .iter()
                .find(|p| p.name == key.as_str() && p.kind != ParamKind::VarStr)
                .ok_or_else(|| unexpected_keyword(spec, key))?;
            if explicit.contains(&param.name) {
                return Err(SkipError::invalid(format!(
                    "The {name} marker got multiple values for argument '{}'",
                    param.name
                )));
            }
            values.insert(param.name, value.clone());
            explicit.push(param.name);
        }

        for param in &spec.params {
            match values.get(param.name) {
                Some(value) => check_kind(name, param, value)?,
                None => match &param.default {
                    Some(default) => {
                        values.insert(param.name, default.clone());
                    }
                    None => {
                        return Err(SkipError::invalid(format!(
                            "The {name} marker requires the '{}' argument",
                            param.name
                        )))
                    }
                },
            }
        }

        Ok(Self { marker: name, values, explicit })
    }

    pub fn marker(&self) -> &'static str {
        self.marker
    }

    pub fn str(&self, name: &str) -> &str {
        self.opt_str(name).unwrap_or_default()
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.values.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn strings(&self, name: &str) -> Vec<&str> {
        match self.values.get(name) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the caller supplied `name`, as opposed to it taking its default.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.iter().any(|n| *n == name)
    }

    pub fn explicit(&self) -> &[&'static str] {
        &self.explicit
    }

    /// The per-instance override of the default skip reason.
    pub fn reason(&self) -> Option<&str> {
        self.opt_str("reason")
    }
}

fn unexpected_keyword(spec: &MarkerSpec, key: &str) -> SkipError {
    let keywords: Vec<&str> = spec
        .params
        .iter()
        .filter(|p| p.kind != ParamKind::VarStr)
        .map(|p| p.name)
        .collect();
    let name = spec.name;
    if keywords == ["reason"] {
        SkipError::invalid(format!(
            "The {name} marker only accepts 'reason' as a keyword argument."
        ))
    } else {
        SkipError::invalid(format!(
            "The {name} marker got an unexpected keyword argument '{key}'"
        ))
    }
}

fn check_kind(marker: &str, param: &ParamSpec, value: &Value) -> Result<()> {
    let ok = match param.kind {
        ParamKind::Str => value.is_string(),
        ParamKind::OptStr => value.is_string() || value.is_null(),
        ParamKind::Bool => value.is_boolean(),
        ParamKind::VarStr => value
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
    };
    if ok {
        return Ok(());
    }
    let param_name = param.name;
    Err(SkipError::invalid(match param.kind {
        ParamKind::Str => format!("The {marker} marker expects '{param_name}' to be a string, got {value}"),
        ParamKind::OptStr => format!("The {marker} marker expects '{param_name}' to be a string or null, got {value}"),
        ParamKind::Bool => format!("The {marker} marker expects '{param_name}' to be a boolean, got {value}"),
        ParamKind::VarStr => format!(
            "The '{marker}' marker only accepts strings as arguments. If you are trying to pass \
             multiple values, each value should be a separate argument."
        ),
    }))
}

/// A registered marker together with its spec, computed once at registration.
#[derive(Clone)]
pub struct RegisteredMarker {
    spec: Arc<MarkerSpec>,
    marker: Arc<dyn Marker>,
}

impl RegisteredMarker {
    fn new(marker: Arc<dyn Marker>) -> Self {
        Self { spec: Arc::new(marker.spec()), marker }
    }

    pub fn spec(&self) -> &MarkerSpec {
        &self.spec
    }

    /// Binds and validates; no host lookups happen here.
    pub fn bind(&self, instance: &MarkerInstance) -> Result<Arguments> {
        let args = Arguments::bind(&self.spec, instance)?;
        self.marker.validate(&args)?;
        Ok(args)
    }

    pub fn check(&self, args: &Arguments, ctx: &EvaluationContext) -> Result<Outcome> {
        self.marker.check(args, ctx)
    }
}

/// Thread-safe marker registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, RegisteredMarker>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut map: HashMap<&'static str, RegisteredMarker> = HashMap::new();
        for marker in builtins::all() {
            let entry = RegisteredMarker::new(marker);
            map.insert(entry.spec.name, entry);
        }
        Self { inner: Arc::new(map) }
    }

    /// Names are registered once; a second registration under the same name fails.
    pub fn register<M: Marker + 'static>(&mut self, marker: M) -> Result<()> {
        let entry = RegisteredMarker::new(Arc::new(marker));
        let name = entry.spec.name;
        if self.inner.contains_key(name) {
            return Err(SkipError::DuplicateMarker(name.to_string()));
        }
        Arc::make_mut(&mut self.inner).insert(name, entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredMarker> {
        self.inner.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Every registered spec, sorted by name.
    pub fn specs(&self) -> Vec<&MarkerSpec> {
        self.inner
            .values()
            .map(RegisteredMarker::spec)
            .sorted_by_key(|s| s.name)
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.keys().sorted()).finish()
    }
}
