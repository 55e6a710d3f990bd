// src/expression.rs
use crate::errors::{Result, SkipError};
use crate::parser::{ParseError, Parser};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A marker bound to concrete arguments for one test.
///
/// Build one with the builder methods, or parse annotation text:
///
/// ```
/// use skip_markers::{parse_marker, MarkerInstance};
///
/// let built = MarkerInstance::new("skip_on_env").arg("FLAKY_TEST").kwarg("eq", "1");
/// let parsed = parse_marker(r#"skip_on_env("FLAKY_TEST", eq="1")"#).unwrap();
/// assert_eq!(built, parsed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerInstance {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Vec<(String, Value)>,
}

impl MarkerInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), args: Vec::new(), kwargs: Vec::new() }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.push((name.into(), value.into()));
        self
    }

    /// Overrides the marker's default skip reason.
    pub fn reason(self, reason: impl Into<String>) -> Self {
        self.kwarg("reason", reason.into())
    }
}

/// Anything `gate!` and the evaluator accept as a marker.
pub trait IntoMarker {
    fn into_marker(self) -> Result<MarkerInstance>;
}

impl IntoMarker for MarkerInstance {
    fn into_marker(self) -> Result<MarkerInstance> {
        Ok(self)
    }
}

impl IntoMarker for &MarkerInstance {
    fn into_marker(self) -> Result<MarkerInstance> {
        Ok(self.clone())
    }
}

impl IntoMarker for &str {
    fn into_marker(self) -> Result<MarkerInstance> {
        parse_marker(self)
    }
}

impl IntoMarker for &String {
    fn into_marker(self) -> Result<MarkerInstance> {
        parse_marker(self)
    }
}

/// Parses `name` or `name(arg, ..., key=value, ...)`.
pub fn parse_marker(input: &str) -> Result<MarkerInstance> {
    let mut p = MParser::new(input);
    let marker = p.parse_marker().map_err(|e| SkipError::Parse(format!("{e} in {input:?}")))?;
    Ok(marker)
}

struct MParser<'a> {
    parser: Parser<'a>,
}

impl<'a> MParser<'a> {
    fn new(s: &'a str) -> Self {
        Self { parser: Parser::new(s) }
    }

    fn parse_marker(&mut self) -> std::result::Result<MarkerInstance, ParseError> {
        self.parser.skip_ws();
        let mut marker = MarkerInstance::new(self.parser.parse_identifier()?);
        self.parser.skip_ws();
        if self.parser.consume_char('(') {
            self.parse_args(&mut marker)?;
            self.parser.expect(')')?;
            self.parser.skip_ws();
        }
        if !self.parser.eof() {
            return Err(self.parser.error("trailing input"));
        }
        Ok(marker)
    }

    fn parse_args(&mut self, marker: &mut MarkerInstance) -> std::result::Result<(), ParseError> {
        self.parser.skip_ws();
        if self.parser.peek_char() == Some(')') {
            return Ok(());
        }
        loop {
            self.parse_arg(marker)?;
            self.parser.skip_ws();
            if self.parser.consume_char(',') {
                self.parser.skip_ws();
                // trailing comma
                if self.parser.peek_char() == Some(')') {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    fn parse_arg(&mut self, marker: &mut MarkerInstance) -> std::result::Result<(), ParseError> {
        let starts_word = matches!(self.parser.peek_char(), Some(c) if c == '_' || c.is_ascii_alphabetic());
        if !starts_word {
            let value = self.parse_literal()?;
            return self.push_positional(marker, value);
        }
        let word = self.parser.parse_identifier()?;
        self.parser.skip_ws();
        if self.parser.consume_char('=') {
            self.parser.skip_ws();
            let value = self.parse_literal()?;
            marker.kwargs.push((word.to_string(), value));
            return Ok(());
        }
        match keyword_literal(word) {
            Some(value) => self.push_positional(marker, value),
            None => Err(self.parser.error(format!("expected '=' after '{word}'"))),
        }
    }

    fn push_positional(
        &self,
        marker: &mut MarkerInstance,
        value: Value,
    ) -> std::result::Result<(), ParseError> {
        if !marker.kwargs.is_empty() {
            return Err(self.parser.error("positional argument follows keyword argument"));
        }
        marker.args.push(value);
        Ok(())
    }

    fn parse_literal(&mut self) -> std::result::Result<Value, ParseError> {
        match self.parser.peek_char() {
            Some('"') | Some('\'') => Ok(Value::String(self.parser.parse_quoted_string()?)),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parser.parse_number_literal(),
            Some(c) if c == '_' || c.is_ascii_alphabetic() => {
                let word = self.parser.parse_identifier()?;
                keyword_literal(word)
                    .ok_or_else(|| self.parser.error(format!("unknown literal '{word}'")))
            }
            _ => Err(self.parser.error("literal expected")),
        }
    }
}

fn keyword_literal(word: &str) -> Option<Value> {
    match word {
        "true" | "True" => Some(Value::Bool(true)),
        "false" | "False" => Some(Value::Bool(false)),
        "null" | "None" => Some(Value::Null),
        _ => None,
    }
}
