//! Declarative skip markers for tests.
//!
//! Attach markers to a test and let the evaluator decide whether it runs:
//!
//! ```no_run
//! #[test]
//! fn uses_ssh() {
//!     skip_markers::gate!("skip_on_windows", "skip_if_binaries_missing('ssh')");
//!     // test body
//! }
//! ```
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod host;
pub mod markers;
pub mod platform;
pub mod testing;
mod expression;
mod parser;

use once_cell::sync::Lazy;

pub use config::{RunMode, RunOptions};
pub use context::EvaluationContext;
pub use engine::{Decision, Evaluator, SourceLocation};
pub use errors::{Result, SkipError};
pub use expression::{parse_marker, IntoMarker, MarkerInstance};
pub use markers::{Marker, MarkerSpec, Registry};

static SESSION: Lazy<Evaluator> = Lazy::new(Evaluator::from_env);

/// The process-wide evaluator: built-in markers, the real machine, run
/// options from the environment. Built on first use and shared read-only
/// by every test thread.
pub fn session() -> &'static Evaluator {
    &SESSION
}

/// Evaluates marker expressions with the session evaluator.
#[track_caller]
pub fn evaluate(exprs: &[&str]) -> Result<Decision> {
    session().evaluate_exprs(exprs)
}

/// Gates the current test: evaluates the markers and returns early from the
/// enclosing function when one of them skips. The reported location is the
/// macro call site. A marker error fails the test.
///
/// `gate!(markers...)` uses [`session`]; `gate!(@with evaluator; markers...)`
/// uses the given [`Evaluator`].
#[macro_export]
macro_rules! gate {
    (@with $evaluator:expr; $($marker:expr),+ $(,)?) => {{
        let location = $crate::SourceLocation::new(file!(), line!(), column!());
        let markers = [$($crate::IntoMarker::into_marker($marker)),+]
            .into_iter()
            .collect::<$crate::Result<::std::vec::Vec<_>>>();
        match markers.and_then(|m| $evaluator.evaluate_at(&m, location)) {
            Ok(decision) if decision.skip => {
                eprintln!("{decision}");
                return;
            }
            Ok(_) => {}
            Err(err) => panic!("{}: {}", location, err),
        }
    }};
    ($($marker:expr),+ $(,)?) => {
        $crate::gate!(@with $crate::session(); $($marker),+)
    };
}
