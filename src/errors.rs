use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

// Everything that can go wrong while registering, parsing or binding markers.
// Predicate outcomes (missing binary, unknown platform, ...) are never errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipError {
    // A marker with this name is already in the registry
    #[error("marker '{0}' is already registered")]
    DuplicateMarker(String),

    // A test referenced a marker name that was never registered
    #[error("unknown marker '{0}'")]
    UnknownMarker(String),

    // A marker received parameters outside of its contract
    #[error("{0}")]
    InvalidParameter(String),

    // Marker annotation text could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

impl SkipError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SkipError::InvalidParameter(msg.into())
    }
}

// Type alias for results that use `SkipError` as the error type
pub type Result<T> = std::result::Result<T, SkipError>;
