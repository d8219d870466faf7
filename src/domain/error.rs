// Error taxonomy for dashboard editing
use thiserror::Error;

/// A field path that does not address anything writable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,

    #[error("field path `config.` names no key")]
    EmptyConfigKey,

    #[error("invalid value for `{path}`: {reason}")]
    InvalidValue { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("polygon needs at least 3 points, found {found}")]
    InsufficientPoints { found: usize },

    #[error("polygon point {index} is not a [longitude, latitude] pair")]
    MalformedPosition { index: usize },
}

/// Failure talking to one of the external collaborators.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
