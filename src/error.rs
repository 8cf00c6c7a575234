use thiserror::Error;

use crate::response::ApiResponse;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client library.
///
/// `Request` and `Server` carry the offending response so callers can inspect
/// the body the service returned. `Internal` marks a broken invariant in the
/// client itself and should never be caught and suppressed.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied input was structurally invalid. Raised locally, never
    /// sent over the wire.
    #[error("{0}")]
    Validation(String),

    /// The transport produced no response at all (DNS/network fault).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The service answered with a 4xx status.
    #[error("request failed with status {}", .response.status())]
    Request { response: ApiResponse },

    /// The service answered with a 5xx status.
    #[error("request failed with status {}", .response.status())]
    Server { response: ApiResponse },

    /// A client invariant was violated; indicates a defect.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// The response attached to a `Request`/`Server` error, if any.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Error::Request { response } | Error::Server { response } => Some(response),
            _ => None,
        }
    }
}
