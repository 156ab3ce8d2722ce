//! Remote sync error types

/// Remote sync result type
pub type Result<T> = std::result::Result<T, Error>;

/// Remote sync errors. These never cross the `RemoteStore` boundary; the
/// client logs them and degrades pulls to `None` and pushes to `false`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("Undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),
}
