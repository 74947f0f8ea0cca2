use std::path::PathBuf;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FlipsideError {
    /// The API key file could not be read.
    #[error("could not read API key from {}: {source}", path.display())]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The API key file exists but its first line is blank.
    #[error("API key file {} is empty", path.display())]
    EmptyCredential { path: PathBuf },
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// JSON-RPC error object returned by the Flipside API.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message text from upstream API.
        message: String,
    },
    /// The query run finished in the failed state.
    #[error("query run {query_run_id} failed: {}", message.as_deref().unwrap_or("no error message"))]
    QueryRunFailed {
        query_run_id: String,
        /// Upstream error name, e.g. `QueryRunExecutionError`.
        name: Option<String>,
        message: Option<String>,
    },
    /// The query run was canceled before producing results.
    #[error("query run {query_run_id} was canceled")]
    QueryRunCanceled { query_run_id: String },
    /// The query run did not reach a terminal state in time.
    #[error("query run {query_run_id} did not finish within {minutes} minutes")]
    QueryRunTimeout { query_run_id: String, minutes: u64 },
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Filesystem error while writing output artifacts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
