//! Error types for postwire.
//!
//! Codec, transport and RPC failures each have their own enum so callers can
//! tell a malformed payload from a dropped connection or a procedure that
//! reported a failure. [`RpcError`] wraps the other two.

use crate::wire::Kind;
use thiserror::Error;

/// Failures of the encoding engine.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unsupported type (kind tag {tag})")]
    UnsupportedType { tag: u8 },

    #[error("incompatible value: expected {expected}, found {found}")]
    IncompatibleValue { expected: Kind, found: Kind },

    #[error("mismatching array length: expected {expected}, found {found}")]
    ArrayLengthMismatch { expected: usize, found: u64 },

    #[error("field count mismatch: expected {expected}, found {found}")]
    FieldCountMismatch { expected: usize, found: u64 },

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    #[error("value {value} does not fit the native word size")]
    Overflow { value: i128 },

    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the request/response stream adapters.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered with status {status}")]
    Status { status: u16 },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("connection closed")]
    Closed,

    #[error("write without a pending request")]
    NoPendingRequest,

    #[error("invalid transport configuration: {message}")]
    InvalidConfig { message: String },
}

/// Failures of an RPC call or a serving iteration.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid procedure name: {name}")]
    InvalidName { name: String },

    /// Failure message sent back by the server, either from the procedure
    /// itself or describing why the request could not be served.
    #[error("{message}")]
    Remote { message: String },

    /// A registered procedure panicked while serving a call.
    #[error("procedure {name} panicked")]
    Panicked { name: String },
}

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::Wire(WireError::Io(err))
    }
}

impl RpcError {
    /// Whether the error came from the remote side rather than this process.
    pub fn is_remote(&self) -> bool {
        matches!(self, RpcError::Remote { .. })
    }

    /// Whether the serving loop should stop after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(TransportError::Closed)
                | RpcError::Transport(TransportError::Serve(_))
                | RpcError::Transport(TransportError::Bind { .. })
        )
    }
}
