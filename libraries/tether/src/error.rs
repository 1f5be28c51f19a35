/// What the remote store reported when a request did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorCode {
    Network,
    PermissionDenied,
    /// The backend dropped its callbacks without ever calling one.
    Cancelled,
    /// The backend could not hand out a generated key.
    KeyUnavailable,
    Other,
}

/// The backend's native error, passed through unmodified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorCode::Network, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No authenticated identity. Collection readers report this as a
    /// nonexistent user reference.
    #[error("nonexistent user reference: no authenticated user")]
    NoUserScope,
    #[error("remote store is not connected")]
    NotConnected,
    #[error("invalid path segment {0:?}")]
    InvalidPath(String),
    #[error("remote request failed: {0}")]
    RequestFailed(#[from] RemoteError),
    #[error("malformed node at {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("bootstrap incomplete: seeded {seeded} of {required} default categories ({cause})")]
    BootstrapIncomplete {
        seeded: usize,
        required: usize,
        cause: Box<StoreError>,
    },
}

impl StoreError {
    pub fn malformed(path: impl ToString, reason: impl ToString) -> Self {
        StoreError::Malformed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
