#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("invalid_argument - {0}")]
    InvalidArgument(String),
    #[error("not_found - {0}")]
    NotFound(String),
    #[error("not_authenticated - {0}")]
    NotAuthenticated(String),
    #[error("timeout - {0}")]
    Timeout(String),
    #[error("remote_failed - {0}")]
    RemoteOperationFailed(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl AppError {
    pub fn invalid_argument<M: Into<String>>(message: M) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn not_authenticated<M: Into<String>>(message: M) -> Self {
        Self::NotAuthenticated(message.into())
    }

    pub fn timeout<M: Into<String>>(message: M) -> Self {
        Self::Timeout(message.into())
    }

    pub fn remote<M: Into<String>>(message: M) -> Self {
        Self::RemoteOperationFailed(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::NotAuthenticated(_) => "not_authenticated",
            Self::Timeout(_) => "timeout",
            Self::RemoteOperationFailed(_) => "remote_failed",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(message)
            | Self::NotFound(message)
            | Self::NotAuthenticated(message)
            | Self::Timeout(message)
            | Self::RemoteOperationFailed(message)
            | Self::InvalidData(message)
            | Self::Io(message) => message,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}
