use thiserror::Error;

/// 错误类别（供调用方做机器判断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    WrongPassword,
    UnverifiedPassword,
    NoCandidateFiles,
    MalformedContainer,
    MetadataUnavailable,
    PerFileFailure,
    Cancelled,
    ConfigurationError,
    AlreadyRunning,
    AuthenticationFailed,
    Io,
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wrong password")]
    WrongPassword,

    #[error("password could not be verified: no sample file")]
    UnverifiedPassword,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("no supported files")]
    NoCandidateFiles,

    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("failed to process {name}: {reason}")]
    PerFileFailure { name: String, reason: String },

    #[error("cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("a recovery run is already active")]
    AlreadyRunning,
}

impl RecoveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::WrongPassword => ErrorKind::WrongPassword,
            Self::UnverifiedPassword => ErrorKind::UnverifiedPassword,
            Self::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            Self::NoCandidateFiles => ErrorKind::NoCandidateFiles,
            Self::MalformedContainer(_) => ErrorKind::MalformedContainer,
            Self::MetadataUnavailable(_) => ErrorKind::MetadataUnavailable,
            Self::PerFileFailure { .. } => ErrorKind::PerFileFailure,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Configuration(_) => ErrorKind::ConfigurationError,
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
        }
    }
}

impl From<rusqlite::Error> for RecoveryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::MetadataUnavailable(err.to_string())
    }
}

impl From<zip::result::ZipError> for RecoveryError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::MalformedContainer(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecoveryError>;
