//! Error taxonomy for the execution service.
//!
//! Every variant maps to exactly one machine-readable [`ErrorCode`] and one
//! HTTP status, so the dispatcher never has to guess how to report a
//! failure back to the caller.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required field '{field}'")]
    MissingRequiredField { field: String },

    #[error("invalid command: {message}")]
    InvalidCommand { message: String },

    #[error("invalid timeout: {message}")]
    InvalidTimeout { message: String },

    #[error("invalid type for field '{field}': {message}")]
    InvalidType { field: String, message: String },

    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("invalid file format for '{path}': {message}")]
    InvalidFileFormat { path: String, message: String },

    #[error("invalid file payload for '{path}': {message}")]
    InvalidFilePayload { path: String, message: String },

    #[error("missing environment: {message}")]
    MissingEnvironment { message: String },

    #[error("environment '{name}' not found")]
    EnvironmentNotFound { name: String },

    #[error("environment '{name}' already exists")]
    EnvironmentExists { name: String },

    #[error("invalid concurrency mode '{mode}'")]
    InvalidConcurrencyMode { mode: String },

    #[error("environment '{name}' is locked")]
    EnvironmentLocked { name: String },

    #[error("failed to spawn command '{command}': {message}")]
    SpawnFailed { command: String, message: String },

    #[error("file system {operation} failed for '{}': {source}", path.display())]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Machine-readable code returned in an error response's `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingRequiredField,
    InvalidCommand,
    InvalidTimeout,
    InvalidType,
    InvalidPath,
    InvalidFileFormat,
    InvalidFilePayload,
    MissingEnvironment,
    EnvironmentNotFound,
    EnvironmentExists,
    InvalidConcurrencyMode,
    EnvironmentLocked,
    SpawnFailed,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidCommand => "INVALID_COMMAND",
            ErrorCode::InvalidTimeout => "INVALID_TIMEOUT",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::InvalidFileFormat => "INVALID_FILE_FORMAT",
            ErrorCode::InvalidFilePayload => "INVALID_FILE_PAYLOAD",
            ErrorCode::MissingEnvironment => "MISSING_ENVIRONMENT",
            ErrorCode::EnvironmentNotFound => "ENVIRONMENT_NOT_FOUND",
            ErrorCode::EnvironmentExists => "ENVIRONMENT_EXISTS",
            ErrorCode::InvalidConcurrencyMode => "INVALID_CONCURRENCY_MODE",
            ErrorCode::EnvironmentLocked => "ENVIRONMENT_LOCKED",
            ErrorCode::SpawnFailed => "SPAWN_FAILED",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    pub fn status(&self) -> http::StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidCommand
            | ErrorCode::InvalidTimeout
            | ErrorCode::InvalidType
            | ErrorCode::InvalidPath
            | ErrorCode::InvalidFileFormat
            | ErrorCode::InvalidFilePayload
            | ErrorCode::MissingEnvironment
            | ErrorCode::EnvironmentExists
            | ErrorCode::InvalidConcurrencyMode => http::StatusCode::BAD_REQUEST,
            ErrorCode::EnvironmentNotFound => http::StatusCode::NOT_FOUND,
            ErrorCode::EnvironmentLocked => http::StatusCode::LOCKED,
            ErrorCode::SpawnFailed | ErrorCode::Internal => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MissingRequiredField { .. } => ErrorCode::MissingRequiredField,
            Error::InvalidCommand { .. } => ErrorCode::InvalidCommand,
            Error::InvalidTimeout { .. } => ErrorCode::InvalidTimeout,
            Error::InvalidType { .. } => ErrorCode::InvalidType,
            Error::InvalidPath { .. } => ErrorCode::InvalidPath,
            Error::InvalidFileFormat { .. } => ErrorCode::InvalidFileFormat,
            Error::InvalidFilePayload { .. } => ErrorCode::InvalidFilePayload,
            Error::MissingEnvironment { .. } => ErrorCode::MissingEnvironment,
            Error::EnvironmentNotFound { .. } => ErrorCode::EnvironmentNotFound,
            Error::EnvironmentExists { .. } => ErrorCode::EnvironmentExists,
            Error::InvalidConcurrencyMode { .. } => ErrorCode::InvalidConcurrencyMode,
            Error::EnvironmentLocked { .. } => ErrorCode::EnvironmentLocked,
            Error::SpawnFailed { .. } => ErrorCode::SpawnFailed,
            Error::FileSystem { .. } | Error::Json { .. } | Error::Internal { .. } => {
                ErrorCode::Internal
            }
        }
    }

    #[must_use]
    pub fn missing_required_field(field: impl Into<String>) -> Self {
        Error::MissingRequiredField {
            field: field.into(),
        }
    }

    #[must_use]
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Error::InvalidCommand {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_timeout(message: impl Into<String>) -> Self {
        Error::InvalidTimeout {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_type(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidType {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_file_format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidFileFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_file_payload(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidFilePayload {
            path: path.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn missing_environment(message: impl Into<String>) -> Self {
        Error::MissingEnvironment {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn environment_not_found(name: impl Into<String>) -> Self {
        Error::EnvironmentNotFound { name: name.into() }
    }

    #[must_use]
    pub fn environment_exists(name: impl Into<String>) -> Self {
        Error::EnvironmentExists { name: name.into() }
    }

    #[must_use]
    pub fn invalid_concurrency_mode(mode: impl Into<String>) -> Self {
        Error::InvalidConcurrencyMode { mode: mode.into() }
    }

    #[must_use]
    pub fn environment_locked(name: impl Into<String>) -> Self {
        Error::EnvironmentLocked { name: name.into() }
    }

    #[must_use]
    pub fn spawn_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SpawnFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

/// Extension trait for adding context to a `Result`, matching the style of
/// the rest of the service's error construction.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base = e.into();
            Error::Internal {
                message: format!("{}: {base}", message.into()),
            }
        })
    }
}
