//! Error types for alertline operations.
//!
//! [`AlertlineError`] covers configuration, authentication and transport
//! failures across every collaborator. The orchestrator uses
//! [`AlertlineError::is_transient`] to decide whether a failure only costs
//! the current poll cycle or ends the loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`AlertlineError`].
pub type Result<T> = std::result::Result<T, AlertlineError>;

/// Error type for all alertline operations.
#[derive(Debug, Error)]
pub enum AlertlineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// A secret expected in the environment is missing
    #[error("Missing credential: environment variable {env} is not set")]
    MissingCredential { env: String },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Authentication Errors
    // =========================================================================
    /// Login to the alert backend was refused or incomplete
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A call was made before a successful login
    #[error("Not authenticated; login must succeed first")]
    NotAuthenticated,

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with a non-success status
    #[error("{context} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        context: String,
        status: u16,
        body: String,
    },

    /// Remote payload could not be decoded
    #[error("Failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    /// Chat provider rejected a request
    #[error("Chat channel error: {message}")]
    Channel { message: String },

    /// Voice provider rejected a request
    #[error("Voice call error: {message}")]
    Voice { message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AlertlineError {
    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a ConfigNotFound error with source
    pub fn config_not_found_with_source(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: Some(source),
        }
    }

    /// Create a ConfigValidation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create an Authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a Parse error
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a Channel error
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    /// Create a Voice error
    pub fn voice(message: impl Into<String>) -> Self {
        Self::Voice {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify an HTTP status code into the appropriate error.
    ///
    /// 401 and 403 mean the session is gone, everything else is a plain
    /// unexpected status.
    pub fn from_http_status(context: impl Into<String>, status: u16, body: &str) -> Self {
        let context = context.into();
        match status {
            401 | 403 => Self::Authentication {
                message: format!("{context} rejected the session (HTTP {status})"),
            },
            _ => Self::UnexpectedStatus {
                context,
                status,
                body: body.chars().take(200).collect(),
            },
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if the failure only costs the current poll cycle.
    ///
    /// The next tick retries naturally. Authentication errors count as
    /// transient here: a session lost mid-run is recovered by logging in
    /// again, and a failed login at startup is reported by the caller
    /// before any poll is attempted.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::UnexpectedStatus { .. }
                | Self::Parse { .. }
                | Self::Channel { .. }
                | Self::Voice { .. }
        ) || self.is_auth_error()
    }

    /// Returns true if the session was rejected or never established.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotAuthenticated)
    }

    /// Returns true if this error should stop the process.
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigInvalid { .. }
                | Self::ConfigValidation { .. }
                | Self::MissingCredential { .. }
        )
    }

    /// Returns actionable guidance for the operator
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Create ~/.alertline/config.yaml or pass --config <path>")
            }
            Self::ConfigInvalid { .. } => Some("Check YAML syntax in the configuration file"),
            Self::MissingCredential { .. } => {
                Some("Export the named environment variable before starting alertline")
            }
            Self::Authentication { .. } | Self::NotAuthenticated => {
                Some("Verify the Aurora username and password")
            }
            _ => None,
        }
    }
}
