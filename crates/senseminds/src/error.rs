//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use senseminds_config::ConfigError;
use senseminds_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach SenseMinds at {url}")]
    #[diagnostic(
        code(senseminds::connection_failed),
        help(
            "Check that the backend is running and reachable.\n\
             URL: {url}\n\
             Try: senseminds status -v"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Connection refused by server: {message}")]
    #[diagnostic(code(senseminds::refused))]
    Refused { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(senseminds::timeout),
        help("Raise `timeout` in your profile or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── API ──────────────────────────────────────────────────────────

    #[error("{resource} not found")]
    #[diagnostic(
        code(senseminds::not_found),
        help("Check that --api-url points at the REST root (usually <server>/api/v1).")
    )]
    NotFound { resource: String },

    #[error("API error: {message}")]
    #[diagnostic(code(senseminds::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(senseminds::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(senseminds::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: senseminds config init --name {name} --url <server>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No SenseMinds deployment configured")]
    #[diagnostic(
        code(senseminds::no_config),
        help(
            "Create a profile with: senseminds config init --url http://<server>:5000\n\
             Or pass --realtime-url / set SENSEMINDS_REALTIME_URL.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(senseminds::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Refused { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ──────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::ProfileNotFound { name, available } => {
                Self::ProfileNotFound { name, available }
            }
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Refused { message } => Self::Refused { message },
            CoreError::NotFound { resource } => Self::NotFound { resource },
            CoreError::Payload { message } | CoreError::Api { message, .. } => {
                Self::Api { message }
            }
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_use_connection_exit_code() {
        let err = CliError::from(CoreError::ConnectionFailed {
            url: "http://10.0.0.5:5000".into(),
            reason: "connection refused".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "poll_interval".into(),
            reason: "must be greater than zero".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().contains("poll_interval"));
    }

    #[test]
    fn missing_profile_keeps_its_name() {
        let err = CliError::from(ConfigError::ProfileNotFound {
            name: "lab".into(),
            available: "default".into(),
        });
        assert!(matches!(err, CliError::ProfileNotFound { ref name, .. } if name == "lab"));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
