use thiserror::Error;

/// Error type for the fallible edges of the plugin: settings and logging.
///
/// The interaction core itself never fails; missing engine data is treated
/// as "not ready this frame" and skipped.
#[derive(Debug, Error)]
pub enum BackpackError {
    /// Settings file could not be read
    #[error("Failed to read settings file: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Settings file is not valid TOML for [`crate::config::Settings`]
    #[error("Failed to parse settings: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A setting parsed but holds an unusable value
    #[error("Invalid setting '{name}': {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    /// File watcher could not be created or attached
    #[error("Settings watcher failed: {0}")]
    Watch(#[from] notify::Error),

    /// Tracing subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl BackpackError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        BackpackError::InvalidSetting {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for settings and logging operations
pub type BackpackResult<T> = Result<T, BackpackError>;
