//! Error types shared across subsystems.

/// Configuration loading and interpretation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("unknown rate-limit key function '{0}'")]
    UnknownKeyFunc(String),

    #[error("invalid rate limit '{0}'")]
    InvalidLimit(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Template loading and rendering errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error(transparent)]
    Tera(#[from] tera::Error),
}

/// Errors raised while wiring the extension into an application.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("extension '{0}' is already registered")]
    AlreadyRegistered(&'static str),
}
