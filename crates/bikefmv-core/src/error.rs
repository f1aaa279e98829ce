use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read whitelist file {path}: {source}")]
    WhitelistIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse whitelist: {0}")]
    WhitelistParse(#[source] serde_json::Error),

    #[error("whitelist validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown source platform: {0}")]
    UnknownSource(String),

    #[error("unknown task status: {0}")]
    UnknownTaskStatus(String),
}
