use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IRC error: {0}")]
    Irc(String),

    #[error("Slack error: {0}")]
    Slack(String),

    #[error("Web error: {0}")]
    Web(String),
}
