//! Error types for fedsts

use thiserror::Error;

/// Result type alias using fedsts Error
pub type Result<T> = std::result::Result<T, Error>;

/// fedsts error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser startup failed: {0}")]
    BrowserStartup(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Login rejected: username or password were not accepted")]
    LoginRejected,

    #[error("Second-factor challenge timed out: {0}")]
    ChallengeTimeout(String),

    #[error("Assertion extraction timed out: {0}")]
    AssertionTimeout(String),

    #[error("Credential exchange rejected: {0}")]
    ExchangeRejected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Credentials file error: {0}")]
    CredentialsFile(String),

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Interrupted")]
    Interrupted,
}
