//! fedsts Common Library
//!
//! Shared types and the credential-exchange adapter for the fedsts tools.

pub mod error;
pub mod profile;
pub mod settings;
pub mod sts;

// Re-export commonly used types
pub use error::{Error, Result};
pub use profile::Profile;
pub use settings::{SecondFactor, Settings};
pub use sts::{CredentialExchange, SamlAssertion, StsCredentials, StsExchange};

/// fedsts version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default settings file path, `$HOME/.fedsts.toml`.
pub fn default_config_path() -> Result<std::path::PathBuf> {
    Ok(require_home(dirs::home_dir())?.join(".fedsts.toml"))
}

/// Default AWS credentials file path, `$HOME/.aws/credentials`.
pub fn default_credentials_path() -> Result<std::path::PathBuf> {
    Ok(require_home(dirs::home_dir())?.join(".aws").join("credentials"))
}

/// A run without a resolvable home directory must fail loudly rather than
/// quietly targeting paths under the current directory.
fn require_home(home: Option<std::path::PathBuf>) -> Result<std::path::PathBuf> {
    home.ok_or_else(|| {
        Error::InvalidConfig("could not determine a home directory".to_string())
    })
}
