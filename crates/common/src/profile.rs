//! Credential request targets.
//!
//! A [`Profile`] names the account/role pair one exchange request targets,
//! plus the IAM identity-provider it authenticates through and the requested
//! credential lifetime.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default requested credential lifetime, in seconds.
pub const DEFAULT_DURATION_SECONDS: i32 = 3600;

/// Credential lifetime window STS accepts, in seconds.
pub const MIN_DURATION_SECONDS: i32 = 900;
pub const MAX_DURATION_SECONDS: i32 = 43200;

/// A fully resolved credential request target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub account: String,
    pub role: String,
    pub id_provider: String,
    pub duration_seconds: i32,
}

impl Profile {
    /// Ensure the fields the exchange request derives identifiers from are
    /// present and the requested lifetime is one STS will accept. Checked
    /// before any browser or network activity, so a bad profile cannot
    /// cost the user a push approval.
    pub fn validate(&self) -> Result<()> {
        if self.account.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "profile {}: missing required key \"account\"",
                self.name
            )));
        }
        if self.role.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "profile {}: missing required key \"role\"",
                self.name
            )));
        }
        if self.id_provider.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "profile {}: no id_provider set via flag or config",
                self.name
            )));
        }
        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&self.duration_seconds) {
            return Err(Error::InvalidConfig(format!(
                "profile {}: duration {}s is outside the {}-{}s window STS accepts",
                self.name, self.duration_seconds, MIN_DURATION_SECONDS, MAX_DURATION_SECONDS
            )));
        }
        Ok(())
    }

    /// IAM ARN of the SAML identity provider in the target account.
    pub fn principal_arn(&self) -> String {
        format!(
            "arn:aws:iam::{}:saml-provider/{}",
            self.account, self.id_provider
        )
    }

    /// IAM ARN of the role to assume in the target account.
    pub fn role_arn(&self) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account, self.role)
    }
}
