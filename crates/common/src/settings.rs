//! Settings file model.
//!
//! `~/.fedsts.toml` carries the IdP login defaults plus any number of
//! `[profile.NAME]` sections. Command-line flags override file values and
//! file values override built-in defaults; resolution happens here so the
//! ceremony and exchange layers only ever see finished values.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::{Profile, DEFAULT_DURATION_SECONDS};

/// Second-factor confirmation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondFactor {
    Push,
    Call,
}

impl Default for SecondFactor {
    fn default() -> Self {
        Self::Push
    }
}

impl std::fmt::Display for SecondFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecondFactor::Push => write!(f, "push"),
            SecondFactor::Call => write!(f, "call"),
        }
    }
}

impl std::str::FromStr for SecondFactor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" => Ok(SecondFactor::Push),
            "call" => Ok(SecondFactor::Call),
            other => Err(Error::InvalidConfig(format!(
                "unrecognized second-factor method {:?}, expected \"push\" or \"call\"",
                other
            ))),
        }
    }
}

/// Top-level settings file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// IdP login username
    pub username: Option<String>,

    /// IdP login password. Most users should leave this unset and rely on
    /// the interactive prompt.
    pub password: Option<String>,

    /// Second-factor method, "push" or "call"
    pub duo_method: Option<String>,

    /// Name of the SAML identity provider registered in IAM
    pub id_provider: Option<String>,

    /// Requested credential lifetime, in seconds
    pub duration: Option<i32>,

    /// IdP sign-in page that starts the ceremony
    pub login_url: Option<String>,

    /// Named credential request targets
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileSection>,
}

/// One `[profile.NAME]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSection {
    pub account: Option<String>,
    pub role: Option<String>,
    pub id_provider: Option<String>,
    pub duration: Option<i32>,
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults so flags
    /// alone can drive a run.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
            toml::from_str(&content)
                .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Names of all configured profiles, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        self.profile.keys().cloned().collect()
    }

    /// Resolve a named `[profile.NAME]` section into a full [`Profile`].
    ///
    /// Field precedence is explicit flag, then the profile section, then the
    /// top-level key, then the built-in default. Unknown names and profiles
    /// failing validation are configuration errors.
    pub fn resolve_profile(
        &self,
        name: &str,
        id_provider_flag: Option<&str>,
        duration_flag: Option<i32>,
    ) -> Result<Profile> {
        let section = self.profile.get(name).ok_or_else(|| {
            Error::InvalidConfig(format!("unable to find profile {} in config", name))
        })?;

        let profile = Profile {
            name: name.to_string(),
            account: section.account.clone().unwrap_or_default(),
            role: section.role.clone().unwrap_or_default(),
            id_provider: id_provider_flag
                .map(str::to_owned)
                .or_else(|| section.id_provider.clone())
                .or_else(|| self.id_provider.clone())
                .unwrap_or_default(),
            duration_seconds: duration_flag
                .or(section.duration)
                .or(self.duration)
                .unwrap_or(DEFAULT_DURATION_SECONDS),
        };
        profile.validate()?;
        Ok(profile)
    }
}
