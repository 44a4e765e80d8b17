//! AWS credentials file writer.
//!
//! Edits `~/.aws/credentials` (or any INI file) in place: the targeted
//! profile sections are replaced wholesale, every other section passes
//! through untouched.

use std::path::{Path, PathBuf};

use ini::Ini;

use fedsts_common::{Error, Result, StsCredentials};

pub struct CredentialsFile {
    path: PathBuf,
    ini: Ini,
}

impl CredentialsFile {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        let ini = if path.exists() {
            Ini::load_from_file(path).map_err(|e| {
                Error::CredentialsFile(format!("{}: {}", path.display(), e))
            })?
        } else {
            Ini::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            ini,
        })
    }

    /// Replace the named section with exactly the credential keys.
    /// Deleting first drops any stale keys a previous writer left behind.
    pub fn put_profile(&mut self, name: &str, creds: &StsCredentials) {
        self.ini.delete(Some(name));
        self.ini
            .with_section(Some(name))
            .set("aws_access_key_id", creds.access_key_id.as_str())
            .set("aws_secret_access_key", creds.secret_access_key.as_str())
            .set("aws_session_token", creds.session_token.as_str())
            // legacy name some SDKs still read
            .set("aws_security_token", creds.session_token.as_str());
    }

    /// Write the file back. Called after every profile so earlier results
    /// survive a later failure.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.ini.write_to_file(&self.path).map_err(|e| {
            Error::CredentialsFile(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}
