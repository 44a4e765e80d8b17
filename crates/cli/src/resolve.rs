//! Flag and config resolution.
//!
//! Flags, environment variables and the settings file all feed the same
//! run, so every subcommand funnels through here to get finished values.
//! Precedence is always flag over config file over built-in default, and
//! everything is rejected or resolved before any browser process spawns.

use std::path::PathBuf;

use dialoguer::Password;

use fedsts_common::profile::DEFAULT_DURATION_SECONDS;
use fedsts_common::{Error, Profile, Result, SecondFactor, Settings};

/// Flags shared by every subcommand.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default is $HOME/.fedsts.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Username for the IdP login
    #[arg(long, env = "FEDSTS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Second-factor method to trigger (push or call)
    #[arg(long, env = "FEDSTS_DUO_METHOD", global = true)]
    pub duo_method: Option<SecondFactor>,

    /// Account number of the role
    #[arg(long, global = true)]
    pub account: Option<String>,

    /// Name of the role
    #[arg(long, global = true)]
    pub role: Option<String>,

    /// Requested duration of the credentials, in seconds
    #[arg(long, global = true)]
    pub duration: Option<i32>,

    /// Name of the identity provider registered in IAM
    #[arg(long, env = "FEDSTS_ID_PROVIDER", global = true)]
    pub id_provider: Option<String>,

    /// IdP sign-in page that starts the ceremony
    #[arg(long, env = "FEDSTS_LOGIN_URL", global = true)]
    pub login_url: Option<String>,

    /// Profiles to fetch credentials for
    #[arg(long, value_delimiter = ',', global = true)]
    pub profiles: Vec<String>,

    /// Single profile to fetch credentials for
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Verbose logging plus browser diagnostics
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Ceremony inputs shared by every subcommand.
#[derive(Debug, Clone)]
pub struct LoginInputs {
    pub username: String,
    pub login_url: String,
    pub method: SecondFactor,
}

/// Load the settings file named by `--config`, or the default path. The
/// default path may be absent; an explicitly named file must exist.
pub fn load_settings(args: &GlobalArgs) -> Result<Settings> {
    match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(Error::InvalidConfig(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            tracing::debug!("Loading config file {}", path.display());
            Settings::load(path)
        }
        None => Settings::load(&fedsts_common::default_config_path()?),
    }
}

/// Reject flag combinations that can never produce a runnable request.
fn validate_flags(args: &GlobalArgs) -> Result<()> {
    let has_profiles = !args.profiles.is_empty() || args.profile.is_some();

    if !has_profiles && args.account.is_none() {
        return Err(Error::InvalidConfig(
            "must use --profiles or --account/--role".to_string(),
        ));
    }
    if has_profiles && (args.account.is_some() || args.role.is_some()) {
        return Err(Error::InvalidConfig(
            "cannot use --profiles and --account/--role together".to_string(),
        ));
    }
    if args.account.is_some() && args.role.is_none() {
        return Err(Error::InvalidConfig(
            "--account and --role must be used together".to_string(),
        ));
    }
    Ok(())
}

/// All profile names requested on the command line, `--profile` appended
/// to `--profiles`.
fn requested_names(args: &GlobalArgs) -> Vec<String> {
    let mut names = args.profiles.clone();
    if let Some(name) = &args.profile {
        names.push(name.clone());
    }
    names
}

/// Build the ad-hoc profile described by `--account`/`--role`, filling the
/// remaining fields from flags and the config file.
fn flag_profile(args: &GlobalArgs, settings: &Settings, name: &str) -> Result<Profile> {
    let profile = Profile {
        name: name.to_string(),
        account: args.account.clone().unwrap_or_default(),
        role: args.role.clone().unwrap_or_default(),
        id_provider: args
            .id_provider
            .clone()
            .or_else(|| settings.id_provider.clone())
            .unwrap_or_default(),
        duration_seconds: args
            .duration
            .or(settings.duration)
            .unwrap_or(DEFAULT_DURATION_SECONDS),
    };
    profile.validate()?;
    Ok(profile)
}

/// Resolve the profiles a creds run targets. With no named profiles the
/// ad-hoc flag profile is used, written under `fallback_name`.
pub fn creds_profiles(
    args: &GlobalArgs,
    settings: &Settings,
    fallback_name: &str,
) -> Result<Vec<Profile>> {
    validate_flags(args)?;

    let names = requested_names(args);
    if names.is_empty() {
        return Ok(vec![flag_profile(args, settings, fallback_name)?]);
    }
    names
        .iter()
        .map(|name| settings.resolve_profile(name, args.id_provider.as_deref(), args.duration))
        .collect()
}

/// Resolve the single profile an exec run targets. The ad-hoc flag profile
/// is named `account/role` so the subprocess environment identifies it.
pub fn exec_profile(args: &GlobalArgs, settings: &Settings) -> Result<Profile> {
    validate_flags(args)?;

    let names = requested_names(args);
    match names.len() {
        0 => {
            let name = format!(
                "{}/{}",
                args.account.as_deref().unwrap_or_default(),
                args.role.as_deref().unwrap_or_default()
            );
            flag_profile(args, settings, &name)
        }
        1 => settings.resolve_profile(&names[0], args.id_provider.as_deref(), args.duration),
        _ => Err(Error::InvalidConfig(
            "exec can only use a single --profile".to_string(),
        )),
    }
}

/// Resolve the login identity the ceremony runs as.
pub fn login_inputs(args: &GlobalArgs, settings: &Settings) -> Result<LoginInputs> {
    let username = args
        .username
        .clone()
        .or_else(|| settings.username.clone())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::InvalidConfig(
                "username must be set via --username flag or config file".to_string(),
            )
        })?;

    let login_url = args
        .login_url
        .clone()
        .or_else(|| settings.login_url.clone())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::InvalidConfig(
                "login_url must be set via --login-url flag or config file".to_string(),
            )
        })?;

    let method = match args.duo_method {
        Some(method) => method,
        None => match &settings.duo_method {
            Some(raw) => raw.parse()?,
            None => SecondFactor::default(),
        },
    };

    Ok(LoginInputs {
        username,
        login_url,
        method,
    })
}

/// Password source order: environment, config file, masked prompt. There
/// is deliberately no flag, so the password cannot end up in shell history
/// or process listings.
pub fn resolve_password(settings: &Settings) -> Result<String> {
    if let Ok(password) = std::env::var("FEDSTS_PASSWORD") {
        if !password.is_empty() {
            return Ok(password);
        }
    }

    if let Some(password) = &settings.password {
        if !password.is_empty() {
            return Ok(password.clone());
        }
    }

    let password = Password::new()
        .with_prompt("Password")
        .allow_empty_password(true)
        .interact()
        .map_err(|e| Error::InvalidConfig(format!("could not read password: {}", e)))?;
    if password.is_empty() {
        return Err(Error::InvalidConfig("must enter a password".to_string()));
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        toml::from_str(
            r#"
            username = "ab123"
            id_provider = "uni_idp"
            login_url = "https://signin.example.edu"
            duo_method = "call"

            [profile.dev]
            account = "123456789012"
            role = "shib-dev"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn rejects_flag_run_without_profiles_or_account() {
        let err = creds_profiles(&GlobalArgs::default(), &settings(), "saml").unwrap_err();
        assert!(err.to_string().contains("--profiles or --account/--role"));
    }

    #[test]
    fn rejects_profiles_mixed_with_account() {
        let args = GlobalArgs {
            profiles: vec!["dev".to_string()],
            account: Some("123456789012".to_string()),
            ..GlobalArgs::default()
        };
        let err = creds_profiles(&args, &settings(), "saml").unwrap_err();
        assert!(err.to_string().contains("together"));
    }

    #[test]
    fn rejects_account_without_role() {
        let args = GlobalArgs {
            account: Some("123456789012".to_string()),
            ..GlobalArgs::default()
        };
        let err = creds_profiles(&args, &settings(), "saml").unwrap_err();
        assert!(err.to_string().contains("--account and --role"));
    }

    #[test]
    fn flag_profile_takes_fallback_name_and_config_provider() {
        let args = GlobalArgs {
            account: Some("999999999999".to_string()),
            role: Some("Admin".to_string()),
            ..GlobalArgs::default()
        };
        let profiles = creds_profiles(&args, &settings(), "saml").unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "saml");
        assert_eq!(profiles[0].id_provider, "uni_idp");
        assert_eq!(profiles[0].duration_seconds, DEFAULT_DURATION_SECONDS);
    }

    #[test]
    fn profile_flag_appends_to_profiles() {
        let args = GlobalArgs {
            profiles: vec!["dev".to_string()],
            profile: Some("dev".to_string()),
            ..GlobalArgs::default()
        };
        let profiles = creds_profiles(&args, &settings(), "saml").unwrap();
        assert_eq!(profiles.len(), 2);
    }

    #[test]
    fn exec_rejects_multiple_profiles() {
        let args = GlobalArgs {
            profiles: vec!["dev".to_string(), "prod".to_string()],
            ..GlobalArgs::default()
        };
        let err = exec_profile(&args, &settings()).unwrap_err();
        assert!(err.to_string().contains("single"));
    }

    #[test]
    fn exec_flag_profile_is_named_account_slash_role() {
        let args = GlobalArgs {
            account: Some("123456789012".to_string()),
            role: Some("Admin".to_string()),
            ..GlobalArgs::default()
        };
        let profile = exec_profile(&args, &settings()).unwrap();
        assert_eq!(profile.name, "123456789012/Admin");
    }

    #[test]
    fn login_inputs_prefer_flags_over_config() {
        let args = GlobalArgs {
            username: Some("cd456".to_string()),
            duo_method: Some(SecondFactor::Push),
            ..GlobalArgs::default()
        };
        let inputs = login_inputs(&args, &settings()).unwrap();
        assert_eq!(inputs.username, "cd456");
        assert_eq!(inputs.method, SecondFactor::Push);
        assert_eq!(inputs.login_url, "https://signin.example.edu");
    }

    #[test]
    fn login_inputs_fall_back_to_config_method() {
        let inputs = login_inputs(&GlobalArgs::default(), &settings()).unwrap();
        assert_eq!(inputs.method, SecondFactor::Call);
    }

    #[test]
    fn login_inputs_require_a_username() {
        let mut bare = settings();
        bare.username = None;
        let err = login_inputs(&GlobalArgs::default(), &bare).unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn login_inputs_require_a_login_url() {
        let mut bare = settings();
        bare.login_url = None;
        let err = login_inputs(&GlobalArgs::default(), &bare).unwrap_err();
        assert!(err.to_string().contains("login_url"));
    }

    #[test]
    fn config_password_skips_the_prompt() {
        let mut with_password = settings();
        with_password.password = Some("hunter2".to_string());
        assert_eq!(resolve_password(&with_password).unwrap(), "hunter2");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let args = GlobalArgs {
            config: Some(PathBuf::from("/nonexistent/fedsts.toml")),
            ..GlobalArgs::default()
        };
        let err = load_settings(&args).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
