//! Creds command: one ceremony, then credentials written per profile.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use fedsts_common::{CredentialExchange, Profile, SamlAssertion, StsExchange};
use fedsts_idp::CeremonyRequest;

use crate::credfile::CredentialsFile;
use crate::resolve::{self, GlobalArgs};

#[derive(Args)]
pub struct CredsArgs {
    /// File to write the credentials to (default is $HOME/.aws/credentials)
    #[arg(long)]
    pub out_file: Option<PathBuf>,

    /// Section name for credentials requested via --account/--role
    #[arg(long, default_value = "saml")]
    pub out_profile: String,
}

pub async fn execute(args: CredsArgs, global: &GlobalArgs) -> Result<()> {
    let settings = resolve::load_settings(global)?;
    let profiles = resolve::creds_profiles(global, &settings, &args.out_profile)?;
    let inputs = resolve::login_inputs(global, &settings)?;

    let out_file = match &args.out_file {
        Some(path) => path.clone(),
        None => fedsts_common::default_credentials_path()?,
    };
    // Probe the out-file before the ceremony; a broken file should not
    // cost the user a push approval.
    let mut out = CredentialsFile::load(&out_file)?;

    let password = resolve::resolve_password(&settings)?;
    let cancel = super::interrupt_token();
    let assertion = super::fetch_assertion(
        CeremonyRequest {
            login_url: inputs.login_url,
            username: inputs.username,
            password,
            method: inputs.method,
        },
        global.debug,
        &cancel,
    )
    .await?;

    println!("Writing credentials to {}.", out_file.display());
    // Ctrl-C still has to work here, after the browser is gone.
    let failed = super::unless_interrupted(&cancel, async {
        let exchange = StsExchange::new().await;
        write_profiles(&exchange, &assertion, &profiles, &mut out).await
    })
    .await?;

    if failed > 0 {
        anyhow::bail!("{} of {} profiles failed", failed, profiles.len());
    }
    Ok(())
}

/// Exchange and write each profile independently; one rejected profile
/// must not abort its siblings. Returns how many failed.
async fn write_profiles(
    exchange: &dyn CredentialExchange,
    assertion: &SamlAssertion,
    profiles: &[Profile],
    out: &mut CredentialsFile,
) -> usize {
    let mut failed = 0;

    for profile in profiles {
        match exchange.exchange(assertion, profile).await {
            Ok(creds) => {
                println!("Received credentials for {}, writing to file.", profile.name);
                out.put_profile(&profile.name, &creds);
                if let Err(e) = out.save() {
                    println!("{}", format!("Problem saving profile: {}", e).yellow());
                }
            }
            Err(e) => {
                eprintln!("{} profile {}: {}", "ERROR:".red().bold(), profile.name, e);
                failed += 1;
            }
        }
    }

    failed
}
