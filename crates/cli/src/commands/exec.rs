//! Exec command: run a subprocess with fresh credentials in its
//! environment.

use std::process::ExitStatus;

use anyhow::{Context, Result};
use clap::Args;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};

use fedsts_common::{CredentialExchange, Error, StsCredentials, StsExchange};
use fedsts_idp::CeremonyRequest;

use crate::resolve::{self, GlobalArgs};

/// Environment variables scrubbed before injecting fresh credentials, so
/// profile selectors from the parent shell cannot shadow them.
const SCRUBBED_ENV: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_CREDENTIAL_FILE",
    "AWS_DEFAULT_PROFILE",
    "AWS_PROFILE",
];

#[derive(Args)]
pub struct ExecArgs {
    /// Command to run with the credentials; defaults to $SHELL
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

pub async fn execute(args: ExecArgs, global: &GlobalArgs) -> Result<()> {
    let settings = resolve::load_settings(global)?;
    let profile = resolve::exec_profile(global, &settings)?;
    let inputs = resolve::login_inputs(global, &settings)?;
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

    // Ctrl-C still has to work during the exchange; once the child is
    // spawned, supervise() takes over signal handling.
    let creds = super::unless_interrupted(&cancel, async {
        let exchange = StsExchange::new().await;
        exchange.exchange(&assertion, &profile).await
    })
    .await??;

    println!(
        "Received credentials for {}, spawning sub-command.",
        profile.name
    );

    let (program, rest) = child_command(&args.command)?;
    let mut command = Command::new(&program);
    command.args(rest);
    apply_credentials_env(&mut command, &creds, &profile.name);

    let child = command
        .spawn()
        .with_context(|| format!("could not start {}", program))?;
    let status = supervise(child).await?;
    std::process::exit(exit_code(status));
}

/// Split the trailing arguments into program and arguments, falling back
/// to the user's shell when none were given.
fn child_command(args: &[String]) -> fedsts_common::Result<(String, &[String])> {
    match args.split_first() {
        Some((program, rest)) => Ok((program.clone(), rest)),
        None => {
            let shell = std::env::var("SHELL").map_err(|_| {
                Error::InvalidConfig("no command given and SHELL is not set".to_string())
            })?;
            Ok((shell, &[]))
        }
    }
}

/// Scrub credential-related variables inherited from the parent, then
/// inject the fresh set plus the profile name.
fn apply_credentials_env(command: &mut Command, creds: &StsCredentials, profile_name: &str) {
    for key in SCRUBBED_ENV {
        command.env_remove(key);
    }
    command.env("AWS_ACCESS_KEY_ID", &creds.access_key_id);
    command.env("AWS_SECRET_ACCESS_KEY", &creds.secret_access_key);
    command.env("AWS_SESSION_TOKEN", &creds.session_token);
    // legacy name some SDKs still read
    command.env("AWS_SECURITY_TOKEN", &creds.session_token);
    command.env("FEDSTS_PROFILE", profile_name);
}

/// Wait for the child while forwarding interrupt and terminate signals to
/// it, so Ctrl-C reaches the subprocess instead of killing the wrapper
/// around it.
async fn supervise(mut child: Child) -> std::io::Result<ExitStatus> {
    let pid = child.id();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            status = child.wait() => return status,
            _ = sigint.recv() => forward(pid, Signal::SIGINT),
            _ = sigterm.recv() => forward(pid, Signal::SIGTERM),
        }
    }
}

fn forward(pid: Option<u32>, sig: Signal) {
    if let Some(pid) = pid {
        // failure here means the child is already gone
        let _ = kill(Pid::from_raw(pid as i32), sig);
    }
}

/// Shell convention: the child's exit code, or 128 plus the signal number
/// when it was signal-killed.
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}
