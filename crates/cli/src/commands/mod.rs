//! CLI Commands

pub mod creds;
pub mod exec;
pub mod profiles;

use colored::Colorize;
use tokio_util::sync::CancellationToken;

use fedsts_common::{Error, Result, SamlAssertion};
use fedsts_idp::{
    BrowserSettings, Ceremony, CeremonyRequest, CeremonySettings, ChallengeOutcome,
    ChromeLauncher,
};

/// Cancellation token wired to Ctrl-C for the rest of the process.
///
/// The listener stays alive after the ceremony finishes: an interrupt has
/// to keep working while the STS exchange and credentials write run, not
/// only while the browser is up.
pub(crate) fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });
    cancel
}

/// Race `work` against the interrupt token.
pub(crate) async fn unless_interrupted<T>(
    cancel: &CancellationToken,
    work: impl std::future::Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Interrupted),
        value = work => Ok(value),
    }
}

/// Run the sign-on ceremony with `cancel` wired to browser teardown, so an
/// interrupt never leaves a headless browser behind. A server-side
/// second-factor override surfaces as a warning, not a failure.
pub(crate) async fn fetch_assertion(
    request: CeremonyRequest,
    debug: bool,
    cancel: &CancellationToken,
) -> Result<SamlAssertion> {
    let settings = CeremonySettings {
        browser: BrowserSettings {
            debug,
            ..BrowserSettings::default()
        },
        ..CeremonySettings::default()
    };

    let launcher = ChromeLauncher::new(settings.browser.clone());
    let output = Ceremony::new(settings)
        .run_with(&launcher, &request, cancel.clone())
        .await?;

    if output.challenge == ChallengeOutcome::AutoSelected {
        println!(
            "{}",
            format!(
                "Server auto-selected its own second-factor method, \
                 ignoring configured '{}'",
                request.method
            )
            .yellow()
        );
    }
    Ok(output.assertion)
}
