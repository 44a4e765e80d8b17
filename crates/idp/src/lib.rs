//! Automated federated sign-on ceremony against an institutional identity
//! provider.
//!
//! One call to [`Ceremony::run`] drives a headless browser through the
//! full ceremony: load the login page, submit the first-factor
//! credentials, trigger the push or call second factor inside the vendor
//! iframe, then wait for the provider to post the identity assertion back
//! and lift it out of the page. The output is the assertion plus how the
//! second-factor stage resolved; callers exchange the assertion for
//! temporary credentials themselves.
//!
//! The browser session is acquired and released exactly once per ceremony,
//! on every exit path. Interrupts and the overall deadline race the stage
//! sequence through `tokio::select!`, and teardown runs after the race no
//! matter which side won.

pub mod assertion;
pub mod challenge;
pub mod driver;
pub mod session;
pub mod signin;

#[cfg(test)]
pub(crate) mod testpage;

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use fedsts_common::{Error, Result, SamlAssertion, SecondFactor};

pub use crate::assertion::AssertionSettings;
pub use crate::challenge::{ChallengeOutcome, ChallengeSettings};
pub use crate::driver::{PageDriver, PollConfig};
pub use crate::session::{
    BrowserSettings, ChromeLauncher, ChromeSession, Session, SessionLauncher,
};
pub use crate::signin::SigninSettings;

/// Everything one ceremony run needs besides the stage inputs.
#[derive(Debug, Clone)]
pub struct CeremonySettings {
    pub browser: BrowserSettings,
    pub signin: SigninSettings,
    pub challenge: ChallengeSettings,
    pub assertion: AssertionSettings,

    /// Hard ceiling on the whole ceremony, stages included. The browser
    /// is torn down when it elapses.
    pub overall_deadline: Duration,
}

impl Default for CeremonySettings {
    fn default() -> Self {
        Self {
            browser: BrowserSettings::default(),
            signin: SigninSettings::default(),
            challenge: ChallengeSettings::default(),
            assertion: AssertionSettings::default(),
            overall_deadline: Duration::from_secs(120),
        }
    }
}

/// Inputs for one ceremony run, immutable once built.
#[derive(Clone)]
pub struct CeremonyRequest {
    /// Identity provider login page.
    pub login_url: String,
    pub username: String,
    pub password: String,
    pub method: SecondFactor,
}

impl fmt::Debug for CeremonyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CeremonyRequest")
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("method", &self.method)
            .finish()
    }
}

/// What a completed ceremony produced.
#[derive(Debug, Clone)]
pub struct CeremonyOutput {
    pub assertion: SamlAssertion,

    /// How the second-factor stage resolved. Callers surface a warning
    /// when the server overrode the configured method.
    pub challenge: ChallengeOutcome,
}

/// Sequences the ceremony stages over one browser session.
pub struct Ceremony {
    settings: CeremonySettings,
}

impl Ceremony {
    pub fn new(settings: CeremonySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CeremonySettings {
        &self.settings
    }

    /// Run the full ceremony and return the extracted assertion.
    pub async fn run(
        &self,
        launcher: &dyn SessionLauncher,
        request: &CeremonyRequest,
    ) -> Result<CeremonyOutput> {
        self.run_with(launcher, request, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), with an external cancellation token.
    /// Cancelling mid-ceremony tears the browser down and yields
    /// [`Error::Interrupted`].
    pub async fn run_with(
        &self,
        launcher: &dyn SessionLauncher,
        request: &CeremonyRequest,
        cancel: CancellationToken,
    ) -> Result<CeremonyOutput> {
        validate_request(request)?;

        let mut session = launcher.launch().await?;
        let deadline = self.settings.overall_deadline;
        let outcome = tokio::select! {
            result = self.run_stages(session.page(), request) => result,
            _ = cancel.cancelled() => Err(Error::Interrupted),
            _ = tokio::time::sleep(deadline) => Err(Error::Timeout {
                seconds: deadline.as_secs(),
            }),
        };
        session.close().await;
        outcome
    }

    async fn run_stages(
        &self,
        page: &dyn PageDriver,
        request: &CeremonyRequest,
    ) -> Result<CeremonyOutput> {
        info!("Fetching identity provider login page");
        page.navigate(&request.login_url).await?;

        info!("Submitting username and password");
        signin::submit_credentials(
            page,
            &self.settings.signin,
            &request.username,
            &request.password,
        )
        .await?;

        info!("Triggering second-factor method '{}'", request.method);
        let challenge =
            challenge::select_method(page, &self.settings.challenge, request.method).await?;

        info!("Waiting for approval and the identity assertion");
        let assertion = assertion::extract_assertion(page, &self.settings.assertion).await?;
        Ok(CeremonyOutput {
            assertion,
            challenge,
        })
    }
}

/// Reject unusable requests before any browser process spawns.
fn validate_request(request: &CeremonyRequest) -> Result<()> {
    if request.login_url.is_empty() {
        return Err(Error::InvalidConfig(
            "login URL must not be empty".to_string(),
        ));
    }
    if request.username.is_empty() {
        return Err(Error::InvalidConfig(
            "username must not be empty".to_string(),
        ));
    }
    if request.password.is_empty() {
        return Err(Error::InvalidConfig(
            "password must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testpage::{FakeLauncher, FakePage, PageModel};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn fast_settings() -> CeremonySettings {
        CeremonySettings {
            signin: SigninSettings {
                poll: PollConfig::new(3, Duration::ZERO),
                settle: Duration::ZERO,
                ..SigninSettings::default()
            },
            challenge: ChallengeSettings {
                frame_poll: PollConfig::new(3, Duration::ZERO),
                button_poll: PollConfig::new(3, Duration::ZERO),
                ..ChallengeSettings::default()
            },
            assertion: AssertionSettings {
                poll: PollConfig::new(3, Duration::ZERO),
                ..AssertionSettings::default()
            },
            overall_deadline: Duration::from_secs(5),
            ..CeremonySettings::default()
        }
    }

    fn request() -> CeremonyRequest {
        CeremonyRequest {
            login_url: "https://idp.example.edu/login".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            method: SecondFactor::Push,
        }
    }

    /// Login page whose submit leads straight to a ready challenge frame
    /// and a populated assertion field.
    fn happy_model(settings: &CeremonySettings) -> PageModel {
        PageModel {
            title: "Institution Login".to_string(),
            visible: vec![settings.signin.username_selector.clone()],
            after_submit: Some(Box::new(PageModel {
                title: "Institution Two-Step Login".to_string(),
                frame_nodes: vec![
                    (
                        settings.challenge.frame_selector.clone(),
                        settings.challenge.ready_marker.clone(),
                        0,
                    ),
                    (
                        settings.challenge.frame_selector.clone(),
                        settings.challenge.push_button.clone(),
                        0,
                    ),
                ],
                attrs: vec![(
                    settings.assertion.field_selector.clone(),
                    "value".to_string(),
                    "c2FtbC1hc3NlcnRpb24=".to_string(),
                )],
                ..PageModel::default()
            })),
            ..PageModel::default()
        }
    }

    #[tokio::test]
    async fn full_ceremony_yields_assertion_and_closes_once() {
        let settings = fast_settings();
        let page = Arc::new(FakePage::new(happy_model(&settings)));
        let launcher = FakeLauncher::new(page.clone());

        let output = Ceremony::new(settings)
            .run(&launcher, &request())
            .await
            .unwrap();

        assert_eq!(output.assertion.as_str(), "c2FtbC1hc3NlcnRpb24=");
        assert_eq!(output.challenge, ChallengeOutcome::MethodClicked);
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
        assert_eq!(
            page.navigations(),
            vec!["https://idp.example.edu/login".to_string()]
        );
        assert_eq!(page.clicks().len(), 1);
    }

    #[tokio::test]
    async fn login_rejection_still_closes_the_session() {
        let settings = fast_settings();
        let page = Arc::new(FakePage::new(PageModel {
            title: "Institution Login".to_string(),
            visible: vec![settings.signin.username_selector.clone()],
            after_submit: Some(Box::new(PageModel {
                title: "Institution Login".to_string(),
                present: vec![settings.signin.reason_selector.clone()],
                texts: vec![(
                    settings.signin.reason_selector.clone(),
                    "Unable to log in.".to_string(),
                )],
                ..PageModel::default()
            })),
            ..PageModel::default()
        }));
        let launcher = FakeLauncher::new(page);

        let err = Ceremony::new(settings)
            .run(&launcher, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LoginRejected));
        assert_eq!(launcher.closes(), 1);
    }

    /// Model that keeps the assertion stage polling forever.
    fn stalled_model(settings: &CeremonySettings) -> PageModel {
        PageModel {
            title: "Institution Login".to_string(),
            visible: vec![settings.signin.username_selector.clone()],
            after_submit: Some(Box::new(PageModel {
                title: "Institution Two-Step Login".to_string(),
                frame_nodes: vec![
                    (
                        settings.challenge.frame_selector.clone(),
                        settings.challenge.ready_marker.clone(),
                        0,
                    ),
                    (
                        settings.challenge.frame_selector.clone(),
                        settings.challenge.push_button.clone(),
                        0,
                    ),
                ],
                ..PageModel::default()
            })),
            ..PageModel::default()
        }
    }

    #[tokio::test]
    async fn interrupt_mid_ceremony_closes_the_session() {
        let mut settings = fast_settings();
        settings.assertion.poll = PollConfig::new(10_000, Duration::from_millis(10));
        let page = Arc::new(FakePage::new(stalled_model(&settings)));
        let launcher = FakeLauncher::new(page);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = Ceremony::new(settings)
            .run_with(&launcher, &request(), cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Interrupted));
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn overall_deadline_bounds_the_ceremony() {
        let mut settings = fast_settings();
        settings.assertion.poll = PollConfig::new(10_000, Duration::from_millis(10));
        settings.overall_deadline = Duration::from_millis(50);
        let page = Arc::new(FakePage::new(stalled_model(&settings)));
        let launcher = FakeLauncher::new(page);

        let err = Ceremony::new(settings)
            .run(&launcher, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn second_close_is_a_noop() {
        let settings = fast_settings();
        let page = Arc::new(FakePage::new(happy_model(&settings)));
        let launcher = FakeLauncher::new(page);

        let mut session = launcher.launch().await.unwrap();
        session.close().await;
        session.close().await;

        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn empty_password_fails_before_launch() {
        let settings = fast_settings();
        let page = Arc::new(FakePage::new(happy_model(&settings)));
        let launcher = FakeLauncher::new(page);

        let mut bad = request();
        bad.password = String::new();
        let err = Ceremony::new(settings)
            .run(&launcher, &bad)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn launch_failure_propagates() {
        struct FailingLauncher;

        #[async_trait]
        impl SessionLauncher for FailingLauncher {
            async fn launch(&self) -> Result<Box<dyn Session>> {
                Err(Error::BrowserStartup("no usable browser found".to_string()))
            }
        }

        let err = Ceremony::new(fast_settings())
            .run(&FailingLauncher, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BrowserStartup(_)));
    }

    #[test]
    fn request_debug_redacts_the_password() {
        let rendered = format!("{:?}", request());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("\"p\""));
    }
}
