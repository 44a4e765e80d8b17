//! First-factor stage: submit the username/password form and classify
//! what the identity provider rendered in response.

use std::time::Duration;

use tracing::debug;

use fedsts_common::{Error, Result};

use crate::driver::{poll_until, PageDriver, PollConfig};

/// Locators and markers for the institution's login page. The page carries
/// no machine-readable outcome, so classification leans on the title and a
/// rejection region; both are data here rather than constants because
/// institutions restyle these pages without notice.
#[derive(Debug, Clone)]
pub struct SigninSettings {
    /// Username input field.
    pub username_selector: String,

    /// Password input field. Its enclosing form is what gets submitted.
    pub password_selector: String,

    /// Title fragment identifying the second-factor page.
    pub success_title_marker: String,

    /// Region the provider renders rejection text into.
    pub reason_selector: String,

    /// Fragment of the rejection text that means the credentials were
    /// refused, as opposed to an informational notice.
    pub failure_marker: String,

    /// Schedule for both the form-visible wait and the outcome poll.
    pub poll: PollConfig,

    /// Pause after submitting, giving the next page a moment to render.
    pub settle: Duration,
}

impl Default for SigninSettings {
    fn default() -> Self {
        Self {
            username_selector: "#username".to_string(),
            password_selector: "#password".to_string(),
            success_title_marker: "Two-Step Login".to_string(),
            reason_selector: "#reason".to_string(),
            failure_marker: "Unable".to_string(),
            poll: PollConfig::new(15, Duration::from_secs(1)),
            settle: Duration::from_secs(1),
        }
    }
}

/// Fill in the login form, submit it and wait for the page to declare an
/// outcome. Success means the second-factor page was reached.
pub async fn submit_credentials(
    page: &dyn PageDriver,
    settings: &SigninSettings,
    username: &str,
    password: &str,
) -> Result<()> {
    let field = settings.username_selector.as_str();
    let visible = poll_until(&settings.poll, move || page.is_visible(field)).await?;
    if !visible {
        return Err(Error::Timeout {
            seconds: settings.poll.budget().as_secs(),
        });
    }

    debug!("Login form ready, submitting credentials");
    page.type_into(&settings.username_selector, username).await?;
    page.type_into(&settings.password_selector, password).await?;
    page.submit(&settings.password_selector).await?;
    tokio::time::sleep(settings.settle).await;

    classify_outcome(page, settings).await
}

/// The provider answers 200 whether the credentials were accepted or not,
/// so the outcome is read from the page itself: the second-factor title
/// means success, the rejection region decides otherwise. A populated
/// region without the failure marker is informational and the ceremony
/// proceeds.
async fn classify_outcome(page: &dyn PageDriver, settings: &SigninSettings) -> Result<()> {
    for attempt in 0..settings.poll.attempts {
        let title = page.title().await?;
        if title.contains(&settings.success_title_marker) {
            debug!("Credentials accepted, second-factor page reached");
            return Ok(());
        }

        if page.is_present(&settings.reason_selector).await? {
            let reason = page.inner_text(&settings.reason_selector).await?;
            if reason.contains(&settings.failure_marker) {
                return Err(Error::LoginRejected);
            }
            debug!("Login page notice: {}", reason.trim());
            return Ok(());
        }

        if attempt + 1 < settings.poll.attempts {
            tokio::time::sleep(settings.poll.interval).await;
        }
    }

    Err(Error::Timeout {
        seconds: settings.poll.budget().as_secs(),
    })
}
