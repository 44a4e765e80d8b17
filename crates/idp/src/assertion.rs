//! Final stage: wait for the provider to post the identity assertion back
//! and lift it out of the hidden response field.

use std::time::Duration;

use tracing::debug;

use fedsts_common::{Error, Result, SamlAssertion};

use crate::driver::{PageDriver, PollConfig};

#[derive(Debug, Clone)]
pub struct AssertionSettings {
    /// Hidden field the provider writes the assertion into.
    pub field_selector: String,

    /// Schedule sized for a human approving a push or answering a call,
    /// not for page rendering.
    pub poll: PollConfig,
}

impl Default for AssertionSettings {
    fn default() -> Self {
        Self {
            field_selector: "#saml_response".to_string(),
            poll: PollConfig::new(90, Duration::from_secs(1)),
        }
    }
}

/// Poll for the assertion field and return its value.
///
/// Each probe is one attribute read with its own deadline; waiting for a
/// node that never appears must surface as a timeout here, never as a
/// hung browser call. A field that renders before being populated keeps
/// the poll going, so only a value-bearing field ends the stage.
pub async fn extract_assertion(
    page: &dyn PageDriver,
    settings: &AssertionSettings,
) -> Result<SamlAssertion> {
    for attempt in 0..settings.poll.attempts {
        if let Some(value) = page.attribute(&settings.field_selector, "value").await? {
            if !value.is_empty() {
                debug!("Assertion field populated");
                return Ok(SamlAssertion::new(value));
            }
        }
        if attempt + 1 < settings.poll.attempts {
            tokio::time::sleep(settings.poll.interval).await;
        }
    }

    Err(Error::AssertionTimeout(format!(
        "assertion field did not yield a value within {}s",
        settings.poll.budget().as_secs()
    )))
}
