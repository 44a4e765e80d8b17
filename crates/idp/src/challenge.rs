//! Second-factor stage: wait for the challenge iframe, then trigger the
//! configured push or call method inside it.

use std::time::Duration;

use tracing::debug;

use fedsts_common::{Error, Result, SecondFactor};

use crate::driver::{poll_until, PageDriver, PollConfig};

/// Locators for the vendor challenge UI. All XPaths are evaluated against
/// the iframe's own document, never the host page.
#[derive(Debug, Clone)]
pub struct ChallengeSettings {
    /// Challenge iframe, addressed from the host document.
    pub frame_selector: String,

    /// Node whose existence means the challenge UI has rendered. The
    /// "remember this device" control appears with the frame content.
    pub ready_marker: String,

    /// Node the vendor renders when it already pushed or dialed on its
    /// own, making a method click redundant.
    pub auto_select_marker: String,

    /// Push method button.
    pub push_button: String,

    /// Call method button.
    pub call_button: String,

    /// Schedule for the frame-ready wait.
    pub frame_poll: PollConfig,

    /// Schedule for the method-button wait. Separate from the frame wait
    /// because multi-device accounts render the frame well before the
    /// buttons.
    pub button_poll: PollConfig,
}

impl ChallengeSettings {
    /// Button locator for a method. The method set is closed, so this
    /// cannot miss.
    pub fn button_xpath(&self, method: SecondFactor) -> &str {
        match method {
            SecondFactor::Push => &self.push_button,
            SecondFactor::Call => &self.call_button,
        }
    }
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            frame_selector: "iframe#duo_iframe".to_string(),
            ready_marker: "//input[@name='dampen_choice']".to_string(),
            auto_select_marker: "//small[@class='used-automatically']".to_string(),
            push_button: "//button[contains(., 'Push')]".to_string(),
            call_button: "//button[contains(., 'Call')]".to_string(),
            frame_poll: PollConfig::new(20, Duration::from_secs(1)),
            button_poll: PollConfig::new(20, Duration::from_secs(1)),
        }
    }
}

/// How the stage finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// The configured method button was found and clicked.
    MethodClicked,
    /// The server triggered its own preferred method; no click sent.
    AutoSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChallengeState {
    WaitingForChallengeFrame,
    MethodResolved,
    Done(ChallengeOutcome),
}

/// Drive the challenge UI until the second factor is triggered.
///
/// Clicking goes through [`PageDriver::frame_click_xpath`], which reports
/// whether a target existed. A miss keeps the poll going instead of
/// advancing, so a button that never renders surfaces as a timeout rather
/// than a silently skipped click.
pub async fn select_method(
    page: &dyn PageDriver,
    settings: &ChallengeSettings,
    method: SecondFactor,
) -> Result<ChallengeOutcome> {
    let frame = settings.frame_selector.as_str();
    let mut state = ChallengeState::WaitingForChallengeFrame;

    loop {
        state = match state {
            ChallengeState::WaitingForChallengeFrame => {
                let marker = settings.ready_marker.as_str();
                let ready =
                    poll_until(&settings.frame_poll, move || {
                        page.frame_xpath_present(frame, marker)
                    })
                    .await?;
                if !ready {
                    return Err(Error::ChallengeTimeout(format!(
                        "challenge frame not ready after {}s",
                        settings.frame_poll.budget().as_secs()
                    )));
                }
                debug!("Challenge frame rendered");
                ChallengeState::MethodResolved
            }

            ChallengeState::MethodResolved => {
                if page
                    .frame_xpath_present(frame, &settings.auto_select_marker)
                    .await?
                {
                    debug!(
                        "Server auto-selected its own second-factor method, \
                         skipping the '{}' click",
                        method
                    );
                    ChallengeState::Done(ChallengeOutcome::AutoSelected)
                } else {
                    let button = settings.button_xpath(method);
                    let clicked =
                        poll_until(&settings.button_poll, move || {
                            page.frame_click_xpath(frame, button)
                        })
                        .await?;
                    if !clicked {
                        return Err(Error::ChallengeTimeout(format!(
                            "'{}' button not found after {}s",
                            method,
                            settings.button_poll.budget().as_secs()
                        )));
                    }
                    debug!("Clicked '{}' method button", method);
                    ChallengeState::Done(ChallengeOutcome::MethodClicked)
                }
            }

            ChallengeState::Done(outcome) => return Ok(outcome),
        };
    }
}
