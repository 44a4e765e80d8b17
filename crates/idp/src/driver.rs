//! Page capability surface for the ceremony stages.
//!
//! Stages drive the browser exclusively through [`PageDriver`], a narrow
//! set of single-round-trip operations. Waiting is never hidden inside the
//! driver: stages poll with [`poll_until`] under an explicit [`PollConfig`]
//! so bounds and intervals stay visible and tests can shrink them to near
//! zero.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fedsts_common::Result;

/// Bounded retry schedule for a polling wait.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Total time the schedule can spend sleeping, for timeout messages.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts
    }
}

/// Narrow browser surface the ceremony stages drive.
///
/// Every method is one round trip with its own deadline. The frame-scoped
/// methods address the second-factor iframe, which is cross-origin and only
/// reachable because the browser launches with web security disabled.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current document title, empty when the page has none.
    async fn title(&self) -> Result<String>;

    /// Whether the element exists and has a non-empty layout box.
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Whether the element exists at all, visible or not.
    async fn is_present(&self, selector: &str) -> Result<bool>;

    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;

    /// Submit the form containing the element.
    async fn submit(&self, selector: &str) -> Result<()>;

    /// Rendered text of the element, empty when absent.
    async fn inner_text(&self, selector: &str) -> Result<String>;

    /// Attribute value, `None` when the element or attribute is missing.
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Whether an XPath matches inside the named iframe's document.
    async fn frame_xpath_present(&self, frame_selector: &str, xpath: &str) -> Result<bool>;

    /// Click the first XPath match inside the named iframe's document.
    /// Returns whether a target existed; a miss is a no-op, not an error.
    async fn frame_click_xpath(&self, frame_selector: &str, xpath: &str) -> Result<bool>;
}

/// Run `probe` until it reports true or the schedule is exhausted.
/// Returns whether the condition was observed in time. Sleeps between
/// probes, never after the last one.
pub async fn poll_until<F, Fut>(poll: &PollConfig, mut probe: F) -> Result<bool>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool>> + Send,
{
    for attempt in 0..poll.attempts {
        if probe().await? {
            return Ok(true);
        }
        if attempt + 1 < poll.attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }
    Ok(false)
}
