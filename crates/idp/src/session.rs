//! Browser session lifecycle and the CDP-backed page driver.
//!
//! One headless Chrome process per ceremony, no pooling. The session owns
//! the browser handle and the CDP event pump; stages only ever see the
//! [`PageDriver`] surface. Closing is idempotent and must also succeed when
//! the browser already died underneath us.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use fedsts_common::{Error, Result};

use crate::driver::PageDriver;

/// Chrome launch knobs.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit Chrome binary; auto-detected when unset.
    pub chrome_binary: Option<PathBuf>,

    /// Show a browser window instead of running headless. Useful when the
    /// IdP changes its pages and the locators need re-deriving.
    pub headful: bool,

    /// Deadline applied to each individual CDP call.
    pub call_timeout: Duration,

    /// Surface CDP handler diagnostics.
    pub debug: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_binary: None,
            headful: false,
            call_timeout: Duration::from_secs(10),
            debug: false,
        }
    }
}

/// Launch seam so ceremony tests can substitute a scripted session.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Session>>;
}

/// One live browser session.
#[async_trait]
pub trait Session: Send + Sync {
    fn page(&self) -> &dyn PageDriver;

    /// Tear the session down. Safe to call more than once and safe when the
    /// browser process is already gone.
    async fn close(&mut self);
}

/// Launches one Chrome process per ceremony.
pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        let session = ChromeSession::launch(&self.settings).await?;
        Ok(Box::new(session))
    }
}

/// A running Chrome plus the task draining its CDP event stream.
pub struct ChromeSession {
    browser: Option<Browser>,
    handler_task: JoinHandle<()>,
    page: CdpPage,
}

impl ChromeSession {
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let config = browser_config(settings)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::BrowserStartup(e.to_string()))?;

        let debug_events = settings.debug;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    if debug_events {
                        warn!("CDP handler stopped: {}", e);
                    }
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(Error::BrowserStartup(e.to_string()));
            }
        };

        debug!("Browser session started");
        Ok(Self {
            browser: Some(browser),
            handler_task,
            page: CdpPage::new(page, settings.call_timeout),
        })
    }
}

#[async_trait]
impl Session for ChromeSession {
    fn page(&self) -> &dyn PageDriver {
        &self.page
    }

    async fn close(&mut self) {
        let mut browser = match self.browser.take() {
            Some(browser) => browser,
            None => return,
        };
        debug!("Closing browser session");
        if let Err(e) = browser.close().await {
            // already-dead browsers are fine, the process is what matters
            debug!("Browser close: {}", e);
        }
        let _ = browser.wait().await;
        self.handler_task.abort();
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // close() normally ran already and took the browser; dropping the
        // remaining Browser handle kills the process on the panic path.
        if self.browser.is_some() {
            warn!("Browser session dropped without close");
        }
        self.handler_task.abort();
    }
}

fn browser_config(settings: &BrowserSettings) -> Result<BrowserConfig> {
    // The challenge iframe is served cross-origin; frame-scoped queries
    // only work with web security disabled.
    let mut builder = BrowserConfig::builder()
        .window_size(1280, 1024)
        .no_sandbox()
        .arg("--disable-web-security")
        .arg("--no-first-run")
        .arg("--no-default-browser-check");

    if settings.headful {
        builder = builder.with_head();
    }
    if let Some(path) = &settings.chrome_binary {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(Error::BrowserStartup)
}

/// CDP implementation of the page surface. Each call carries its own
/// deadline so a wedged renderer cannot hang the ceremony.
pub struct CdpPage {
    page: Page,
    call_timeout: Duration,
}

impl CdpPage {
    fn new(page: Page, call_timeout: Duration) -> Self {
        Self { page, call_timeout }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = chromiumoxide::error::Result<T>> + Send,
        T: Send,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::Browser(format!("{}: {}", what, e))),
            Err(_) => Err(Error::Timeout {
                seconds: self.call_timeout.as_secs(),
            }),
        }
    }

    async fn eval_json(&self, what: &str, script: String) -> Result<serde_json::Value> {
        let result = self.bounded(what, self.page.evaluate(script)).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.bounded("navigate", async {
            self.page.goto(url).await.map(|_| ())
        })
        .await
    }

    async fn title(&self) -> Result<String> {
        let title = self.bounded("read title", self.page.get_title()).await?;
        Ok(title.unwrap_or_default())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }})()"#,
            sel = js_string(selector),
        );
        let value = self.eval_json("visibility probe", script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_present(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "document.querySelector({}) !== null",
            js_string(selector)
        );
        let value = self.eval_json("presence probe", script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .bounded("find field", self.page.find_element(selector))
            .await?;
        self.bounded("focus field", element.click()).await?;
        self.bounded("type text", element.type_str(text)).await?;
        Ok(())
    }

    async fn submit(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({sel});
                if (!el || !el.form) return false;
                el.form.submit();
                return true;
            }})()"#,
            sel = js_string(selector),
        );
        let value = self.eval_json("submit form", script).await?;
        if value.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(Error::Browser(format!("no form to submit at {}", selector)))
        }
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({sel});
                return el ? el.innerText : "";
            }})()"#,
            sel = js_string(selector),
        );
        let value = self.eval_json("read text", script).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({sel});
                return el ? el.getAttribute({name}) : null;
            }})()"#,
            sel = js_string(selector),
            name = js_string(name),
        );
        let value = self.eval_json("read attribute", script).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn frame_xpath_present(&self, frame_selector: &str, xpath: &str) -> Result<bool> {
        let script = frame_script(frame_selector, xpath, false);
        let value = self.eval_json("frame probe", script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn frame_click_xpath(&self, frame_selector: &str, xpath: &str) -> Result<bool> {
        let script = frame_script(frame_selector, xpath, true);
        let value = self.eval_json("frame click", script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

/// Resolve an XPath inside the named iframe's document, optionally clicking
/// the first match. Yields false rather than throwing when the frame or the
/// node is missing, so callers can keep polling.
fn frame_script(frame_selector: &str, xpath: &str, click: bool) -> String {
    format!(
        r#"(function() {{
            const frame = document.querySelector({frame});
            if (!frame || !frame.contentWindow) return false;
            let doc;
            try {{ doc = frame.contentWindow.document; }} catch (e) {{ return false; }}
            const node = doc.evaluate({xpath}, doc, null,
                XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            if (!node) return false;
            {action}
            return true;
        }})()"#,
        frame = js_string(frame_selector),
        xpath = js_string(xpath),
        action = if click { "node.click();" } else { "" },
    )
}

/// Quote a value as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
