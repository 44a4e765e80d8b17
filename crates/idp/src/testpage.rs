//! Scripted page and session fakes shared by the stage and ceremony tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use fedsts_common::Result;

use crate::driver::PageDriver;
use crate::session::{Session, SessionLauncher};

/// Declarative description of what the fake page currently shows.
#[derive(Debug, Default, Clone)]
pub(crate) struct PageModel {
    pub title: String,
    /// Selectors with a layout box. Visible implies present.
    pub visible: Vec<String>,
    pub present: Vec<String>,
    /// (selector, rendered text)
    pub texts: Vec<(String, String)>,
    /// (selector, attribute, value)
    pub attrs: Vec<(String, String, String)>,
    /// (frame selector, xpath, probes before the node shows up)
    pub frame_nodes: Vec<(String, String, u32)>,
    /// Model swapped in when a form is submitted.
    pub after_submit: Option<Box<PageModel>>,
}

#[derive(Default)]
struct State {
    model: PageModel,
    navigations: Vec<String>,
    typed: Vec<(String, String)>,
    submits: Vec<String>,
    clicks: Vec<(String, String)>,
    frame_probes: HashMap<(String, String), u32>,
}

pub(crate) struct FakePage {
    state: Mutex<State>,
}

impl FakePage {
    pub fn new(model: PageModel) -> Self {
        Self {
            state: Mutex::new(State {
                model,
                ..State::default()
            }),
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn submits(&self) -> Vec<String> {
        self.state.lock().unwrap().submits.clone()
    }

    pub fn clicks(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().clicks.clone()
    }
}

/// A frame node counts as rendered once it has been probed more times than
/// its configured delay, letting tests model late-appearing UI.
fn frame_node_ready(state: &mut State, frame: &str, xpath: &str) -> bool {
    let key = (frame.to_string(), xpath.to_string());
    let count = state.frame_probes.entry(key).or_insert(0);
    *count += 1;
    let seen = *count;
    state
        .model
        .frame_nodes
        .iter()
        .any(|(f, x, delay)| f == frame && x == xpath && seen > *delay)
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.state.lock().unwrap().navigations.push(url.to_string());
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().model.title.clone())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.model.visible.iter().any(|s| s == selector))
    }

    async fn is_present(&self, selector: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.model.present.iter().any(|s| s == selector)
            || state.model.visible.iter().any(|s| s == selector))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .typed
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn submit(&self, selector: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.submits.push(selector.to_string());
        if let Some(next) = state.model.after_submit.take() {
            state.model = *next;
        }
        Ok(())
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state
            .model
            .texts
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, text)| text.clone())
            .unwrap_or_default())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .model
            .attrs
            .iter()
            .find(|(s, a, _)| s == selector && a == name)
            .map(|(_, _, value)| value.clone()))
    }

    async fn frame_xpath_present(&self, frame_selector: &str, xpath: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(frame_node_ready(&mut state, frame_selector, xpath))
    }

    async fn frame_click_xpath(&self, frame_selector: &str, xpath: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if frame_node_ready(&mut state, frame_selector, xpath) {
            state
                .clicks
                .push((frame_selector.to_string(), xpath.to_string()));
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Session over a shared [`FakePage`], mirroring the real session's
/// take-guard close semantics.
pub(crate) struct FakeSession {
    page: Arc<FakePage>,
    live: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Session for FakeSession {
    fn page(&self) -> &dyn PageDriver {
        &*self.page
    }

    async fn close(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeLauncher {
    page: Arc<FakePage>,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(page: Arc<FakePage>) -> Self {
        Self {
            page,
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            live: true,
            closes: self.closes.clone(),
        }))
    }
}
