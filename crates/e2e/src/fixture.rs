//! In-process page fixture
//!
//! Renders canned text nodes for known inputs so the runner can be
//! exercised without a browser or network. Every call is recorded in a
//! log shared with the launcher.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use singlish_common::TextNode;

use crate::error::{E2eError, E2eResult};
use crate::page::{LoadState, NavigateOptions, PageDriver, PageLauncher, WaitOptions};

/// How the fixture responds to navigation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FixtureNavigation {
    #[default]
    Ok,
    /// Report a bounded-wait timeout
    Timeout,
    /// Never answer
    Hang,
}

/// Description of the page the fixture pretends to be
#[derive(Debug, Clone)]
pub struct FixtureSite {
    pub input_selector: String,
    /// Text rendered above the result
    pub header: Vec<String>,
    /// Text rendered below the result
    pub footer: Vec<String>,
    /// Result nodes rendered for each submitted input
    pub responses: HashMap<String, Vec<String>>,
    pub navigation: FixtureNavigation,
    /// Control that copies the output to the clipboard
    pub copy_selector: Option<String>,
    /// Clipboard content after a copy, instead of the rendered output
    pub clipboard_override: Option<String>,
    /// Time after a fill before the result shows up
    pub render_delay_ms: u64,
}

impl FixtureSite {
    pub fn new(input_selector: impl Into<String>) -> Self {
        Self {
            input_selector: input_selector.into(),
            header: Vec::new(),
            footer: Vec::new(),
            responses: HashMap::new(),
            navigation: FixtureNavigation::Ok,
            copy_selector: None,
            clipboard_override: None,
            render_delay_ms: 0,
        }
    }

    /// A layout like the public translator: bilingual controls around a
    /// result panel.
    pub fn translator_layout() -> Self {
        let mut site = Self::new("textarea");
        site.header = vec![
            "Singlish".to_string(),
            "Sinhala".to_string(),
            "Swap භාෂා මාරු කරන්න".to_string(),
            "Undo අහෝසි කරන්න".to_string(),
        ];
        site.footer = vec![
            "Touchpad ස්පර්ශක පුවරුව".to_string(),
            "Copy".to_string(),
        ];
        site
    }

    pub fn respond<I, S>(mut self, input: impl Into<String>, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses
            .insert(input.into(), nodes.into_iter().map(Into::into).collect());
        self
    }
}

/// Shared log of page calls, in order
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Launches fixture pages for a site
#[derive(Debug, Clone)]
pub struct FixtureLauncher {
    site: Arc<FixtureSite>,
    log: CallLog,
    fail_launch: bool,
}

impl FixtureLauncher {
    pub fn new(site: FixtureSite) -> Self {
        Self {
            site: Arc::new(site),
            log: Arc::new(Mutex::new(Vec::new())),
            fail_launch: false,
        }
    }

    /// Launcher whose pages never come up
    pub fn failing(site: FixtureSite) -> Self {
        Self {
            fail_launch: true,
            ..Self::new(site)
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl PageLauncher for FixtureLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn PageDriver>> {
        self.log.lock().push("launch".to_string());
        if self.fail_launch {
            return Err(E2eError::Playwright("fixture browser refused to start".to_string()));
        }
        Ok(Box::new(FixturePage::new(self.site.clone(), self.log.clone())))
    }
}

/// One fixture page
#[derive(Debug)]
pub struct FixturePage {
    site: Arc<FixtureSite>,
    log: CallLog,
    loaded: bool,
    value: String,
    waited_since_fill_ms: u64,
    clipboard: String,
    closed: bool,
}

impl FixturePage {
    pub fn new(site: Arc<FixtureSite>, log: CallLog) -> Self {
        Self {
            site,
            log,
            loaded: false,
            value: String::new(),
            waited_since_fill_ms: 0,
            clipboard: String::new(),
            closed: false,
        }
    }

    fn record(&self, call: String) {
        self.log.lock().push(call);
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.closed {
            return Err(E2eError::Playwright("page already closed".to_string()));
        }
        Ok(())
    }

    fn rendered_output(&self) -> &[String] {
        if self.waited_since_fill_ms < self.site.render_delay_ms {
            return &[];
        }
        self.site
            .responses
            .get(&self.value)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl PageDriver for FixturePage {
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("navigate:{}", url));
        match self.site.navigation {
            FixtureNavigation::Ok => {
                self.loaded = true;
                Ok(())
            }
            FixtureNavigation::Timeout => Err(E2eError::Timeout(format!(
                "navigate:{}: Timeout {}ms exceeded.",
                url, options.timeout_ms
            ))),
            FixtureNavigation::Hang => std::future::pending().await,
        }
    }

    async fn wait_for_load_state(&mut self, state: LoadState, _timeout_ms: u64) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("load_state:{:?}", state));
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, options: WaitOptions) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("wait:{}", selector));
        if self.loaded && selector == self.site.input_selector {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!(
                "wait:{}: Timeout {}ms exceeded.",
                selector, options.timeout_ms
            )))
        }
    }

    async fn fill_field(&mut self, selector: &str, text: &str) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("fill:{}:{}", selector, text));
        if selector != self.site.input_selector {
            return Err(E2eError::Playwright(format!("no element matches {}", selector)));
        }
        self.value = text.to_string();
        self.waited_since_fill_ms = 0;
        Ok(())
    }

    async fn wait_millis(&mut self, ms: u64) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("sleep:{}ms", ms));
        tokio::time::sleep(Duration::from_millis(ms)).await;
        self.waited_since_fill_ms += ms;
        Ok(())
    }

    async fn snapshot_visible_text(&mut self) -> E2eResult<Vec<TextNode>> {
        self.ensure_open()?;
        self.record("snapshot".to_string());
        let texts = self
            .site
            .header
            .iter()
            .chain(self.rendered_output())
            .chain(self.site.footer.iter());
        Ok(TextNode::sequence(texts.cloned()))
    }

    async fn click(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()> {
        self.ensure_open()?;
        self.record(format!("click:{}", selector));
        if self.site.copy_selector.as_deref() != Some(selector) {
            return Err(E2eError::Timeout(format!(
                "click:{}: Timeout {}ms exceeded.",
                selector, timeout_ms
            )));
        }
        self.clipboard = match &self.site.clipboard_override {
            Some(text) => text.clone(),
            None => self
                .rendered_output()
                .last()
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
        };
        Ok(())
    }

    async fn read_clipboard(&mut self) -> E2eResult<String> {
        self.ensure_open()?;
        self.record("read_clipboard".to_string());
        Ok(self.clipboard.clone())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.record("close".to_string());
        self.closed = true;
        Ok(())
    }
}
