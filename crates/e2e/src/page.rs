//! Page-driving capability consumed by the scenario runner

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use singlish_common::TextNode;

use crate::error::E2eResult;

/// When navigation counts as finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
    Commit,
}

/// Page load states that can be awaited after navigation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Load,
    DomContentLoaded,
    #[default]
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub timeout_ms: u64,
    pub wait_until: WaitUntil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout_ms: u64,
    pub state: WaitState,
}

impl WaitOptions {
    pub fn visible(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            state: WaitState::Visible,
        }
    }
}

/// One browser page, owned by a single scenario for its whole run.
///
/// Bounded waits that run out must surface as [`E2eError::Timeout`] so the
/// runner can tell a slow target from a broken driver.
///
/// [`E2eError::Timeout`]: crate::error::E2eError::Timeout
#[async_trait]
pub trait PageDriver: Send {
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> E2eResult<()>;

    async fn wait_for_load_state(&mut self, state: LoadState, timeout_ms: u64) -> E2eResult<()>;

    async fn wait_for_selector(&mut self, selector: &str, options: WaitOptions) -> E2eResult<()>;

    /// Replace the value of the first element matching `selector`
    async fn fill_field(&mut self, selector: &str, text: &str) -> E2eResult<()>;

    async fn wait_millis(&mut self, ms: u64) -> E2eResult<()>;

    /// Every text node under `body`, in document order
    async fn snapshot_visible_text(&mut self) -> E2eResult<Vec<TextNode>>;

    async fn click(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()>;

    async fn read_clipboard(&mut self) -> E2eResult<String>;

    /// Release the page and whatever browser backs it
    async fn close(&mut self) -> E2eResult<()>;
}

/// Hands out a fresh, isolated page per scenario
#[async_trait]
pub trait PageLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn PageDriver>>;
}
