//! Playwright browser automation
//!
//! Each page is backed by its own `node` process running a small bridge
//! script around Playwright. Requests and responses travel as one JSON
//! object per line over the process's stdin/stdout:
//!
//! ```text
//! -> {"id":3,"op":"fill","selector":"textarea","text":"mama yanavaa"}
//! <- {"id":3,"ok":true,"value":null}
//! <- {"id":4,"ok":false,"kind":"timeout","error":"Timeout 30000ms exceeded."}
//! ```

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use singlish_common::TextNode;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{
    LoadState, NavigateOptions, PageDriver, PageLauncher, WaitOptions, WaitState, WaitUntil,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Grant clipboard read/write to the page (Chromium only)
    pub clipboard: bool,

    /// `node` executable
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,

    /// How long the browser may take to come up
    pub launch_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            clipboard: true,
            node_binary: PathBuf::from("node"),
            project_dir: PathBuf::from("."),
            launch_timeout: Duration::from_secs(60),
        }
    }
}

/// Launches one Playwright-backed page per scenario
#[derive(Debug, Clone)]
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        // Verify playwright is installed
        Self::check_playwright_installed(&config)?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Build the bridge script for this configuration
    pub fn build_script(&self) -> String {
        let mut script = format!(
            r#"
const pw = require(require.resolve('playwright', {{ paths: [process.cwd()] }}));
const browserType = pw.{browser};
const launchOptions = {{ headless: {headless} }};
const contextOptions = {{ viewport: {{ width: {width}, height: {height} }} }};
const grantClipboard = {clipboard};
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
            clipboard = self.config.clipboard,
        );
        script.push_str(BRIDGE_BODY);
        script
    }
}

#[async_trait]
impl PageLauncher for PlaywrightHandle {
    async fn launch(&self) -> E2eResult<Box<dyn PageDriver>> {
        let page = PlaywrightPage::spawn(&self.config, &self.build_script()).await?;
        Ok(Box::new(page))
    }
}

/// Request/response loop of the bridge. Expects `browserType`,
/// `launchOptions`, `contextOptions` and `grantClipboard` to be defined.
const BRIDGE_BODY: &str = r#"
const readline = require('readline');

const send = (message) => process.stdout.write(JSON.stringify(message) + '\n');

const snapshotText = () => {
  const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
  const nodes = [];
  let node;
  while ((node = walker.nextNode())) {
    nodes.push({ content: node.textContent || '', ordinal: nodes.length });
  }
  return nodes;
};

(async () => {
  const browser = await browserType.launch(launchOptions);
  const context = await browser.newContext(contextOptions);
  if (grantClipboard) {
    await context.grantPermissions(['clipboard-read', 'clipboard-write']).catch(() => {});
  }
  const page = await context.newPage();

  const handlers = {
    navigate: (r) => page.goto(r.url, { waitUntil: r.wait_until, timeout: r.timeout_ms }),
    wait_for_load_state: (r) => page.waitForLoadState(r.state, { timeout: r.timeout_ms }),
    wait_for_selector: (r) => page.waitForSelector(r.selector, { state: r.state, timeout: r.timeout_ms }),
    fill: (r) => page.locator(r.selector).first().fill(r.text),
    wait: (r) => page.waitForTimeout(r.ms),
    snapshot: () => page.evaluate(snapshotText),
    click: (r) => page.locator(r.selector).first().click({ timeout: r.timeout_ms }),
    read_clipboard: () => page.evaluate(() => navigator.clipboard.readText()),
  };

  send({ ready: true });

  const lines = readline.createInterface({ input: process.stdin });
  for await (const line of lines) {
    if (!line.trim()) continue;
    let request;
    try {
      request = JSON.parse(line);
    } catch (error) {
      send({ id: null, ok: false, kind: 'protocol', error: error.message });
      continue;
    }
    if (request.op === 'close') {
      send({ id: request.id, ok: true, value: null });
      break;
    }
    const handler = handlers[request.op];
    if (!handler) {
      send({ id: request.id, ok: false, kind: 'protocol', error: `unknown op ${request.op}` });
      continue;
    }
    try {
      const value = await handler(request);
      // Handles and responses are not serializable; only data goes back
      const opaque = value === undefined || (value !== null && typeof value === 'object' && !Array.isArray(value));
      send({ id: request.id, ok: true, value: opaque ? null : value });
    } catch (error) {
      const kind = error.name === 'TimeoutError' ? 'timeout' : 'error';
      send({ id: request.id, ok: false, kind, error: error.message });
    }
  }

  await browser.close();
})().catch((error) => {
  process.stderr.write(`${error.stack || error}\n`);
  process.exit(1);
});
"#;

/// Operations understood by the bridge
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeOp<'a> {
    Navigate {
        url: &'a str,
        wait_until: WaitUntil,
        timeout_ms: u64,
    },
    WaitForLoadState {
        state: LoadState,
        timeout_ms: u64,
    },
    WaitForSelector {
        selector: &'a str,
        state: WaitState,
        timeout_ms: u64,
    },
    Fill {
        selector: &'a str,
        text: &'a str,
    },
    Wait {
        ms: u64,
    },
    Snapshot,
    Click {
        selector: &'a str,
        timeout_ms: u64,
    },
    ReadClipboard,
    Close,
}

impl BridgeOp<'_> {
    fn name(&self) -> String {
        match self {
            BridgeOp::Navigate { url, .. } => format!("navigate:{}", url),
            BridgeOp::WaitForLoadState { state, .. } => format!("load_state:{:?}", state),
            BridgeOp::WaitForSelector { selector, .. } => format!("wait:{}", selector),
            BridgeOp::Fill { selector, .. } => format!("fill:{}", selector),
            BridgeOp::Wait { ms } => format!("sleep:{}ms", ms),
            BridgeOp::Snapshot => "snapshot".to_string(),
            BridgeOp::Click { selector, .. } => format!("click:{}", selector),
            BridgeOp::ReadClipboard => "read_clipboard".to_string(),
            BridgeOp::Close => "close".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    op: BridgeOp<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BridgeReady {
    ready: bool,
}

/// A browser page driven through a bridge process
pub struct PlaywrightPage {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    closed: bool,
    // Holds the bridge script for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightPage {
    /// Start a bridge process and wait until its browser is up
    pub async fn spawn(config: &PlaywrightConfig, script: &str) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, script)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .current_dir(&config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!(
                    "Failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright_bridge", "{}", line);
                }
            });
        }

        let mut page = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            closed: false,
            _script_dir: script_dir,
        };

        let ready = tokio::time::timeout(config.launch_timeout, page.wait_ready()).await;
        match ready {
            Ok(Ok(())) => {
                info!("Launched {} (pid: {:?})", config.browser.as_str(), page.child.id());
                Ok(page)
            }
            Ok(Err(e)) => {
                page.stop().await;
                Err(e)
            }
            Err(_) => {
                page.stop().await;
                Err(E2eError::Timeout(format!(
                    "browser launch ({} s)",
                    config.launch_timeout.as_secs()
                )))
            }
        }
    }

    async fn wait_ready(&mut self) -> E2eResult<()> {
        let line = self.stdout.next_line().await?.ok_or_else(|| {
            E2eError::Playwright("bridge exited before the browser launched".to_string())
        })?;
        let ready: BridgeReady = serde_json::from_str(&line)?;
        if ready.ready {
            Ok(())
        } else {
            Err(E2eError::Playwright(format!("unexpected bridge greeting: {}", line)))
        }
    }

    /// Send one request and wait for its response
    async fn request(&mut self, op: BridgeOp<'_>) -> E2eResult<serde_json::Value> {
        if self.closed {
            return Err(E2eError::Playwright("page already closed".to_string()));
        }

        let id = self.next_id;
        self.next_id += 1;
        let name = op.name();

        let mut line = serde_json::to_string(&BridgeRequest { id, op })?;
        line.push('\n');
        debug!("-> [{}] {}", id, name);
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let line = self.stdout.next_line().await?.ok_or_else(|| {
                E2eError::Playwright(format!("bridge exited during {}", name))
            })?;
            let response: BridgeResponse = match serde_json::from_str(&line) {
                Ok(response) => response,
                Err(_) => {
                    // Playwright or page console noise on stdout
                    debug!("<- (ignored) {}", line);
                    continue;
                }
            };

            // Responses to requests abandoned by an earlier timeout
            if response.id.is_some_and(|r| r < id) {
                debug!("<- stale response {:?}", response.id);
                continue;
            }

            debug!("<- [{}] ok={}", id, response.ok);
            if response.ok {
                return Ok(response.value);
            }

            let message = response.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(match response.kind.as_deref() {
                Some("timeout") => E2eError::Timeout(format!("{}: {}", name, message)),
                _ => E2eError::Playwright(format!("{}: {}", name, message)),
            });
        }
    }

    /// Tear the bridge down, politely first
    async fn stop(&mut self) {
        if let Some(pid) = self.child.id() {
            debug!("Stopping Playwright bridge (pid: {})", pid);

            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    let _ = tokio::time::timeout(Duration::from_millis(500), self.child.wait()).await;
                }
            }
        }

        // Force kill if still running
        let _ = self.child.kill().await;
        self.closed = true;
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> E2eResult<()> {
        self.request(BridgeOp::Navigate {
            url,
            wait_until: options.wait_until,
            timeout_ms: options.timeout_ms,
        })
        .await
        .map(drop)
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout_ms: u64) -> E2eResult<()> {
        self.request(BridgeOp::WaitForLoadState { state, timeout_ms })
            .await
            .map(drop)
    }

    async fn wait_for_selector(&mut self, selector: &str, options: WaitOptions) -> E2eResult<()> {
        self.request(BridgeOp::WaitForSelector {
            selector,
            state: options.state,
            timeout_ms: options.timeout_ms,
        })
        .await
        .map(drop)
    }

    async fn fill_field(&mut self, selector: &str, text: &str) -> E2eResult<()> {
        self.request(BridgeOp::Fill { selector, text }).await.map(drop)
    }

    async fn wait_millis(&mut self, ms: u64) -> E2eResult<()> {
        self.request(BridgeOp::Wait { ms }).await.map(drop)
    }

    async fn snapshot_visible_text(&mut self) -> E2eResult<Vec<TextNode>> {
        let value = self.request(BridgeOp::Snapshot).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()> {
        self.request(BridgeOp::Click {
            selector,
            timeout_ms,
        })
        .await
        .map(drop)
    }

    async fn read_clipboard(&mut self) -> E2eResult<String> {
        let value = self.request(BridgeOp::ReadClipboard).await?;
        match value {
            serde_json::Value::String(text) => Ok(text),
            serde_json::Value::Null => Ok(String::new()),
            other => Err(E2eError::Playwright(format!(
                "clipboard returned non-text value: {}",
                other
            ))),
        }
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }

        let graceful =
            tokio::time::timeout(Duration::from_secs(5), self.request(BridgeOp::Close)).await;
        if matches!(graceful, Ok(Ok(_))) {
            // Let the bridge finish closing its browser before signalling
            if let Ok(Ok(status)) =
                tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await
            {
                debug!("Playwright bridge exited: {}", status);
                self.closed = true;
                return Ok(());
            }
        } else {
            warn!("Playwright bridge did not close cleanly");
        }

        self.stop().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(config: PlaywrightConfig) -> PlaywrightHandle {
        PlaywrightHandle { config }
    }

    #[test]
    fn test_script_header_reflects_config() {
        let script = handle(PlaywrightConfig {
            browser: Browser::Firefox,
            headless: false,
            viewport_width: 1920,
            viewport_height: 1080,
            clipboard: false,
            ..Default::default()
        })
        .build_script();

        assert!(script.contains("const browserType = pw.firefox;"));
        assert!(script.contains("headless: false"));
        assert!(script.contains("width: 1920, height: 1080"));
        assert!(script.contains("const grantClipboard = false;"));
        assert!(script.contains("createTreeWalker(document.body, NodeFilter.SHOW_TEXT)"));
    }

    #[test]
    fn test_request_wire_format() {
        let request = BridgeRequest {
            id: 7,
            op: BridgeOp::Navigate {
                url: "https://www.swifttranslator.com/",
                wait_until: WaitUntil::DomContentLoaded,
                timeout_ms: 60000,
            },
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "op": "navigate",
                "url": "https://www.swifttranslator.com/",
                "wait_until": "domcontentloaded",
                "timeout_ms": 60000
            })
        );

        let json = serde_json::to_value(BridgeRequest {
            id: 8,
            op: BridgeOp::WaitForSelector {
                selector: "textarea",
                state: WaitState::Visible,
                timeout_ms: 30000,
            },
        })
        .unwrap();
        assert_eq!(json["op"], "wait_for_selector");
        assert_eq!(json["state"], "visible");

        let json = serde_json::to_value(BridgeRequest { id: 9, op: BridgeOp::Snapshot }).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 9, "op": "snapshot" }));
    }

    #[test]
    fn test_response_parsing() {
        let ok: BridgeResponse = serde_json::from_str(
            r#"{"id":3,"ok":true,"value":[{"content":"අපි","ordinal":0}]}"#,
        )
        .unwrap();
        assert!(ok.ok);
        let nodes: Vec<TextNode> = serde_json::from_value(ok.value).unwrap();
        assert_eq!(nodes, vec![TextNode::new("අපි", 0)]);

        let timeout: BridgeResponse = serde_json::from_str(
            r#"{"id":4,"ok":false,"kind":"timeout","error":"Timeout 30000ms exceeded."}"#,
        )
        .unwrap();
        assert!(!timeout.ok);
        assert_eq!(timeout.kind.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("webkit".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("netscape".parse::<Browser>().is_err());
    }

    // Scripted bridge run by `sh` in place of node
    const SCRIPTED_BRIDGE: &str = r#"
echo '{"ready":true}'
read line
echo 'playwright: console noise'
echo '{"id":0,"ok":true,"value":null}'
echo '{"id":1,"ok":false,"kind":"timeout","error":"Timeout 60000ms exceeded."}'
read line
echo '{"id":2,"ok":false,"kind":"error","error":"element is not attached"}'
read line
echo '{"id":3,"ok":true,"value":[{"content":" අපි ","ordinal":0}]}'
read line
echo '{"id":4,"ok":true,"value":null}'
"#;

    fn shell_config() -> PlaywrightConfig {
        PlaywrightConfig {
            node_binary: PathBuf::from("sh"),
            launch_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bridge_protocol_mapping() {
        let mut page = PlaywrightPage::spawn(&shell_config(), SCRIPTED_BRIDGE)
            .await
            .unwrap();

        // Noise and the stale id 0 are skipped before the timeout answer
        let err = page
            .navigate(
                "https://www.swifttranslator.com/",
                NavigateOptions {
                    timeout_ms: 60000,
                    wait_until: WaitUntil::DomContentLoaded,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {}", err);

        let err = page.fill_field("textarea", "mama").await.unwrap_err();
        assert!(matches!(err, E2eError::Playwright(ref m) if m.contains("element is not attached")));

        let nodes = page.snapshot_visible_text().await.unwrap();
        assert_eq!(nodes, vec![TextNode::new(" අපි ", 0)]);

        page.close().await.unwrap();
        assert!(page.closed);
        assert!(page.child.try_wait().unwrap().is_some());
        assert!(page.snapshot_visible_text().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bridge_exit_mid_request() {
        let script = "echo '{\"ready\":true}'\nread line\nexit 0\n";
        let mut page = PlaywrightPage::spawn(&shell_config(), script).await.unwrap();

        let err = page.wait_millis(10).await.unwrap_err();
        assert!(matches!(err, E2eError::Playwright(ref m) if m.contains("bridge exited during sleep:10ms")));

        page.close().await.unwrap();
        assert!(page.child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bridge_exit_before_ready() {
        let err = PlaywrightPage::spawn(&shell_config(), "exit 1\n")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, E2eError::Playwright(ref m) if m.contains("before the browser launched")));
    }
}
