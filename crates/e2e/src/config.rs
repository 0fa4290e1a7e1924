//! Harness configuration
//!
//! Loaded from an optional TOML file; every field has a default so an
//! empty (or missing) file describes the public translator page.
//!
//! ```toml
//! [target]
//! url = "https://www.swifttranslator.com/"
//! input_selector = "textarea"
//!
//! [settle]
//! default_ms = 3000
//!
//! [extractor]
//! exclusions = ["Undo", "Redo", "Touchpad", "Swap"]
//! selection = "last"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use singlish_common::ExtractorConfig;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub target: TargetConfig,
    pub timeouts: Timeouts,
    pub settle: SettleConfig,
    pub extractor: ExtractorConfig,
    pub browser: BrowserConfig,
    pub run: RunConfig,
}

/// The page under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub url: String,

    /// The page's primary text input
    pub input_selector: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "https://www.swifttranslator.com/".to_string(),
            input_selector: "textarea".to_string(),
        }
    }
}

/// Timeout settings in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Page load, including the network going idle
    pub navigation_ms: u64,

    /// Input control attached and visible after load
    pub input_ready_ms: u64,

    /// Input control visible right before filling
    pub field_visible_ms: u64,

    /// Copy control click
    pub click_ms: u64,

    /// Whole scenario, from launch to verdict
    pub scenario_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 60_000,
            input_ready_ms: 30_000,
            field_visible_ms: 10_000,
            click_ms: 5_000,
            scenario_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Wait after filling before the output is read
    pub default_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self { default_ms: 3_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,

    pub launch_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let playwright = PlaywrightConfig::default();
        Self {
            kind: playwright.browser,
            headless: playwright.headless,
            viewport_width: playwright.viewport_width,
            viewport_height: playwright.viewport_height,
            node_binary: playwright.node_binary,
            project_dir: playwright.project_dir,
            launch_timeout_ms: playwright.launch_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Scenarios in flight at once, each on its own browser
    pub jobs: usize,

    /// Probe the target over HTTP before launching browsers
    pub preflight: bool,

    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            preflight: true,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults if absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.target.url.is_empty() {
            return Err(E2eError::Config("target.url is empty".to_string()));
        }
        if self.target.input_selector.is_empty() {
            return Err(E2eError::Config("target.input_selector is empty".to_string()));
        }
        if self.run.jobs == 0 {
            return Err(E2eError::Config("run.jobs must be at least 1".to_string()));
        }
        if self.timeouts.scenario_ms == 0 {
            return Err(E2eError::Config("timeouts.scenario_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.scenario_ms)
    }

    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            browser: self.browser.kind,
            headless: self.browser.headless,
            viewport_width: self.browser.viewport_width,
            viewport_height: self.browser.viewport_height,
            clipboard: true,
            node_binary: self.browser.node_binary.clone(),
            project_dir: self.browser.project_dir.clone(),
            launch_timeout: Duration::from_millis(self.browser.launch_timeout_ms),
        }
    }
}

/// Command-line values layered over the file configuration
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub settle_ms: Option<u64>,
    pub jobs: Option<usize>,
    pub browser: Option<Browser>,
    pub headless: Option<bool>,
    pub skip_preflight: bool,
    pub output_dir: Option<PathBuf>,
}

impl Overrides {
    /// Apply every value that was given; absent ones keep the file setting
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.url {
            config.target.url = url.clone();
        }
        if let Some(ms) = self.settle_ms {
            config.settle.default_ms = ms;
        }
        if let Some(jobs) = self.jobs {
            config.run.jobs = jobs;
        }
        if let Some(browser) = self.browser {
            config.browser.kind = browser;
        }
        if let Some(headless) = self.headless {
            config.browser.headless = headless;
        }
        if self.skip_preflight {
            config.run.preflight = false;
        }
        if let Some(output_dir) = &self.output_dir {
            config.run.output_dir = output_dir.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use singlish_common::Selection;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = HarnessConfig::from_toml("").unwrap();
        assert_eq!(config.target.url, "https://www.swifttranslator.com/");
        assert_eq!(config.target.input_selector, "textarea");
        assert_eq!(config.settle.default_ms, 3000);
        assert_eq!(config.timeouts.navigation_ms, 60_000);
        assert_eq!(config.extractor, ExtractorConfig::default());
        assert_eq!(config.run.jobs, 1);
    }

    #[test]
    fn test_partial_override() {
        let config = HarnessConfig::from_toml(
            r#"
[target]
url = "http://127.0.0.1:8080/"

[settle]
default_ms = 500

[extractor]
exclusions = ["Clear"]
selection = "first"

[browser]
kind = "firefox"
headless = false

[run]
jobs = 4
"#,
        )
        .unwrap();

        assert_eq!(config.target.url, "http://127.0.0.1:8080/");
        assert_eq!(config.target.input_selector, "textarea");
        assert_eq!(config.settle.default_ms, 500);
        assert_eq!(config.extractor.exclusions, vec!["Clear"]);
        assert_eq!(config.extractor.selection, Selection::First);
        assert_eq!(config.extractor.max_length, 300);
        assert_eq!(config.playwright().browser, Browser::Firefox);
        assert!(!config.playwright().headless);
        assert_eq!(config.run.jobs, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(HarnessConfig::from_toml("[run]\njobs = 0\n").is_err());
        assert!(HarnessConfig::from_toml("[target]\nurl = \"\"\n").is_err());
        assert!(HarnessConfig::from_toml("[settle]\ndefault_ms = \"soon\"\n").is_err());
    }

    #[test]
    fn test_overrides_layer_over_file() {
        let mut config = HarnessConfig::from_toml(
            "[settle]\ndefault_ms = 500\n\n[run]\njobs = 4\noutput_dir = \"out\"\n",
        )
        .unwrap();

        Overrides {
            url: Some("http://127.0.0.1:8080/".to_string()),
            settle_ms: Some(4000),
            browser: Some(Browser::Firefox),
            headless: Some(false),
            skip_preflight: true,
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.target.url, "http://127.0.0.1:8080/");
        assert_eq!(config.settle.default_ms, 4000);
        assert_eq!(config.browser.kind, Browser::Firefox);
        assert!(!config.browser.headless);
        assert!(!config.run.preflight);
        // Values not given on the command line keep the file's
        assert_eq!(config.run.jobs, 4);
        assert_eq!(config.run.output_dir, PathBuf::from("out"));
        assert_eq!(config.target.input_selector, "textarea");
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let mut config = HarnessConfig::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config.target.url, HarnessConfig::default().target.url);
        assert!(config.run.preflight);
        assert_eq!(config.settle.default_ms, 3000);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("harness.toml")).unwrap();
        assert_eq!(config.timeouts.scenario_ms, 120_000);
    }
}
