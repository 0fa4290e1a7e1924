//! Singlish translator E2E harness
//!
//! This crate drives a live Singlish→Sinhala translator page in a real
//! browser and checks what it renders:
//! - Loads declarative YAML scenarios (positive, negative, UI)
//! - Controls Playwright through a JSON-lines bridge process
//! - Recovers the translation from visible page text with a script heuristic
//! - Reports an automated outcome and an intent-aware verdict per scenario
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  E2E Harness (Rust)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner<L: PageLauncher>                                │
//! │    ├── target::probe(url)                                   │
//! │    ├── launcher.launch() -> Box<dyn PageDriver>             │
//! │    ├── ScenarioRunner::run(scenario, page) -> Report        │
//! │    │     navigate → fill → settle → snapshot → extract      │
//! │    └── TestSuiteResult::write(output_dir)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── id, title, input, category                           │
//! │    ├── expect: non_empty | exact_match { value }            │
//! │    ├── settle_ms: Option<u64>                               │
//! │    └── interaction: copy_output { button_selector }         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod fixture;
pub mod page;
pub mod playwright;
pub mod report;
pub mod runner;
pub mod spec;
pub mod target;

pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use page::{PageDriver, PageLauncher};
pub use report::{FailureReason, Outcome, ScenarioReport, TestSuiteResult, Verdict};
pub use runner::{ScenarioRunner, TestRunner};
pub use spec::{Category, Expectation, Intent, Scenario, ScenarioFilter};
