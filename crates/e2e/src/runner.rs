//! Scenario runner and suite orchestration

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use futures::stream::{self, StreamExt};
use singlish_common::OutputExtractor;
use tracing::{debug, info, warn};

use crate::config::{HarnessConfig, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::page::{LoadState, NavigateOptions, PageDriver, PageLauncher, WaitOptions, WaitUntil};
use crate::report::{FailureReason, Outcome, ScenarioReport, TestSuiteResult};
use crate::spec::{self, Expectation, Interaction, Scenario, ScenarioFilter};

/// Progress of a single scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Navigating,
    InputReady,
    Submitted,
    Settling,
    Extracted,
    Passed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Judge extracted output against an expectation
pub fn evaluate(expect: &Expectation, extracted: &str) -> Outcome {
    match expect {
        Expectation::NonEmpty if extracted.is_empty() => {
            Outcome::failed(FailureReason::ExtractionEmpty)
        }
        Expectation::NonEmpty => Outcome::Passed,
        Expectation::ExactMatch { value } if extracted == value => Outcome::Passed,
        Expectation::ExactMatch { .. } if extracted.is_empty() => {
            Outcome::failed(FailureReason::ExtractionEmpty)
        }
        Expectation::ExactMatch { value } => Outcome::failed(FailureReason::AssertionMismatch {
            expected: value.clone(),
            actual: extracted.to_string(),
        }),
    }
}

/// Drives one scenario against one page
#[derive(Debug)]
pub struct ScenarioRunner {
    extractor: OutputExtractor,
    url: String,
    input_selector: String,
    timeouts: Timeouts,
    default_settle_ms: u64,
}

impl ScenarioRunner {
    pub fn new(config: &HarnessConfig) -> E2eResult<Self> {
        let extractor = OutputExtractor::new(&config.extractor)?;
        Ok(Self::with_extractor(config, extractor))
    }

    /// Use an extractor built elsewhere, e.g. with a custom selection policy
    pub fn with_extractor(config: &HarnessConfig, extractor: OutputExtractor) -> Self {
        Self {
            extractor,
            url: config.target.url.clone(),
            input_selector: config.target.input_selector.clone(),
            timeouts: config.timeouts.clone(),
            default_settle_ms: config.settle.default_ms,
        }
    }

    /// Run a scenario to a report. Never fails: every problem becomes a
    /// failed outcome so sibling scenarios are unaffected.
    pub async fn run(&self, scenario: &Scenario, page: &mut dyn PageDriver) -> ScenarioReport {
        let start = Instant::now();
        let mut state = RunState::NotStarted;
        let mut actual = String::new();

        let outcome = match self.drive(scenario, page, &mut state, &mut actual).await {
            Ok(outcome) => outcome,
            Err(reason) => Outcome::failed(reason),
        };

        let terminal = if outcome.is_passed() {
            RunState::Passed
        } else {
            RunState::Failed
        };
        self.advance(scenario, &mut state, terminal);

        ScenarioReport::new(scenario, actual, outcome, start.elapsed().as_millis() as u64)
    }

    fn advance(&self, scenario: &Scenario, state: &mut RunState, next: RunState) {
        debug!("{}: {} -> {}", scenario.id, state, next);
        *state = next;
    }

    async fn drive(
        &self,
        scenario: &Scenario,
        page: &mut dyn PageDriver,
        state: &mut RunState,
        actual: &mut String,
    ) -> Result<Outcome, FailureReason> {
        self.advance(scenario, state, RunState::Navigating);
        self.load_page(page).await?;

        self.advance(scenario, state, RunState::InputReady);
        let field_visible = self.timeouts.field_visible_ms;
        page.wait_for_selector(&self.input_selector, WaitOptions::visible(field_visible))
            .await
            .map_err(|e| readiness_failure(e, field_visible))?;
        page.fill_field(&self.input_selector, "")
            .await
            .map_err(driver_failure)?;
        page.fill_field(&self.input_selector, &scenario.input)
            .await
            .map_err(driver_failure)?;
        self.advance(scenario, state, RunState::Submitted);

        let settle_ms = scenario.settle_ms.unwrap_or(self.default_settle_ms);
        self.advance(scenario, state, RunState::Settling);
        page.wait_millis(settle_ms).await.map_err(driver_failure)?;

        let snapshot = page.snapshot_visible_text().await.map_err(driver_failure)?;
        *actual = self.extractor.extract(&snapshot);
        self.advance(scenario, state, RunState::Extracted);
        debug!(
            "{}: {} text nodes, extracted {:?}",
            scenario.id,
            snapshot.len(),
            actual
        );

        let outcome = evaluate(&scenario.expect, actual);
        match (&outcome, &scenario.interaction) {
            (Outcome::Passed, Some(interaction)) => self.interact(interaction, page, actual).await,
            _ => Ok(outcome),
        }
    }

    /// Navigate and wait until the input control is usable
    async fn load_page(&self, page: &mut dyn PageDriver) -> Result<(), FailureReason> {
        let navigation = self.timeouts.navigation_ms;
        page.navigate(
            &self.url,
            NavigateOptions {
                timeout_ms: navigation,
                wait_until: WaitUntil::DomContentLoaded,
            },
        )
        .await
        .map_err(|e| readiness_failure(e, navigation))?;

        page.wait_for_load_state(LoadState::NetworkIdle, navigation)
            .await
            .map_err(|e| readiness_failure(e, navigation))?;

        let input_ready = self.timeouts.input_ready_ms;
        page.wait_for_selector(&self.input_selector, WaitOptions::visible(input_ready))
            .await
            .map_err(|e| readiness_failure(e, input_ready))
    }

    async fn interact(
        &self,
        interaction: &Interaction,
        page: &mut dyn PageDriver,
        output: &str,
    ) -> Result<Outcome, FailureReason> {
        match interaction {
            Interaction::CopyOutput { button_selector } => {
                page.click(button_selector, self.timeouts.click_ms)
                    .await
                    .map_err(driver_failure)?;
                let clipboard = page.read_clipboard().await.map_err(driver_failure)?;
                if clipboard == output {
                    Ok(Outcome::Passed)
                } else {
                    Ok(Outcome::failed(FailureReason::ClipboardMismatch {
                        expected: output.to_string(),
                        actual: clipboard,
                    }))
                }
            }
        }
    }
}

fn readiness_failure(error: E2eError, timeout_ms: u64) -> FailureReason {
    if error.is_timeout() {
        FailureReason::NavigationTimeout { timeout_ms }
    } else {
        driver_failure(error)
    }
}

fn driver_failure(error: E2eError) -> FailureReason {
    FailureReason::Driver {
        message: error.to_string(),
    }
}

/// Runs suites of scenarios, one fresh page each
pub struct TestRunner<L> {
    launcher: L,
    runner: ScenarioRunner,
    scenario_timeout: Duration,
    jobs: usize,
}

impl<L: PageLauncher> TestRunner<L> {
    pub fn new(launcher: L, config: &HarnessConfig) -> E2eResult<Self> {
        config.validate()?;
        Ok(Self {
            launcher,
            runner: ScenarioRunner::new(config)?,
            scenario_timeout: config.scenario_timeout(),
            jobs: config.run.jobs,
        })
    }

    pub fn with_runner(launcher: L, runner: ScenarioRunner, config: &HarnessConfig) -> Self {
        Self {
            launcher,
            runner,
            scenario_timeout: config.scenario_timeout(),
            jobs: config.run.jobs.max(1),
        }
    }

    /// Run every scenario under `dir` that passes the filter
    pub async fn run_dir(&self, dir: &Path, filter: &ScenarioFilter) -> E2eResult<TestSuiteResult> {
        let scenarios = filter.apply(spec::load_all(dir)?);
        if scenarios.is_empty() {
            warn!("No scenarios matched in {}", dir.display());
        }
        Ok(self.run_scenarios(&scenarios).await)
    }

    /// Run scenarios, keeping results in declaration order
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> TestSuiteResult {
        let started_at = chrono::Utc::now();
        let start = Instant::now();

        info!("Running {} scenario(s) with {} job(s)...", scenarios.len(), self.jobs);

        let results: Vec<ScenarioReport> = stream::iter(scenarios)
            .map(|scenario| self.run_one(scenario))
            .buffered(self.jobs)
            .collect()
            .await;

        TestSuiteResult::from_reports(started_at, start.elapsed().as_millis() as u64, results)
    }

    /// Run one scenario on its own page under the overall timeout
    pub async fn run_one(&self, scenario: &Scenario) -> ScenarioReport {
        let start = Instant::now();

        let report = match self.launcher.launch().await {
            Ok(mut page) => {
                let result =
                    tokio::time::timeout(self.scenario_timeout, self.runner.run(scenario, page.as_mut()))
                        .await;
                if let Err(e) = page.close().await {
                    warn!("{}: failed to close page: {}", scenario.id, e);
                }
                match result {
                    Ok(report) => report,
                    Err(_) => ScenarioReport::new(
                        scenario,
                        String::new(),
                        Outcome::failed(FailureReason::Timeout {
                            timeout_ms: self.scenario_timeout.as_millis() as u64,
                        }),
                        start.elapsed().as_millis() as u64,
                    ),
                }
            }
            Err(e) => ScenarioReport::new(
                scenario,
                String::new(),
                Outcome::failed(driver_failure(e)),
                start.elapsed().as_millis() as u64,
            ),
        };

        report.log();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(value: &str) -> Expectation {
        Expectation::ExactMatch {
            value: value.to_string(),
        }
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(evaluate(&Expectation::NonEmpty, "මම වැඩක ඉන්නේ"), Outcome::Passed);
        assert_eq!(
            evaluate(&Expectation::NonEmpty, ""),
            Outcome::failed(FailureReason::ExtractionEmpty)
        );
    }

    #[test]
    fn test_exact_match_is_byte_for_byte() {
        assert_eq!(evaluate(&exact("අපි party යනවා "), "අපි party යනවා "), Outcome::Passed);
        // Trailing space in the expectation is significant
        assert_eq!(
            evaluate(&exact("අපි party යනවා "), "අපි party යනවා"),
            Outcome::failed(FailureReason::AssertionMismatch {
                expected: "අපි party යනවා ".to_string(),
                actual: "අපි party යනවා".to_string(),
            })
        );
    }

    #[test]
    fn test_exact_match_with_empty_output() {
        assert_eq!(
            evaluate(&exact("Invalid time format"), ""),
            Outcome::failed(FailureReason::ExtractionEmpty)
        );
    }

    #[test]
    fn test_readiness_failure_mapping() {
        assert_eq!(
            readiness_failure(E2eError::Timeout("textarea".to_string()), 30000),
            FailureReason::NavigationTimeout { timeout_ms: 30000 }
        );
        assert!(matches!(
            readiness_failure(E2eError::Playwright("crashed".to_string()), 30000),
            FailureReason::Driver { .. }
        ));
    }
}
