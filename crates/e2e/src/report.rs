//! Scenario outcomes, verdicts and suite results

use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::E2eResult;
use crate::spec::{Category, Intent, Scenario};

/// Why a scenario failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The page or its input control did not come up in time
    NavigationTimeout { timeout_ms: u64 },
    /// No translation was visible
    ExtractionEmpty,
    AssertionMismatch { expected: String, actual: String },
    ClipboardMismatch { expected: String, actual: String },
    /// The whole scenario ran past its bound
    Timeout { timeout_ms: u64 },
    /// The browser or bridge failed
    Driver { message: String },
}

impl FailureReason {
    /// Failures that say nothing about the translator itself
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            FailureReason::NavigationTimeout { .. }
                | FailureReason::Timeout { .. }
                | FailureReason::Driver { .. }
        )
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NavigationTimeout { timeout_ms } => {
                write!(f, "page not ready within {} ms", timeout_ms)
            }
            FailureReason::ExtractionEmpty => write!(f, "no translation output found"),
            FailureReason::AssertionMismatch { expected, actual } => {
                write!(f, "expected {:?}, got {:?}", expected, actual)
            }
            FailureReason::ClipboardMismatch { expected, actual } => {
                write!(f, "clipboard held {:?}, output was {:?}", actual, expected)
            }
            FailureReason::Timeout { timeout_ms } => {
                write!(f, "scenario timed out after {} ms", timeout_ms)
            }
            FailureReason::Driver { message } => write!(f, "driver error: {}", message),
        }
    }
}

/// Automated result of one scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { reason: FailureReason },
}

impl Outcome {
    pub fn failed(reason: FailureReason) -> Self {
        Outcome::Failed { reason }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { reason } => Some(reason),
        }
    }
}

/// What the outcome means for a human reviewer, given the intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Behaved as a correct translator should
    Conforms,
    /// A scenario expected to pass did not
    Regression,
    /// Malformed input did not produce the "perfect" output
    InvalidInputDetected,
    /// Malformed input produced exactly the asserted output
    InvalidInputAccepted,
    /// The harness could not judge the service
    Inconclusive,
}

impl Verdict {
    pub fn judge(intent: Intent, outcome: &Outcome) -> Self {
        match (intent, outcome.reason()) {
            (_, Some(reason)) if reason.is_infrastructure() => Verdict::Inconclusive,
            (Intent::ExpectPass, None) => Verdict::Conforms,
            (Intent::ExpectPass, Some(_)) => Verdict::Regression,
            (Intent::ExpectMismatch, None) => Verdict::InvalidInputAccepted,
            (Intent::ExpectMismatch, Some(_)) => Verdict::InvalidInputDetected,
        }
    }

    /// Whether the reviewer's expectation was met
    pub fn as_intended(self) -> bool {
        matches!(self, Verdict::Conforms | Verdict::InvalidInputDetected)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::Conforms => "conforms",
            Verdict::Regression => "regression",
            Verdict::InvalidInputDetected => "invalid input detected (expected failure)",
            Verdict::InvalidInputAccepted => "invalid input accepted",
            Verdict::Inconclusive => "inconclusive",
        };
        f.write_str(text)
    }
}

/// Everything reported about one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub intent: Intent,
    pub input: String,
    /// `None` for non-empty checks
    pub expected: Option<String>,
    /// Extracted output, reported whether or not the scenario passed
    pub actual: String,
    pub outcome: Outcome,
    pub verdict: Verdict,
    pub duration_ms: u64,
}

impl ScenarioReport {
    pub fn new(scenario: &Scenario, actual: String, outcome: Outcome, duration_ms: u64) -> Self {
        let intent = scenario.intent();
        Self {
            id: scenario.id.clone(),
            title: scenario.title.clone(),
            category: scenario.category,
            intent,
            input: scenario.input.clone(),
            expected: scenario.expect.expected_value().map(String::from),
            actual,
            verdict: Verdict::judge(intent, &outcome),
            outcome,
            duration_ms,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_passed()
    }

    /// Log the report line for this scenario
    pub fn log(&self) {
        let expected = self.expected.as_deref().unwrap_or("<non-empty>");
        match &self.outcome {
            Outcome::Passed => info!(
                "✓ {} [{}] ({} ms) actual={:?} - {}",
                self.id, self.category, self.duration_ms, self.actual, self.verdict
            ),
            Outcome::Failed { reason } => error!(
                "✗ {} [{}] ({} ms) expected={:?} actual={:?} - {} - {}",
                self.id, self.category, self.duration_ms, expected, self.actual, reason, self.verdict
            ),
        }
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Scenarios whose verdict matched their documented intent
    pub as_intended: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

impl TestSuiteResult {
    pub fn from_reports(
        started_at: chrono::DateTime<chrono::Utc>,
        duration_ms: u64,
        results: Vec<ScenarioReport>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            started_at: started_at.to_rfc3339(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            as_intended: results.iter().filter(|r| r.verdict.as_intended()).count(),
            duration_ms,
            results,
        }
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.results.iter().filter(|r| r.verdict == verdict).count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self) {
        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            self.passed, self.failed, self.duration_ms
        );
        info!(
            "Verdicts: {} conform, {} regressions, {} invalid inputs detected, {} invalid inputs accepted, {} inconclusive",
            self.count(Verdict::Conforms),
            self.count(Verdict::Regression),
            self.count(Verdict::InvalidInputDetected),
            self.count(Verdict::InvalidInputAccepted),
            self.count(Verdict::Inconclusive),
        );
    }

    /// Write results to `test-results.json` in `output_dir`
    pub fn write(&self, output_dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Expectation;

    fn mismatch() -> Outcome {
        Outcome::failed(FailureReason::AssertionMismatch {
            expected: "Invalid currency format".to_string(),
            actual: "මම රු. $100 ක් ගෙව්වා".to_string(),
        })
    }

    #[test]
    fn test_verdict_table() {
        use Intent::*;

        assert_eq!(Verdict::judge(ExpectPass, &Outcome::Passed), Verdict::Conforms);
        assert_eq!(Verdict::judge(ExpectPass, &mismatch()), Verdict::Regression);
        assert_eq!(
            Verdict::judge(ExpectPass, &Outcome::failed(FailureReason::ExtractionEmpty)),
            Verdict::Regression
        );
        assert_eq!(Verdict::judge(ExpectMismatch, &mismatch()), Verdict::InvalidInputDetected);
        assert_eq!(
            Verdict::judge(ExpectMismatch, &Outcome::Passed),
            Verdict::InvalidInputAccepted
        );

        let timeout = Outcome::failed(FailureReason::NavigationTimeout { timeout_ms: 30000 });
        assert_eq!(Verdict::judge(ExpectMismatch, &timeout), Verdict::Inconclusive);
        assert_eq!(Verdict::judge(ExpectPass, &timeout), Verdict::Inconclusive);
    }

    #[test]
    fn test_negative_report_keeps_automated_failure() {
        let scenario = Scenario::new(
            "Neg_Fun_0002",
            "mama ru. $100 k gevvaa",
            Expectation::ExactMatch {
                value: "Invalid currency format".to_string(),
            },
            Category::Negative,
        );
        let report = ScenarioReport::new(&scenario, "මම රු. $100 ක් ගෙව්වා".to_string(), mismatch(), 3100);

        assert!(!report.passed());
        assert_eq!(report.verdict, Verdict::InvalidInputDetected);
        assert!(report.verdict.as_intended());
        assert_eq!(report.expected.as_deref(), Some("Invalid currency format"));
    }

    #[test]
    fn test_suite_counts_and_json() {
        let positive = Scenario::new("Pos_1", "mama", Expectation::NonEmpty, Category::Positive);
        let negative = Scenario::new(
            "Neg_1",
            "mama ru. $100 k gevvaa",
            Expectation::ExactMatch {
                value: "Invalid currency format".to_string(),
            },
            Category::Negative,
        );
        let results = vec![
            ScenarioReport::new(&positive, "මම".to_string(), Outcome::Passed, 10),
            ScenarioReport::new(&negative, "මම".to_string(), mismatch(), 10),
        ];
        let suite = TestSuiteResult::from_reports(chrono::Utc::now(), 20, results);

        assert_eq!(suite.passed, 1);
        assert_eq!(suite.failed, 1);
        assert_eq!(suite.as_intended, 2);
        assert!(!suite.all_passed());

        let dir = tempfile::tempdir().unwrap();
        let path = suite.write(dir.path()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["results"][1]["outcome"]["status"], "failed");
        assert_eq!(json["results"][1]["outcome"]["reason"]["kind"], "assertion_mismatch");
        assert_eq!(json["results"][1]["verdict"], "invalid_input_detected");
        assert_eq!(json["results"][1]["category"], "negative");
    }
}
