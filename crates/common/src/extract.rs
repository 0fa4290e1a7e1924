//! Translation output extraction
//!
//! Given every text node on a rendered page, isolate the single fragment
//! that is the translation result. A node is a candidate when its trimmed
//! content:
//!
//! 1. contains a run of at least `min_script_run` Sinhala code points,
//! 2. is shorter than `max_length` (UTF-16 units, as the DOM counts),
//! 3. contains none of the configured exclusion terms (case-sensitive
//!    substrings, typically bilingual control labels).
//!
//! A [`SelectionPolicy`] then picks one candidate. The default takes the
//! last one in document order, since the result panel renders after the
//! input panel on the target page.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::error::{Error, Result};
use crate::script::ScriptFilter;
use crate::types::{dom_len, dom_trim, Candidate, TextNode};

/// Picks the result among filtered candidates.
///
/// Candidates are handed over sorted by ordinal; nodes sharing an ordinal
/// keep the order in which they were traversed.
pub trait SelectionPolicy: Send + Sync + fmt::Debug {
    fn select<'a>(&self, candidates: &[Candidate<'a>]) -> Option<Candidate<'a>>;
}

/// Result is rendered below the input (default layout)
#[derive(Debug, Clone, Copy, Default)]
pub struct LastInDocumentOrder;

impl SelectionPolicy for LastInDocumentOrder {
    fn select<'a>(&self, candidates: &[Candidate<'a>]) -> Option<Candidate<'a>> {
        candidates.last().copied()
    }
}

/// Result is rendered above the input
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstInDocumentOrder;

impl SelectionPolicy for FirstInDocumentOrder {
    fn select<'a>(&self, candidates: &[Candidate<'a>]) -> Option<Candidate<'a>> {
        candidates.first().copied()
    }
}

/// Named selection policies available from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Last,
    First,
}

impl Selection {
    pub fn policy(self) -> Box<dyn SelectionPolicy> {
        match self {
            Selection::Last => Box::new(LastInDocumentOrder),
            Selection::First => Box::new(FirstInDocumentOrder),
        }
    }
}

impl std::str::FromStr for Selection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "last" => Ok(Selection::Last),
            "first" => Ok(Selection::First),
            other => Err(Error::InvalidConfig(format!(
                "unknown selection policy '{}' (expected 'last' or 'first')",
                other
            ))),
        }
    }
}

/// Extraction tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Minimum consecutive Sinhala code points for a node to qualify
    pub min_script_run: usize,

    /// Nodes at or above this length are treated as non-result blocks
    pub max_length: usize,

    /// Control labels that disqualify a node outright
    pub exclusions: Vec<String>,

    /// Which candidate wins
    pub selection: Selection,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_script_run: 3,
            max_length: 300,
            exclusions: ["Undo", "Redo", "Touchpad", "Swap"]
                .into_iter()
                .map(String::from)
                .collect(),
            selection: Selection::Last,
        }
    }
}

/// Output extractor for one page layout
#[derive(Debug)]
pub struct OutputExtractor {
    script: ScriptFilter,
    max_length: usize,
    exclusions: Vec<String>,
    policy: Box<dyn SelectionPolicy>,
}

impl OutputExtractor {
    /// Build an extractor using the policy named in the config
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        Self::with_policy(config, config.selection.policy())
    }

    /// Build an extractor with a caller-supplied selection policy
    pub fn with_policy(config: &ExtractorConfig, policy: Box<dyn SelectionPolicy>) -> Result<Self> {
        if config.max_length == 0 {
            return Err(Error::InvalidConfig(
                "max_length must be at least 1".to_string(),
            ));
        }
        if let Some(i) = config.exclusions.iter().position(|t| t.is_empty()) {
            // An empty term would match every node
            return Err(Error::InvalidConfig(format!(
                "exclusion term #{} is empty",
                i
            )));
        }

        Ok(Self {
            script: ScriptFilter::new(config.min_script_run)?,
            max_length: config.max_length,
            exclusions: config.exclusions.clone(),
            policy,
        })
    }

    /// Whether trimmed text passes the script, length and exclusion filters
    pub fn qualifies(&self, trimmed: &str) -> bool {
        self.script.matches(trimmed)
            && dom_len(trimmed) < self.max_length
            && !self.exclusions.iter().any(|term| trimmed.contains(term.as_str()))
    }

    /// All nodes passing the filters, in document order
    pub fn candidates<'a>(&self, snapshot: &'a [TextNode]) -> Vec<Candidate<'a>> {
        let mut candidates: Vec<Candidate<'a>> = snapshot
            .iter()
            .enumerate()
            .filter_map(|(position, node)| {
                let content = node.trimmed();
                self.qualifies(content).then_some(Candidate {
                    content,
                    ordinal: node.ordinal,
                    position,
                })
            })
            .collect();

        // Stable: duplicate ordinals stay in traversal order
        candidates.sort_by_key(|c| c.ordinal);
        candidates
    }

    /// The translation result, or an empty string when none is visible
    pub fn extract(&self, snapshot: &[TextNode]) -> String {
        let candidates = self.candidates(snapshot);
        trace!(
            nodes = snapshot.len(),
            candidates = candidates.len(),
            "Filtered page text"
        );

        self.policy
            .select(&candidates)
            .map(|c| dom_trim(c.content).to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn default_extractor() -> OutputExtractor {
        OutputExtractor::new(&ExtractorConfig::default()).unwrap()
    }

    fn extract(contents: &[&str]) -> String {
        default_extractor().extract(&TextNode::sequence(contents.iter().copied()))
    }

    #[test]
    fn test_no_sinhala_yields_empty() {
        assert_eq!(extract(&["Singlish", "Sinhala", "mama gedhara yanavaa"]), "");
        assert_eq!(extract(&[]), "");
    }

    #[test]
    fn test_single_candidate_returned_trimmed() {
        let snapshot = ["Input", "mama gedhara yanavaa", "  මම ගෙදර යනවා \n", "Copy"];
        assert_eq!(extract(&snapshot), "මම ගෙදර යනවා");
        // Re-running on the same snapshot gives the same result
        assert_eq!(extract(&snapshot), extract(&snapshot));
    }

    #[test]
    fn test_last_candidate_wins() {
        assert_eq!(extract(&["අපි යමු", "History", "මම ගෙදර යනවා"]), "මම ගෙදර යනවා");
    }

    #[test]
    fn test_exclusion_only_yields_empty() {
        assert_eq!(extract(&["Undo අහෝසි කරන්න", "Swap මාරු කරන්න"]), "");
    }

    #[test]
    fn test_excluded_node_after_result_is_skipped() {
        assert_eq!(
            extract(&["මම ගෙදර යනවා", "Touchpad ස්පර්ශක"]),
            "මම ගෙදර යනවා"
        );
    }

    #[test]
    fn test_exclusion_is_case_sensitive_substring() {
        // Lowercase does not match "Undo"
        assert_eq!(extract(&["undo අහෝසි"]), "undo අහෝසි");
        // Substring inside a longer word still matches
        assert_eq!(extract(&["Redone අහෝසි"]), "");
    }

    #[test_case("මම", false ; "two sinhala characters rejected")]
    #[test_case("මමම", true ; "three sinhala characters accepted")]
    #[test_case("මම x මම", false ; "runs are not joined across other characters")]
    fn test_script_run_threshold(text: &str, accepted: bool) {
        assert_eq!(extract(&[text]).is_empty(), !accepted);
    }

    #[test_case(299, true ; "just under ceiling accepted")]
    #[test_case(300, false ; "at ceiling rejected")]
    #[test_case(301, false ; "over ceiling rejected")]
    fn test_length_ceiling(len: usize, accepted: bool) {
        let text = format!("මමම{}", "a".repeat(len - 3));
        assert_eq!(text.encode_utf16().count(), len);
        assert_eq!(extract(&[text.as_str()]).is_empty(), !accepted);
    }

    #[test]
    fn test_length_measured_after_trim() {
        let text = format!("   මමම{}   ", "a".repeat(296));
        assert_eq!(extract(&[text.as_str()]).len(), text.trim().len());
    }

    #[test]
    fn test_duplicate_ordinals_resolved_by_traversal_order() {
        let snapshot = vec![
            TextNode::new("අපි යමු", 4),
            TextNode::new("මම යනවා", 4),
            TextNode::new("ඔයා එනවා", 1),
        ];
        let extractor = default_extractor();
        assert_eq!(extractor.extract(&snapshot), "මම යනවා");
    }

    #[test]
    fn test_first_policy_for_result_above_input() {
        let config = ExtractorConfig {
            selection: Selection::First,
            ..Default::default()
        };
        let extractor = OutputExtractor::new(&config).unwrap();
        let snapshot = TextNode::sequence(["අපි යමු", "මම යනවා"]);
        assert_eq!(extractor.extract(&snapshot), "අපි යමු");
    }

    #[test]
    fn test_configured_exclusions_replace_defaults() {
        let config = ExtractorConfig {
            exclusions: vec!["Clear".to_string()],
            ..Default::default()
        };
        let extractor = OutputExtractor::new(&config).unwrap();
        let snapshot = TextNode::sequence(["Undo අහෝසි", "Clear මකන්න"]);
        assert_eq!(extractor.extract(&snapshot), "Undo අහෝසි");
    }

    #[test]
    fn test_candidates_report_positions() {
        let extractor = default_extractor();
        let snapshot = TextNode::sequence(["x", " අපි යමු ", "y"]);
        let candidates = extractor.candidates(&snapshot);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content, "අපි යමු");
        assert_eq!(candidates[0].position, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let empty_term = ExtractorConfig {
            exclusions: vec![String::new()],
            ..Default::default()
        };
        assert!(OutputExtractor::new(&empty_term).is_err());

        let zero_length = ExtractorConfig {
            max_length: 0,
            ..Default::default()
        };
        assert!(OutputExtractor::new(&zero_length).is_err());
    }

    #[test]
    fn test_selection_from_str() {
        assert_eq!("last".parse::<Selection>().unwrap(), Selection::Last);
        assert_eq!("first".parse::<Selection>().unwrap(), Selection::First);
        assert!("middle".parse::<Selection>().is_err());
    }
}
