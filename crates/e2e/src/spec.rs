//! Declarative YAML scenario files
//!
//! A spec file groups scenarios of one category:
//!
//! ```yaml
//! suite: negative-functional
//! category: negative
//! scenarios:
//!   - id: Neg_Fun_0002
//!     title: Invalid currency symbol usage
//!     input: "mama ru. $100 k gevvaa"
//!     settle_ms: 4000
//!     expect:
//!       mode: exact_match
//!       value: "Invalid currency format"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};

/// Test class a scenario belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Positive,
    Negative,
    UiInteraction,
}

impl Category {
    /// Documented intent for scenarios of this category
    pub fn intent(self) -> Intent {
        match self {
            Category::Positive | Category::UiInteraction => Intent::ExpectPass,
            Category::Negative => Intent::ExpectMismatch,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Positive => write!(f, "positive"),
            Category::Negative => write!(f, "negative"),
            Category::UiInteraction => write!(f, "ui_interaction"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "positive" => Ok(Category::Positive),
            "negative" => Ok(Category::Negative),
            "ui" | "ui_interaction" => Ok(Category::UiInteraction),
            other => Err(E2eError::Config(format!("unknown category '{}'", other))),
        }
    }
}

/// What a human reviewer expects the automated result to be.
///
/// Negative scenarios assert the output a perfect translator would give
/// for malformed input. The service is not expected to produce it, so an
/// assertion mismatch there means the invalid input was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ExpectPass,
    ExpectMismatch,
}

/// How the extracted output is judged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Expectation {
    /// Any visible translation passes
    NonEmpty,
    /// Output must equal `value` byte for byte
    ExactMatch { value: String },
}

impl Expectation {
    pub fn expected_value(&self) -> Option<&str> {
        match self {
            Expectation::NonEmpty => None,
            Expectation::ExactMatch { value } => Some(value),
        }
    }
}

/// UI interaction performed after the output is extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Interaction {
    /// Click the copy control and compare the clipboard with the output
    CopyOutput { button_selector: String },
}

/// One test case, resolved against its spec file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub input: String,
    pub expect: Expectation,
    pub category: Category,
    /// Overrides the configured settle interval
    pub settle_ms: Option<u64>,
    pub interaction: Option<Interaction>,
    pub tags: Vec<String>,
    /// File the scenario was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, input: impl Into<String>, expect: Expectation, category: Category) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            input: input.into(),
            expect,
            category,
            settle_ms: None,
            interaction: None,
            tags: Vec::new(),
            source: None,
        }
    }

    pub fn intent(&self) -> Intent {
        self.category.intent()
    }
}

/// A complete spec file parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecFile {
    /// Suite name
    pub suite: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Default category for the scenarios below
    pub category: Category,

    /// Tags applied to every scenario in the file
    #[serde(default)]
    pub tags: Vec<String>,

    pub scenarios: Vec<ScenarioEntry>,
}

/// A scenario as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub input: String,
    pub expect: Expectation,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub settle_ms: Option<u64>,
    #[serde(default)]
    pub interaction: Option<Interaction>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SpecFile {
    /// Parse a spec file from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        if let Some(entry) = spec.scenarios.iter().find(|s| s.id.trim().is_empty()) {
            return Err(E2eError::SpecParse(format!(
                "scenario with input {:?} in suite '{}' has no id",
                entry.input, spec.suite
            )));
        }
        Ok(spec)
    }

    /// Parse a spec file from disk
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            E2eError::Yaml(e) => E2eError::SpecParse(format!("{}: {}", path.display(), e)),
            other => other,
        })
    }

    /// Resolve entries into scenarios, applying file-level defaults
    pub fn into_scenarios(self, source: Option<&Path>) -> Vec<Scenario> {
        let file_tags = self.tags;
        let category = self.category;

        self.scenarios
            .into_iter()
            .map(|entry| {
                let mut tags = file_tags.clone();
                tags.extend(entry.tags);
                Scenario {
                    id: entry.id,
                    title: entry.title,
                    input: entry.input,
                    expect: entry.expect,
                    category: entry.category.unwrap_or(category),
                    settle_ms: entry.settle_ms,
                    interaction: entry.interaction,
                    tags,
                    source: source.map(Path::to_path_buf),
                }
            })
            .collect()
    }
}

/// Load all scenarios from the YAML files under a directory.
///
/// Files are visited in name order so runs are reproducible. Scenario ids
/// must be unique across the whole directory.
pub fn load_all(dir: &Path) -> E2eResult<Vec<Scenario>> {
    if !dir.is_dir() {
        return Err(E2eError::SpecParse(format!(
            "specs directory not found: {}",
            dir.display()
        )));
    }

    let mut scenarios = Vec::new();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for entry in walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
    {
        let path = entry.path();
        let spec = SpecFile::from_file(path)?;

        for scenario in spec.into_scenarios(Some(path)) {
            if let Some(first) = seen.get(&scenario.id) {
                return Err(E2eError::DuplicateScenario {
                    id: scenario.id,
                    path: format!("{} (first defined in {})", path.display(), first.display()),
                });
            }
            seen.insert(scenario.id.clone(), path.to_path_buf());
            scenarios.push(scenario);
        }
    }

    Ok(scenarios)
}

/// Selects which scenarios to run
#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    pub category: Option<Category>,
    pub id: Option<String>,
    pub tag: Option<String>,
}

impl ScenarioFilter {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        self.category.map_or(true, |c| scenario.category == c)
            && self.id.as_deref().map_or(true, |id| scenario.id == id)
            && self
                .tag
                .as_deref()
                .map_or(true, |tag| scenario.tags.iter().any(|t| t == tag))
    }

    pub fn apply(&self, scenarios: Vec<Scenario>) -> Vec<Scenario> {
        scenarios.into_iter().filter(|s| self.matches(s)).collect()
    }
}
