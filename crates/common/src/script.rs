//! Sinhala script detection

use regex::Regex;

use crate::error::{Error, Result};

/// First code point of the Sinhala Unicode block
pub const SINHALA_START: char = '\u{0D80}';
/// Last code point of the Sinhala Unicode block
pub const SINHALA_END: char = '\u{0DFF}';

pub fn is_sinhala(c: char) -> bool {
    (SINHALA_START..=SINHALA_END).contains(&c)
}

/// Length in code points of the longest consecutive Sinhala run
pub fn longest_sinhala_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if is_sinhala(c) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Compiled matcher for "at least `min_run` consecutive Sinhala code points"
#[derive(Debug, Clone)]
pub struct ScriptFilter {
    pattern: Regex,
    min_run: usize,
}

impl ScriptFilter {
    pub fn new(min_run: usize) -> Result<Self> {
        if min_run == 0 {
            return Err(Error::InvalidConfig(
                "min_script_run must be at least 1".to_string(),
            ));
        }
        let pattern = Regex::new(&format!("[\\x{{0D80}}-\\x{{0DFF}}]{{{},}}", min_run))
            .map_err(|e| Error::InvalidConfig(format!("script pattern: {}", e)))?;
        Ok(Self { pattern, min_run })
    }

    pub fn min_run(&self) -> usize {
        self.min_run
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}
