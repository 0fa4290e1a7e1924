//! Page text types

use serde::{Deserialize, Serialize};

/// A leaf fragment of page text and its rank in document order.
///
/// Ordinals come from a depth-first walk of `document.body`; a fresh
/// set is produced for every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    pub content: String,
    pub ordinal: usize,
}

impl TextNode {
    pub fn new(content: impl Into<String>, ordinal: usize) -> Self {
        Self {
            content: content.into(),
            ordinal,
        }
    }

    /// Build a snapshot from a list of strings, numbering them in order
    pub fn sequence<I, S>(contents: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        contents
            .into_iter()
            .enumerate()
            .map(|(ordinal, content)| Self::new(content, ordinal))
            .collect()
    }

    /// Content with DOM `trim()` semantics applied
    pub fn trimmed(&self) -> &str {
        dom_trim(&self.content)
    }
}

/// A text node that survived every extraction filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Trimmed node content
    pub content: &'a str,
    pub ordinal: usize,
    /// Index in the snapshot as it was traversed
    pub position: usize,
}

/// Trim the way `String.prototype.trim` does.
///
/// ECMAScript whitespace is Unicode `White_Space` minus NEL (U+0085),
/// plus the BOM (U+FEFF).
pub fn dom_trim(text: &str) -> &str {
    text.trim_matches(is_dom_whitespace)
}

fn is_dom_whitespace(c: char) -> bool {
    c != '\u{85}' && (c.is_whitespace() || c == '\u{feff}')
}

/// Length of a string as the DOM reports it (UTF-16 code units)
pub fn dom_len(text: &str) -> usize {
    text.encode_utf16().count()
}
