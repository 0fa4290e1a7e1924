//! Singlish harness common library
//!
//! Page text types and the output-extraction heuristic shared by the
//! scenario runner. Nothing here talks to a browser: callers hand in a
//! snapshot of text nodes and get back the translation result.

pub mod error;
pub mod extract;
pub mod script;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use extract::{
    ExtractorConfig, FirstInDocumentOrder, LastInDocumentOrder, OutputExtractor, Selection,
    SelectionPolicy,
};
pub use types::{Candidate, TextNode};
