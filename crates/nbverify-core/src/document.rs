//! Persisted notebook documents (.ipynb).
//!
//! Only the parts the harness inspects are modelled strictly: the format
//! version, the cell sequence and each cell's outputs. Everything else is
//! carried as loose JSON so that documents written by any engine version
//! still load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The only `nbformat` major version the loader accepts.
pub const SUPPORTED_NBFORMAT: u32 = 4;

/// An executed notebook as persisted by the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookDocument {
    /// Format version
    pub nbformat: u32,

    /// Minor format version
    #[serde(default)]
    pub nbformat_minor: u32,

    /// Notebook metadata (kernelspec, language info, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Notebook cells, in document order
    #[serde(default)]
    pub cells: Vec<Cell>,

    /// Path the document was loaded from
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// A single notebook cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Cell type (`code`, `markdown`, `raw`)
    pub cell_type: String,

    /// Cell source
    #[serde(default)]
    pub source: MultilineText,

    /// Cell metadata
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Captured outputs. Absent for non-code cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Output>>,

    /// Execution count (for code cells)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_count: Option<u32>,
}

/// Cell output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type")]
pub enum Output {
    /// Standard output/error
    #[serde(rename = "stream")]
    Stream { name: String, text: MultilineText },

    /// Rich display data
    #[serde(rename = "display_data")]
    DisplayData {
        #[serde(default)]
        data: serde_json::Value,
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// Result of the last expression
    #[serde(rename = "execute_result")]
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        data: serde_json::Value,
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// Error output
    #[serde(rename = "error")]
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },

    /// Any output kind this harness does not know about
    #[serde(other)]
    Unknown,
}

/// Text stored either as a single string or as a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultilineText {
    Single(String),
    Lines(Vec<String>),
}

impl Default for MultilineText {
    fn default() -> Self {
        MultilineText::Single(String::new())
    }
}

impl NotebookDocument {
    /// Read a document from a file.
    ///
    /// Missing files, malformed JSON and unsupported format versions are all
    /// reported as [`Error::DocumentParse`].
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::DocumentParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut document = Self::parse(&content).map_err(|message| Error::DocumentParse {
            path: path.to_path_buf(),
            message,
        })?;
        document.source_path = Some(path.to_path_buf());

        tracing::debug!(
            "Loaded {} (nbformat {}.{}, {} cells)",
            path.display(),
            document.nbformat,
            document.nbformat_minor,
            document.cells.len()
        );

        Ok(document)
    }

    /// Parse a document from JSON text, checking the format version.
    fn parse(content: &str) -> std::result::Result<Self, String> {
        // Check the version before the full parse so a future format is
        // reported as such rather than as whatever field changed shape.
        let header: VersionHeader = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if header.nbformat != SUPPORTED_NBFORMAT {
            return Err(format!(
                "unsupported nbformat {} (expected {})",
                header.nbformat, SUPPORTED_NBFORMAT
            ));
        }

        serde_json::from_str(content).map_err(|e| e.to_string())
    }
}

impl std::str::FromStr for NotebookDocument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).map_err(|message| Error::DocumentParse {
            path: PathBuf::from("<memory>"),
            message,
        })
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    nbformat: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r##"{
        "nbformat": 4,
        "nbformat_minor": 5,
        "metadata": {"kernelspec": {"name": "python3"}},
        "cells": [
            {"cell_type": "markdown", "metadata": {}, "source": "# Title"},
            {
                "cell_type": "code",
                "metadata": {},
                "execution_count": 1,
                "source": ["import numpy as np\n", "x = 1"],
                "outputs": [
                    {"output_type": "stream", "name": "stdout", "text": ["hi\n"]},
                    {"output_type": "execute_result", "execution_count": 1,
                     "data": {"text/plain": ["1"]}, "metadata": {}},
                    {"output_type": "update_display_data", "data": {}}
                ]
            }
        ]
    }"##;

    #[test]
    fn test_parse_document() {
        let doc: NotebookDocument = DOC.parse().unwrap();
        assert_eq!(doc.nbformat, 4);
        assert_eq!(doc.cells.len(), 2);

        assert!(doc.cells[0].outputs.is_none());
        assert_eq!(doc.cells[0].source, MultilineText::Single("# Title".to_string()));

        let outputs = doc.cells[1].outputs.as_ref().unwrap();
        assert_eq!(outputs.len(), 3);
        assert!(matches!(outputs[0], Output::Stream { .. }));
        assert!(matches!(outputs[1], Output::ExecuteResult { .. }));
        assert!(matches!(outputs[2], Output::Unknown));
        assert!(matches!(&doc.cells[1].source, MultilineText::Lines(lines) if lines.len() == 2));
    }

    #[test]
    fn test_rejects_future_nbformat() {
        let err = r#"{"nbformat": 5, "nbformat_minor": 0, "cells": []}"#
            .parse::<NotebookDocument>()
            .unwrap_err();
        match err {
            Error::DocumentParse { message, .. } => assert!(message.contains("unsupported nbformat 5")),
            other => panic!("Expected DocumentParse, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            "{\"nbformat\": 4, \"cells\": [".parse::<NotebookDocument>(),
            Err(Error::DocumentParse { .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("missing.ipynb");
        match NotebookDocument::read_from_file(&path) {
            Err(Error::DocumentParse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected DocumentParse, got {other:?}"),
        }
    }

    #[test]
    fn test_read_from_file_records_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nb.ipynb");
        fs::write(&path, DOC).unwrap();

        let loaded = NotebookDocument::read_from_file(&path).unwrap();
        assert_eq!(loaded.cells.len(), 2);
        assert_eq!(loaded.source_path.as_deref(), Some(path.as_path()));
    }
}
