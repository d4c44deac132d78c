//! Execution error extraction.

use serde::{Deserialize, Serialize};

use crate::document::{NotebookDocument, Output};

/// An `error` output found in an executed notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Index of the cell in the document (0-based).
    pub cell_index: usize,
    /// Index of the output within the cell (0-based).
    pub output_index: usize,
    /// Exception name, e.g. `ZeroDivisionError`.
    pub ename: String,
    /// Exception value.
    pub evalue: String,
    /// Traceback lines as captured by the kernel.
    pub traceback: Vec<String>,
}

/// Collect every error output, in cell order then output order.
///
/// Cells without an `outputs` field contribute nothing. The document is not
/// modified, so repeated calls return the same list.
pub fn extract_errors(document: &NotebookDocument) -> Vec<ExecutionError> {
    document
        .cells
        .iter()
        .enumerate()
        .flat_map(|(cell_index, cell)| {
            cell.outputs
                .iter()
                .flatten()
                .enumerate()
                .filter_map(move |(output_index, output)| match output {
                    Output::Error {
                        ename,
                        evalue,
                        traceback,
                    } => Some(ExecutionError {
                        cell_index,
                        output_index,
                        ename: ename.clone(),
                        evalue: evalue.clone(),
                        traceback: traceback.clone(),
                    }),
                    _ => None,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Cell, MultilineText};

    fn code_cell(outputs: Option<Vec<Output>>) -> Cell {
        Cell {
            cell_type: "code".to_string(),
            source: MultilineText::default(),
            metadata: serde_json::json!({}),
            outputs,
            execution_count: None,
        }
    }

    fn error(name: &str) -> Output {
        Output::Error {
            ename: name.to_string(),
            evalue: format!("{name} raised"),
            traceback: vec!["Traceback (most recent call last)".to_string()],
        }
    }

    fn stream(text: &str) -> Output {
        Output::Stream {
            name: "stdout".to_string(),
            text: MultilineText::Single(text.to_string()),
        }
    }

    fn document(cells: Vec<Cell>) -> NotebookDocument {
        NotebookDocument {
            nbformat: 4,
            nbformat_minor: 5,
            metadata: serde_json::json!({}),
            cells,
            source_path: None,
        }
    }

    #[test]
    fn test_empty_outputs_yield_no_errors() {
        let doc = document(vec![
            code_cell(Some(vec![])),
            code_cell(Some(vec![])),
            code_cell(Some(vec![])),
        ]);
        assert!(extract_errors(&doc).is_empty());
    }

    #[test]
    fn test_cells_without_outputs_field_are_not_errors() {
        let doc = document(vec![
            code_cell(None),
            code_cell(Some(vec![error("ValueError")])),
            code_cell(None),
        ]);
        let errors = extract_errors(&doc);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].cell_index, 1);
    }

    #[test]
    fn test_single_error_references_its_cell() {
        for i in 0..4 {
            let cells = (0..4)
                .map(|j| {
                    if j == i {
                        code_cell(Some(vec![stream("x"), error("ZeroDivisionError")]))
                    } else {
                        code_cell(Some(vec![stream("ok")]))
                    }
                })
                .collect();
            let errors = extract_errors(&document(cells));
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].cell_index, i);
            assert_eq!(errors[0].output_index, 1);
            assert_eq!(errors[0].ename, "ZeroDivisionError");
        }
    }

    #[test]
    fn test_preserves_document_order() {
        let doc = document(vec![
            code_cell(Some(vec![error("NameError"), error("TypeError")])),
            code_cell(Some(vec![stream("ok")])),
            code_cell(Some(vec![error("KeyError")])),
        ]);
        let names: Vec<_> = extract_errors(&doc).into_iter().map(|e| e.ename).collect();
        assert_eq!(names, ["NameError", "TypeError", "KeyError"]);
    }

    #[test]
    fn test_idempotent() {
        let doc = document(vec![code_cell(Some(vec![error("OSError")]))]);
        assert_eq!(extract_errors(&doc), extract_errors(&doc));
    }
}
