//! Result rows and the sinks that persist them.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::collector::{Outcome, RatingResult};
use crate::stimulus::Stimulus;

/// Marker written in place of a mean when a stimulus has none.
pub const ERROR_MARKER: &str = "Error";

/// Column order of the CSV output.
pub const CSV_HEADER: [&str; 6] = [
    "Identifier",
    "Average_Rating",
    "Standard_Deviation",
    "N_Valid",
    "All_Ratings",
    "Status",
];

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("csv error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One output row: stimulus identifier plus its aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub id: String,
    #[serde(flatten)]
    pub result: RatingResult,
}

impl ResultRow {
    pub fn new(stimulus: &Stimulus, result: RatingResult) -> Self {
        Self {
            id: stimulus.id.clone(),
            result,
        }
    }

    /// Cells in [`CSV_HEADER`] order.
    pub fn csv_cells(&self) -> [String; 6] {
        let mean = match self.result.mean {
            Some(m) => m.to_string(),
            None => ERROR_MARKER.to_string(),
        };
        let std_dev = self
            .result
            .std_dev
            .map(|s| s.to_string())
            .unwrap_or_default();
        let status = match &self.result.outcome {
            Outcome::Failed { error } => format!("failed: {error}"),
            other => other.as_str().to_string(),
        };
        [
            self.id.clone(),
            mean,
            std_dev,
            self.result.ratings.len().to_string(),
            format_ratings(&self.result.ratings),
            status,
        ]
    }
}

/// `[3, 3, 4]` style list.
pub fn format_ratings(ratings: &[i64]) -> String {
    let inner: Vec<String> = ratings.iter().map(|r| r.to_string()).collect();
    format!("[{}]", inner.join(", "))
}

/// Durable destination for a finished batch. Called exactly once per batch.
pub trait OutputSink: Send + Sync {
    fn write_rows(&self, rows: &[ResultRow]) -> Result<(), OutputError>;
}

/// Writes all rows to a CSV file, replacing any previous contents.
#[derive(Debug, Clone)]
pub struct CsvOutputSink {
    path: PathBuf,
}

impl CsvOutputSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn csv_err(&self, source: csv::Error) -> OutputError {
        OutputError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl OutputSink for CsvOutputSink {
    fn write_rows(&self, rows: &[ResultRow]) -> Result<(), OutputError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut writer = csv::Writer::from_path(&self.path).map_err(|e| self.csv_err(e))?;
        writer
            .write_record(CSV_HEADER)
            .map_err(|e| self.csv_err(e))?;
        for row in rows {
            writer
                .write_record(row.csv_cells())
                .map_err(|e| self.csv_err(e))?;
        }
        writer.flush().map_err(|source| OutputError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ratings: Vec<i64>, mean: Option<f64>, std_dev: Option<f64>, outcome: Outcome) -> RatingResult {
        RatingResult {
            ratings,
            mean,
            std_dev,
            outcome,
            calls: 1,
            rejected: 0,
            input_tokens: 0,
            output_tokens: 0,
            cost_nanodollars: 0,
        }
    }

    #[test]
    fn complete_row_cells() {
        let row = ResultRow {
            id: "a.jpg".into(),
            result: result(vec![3, 3, 4, 5, 3], Some(3.6), Some(0.89), Outcome::Complete),
        };
        assert_eq!(
            row.csv_cells(),
            [
                "a.jpg".to_string(),
                "3.6".to_string(),
                "0.89".to_string(),
                "5".to_string(),
                "[3, 3, 4, 5, 3]".to_string(),
                "complete".to_string(),
            ]
        );
    }

    #[test]
    fn failed_row_carries_error_marker() {
        let row = ResultRow {
            id: "b.jpg".into(),
            result: result(
                vec![],
                None,
                None,
                Outcome::Failed {
                    error: "http error".into(),
                },
            ),
        };
        let cells = row.csv_cells();
        assert_eq!(cells[1], ERROR_MARKER);
        assert_eq!(cells[2], "");
        assert_eq!(cells[4], "[]");
        assert_eq!(cells[5], "failed: http error");
    }
}
