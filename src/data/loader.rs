// ============================================================
// Layer 4: Article Loader
// ============================================================
// Reads a JSON Lines file: one article per line, one JSON object
// per article, arbitrary keys. Column selection and typing are
// left to the ExampleEncoder; this layer only parses.
//
//   {"item_title": "...", "item_views": 1520, "stock_code": "600519", "viral": 1}
//
// Blank lines are ignored. A line that is not a JSON object is
// logged and skipped, so one bad row never sinks a whole run.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use crate::domain::example::RawRecord;
use crate::domain::traits::RecordSource;

pub struct JsonlLoader {
    path: PathBuf,
    /// Stop after this many rows (the research runs capped at 64 000)
    limit: Option<usize>,
}

impl JsonlLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), limit: None }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

impl RecordSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<RawRecord>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open data file '{}'", self.path.display()))?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            if self.limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }

            let line = line
                .with_context(|| format!("Cannot read line {} of '{}'", line_no + 1, self.path.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<RawRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping line {}: {}", line_no + 1, e);
                }
            }
        }

        tracing::info!(
            "Loaded {} rows from '{}' ({} skipped)",
            records.len(),
            self.path.display(),
            skipped
        );
        Ok(records)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_reads_objects_and_skips_garbage() {
        let f = write_file(
            "{\"item_title\": \"a\", \"viral\": 1}\n\nnot json\n[1, 2]\n{\"item_title\": \"b\", \"viral\": 0}\n",
        );
        let rows = JsonlLoader::new(f.path()).load_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["item_title"], "b");
    }

    #[test]
    fn test_limit_caps_rows() {
        let f = write_file("{\"x\": 1}\n{\"x\": 2}\n{\"x\": 3}\n");
        let rows = JsonlLoader::new(f.path()).with_limit(Some(2)).load_all().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(JsonlLoader::new("/definitely/not/here.jsonl").load_all().is_err());
    }
}
