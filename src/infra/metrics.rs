// ============================================================
// Layer 6: Report Writer
// ============================================================
// Per-epoch CSV reports, all in the checkpoint directory:
//
//   metrics.csv                    one row per epoch (appended)
//     epoch,train_loss,val_loss,accuracy,precision,recall,f1
//   confusion_matrix_{tag}.csv     2×2 counts, rows = true label
//   explanation_{tag}.csv          one row per positive article
//     text,pred,title_attention,features,feature_attention
//   baseline_{name}.csv            one row per epoch per baseline
//   attention_weights_{tag}.csv    text classifier, one row per article
//     text,label,prediction,attention_weights
//   scores_{tag}.csv               articles ranked by score, best first
//     rank,row,score,pred,label
//
// `tag` is `epoch_{n}` during training and `eval` for the eval command.
// Vector cells are `;`-joined; text cells are always quoted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::metric::{find_scalar, ConfusionMatrix, MetricResult, MetricValue};
use crate::ml::{evaluator::ExplanationReport, title_classifier::TitleAttentionRow};

const METRICS_HEADER:     &str = "epoch,train_loss,val_loss,accuracy,precision,recall,f1";
const EXPLANATION_HEADER: &str = "text,pred,title_attention,features,feature_attention";
const ATTENTION_HEADER:   &str = "text,label,prediction,attention_weights";

/// One row of metrics.csv
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Mean BPR loss over training batches
    pub train_loss: f64,
    /// Mean BPR loss over validation pairs (NaN when there are none)
    pub val_loss:   f64,
    pub accuracy:   f64,
    pub precision:  f64,
    pub recall:     f64,
    pub f1:         f64,
}

impl EpochMetrics {
    /// Pull the scalar classification metrics out of an evaluation.
    /// Metrics the evaluator was not configured with read as 0.
    pub fn from_results(epoch: usize, train_loss: f64, val_loss: f64, results: &[MetricResult]) -> Self {
        let get = |name| find_scalar(results, name).unwrap_or(0.0);
        Self {
            epoch,
            train_loss,
            val_loss,
            accuracy:  get("accuracy"),
            precision: get("precision"),
            recall:    get("recall"),
            f1:        get("f1"),
        }
    }

    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create report dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join("metrics.csv")
    }

    /// Appends one row; the header is written when the file is new.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let csv_path = self.metrics_path();
        let is_new   = !csv_path.exists();
        let mut f = append(&csv_path)?;
        if is_new {
            writeln!(f, "{METRICS_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.accuracy, m.precision, m.recall, m.f1,
        )?;
        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch, m.train_loss, m.val_loss,
        );
        Ok(())
    }

    pub fn write_confusion(&self, tag: &str, cm: &ConfusionMatrix) -> Result<PathBuf> {
        let path = self.dir.join(format!("confusion_matrix_{tag}.csv"));
        let mut f = create(&path)?;
        writeln!(f, "label,pred_0,pred_1")?;
        for (label, row) in cm.counts.iter().enumerate() {
            writeln!(f, "{label},{},{}", row[0], row[1])?;
        }
        f.flush()?;
        tracing::debug!("Wrote confusion matrix to '{}'", path.display());
        Ok(path)
    }

    /// `row` is the article's position in the scored split.
    pub fn write_scores(&self, tag: &str, scores: &[f32], preds: &[u8], labels: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(format!("scores_{tag}.csv"));
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut f = create(&path)?;
        writeln!(f, "rank,row,score,pred,label")?;
        for (rank, &i) in order.iter().enumerate() {
            writeln!(f, "{},{i},{:.6},{},{}", rank + 1, scores[i], preds[i], labels[i])?;
        }
        f.flush()?;
        Ok(path)
    }

    pub fn write_explanation(&self, tag: &str, report: &ExplanationReport) -> Result<PathBuf> {
        let path = self.dir.join(format!("explanation_{tag}.csv"));
        let mut f = create(&path)?;
        writeln!(f, "{EXPLANATION_HEADER}")?;
        for row in &report.rows {
            writeln!(
                f,
                "{},{},{},{},{}",
                quote(&row.text),
                row.pred,
                join_floats(&row.title_attention),
                quote(&row.features.join(";")),
                join_floats(&row.feature_attention),
            )?;
        }
        f.flush()?;
        tracing::debug!("Wrote {} explanation rows to '{}'", report.len(), path.display());
        Ok(path)
    }

    pub fn write_attention(&self, tag: &str, rows: &[TitleAttentionRow]) -> Result<PathBuf> {
        let path = self.dir.join(format!("attention_weights_{tag}.csv"));
        let mut f = create(&path)?;
        writeln!(f, "{ATTENTION_HEADER}")?;
        for row in rows {
            writeln!(
                f,
                "{},{},{},{}",
                quote(&row.text),
                row.label,
                row.prediction,
                join_floats(&row.attention),
            )?;
        }
        f.flush()?;
        Ok(path)
    }

    /// Append one epoch of baseline results. Per-task metrics are
    /// `;`-joined in a single cell.
    pub fn log_baseline(&self, name: &str, epoch: usize, loss: f64, results: &[MetricResult]) -> Result<()> {
        let path = self.dir.join(format!("baseline_{name}.csv"));
        let is_new = !path.exists();
        let mut f = append(&path)?;
        if is_new {
            let names: Vec<&str> = results
                .iter()
                .filter(|r| metric_cell(&r.value).is_some())
                .map(|r| r.name.as_str())
                .collect();
            writeln!(f, "epoch,loss,{}", names.join(","))?;
        }
        let cells: Vec<String> = results.iter().filter_map(|r| metric_cell(&r.value)).collect();
        writeln!(f, "{epoch},{loss:.6},{}", cells.join(","))?;
        Ok(())
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let f = File::create(path).with_context(|| format!("Cannot create '{}'", path.display()))?;
    Ok(BufWriter::new(f))
}

fn append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open '{}' for append", path.display()))
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn join_floats(values: &[f32]) -> String {
    values.iter().map(|v| format!("{v:.6}")).collect::<Vec<_>>().join(";")
}

/// Report and confusion values have their own files and are skipped here.
fn metric_cell(value: &MetricValue) -> Option<String> {
    match value {
        MetricValue::Scalar(v)  => Some(format!("{v:.6}")),
        MetricValue::PerTask(v) => Some(v.iter().map(|x| format!("{x:.6}")).collect::<Vec<_>>().join(";")),
        MetricValue::Report(_) | MetricValue::Confusion(_) => None,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::evaluator::ExplanationRow;

    fn writer() -> (tempfile::TempDir, ReportWriter) {
        let tmp = tempfile::tempdir().unwrap();
        let w = ReportWriter::new(tmp.path()).unwrap();
        (tmp, w)
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::from_results(2, 2.5, 2.3, &[]);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
        assert_eq!(m.accuracy, 0.0);
    }

    #[test]
    fn test_metrics_rows_append_under_one_header() {
        let (_tmp, w) = writer();
        let results = vec![
            MetricResult::new("accuracy", MetricValue::Scalar(0.75)),
            MetricResult::new("f1", MetricValue::Scalar(0.5)),
        ];
        w.log(&EpochMetrics::from_results(1, 1.0, 0.9, &results)).unwrap();
        w.log(&EpochMetrics::from_results(2, 0.8, 0.7, &results)).unwrap();

        // Reopening must not write a second header
        let w = ReportWriter::new(w.dir.clone()).unwrap();
        let rows = lines(&w.metrics_path());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], METRICS_HEADER);
        assert_eq!(rows[1], "1,1.000000,0.900000,0.750000,0.000000,0.000000,0.500000");
    }

    #[test]
    fn test_confusion_csv_shape() {
        let (_tmp, w) = writer();
        let cm = ConfusionMatrix::from_labels(&[1, 1, 0, 0, 0], &[1, 0, 0, 0, 1]);
        let rows = lines(&w.write_confusion("epoch_1", &cm).unwrap());
        assert_eq!(rows, vec!["label,pred_0,pred_1", "0,2,1", "1,1,1"]);
    }

    #[test]
    fn test_explanation_csv_quotes_text_and_joins_vectors() {
        let (_tmp, w) = writer();
        let report = ExplanationReport {
            rows: vec![ExplanationRow {
                text:              "stocks, \"rally\"".into(),
                pred:              1,
                title_attention:   vec![0.5, 0.25],
                features:          vec!["text".into(), "user:source".into()],
                feature_attention: vec![0.75, 1.0],
            }],
        };
        let path = w.write_explanation("eval", &report).unwrap();
        assert!(path.ends_with("explanation_eval.csv"));

        let rows = lines(&path);
        assert_eq!(rows[0], EXPLANATION_HEADER);
        assert_eq!(
            rows[1],
            "\"stocks, \"\"rally\"\"\",1,0.500000;0.250000,\"text;user:source\",0.750000;1.000000"
        );
    }

    #[test]
    fn test_baseline_csv_skips_structured_metrics() {
        let (_tmp, w) = writer();
        let results = vec![
            MetricResult::new("r2", MetricValue::PerTask(vec![0.5, 0.25])),
            MetricResult::new("confusion", MetricValue::Confusion(ConfusionMatrix::default())),
        ];
        w.log_baseline("lr", 1, 0.1, &results).unwrap();
        w.log_baseline("lr", 2, 0.05, &results).unwrap();

        let rows = lines(&w.dir.join("baseline_lr.csv"));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], "epoch,loss,r2");
        assert_eq!(rows[1], "1,0.100000,0.500000;0.250000");
    }

    #[test]
    fn test_scores_are_ranked_best_first() {
        let (_tmp, w) = writer();
        let path = w.write_scores("eval", &[-0.5, 2.0, 0.25], &[0, 1, 1], &[0, 1, 0]).unwrap();
        assert_eq!(
            lines(&path),
            vec![
                "rank,row,score,pred,label",
                "1,1,2.000000,1,1",
                "2,2,0.250000,1,0",
                "3,0,-0.500000,0,0",
            ]
        );
    }

    #[test]
    fn test_attention_rows_keep_label_and_prediction() {
        let (_tmp, w) = writer();
        let rows = vec![TitleAttentionRow {
            text:       "rates cut".into(),
            label:      1,
            prediction: 0,
            attention:  vec![0.5, 0.25],
        }];
        let path = w.write_attention("text_epoch_1", &rows).unwrap();
        assert!(path.ends_with("attention_weights_text_epoch_1.csv"));
        assert_eq!(
            lines(&path),
            vec![ATTENTION_HEADER, "\"rates cut\",1,0,0.500000;0.250000"]
        );
    }
}
