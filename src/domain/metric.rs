// ============================================================
// Layer 3: Metric Strategies
// ============================================================
// Evaluator plug-ins. Each metric is a small strategy object
// with a uniform capability:
//
//   classification: (labels, predictions)        -> MetricValue
//   regression:     (y, y_hat, n, p) per task    -> f64
//
// Models hold an ordered Vec of strategies and produce an
// ordered Vec<MetricResult>, one entry per strategy.
//
// Binary labels only: 1 is the positive ("viral") class.
// Divisions by zero (no predicted / no true positives) give 0.0.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Values ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Scalar(f64),
    /// One value per regression task
    PerTask(Vec<f64>),
    Report(ClassificationReport),
    Confusion(ConfusionMatrix),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub name:  String,
    pub value: MetricValue,
}

impl MetricResult {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self { name: name.into(), value }
    }
}

/// Look up a scalar metric by name in an ordered result list
pub fn find_scalar(results: &[MetricResult], name: &str) -> Option<f64> {
    results.iter().find(|r| r.name == name).and_then(|r| r.value.as_scalar())
}

// ─── Confusion matrix ─────────────────────────────────────────────────────────

/// 2×2 counts, rows = true label, columns = predicted label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_labels(labels: &[u8], preds: &[u8]) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (&y, &p) in labels.iter().zip(preds) {
            counts[(y != 0) as usize][(p != 0) as usize] += 1;
        }
        Self { counts }
    }

    pub fn true_positives(&self)  -> usize { self.counts[1][1] }
    pub fn true_negatives(&self)  -> usize { self.counts[0][0] }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives() + self.true_negatives(), self.total())
    }

    /// Precision, recall and F1 treating `class` as the positive class
    pub fn class_scores(&self, class: usize) -> ClassScores {
        let other = 1 - class;
        let tp = self.counts[class][class];
        let fp = self.counts[other][class];
        let fn_ = self.counts[class][other];
        let precision = ratio(tp, tp + fp);
        let recall    = ratio(tp, tp + fn_);
        ClassScores {
            label: class as u8,
            precision,
            recall,
            f1: harmonic_mean(precision, recall),
            support: tp + fn_,
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Predicted     0       1")?;
        writeln!(f, "True 0  {:>7} {:>7}", self.counts[0][0], self.counts[0][1])?;
        write!(f, "True 1  {:>7} {:>7}", self.counts[1][0], self.counts[1][1])
    }
}

// ─── Classification report ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub label:     u8,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub support:   usize,
}

/// Per-class precision / recall / F1 with macro and weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes:      Vec<ClassScores>,
    pub accuracy:     f64,
    pub macro_avg:    ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let classes: Vec<ClassScores> = (0..2).map(|c| cm.class_scores(c)).collect();
        let total = cm.total();

        let avg = |weight: &dyn Fn(&ClassScores) -> f64, norm: f64| -> ClassScores {
            let norm = if norm == 0.0 { 1.0 } else { norm };
            ClassScores {
                label:     u8::MAX,
                precision: classes.iter().map(|c| weight(c) * c.precision).sum::<f64>() / norm,
                recall:    classes.iter().map(|c| weight(c) * c.recall).sum::<f64>() / norm,
                f1:        classes.iter().map(|c| weight(c) * c.f1).sum::<f64>() / norm,
                support:   total,
            }
        };

        let macro_avg    = avg(&|_| 1.0, classes.len() as f64);
        let weighted_avg = avg(&|c| c.support as f64, total as f64);

        Self { accuracy: cm.accuracy(), classes, macro_avg, weighted_avg }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for c in &self.classes {
            writeln!(
                f, "{:>14} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(
            f, "{:>14} {:>9} {:>9} {:>9.4} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, row) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f, "{:>14} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                name, row.precision, row.recall, row.f1, row.support
            )?;
        }
        Ok(())
    }
}

// ─── Strategy traits ──────────────────────────────────────────────────────────

pub trait ClassificationMetric {
    fn name(&self) -> &'static str;
    fn compute(&self, labels: &[u8], preds: &[u8]) -> MetricValue;
}

pub trait RegressionMetric {
    fn name(&self) -> &'static str;
    /// `n` = number of rows, `p` = number of features
    fn compute(&self, y: &[f64], y_hat: &[f64], n: usize, p: usize) -> f64;
}

/// Run every classification strategy in order
pub fn evaluate_classification(
    metrics: &[Box<dyn ClassificationMetric>],
    labels:  &[u8],
    preds:   &[u8],
) -> Vec<MetricResult> {
    metrics
        .iter()
        .map(|m| MetricResult::new(m.name(), m.compute(labels, preds)))
        .collect()
}

/// Run every regression strategy on each task column in order.
/// `y` and `y_hat` are row-major `[n, tasks]`.
pub fn evaluate_regression(
    metrics: &[Box<dyn RegressionMetric>],
    y:       &[f64],
    y_hat:   &[f64],
    tasks:   usize,
    p:       usize,
) -> Vec<MetricResult> {
    let n = if tasks == 0 { 0 } else { y.len() / tasks };
    let column = |data: &[f64], t: usize| -> Vec<f64> {
        data.iter().skip(t).step_by(tasks.max(1)).copied().collect()
    };
    metrics
        .iter()
        .map(|m| {
            let per_task = (0..tasks)
                .map(|t| m.compute(&column(y, t), &column(y_hat, t), n, p))
                .collect();
            MetricResult::new(m.name(), MetricValue::PerTask(per_task))
        })
        .collect()
}

/// The strategies a viral-ranking evaluation reports, in CSV order.
pub fn default_classification_metrics() -> Vec<Box<dyn ClassificationMetric>> {
    vec![
        Box::new(Accuracy),
        Box::new(Precision),
        Box::new(Recall),
        Box::new(F1),
        Box::new(Classification),
        Box::new(Confusion),
    ]
}

/// Look up one of the default strategies by its result name.
pub fn classification_metric(name: &str) -> Option<Box<dyn ClassificationMetric>> {
    default_classification_metrics().into_iter().find(|m| m.name() == name)
}

pub fn default_regression_metrics() -> Vec<Box<dyn RegressionMetric>> {
    vec![Box::new(R2Score), Box::new(AdjustedR2)]
}

pub fn find_confusion(results: &[MetricResult]) -> Option<&ConfusionMatrix> {
    results.iter().find_map(|r| match &r.value {
        MetricValue::Confusion(cm) => Some(cm),
        _ => None,
    })
}

pub fn find_report(results: &[MetricResult]) -> Option<&ClassificationReport> {
    results.iter().find_map(|r| match &r.value {
        MetricValue::Report(report) => Some(report),
        _ => None,
    })
}

// ─── Classification strategies ────────────────────────────────────────────────

pub struct Accuracy;
pub struct Precision;
pub struct Recall;
pub struct F1;
pub struct Classification;
pub struct Confusion;

impl ClassificationMetric for Accuracy {
    fn name(&self) -> &'static str { "accuracy" }
    fn compute(&self, labels: &[u8], preds: &[u8]) -> MetricValue {
        MetricValue::Scalar(ConfusionMatrix::from_labels(labels, preds).accuracy())
    }
}

impl ClassificationMetric for Precision {
    fn name(&self) -> &'static str { "precision" }
    fn compute(&self, labels: &[u8], preds: &[u8]) -> MetricValue {
        MetricValue::Scalar(ConfusionMatrix::from_labels(labels, preds).class_scores(1).precision)
    }
}

impl ClassificationMetric for Recall {
    fn name(&self) -> &'static str { "recall" }
    fn compute(&self, labels: &[u8], preds: &[u8]) -> MetricValue {
        MetricValue::Scalar(ConfusionMatrix::from_labels(labels, preds).class_scores(1).recall)
    }
}

impl ClassificationMetric for F1 {
    fn name(&self) -> &'static str { "f1" }
    fn compute(&self, labels: &[u8], preds: &[u8]) -> MetricValue {
        MetricValue::Scalar(ConfusionMatrix::from_labels(labels, preds).class_scores(1).f1)
    }
}

impl ClassificationMetric for Classification {
    fn name(&self) -> &'static str { "classification" }
    fn compute(&self, labels: &[u8], preds: &[u8]) -> MetricValue {
        let cm = ConfusionMatrix::from_labels(labels, preds);
        MetricValue::Report(ClassificationReport::from_confusion(&cm))
    }
}

impl ClassificationMetric for Confusion {
    fn name(&self) -> &'static str { "confusion_matrix" }
    fn compute(&self, labels: &[u8], preds: &[u8]) -> MetricValue {
        MetricValue::Confusion(ConfusionMatrix::from_labels(labels, preds))
    }
}

// ─── Regression strategies ────────────────────────────────────────────────────

pub struct R2Score;
pub struct AdjustedR2;

impl RegressionMetric for R2Score {
    fn name(&self) -> &'static str { "r2" }
    fn compute(&self, y: &[f64], y_hat: &[f64], _n: usize, _p: usize) -> f64 {
        r2(y, y_hat)
    }
}

impl RegressionMetric for AdjustedR2 {
    fn name(&self) -> &'static str { "adjusted_r2" }
    /// Undefined when n <= p + 1; plain R² is returned in that case.
    fn compute(&self, y: &[f64], y_hat: &[f64], n: usize, p: usize) -> f64 {
        let r2 = r2(y, y_hat);
        if n <= p + 1 {
            return r2;
        }
        1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - p as f64 - 1.0)
    }
}

fn r2(y: &[f64], y_hat: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let mean   = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let ss_res = y.iter().zip(y_hat).map(|(v, p)| (v - p).powi(2)).sum::<f64>();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b == 0.0 { 0.0 } else { 2.0 * a * b / (a + b) }
}
