// ============================================================
// Layer 5: Training Loops
// ============================================================
// BertAttBpr: pairwise train + validation loop with Adam.
//
//   per epoch:
//     train      shuffled pair batches → BPR loss → backward → Adam step
//     validate   model.valid() (no autodiff):
//                  mean BPR loss over validation pairs
//                  Evaluator: metrics, confusion matrix, explanations
//     persist    metrics.csv row, per-epoch CSVs, checkpoint
//
// Baselines: the same loop shape over design-matrix batches with
// each baseline's own loss, then R² / classification metrics.
// The title classifier runs it over title batches with
// cross-entropy and adds a per-article attention report.
//
// Training runs on Autodiff<Wgpu>; the loops are generic over
// AutodiffBackend so tests drive them on Autodiff<NdArray>.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{path::Path, sync::Arc};
use tokenizers::Tokenizer;

use crate::application::{baseline_use_case::BaselineConfig, train_use_case::TrainConfig};
use crate::data::{
    batcher::{DesignMatrixBatcher, PairBatcher, TitleBatch, TitleBatcher},
    dataset::{ExampleDataset, PairDataset},
};
use crate::domain::metric::{
    default_classification_metrics, default_regression_metrics, evaluate_classification,
    evaluate_regression, find_confusion, find_report, find_scalar, MetricResult,
};
use crate::infra::{
    checkpoint::{load_pretrained_encoder, CheckpointManager},
    metrics::{EpochMetrics, ReportWriter},
    tokenizer_store::id_space,
};
use crate::ml::{
    baselines::{
        Baseline, BaselineKind, LassoRegressionConfig, LinearRegressionConfig,
        LogisticRegressionConfig, SingleTaskRegressionConfig,
    },
    evaluator::{decode_title, Evaluator},
    model::{BertAttBpr, BertAttBprConfig},
    title_classifier::{TitleAttentionRow, TitleClassifier, TitleClassifierConfig},
};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type InferBackend = burn::backend::Wgpu;

/// Probability cut-off for the logistic baseline
const LOGISTIC_THRESHOLD: f64 = 0.5;

pub struct TrainingData {
    pub train_pairs:  PairDataset,
    /// May be empty: validation loss is then NaN
    pub val_pairs:    PairDataset,
    pub val_examples: ExampleDataset,
}

pub fn run_training(
    cfg:         &TrainConfig,
    model_cfg:   &BertAttBprConfig,
    data:        TrainingData,
    evaluator:   &Evaluator,
    checkpoints: &CheckpointManager,
    reports:     &ReportWriter,
) -> Result<Vec<EpochMetrics>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    train_loop::<TrainBackend>(cfg, model_cfg, data, evaluator, checkpoints, reports, device)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:         &TrainConfig,
    model_cfg:   &BertAttBprConfig,
    data:        TrainingData,
    evaluator:   &Evaluator,
    checkpoints: &CheckpointManager,
    reports:     &ReportWriter,
    device:      B::Device,
) -> Result<Vec<EpochMetrics>> {

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: BertAttBpr<B> = model_cfg.init(&device);
    if let Some(path) = &cfg.pretrained_encoder {
        model = model.with_title_encoder(load_pretrained_encoder::<B>(Path::new(path), &device)?);
    }
    tracing::info!(
        "Model ready: dim={}, {} title layers, {} numeric / {} categorical / {} user columns",
        model_cfg.dim,
        model_cfg.text.num_layers,
        model_cfg.numeric_count,
        model_cfg.categorical_rows.len(),
        model_cfg.user_rows.len(),
    );

    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::<B, _, _>::new(PairBatcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .set_device(device.clone())
        .build(data.train_pairs);

    let val_loader = DataLoaderBuilder::<B::InnerBackend, _, _>::new(PairBatcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .set_device(device.clone())
        .build(data.val_pairs);

    let mut history       = Vec::with_capacity(cfg.epochs);
    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(&batch)?;
            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);
        }
        let train_loss = mean(train_loss_sum, train_batches);

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;
        for batch in val_loader.iter() {
            let (loss, _) = model_valid.forward_loss(&batch)?;
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches  += 1;
        }
        let val_loss = mean(val_loss_sum, val_batches);

        let outcome = evaluator.evaluate(&model_valid, &data.val_examples, &device)?;

        // ── Reports ───────────────────────────────────────────────────────────
        let metrics = EpochMetrics::from_results(epoch, train_loss, val_loss, &outcome.metrics);
        reports.log(&metrics)?;

        let tag = format!("epoch_{epoch}");
        if let Some(cm) = find_confusion(&outcome.metrics) {
            reports.write_confusion(&tag, cm)?;
        }
        if let Some(report) = &outcome.report {
            reports.write_explanation(&tag, report)?;
        }
        if let Some(report) = find_report(&outcome.metrics) {
            tracing::info!("Validation report, epoch {}:\n{}", epoch, report);
        }

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | acc={:.1}% | precision={:.3} | recall={:.3} | f1={:.3}",
            epoch, cfg.epochs, train_loss, val_loss,
            metrics.accuracy * 100.0, metrics.precision, metrics.recall, metrics.f1,
        );

        if metrics.is_improvement(best_val_loss) {
            best_val_loss = metrics.val_loss;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_val_loss, epoch);
        }

        checkpoints.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
        history.push(metrics);
    }

    tracing::info!("Training complete!");
    Ok(history)
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

// ─── Baselines ────────────────────────────────────────────────────────────────

pub fn run_baseline(
    cfg:       &BaselineConfig,
    train:     ExampleDataset,
    val:       ExampleDataset,
    tokenizer: Arc<Tokenizer>,
    reports:   &ReportWriter,
) -> Result<Vec<MetricResult>> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    baseline_loop::<TrainBackend>(cfg, train, val, tokenizer, reports, device)
}

/// Build the configured baseline and train it. The tokenizer is
/// only read by the title classifier.
pub fn baseline_loop<B: AutodiffBackend>(
    cfg:       &BaselineConfig,
    train:     ExampleDataset,
    val:       ExampleDataset,
    tokenizer: Arc<Tokenizer>,
    reports:   &ReportWriter,
    device:    B::Device,
) -> Result<Vec<MetricResult>> {
    if !cfg.kind.uses_design_matrix() {
        let model_cfg = TitleClassifierConfig::new(cfg.text_encoder(id_space(&tokenizer)));
        tracing::info!(
            "Baseline {}: title classifier, hidden={}, layers={}",
            cfg.kind.name(), model_cfg.text.hidden, model_cfg.text.num_layers,
        );
        let mut model = model_cfg.init::<B>(&device);
        if let Some(path) = &cfg.pretrained_encoder {
            model.encoder = model.encoder.load_record(load_pretrained_encoder(Path::new(path), &device)?);
        }
        return fit_title_classifier(model, cfg, train, val, &tokenizer, reports, device);
    }

    let p     = cfg.schema.design_width();
    let tasks = cfg.schema.task_count();
    tracing::info!("Baseline {}: {} features, {} task(s)", cfg.kind.name(), p, tasks);

    match cfg.kind {
        BaselineKind::Lr => {
            let model = LinearRegressionConfig::new(p, tasks).init::<B>(&device);
            fit_baseline(model, cfg, train, val, reports, device)
        }
        BaselineKind::Logr => {
            let model = LogisticRegressionConfig::new(p, tasks).init::<B>(&device);
            fit_baseline(model, cfg, train, val, reports, device)
        }
        BaselineKind::Llr => {
            let model = LassoRegressionConfig::new(p, tasks)
                .with_lambda1(cfg.lambda1)
                .with_lambda2(cfg.lambda2)
                .init::<B>(&device);
            fit_baseline(model, cfg, train, val, reports, device)
        }
        BaselineKind::Slr => {
            anyhow::ensure!(
                cfg.y_index < tasks,
                "y_index {} is out of range for {} target column(s)", cfg.y_index, tasks
            );
            let model = SingleTaskRegressionConfig::new(p, cfg.y_index).init::<B>(&device);
            fit_baseline(model, cfg, train, val, reports, device)
        }
        BaselineKind::Text => anyhow::bail!("The title classifier does not read the design matrix"),
    }
}

fn fit_baseline<B, M>(
    mut model: M,
    cfg:       &BaselineConfig,
    train:     ExampleDataset,
    val:       ExampleDataset,
    reports:   &ReportWriter,
    device:    B::Device,
) -> Result<Vec<MetricResult>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Baseline<B>,
    M::InnerModule: Baseline<B::InnerBackend>,
{
    let mut optim = AdamConfig::new().init::<B, M>();
    let p = cfg.schema.design_width();

    let train_loader = DataLoaderBuilder::<B, _, _>::new(DesignMatrixBatcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .set_device(device.clone())
        .build(train);
    let val_loader = DataLoaderBuilder::<B::InnerBackend, _, _>::new(DesignMatrixBatcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .set_device(device)
        .build(val);

    let mut results = Vec::new();

    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        for batch in train_loader.iter() {
            let out = model.forward_loss(batch.x, batch.y);
            loss_sum += out.loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            let grads = GradientsParams::from_grads(out.loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);
        }
        let train_loss = mean(loss_sum, batches);

        // ── Validation ────────────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut y     = Vec::new();
        let mut y_hat = Vec::new();
        let mut width = 1usize;
        for batch in val_loader.iter() {
            let out = model_valid.forward_loss(batch.x, batch.y);
            width = out.prediction.dims()[1];
            y_hat.extend(floats(out.prediction)?);
            y.extend(floats(out.target)?);
        }

        results = if cfg.kind.is_classifier() {
            let labels: Vec<u8> = y.iter().map(|&v| u8::from(v >= LOGISTIC_THRESHOLD)).collect();
            let preds:  Vec<u8> = y_hat.iter().map(|&v| u8::from(v > LOGISTIC_THRESHOLD)).collect();
            let results = evaluate_classification(&default_classification_metrics(), &labels, &preds);
            if let Some(cm) = find_confusion(&results) {
                tracing::info!("Confusion matrix, epoch {}:\n{}", epoch, cm);
                reports.write_confusion(&format!("{}_epoch_{epoch}", cfg.kind.name()), cm)?;
            }
            results
        } else {
            evaluate_regression(&default_regression_metrics(), &y, &y_hat, width, p)
        };

        reports.log_baseline(cfg.kind.name(), epoch, train_loss, &results)?;
        match find_scalar(&results, "accuracy") {
            Some(acc) => println!(
                "Baseline {} epoch {:>3}/{} | loss={:.4} | acc={:.1}%",
                cfg.kind.name(), epoch, cfg.epochs, train_loss, acc * 100.0,
            ),
            None => println!(
                "Baseline {} epoch {:>3}/{} | loss={:.4}",
                cfg.kind.name(), epoch, cfg.epochs, train_loss,
            ),
        }
    }

    Ok(results)
}

fn fit_title_classifier<B: AutodiffBackend>(
    mut model: TitleClassifier<B>,
    cfg:       &BaselineConfig,
    train:     ExampleDataset,
    val:       ExampleDataset,
    tokenizer: &Tokenizer,
    reports:   &ReportWriter,
    device:    B::Device,
) -> Result<Vec<MetricResult>> {
    let name = cfg.kind.name();
    let mut optim = AdamConfig::new().init::<B, TitleClassifier<B>>();

    let train_loader = DataLoaderBuilder::<B, _, _>::new(TitleBatcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .set_device(device.clone())
        .build(train);

    let mut results = Vec::new();

    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(&batch);
            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);
        }
        let train_loss = mean(loss_sum, batches);

        // ── Validation ────────────────────────────────────────────────────────
        // Chunked by hand so each prediction stays next to its article.
        let model_valid = model.valid();
        let mut labels = Vec::with_capacity(val.examples().len());
        let mut preds  = Vec::with_capacity(val.examples().len());
        let mut rows   = Vec::with_capacity(val.examples().len());

        for chunk in val.examples().chunks(cfg.batch_size.max(1)) {
            let batch: TitleBatch<B::InnerBackend> = TitleBatcher.batch(chunk.to_vec(), &device);
            let output = model_valid.forward(batch.ids, batch.mask);

            let chunk_preds: Vec<u8> = output
                .predictions()
                .into_data()
                .iter::<i64>()
                .map(|p| u8::from(p == 1))
                .collect();
            let width     = output.title_attention.dims()[1];
            let attention = floats(output.title_attention)?;

            for (i, example) in chunk.iter().enumerate() {
                rows.push(TitleAttentionRow {
                    text:       decode_title(tokenizer, example)?,
                    label:      example.label,
                    prediction: chunk_preds[i],
                    attention:  attention[i * width..(i + 1) * width].iter().map(|&a| a as f32).collect(),
                });
            }
            labels.extend(chunk.iter().map(|e| e.label));
            preds.extend(chunk_preds);
        }

        results = evaluate_classification(&default_classification_metrics(), &labels, &preds);

        let tag = format!("{name}_epoch_{epoch}");
        if let Some(cm) = find_confusion(&results) {
            tracing::info!("Confusion matrix, epoch {}:\n{}", epoch, cm);
            reports.write_confusion(&tag, cm)?;
        }
        if let Some(report) = find_report(&results) {
            tracing::info!("Classification report, epoch {}:\n{}", epoch, report);
        }
        let path = reports.write_attention(&tag, &rows)?;
        tracing::info!("Attention report: '{}'", path.display());

        reports.log_baseline(name, epoch, train_loss, &results)?;
        println!(
            "Baseline {} epoch {:>3}/{} | loss={:.4} | acc={:.1}%",
            name, epoch, cfg.epochs, train_loss,
            find_scalar(&results, "accuracy").unwrap_or(0.0) * 100.0,
        );
    }

    Ok(results)
}

fn floats<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f64>> {
    t.into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))
}
