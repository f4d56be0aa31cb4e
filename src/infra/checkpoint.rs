// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Everything `eval` needs to rebuild a trained model lives in
// one directory:
//
//   checkpoints/
//     {experiment}_epoch_1.mpk      weights after epoch 1
//     {experiment}_epoch_2.mpk
//     ...
//     latest_epoch.json             number of the last saved epoch
//     train_config.json             the run's TrainConfig
//     model_config.json             BertAttBprConfig (layer sizes)
//     schema.json                   feature schema + category codes
//     tokenizer.json                written by TokenizerStore
//
// Weights go through Burn's CompactRecorder (named MessagePack,
// half precision).
// Loading into a model of a different shape fails inside Burn and
// the error is passed up unchanged. Files carry no version tag.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::vocab::EncodingSnapshot;
use crate::domain::traits::Persistable;
use crate::ml::{model::BertAttBprConfig, text_encoder::TitleEncoderRecord};

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const TRAIN_CONFIG_FILE: &str = "train_config.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";
const SCHEMA_FILE:       &str = "schema.json";

pub struct CheckpointManager {
    dir:        PathBuf,
    experiment: String,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>, experiment: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir, experiment: experiment.into() })
    }

    /// Reopen a trained run: reads train_config.json and uses its
    /// experiment name for the weight files.
    pub fn open(dir: impl Into<PathBuf>) -> Result<(Self, TrainConfig)> {
        let dir = dir.into();
        let bare = Self { dir, experiment: String::new() };
        let cfg = bare.load_config()?;
        Ok((Self { experiment: cfg.experiment.clone(), ..bare }, cfg))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path without extension; the recorder appends `.mpk`.
    fn weights_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{}_epoch_{epoch}", self.experiment))
    }

    /// Save any Burn module's weights for `epoch` and move the
    /// latest-epoch pointer to it.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.weights_path(epoch);
        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&latest, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load weights for `epoch`, or for the latest saved epoch when `None`.
    /// `model` must already have the checkpoint's architecture.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        epoch:  Option<usize>,
        device: &B::Device,
    ) -> Result<M> {
        let epoch = match epoch {
            Some(e) => e,
            None    => self.latest_epoch()?,
        };
        let path = self.weights_path(epoch);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        model
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_EPOCH_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(TRAIN_CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(TRAIN_CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read config from '{}'. Run 'train' before 'eval'.", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_model_config(&self, cfg: &BertAttBprConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<BertAttBprConfig> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        BertAttBprConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read model config '{}': {e}", path.display()))
    }

    pub fn save_snapshot(&self, snapshot: &EncodingSnapshot) -> Result<()> {
        snapshot.save(&self.dir.join(SCHEMA_FILE))
    }

    pub fn load_snapshot(&self) -> Result<EncodingSnapshot> {
        EncodingSnapshot::load(&self.dir.join(SCHEMA_FILE))
    }
}

/// Read converted pretrained title-encoder weights (a CompactRecorder
/// file holding a `TitleEncoderRecord`).
pub fn load_pretrained_encoder<B: Backend>(
    path:   &Path,
    device: &B::Device,
) -> Result<TitleEncoderRecord<B>> {
    tracing::info!("Loading pretrained title encoder from '{}'", path.display());
    CompactRecorder::new()
        .load(path.to_path_buf(), device)
        .with_context(|| format!("Cannot load pretrained encoder '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocab::CategoryVocabs;
    use crate::domain::schema::fixtures::schema;
    use crate::ml::model::{fixtures::scenario_config, BertAttBpr};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn manager() -> (tempfile::TempDir, CheckpointManager) {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(tmp.path().join("ckpt"), "unit").unwrap();
        (tmp, mgr)
    }

    #[test]
    fn test_model_round_trip_restores_weights() {
        let (_tmp, mgr) = manager();
        let device = Default::default();
        let cfg = scenario_config();

        let saved: BertAttBpr<TestBackend> = cfg.init(&device);
        mgr.save_model(&saved, 3).unwrap();
        assert_eq!(mgr.latest_epoch().unwrap(), 3);
        assert!(mgr.dir().join("unit_epoch_3.mpk").exists());

        let fresh: BertAttBpr<TestBackend> = cfg.init(&device);
        let loaded = mgr.load_model(fresh, None, &device).unwrap();
        saved.task_query.val().into_data().assert_approx_eq::<f32>(
            &loaded.task_query.val().into_data(),
            burn::tensor::Tolerance::default(),
        );
    }

    #[test]
    fn test_missing_epoch_is_an_error() {
        let (_tmp, mgr) = manager();
        let device = Default::default();
        let model: BertAttBpr<TestBackend> = scenario_config().init(&device);
        assert!(mgr.load_model(model, Some(7), &device).is_err());
        assert!(mgr.latest_epoch().is_err());
    }

    #[test]
    fn test_configs_and_snapshot_round_trip() {
        let (_tmp, mgr) = manager();

        let cfg = TrainConfig { epochs: 2, experiment: "unit".into(), ..TrainConfig::default() };
        mgr.save_config(&cfg).unwrap();
        assert_eq!(mgr.load_config().unwrap().epochs, 2);

        let (reopened, loaded_cfg) = CheckpointManager::open(mgr.dir()).unwrap();
        assert_eq!(loaded_cfg.epochs, 2);
        assert_eq!(reopened.weights_path(1), mgr.weights_path(1));

        let model_cfg = scenario_config();
        mgr.save_model_config(&model_cfg).unwrap();
        let loaded = mgr.load_model_config().unwrap();
        assert_eq!(loaded.dim, model_cfg.dim);
        assert_eq!(loaded.user_rows, model_cfg.user_rows);

        let snapshot = EncodingSnapshot { schema: schema(), vocabs: CategoryVocabs::default() };
        mgr.save_snapshot(&snapshot).unwrap();
        assert_eq!(mgr.load_snapshot().unwrap(), snapshot);
    }
}
