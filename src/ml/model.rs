// ============================================================
// Layer 5: BertAttBpr Fusion Network
// ============================================================
// Scores one (user, post) interaction:
//
//   Step 1  title   → TitleEncoder → FeedForward(hidden → 2·dim → dim)
//           numeric → one FeedForward(1 → dim/2 → dim) per column
//           cat     → one Embedding(vocab + 1, dim) per column
//           topics  → FeedForward(topics → dim/2 → dim)
//   Step 2  stack into the post sequence  [b, 1 + k + m + (t>0), dim]
//           (modalities with no columns are left out)
//   Step 3  user cat → one Embedding per column → [b, u, dim]
//   Step 4  pool both sequences with the learned task query
//           (separate pooling units for post and user)
//   Step 5  score = ⟨user_pooled, post_pooled⟩
//
// Alongside the score it returns the feature attention
// (post weights ++ user weights) and the title relevance.
//
// Reference: Burn Book §3 (Modules), §5 (Training)

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
    tensor::Distribution,
};

use crate::data::{
    batcher::{ArticleBatch, PairBatch},
    error::SchemaError,
    vocab::CategoryVocabs,
};
use crate::domain::schema::FeatureSchema;
use crate::ml::{
    attention::{AttentionPooling, AttentionPoolingConfig},
    encoders::{FeedForward, FeedForwardConfig},
    loss::bpr_loss,
    text_encoder::{TitleEncoder, TitleEncoderConfig, TitleEncoderRecord},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct BertAttBprConfig {
    pub dim:             usize,
    pub text:            TitleEncoderConfig,
    pub numeric_count:   usize,
    /// Embedding rows per post categorical column
    pub categorical_rows: Vec<usize>,
    pub topic_count:     usize,
    /// Embedding rows per user column
    pub user_rows:       Vec<usize>,
    #[config(default = 0.1)]
    pub dropout:         f64,
}

impl BertAttBprConfig {
    /// Size every per-column encoder from the schema and fitted vocabularies.
    pub fn for_schema(
        dim:    usize,
        text:   TitleEncoderConfig,
        schema: &FeatureSchema,
        vocabs: &CategoryVocabs,
    ) -> Result<Self, SchemaError> {
        Ok(Self::new(
            dim,
            text,
            schema.numeric_cols.len(),
            vocabs.embedding_rows(&schema.categorical_cols)?,
            schema.topic_cols.len(),
            vocabs.embedding_rows(&schema.user_cols)?,
        ))
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> BertAttBpr<B> {
        let dim  = self.dim;
        let half = dim / 2;

        let title_encoder    = self.text.init(device);
        let title_projection = FeedForwardConfig::new(self.text.hidden, 2 * dim, dim)
            .with_dropout(self.dropout)
            .init(device);

        let numeric_encoders = (0..self.numeric_count)
            .map(|_| FeedForwardConfig::new(1, half, dim).with_dropout(self.dropout).init(device))
            .collect();
        let categorical_embeddings = self.categorical_rows
            .iter()
            .map(|&rows| EmbeddingConfig::new(rows, dim).init(device))
            .collect();
        let topic_encoder = (self.topic_count > 0).then(|| {
            FeedForwardConfig::new(self.topic_count, half, dim)
                .with_dropout(self.dropout)
                .init(device)
        });
        let user_embeddings = self.user_rows
            .iter()
            .map(|&rows| EmbeddingConfig::new(rows, dim).init(device))
            .collect();

        let post_pooling = AttentionPoolingConfig::new(dim).init(device);
        let user_pooling = AttentionPoolingConfig::new(dim).init(device);

        let task_query = Param::from_tensor(Tensor::random(
            [1, 1, dim],
            Distribution::Uniform(0.0, 1.0),
            device,
        ));

        BertAttBpr {
            title_encoder, title_projection, numeric_encoders,
            categorical_embeddings, topic_encoder, user_embeddings,
            post_pooling, user_pooling, task_query, dim,
        }
    }
}

#[derive(Module, Debug)]
pub struct BertAttBpr<B: Backend> {
    pub title_encoder:          TitleEncoder<B>,
    pub title_projection:       FeedForward<B>,
    pub numeric_encoders:       Vec<FeedForward<B>>,
    pub categorical_embeddings: Vec<Embedding<B>>,
    pub topic_encoder:          Option<FeedForward<B>>,
    pub user_embeddings:        Vec<Embedding<B>>,
    pub post_pooling:           AttentionPooling<B>,
    pub user_pooling:           AttentionPooling<B>,
    pub task_query:             Param<Tensor<B, 3>>,
    pub dim:                    usize,
}

pub struct ScoreOutput<B: Backend> {
    /// [batch]
    pub scores:            Tensor<B, 1>,
    /// [batch, post_len + user_len]
    pub feature_attention: Tensor<B, 2>,
    /// [batch, title_len], detached
    pub title_attention:   Tensor<B, 2>,
}

pub struct PairOutput<B: Backend> {
    pub positive: ScoreOutput<B>,
    pub negative: ScoreOutput<B>,
}

impl<B: Backend> BertAttBpr<B> {
    /// Replace the title encoder weights with a pretrained record.
    pub fn with_title_encoder(mut self, record: TitleEncoderRecord<B>) -> Self {
        self.title_encoder = self.title_encoder.load_record(record);
        self
    }

    /// Post representation sequence: [batch, post_len, dim]
    fn post_sequence(
        &self,
        batch:    &ArticleBatch<B>,
        text_rep: Tensor<B, 3>,
    ) -> Result<Tensor<B, 3>, SchemaError> {
        let [b, _] = batch.title_ids.dims();
        let dim = self.dim;
        let mut slots = vec![text_rep];

        check_width("numeric", self.numeric_encoders.len(), width(&batch.numeric))?;
        if let Some(numeric) = &batch.numeric {
            for (i, encoder) in self.numeric_encoders.iter().enumerate() {
                let column = numeric.clone().slice([0..b, i..i + 1]);
                slots.push(encoder.forward(column).reshape([b, 1, dim]));
            }
        }

        check_width("categorical", self.categorical_embeddings.len(), width(&batch.categorical))?;
        if let Some(categorical) = &batch.categorical {
            for (i, embedding) in self.categorical_embeddings.iter().enumerate() {
                slots.push(embedding.forward(categorical.clone().slice([0..b, i..i + 1])));
            }
        }

        let topic_width = self.topic_encoder.as_ref().map_or(0, FeedForward::d_input);
        check_width("topic", topic_width, width(&batch.topics))?;
        if let (Some(encoder), Some(topics)) = (&self.topic_encoder, &batch.topics) {
            slots.push(encoder.forward(topics.clone()).reshape([b, 1, dim]));
        }

        Ok(Tensor::cat(slots, 1))
    }

    /// User representation sequence: [batch, user_len, dim]
    fn user_sequence(&self, batch: &ArticleBatch<B>) -> Result<Tensor<B, 3>, SchemaError> {
        let [b, width] = batch.user.dims();
        check_width("user", self.user_embeddings.len(), width)?;
        let slots = self.user_embeddings
            .iter()
            .enumerate()
            .map(|(i, embedding)| embedding.forward(batch.user.clone().slice([0..b, i..i + 1])))
            .collect();
        Ok(Tensor::cat(slots, 1))
    }

    /// Fails when a batch's column counts differ from the ones the
    /// model was built for.
    pub fn score(&self, batch: &ArticleBatch<B>) -> Result<ScoreOutput<B>, SchemaError> {
        let b = batch.batch_size();
        let dim = self.dim;

        // ── Step 1: text ─────────────────────────────────────────────────────
        let title = self.title_encoder.forward(batch.title_ids.clone(), batch.title_mask.clone());
        let title_attention = title.title_relevance();
        let text_rep = self.title_projection.forward(title.pooled).reshape([b, 1, dim]);

        // ── Steps 2-3: modality sequences ────────────────────────────────────
        let post = self.post_sequence(batch, text_rep)?;
        let user = self.user_sequence(batch)?;

        // ── Step 4: task-query pooling ───────────────────────────────────────
        let query = self.task_query.val().expand([b, 1, dim]);
        let post_pooled = self.post_pooling.forward(post, query.clone());
        let user_pooled = self.user_pooling.forward(user, query);

        // ── Step 5: inner product ────────────────────────────────────────────
        let scores = user_pooled.pooled
            .matmul(post_pooled.pooled.swap_dims(1, 2))
            .reshape([b]);

        let feature_attention = Tensor::cat(vec![post_pooled.weights, user_pooled.weights], 1);

        Ok(ScoreOutput { scores, feature_attention, title_attention })
    }

    pub fn forward_pair(&self, batch: &PairBatch<B>) -> Result<PairOutput<B>, SchemaError> {
        Ok(PairOutput {
            positive: self.score(&batch.positive)?,
            negative: self.score(&batch.negative)?,
        })
    }

    /// BPR loss over a pair batch: [1]
    pub fn forward_loss(
        &self,
        batch: &PairBatch<B>,
    ) -> Result<(Tensor<B, 1>, PairOutput<B>), SchemaError> {
        let output = self.forward_pair(batch)?;
        let loss = bpr_loss(output.positive.scores.clone(), output.negative.scores.clone());
        Ok((loss, output))
    }
}

fn width<B: Backend, K: burn::tensor::BasicOps<B>>(t: &Option<Tensor<B, 2, K>>) -> usize {
    t.as_ref().map_or(0, |t| t.dims()[1])
}

fn check_width(modality: &'static str, expected: usize, got: usize) -> Result<(), SchemaError> {
    if expected == got {
        Ok(())
    } else {
        Err(SchemaError::ModalityMismatch { modality, expected, got })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod fixtures {
    use super::BertAttBprConfig;
    use crate::ml::text_encoder::fixtures::tiny_config;

    /// dim 16, 2 numeric, 1 categorical (3 categories), 4 topics, 1 user column
    pub fn scenario_config() -> BertAttBprConfig {
        BertAttBprConfig::new(16, tiny_config(110, 8), 2, vec![4], 4, vec![6])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::scenario_config;
    use super::*;
    use crate::data::batcher::ArticleBatch;
    use crate::data::pairs::TrainingPair;
    use crate::domain::example::fixtures::example;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray<f32>;

    fn pair_batch(device: &<TestBackend as Backend>::Device) -> PairBatch<TestBackend> {
        let pairs = vec![
            TrainingPair { positive: example(1, 1), negative: example(0, 1) },
            TrainingPair { positive: example(1, 2), negative: example(0, 2) },
        ];
        crate::data::batcher::PairBatcher.batch(pairs, device)
    }

    #[test]
    fn test_scenario_scores_and_attention_shapes() {
        let device = Default::default();
        let model  = scenario_config().init::<TestBackend>(&device);
        let batch  = pair_batch(&device);

        let out = model.forward_pair(&batch).unwrap();
        assert_eq!(out.positive.scores.dims(), [2]);
        // post: text + 2 numeric + 1 categorical + topic = 5, user = 1
        assert_eq!(out.positive.feature_attention.dims(), [2, 6]);
        assert_eq!(out.positive.title_attention.dims(), [2, 8]);

        let scores: Vec<f32> = out.positive.scores.into_data().to_vec().unwrap();
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_scenario_loss_is_finite_and_non_negative() {
        let device = Default::default();
        let model  = scenario_config().init::<TestBackend>(&device);
        let (loss, _) = model.forward_loss(&pair_batch(&device)).unwrap();
        let loss: f32 = loss.into_scalar();
        assert!(loss.is_finite());
        assert!(loss >= 0.0);
    }

    #[test]
    fn test_omitted_modalities_shrink_feature_attention() {
        let device = Default::default();
        let cfg = BertAttBprConfig::new(16, scenario_config().text, 0, vec![4], 0, vec![6]);
        let model = cfg.init::<TestBackend>(&device);

        let mut ex = example(1, 1);
        ex.numeric.clear();
        ex.topics.clear();
        let batch = ArticleBatch::<TestBackend>::from_examples(&[ex], &device);

        let out = model.score(&batch).unwrap();
        // text + categorical, then user
        assert_eq!(out.feature_attention.dims(), [1, 3]);
    }

    #[test]
    fn test_batch_missing_a_configured_modality_is_rejected() {
        let device = Default::default();
        let model  = scenario_config().init::<TestBackend>(&device);

        let mut ex = example(1, 1);
        ex.numeric.clear();
        let batch = ArticleBatch::<TestBackend>::from_examples(&[ex], &device);

        let err = model.score(&batch).err().expect("numeric columns were configured");
        assert!(matches!(
            err,
            SchemaError::ModalityMismatch { modality: "numeric", expected: 2, got: 0 }
        ));
    }

    #[test]
    fn test_batch_with_extra_topics_is_rejected() {
        let device = Default::default();
        let cfg = BertAttBprConfig::new(16, scenario_config().text, 2, vec![4], 0, vec![6]);
        let model = cfg.init::<TestBackend>(&device);
        let batch = ArticleBatch::<TestBackend>::from_examples(&[example(1, 1)], &device);

        let err = model.score(&batch).err().expect("no topic encoder was built");
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn test_feature_attention_sums_to_one_per_pool() {
        let device = Default::default();
        let model  = scenario_config().init::<TestBackend>(&device);
        let batch  = ArticleBatch::<TestBackend>::from_examples(&[example(1, 3)], &device);

        let weights: Vec<f32> = model.score(&batch).unwrap().feature_attention.into_data().to_vec().unwrap();
        let post: f32 = weights[..5].iter().sum();
        let user: f32 = weights[5..].iter().sum();
        assert!((post - 1.0).abs() < 1e-5);
        assert!((user - 1.0).abs() < 1e-5);
        assert!(weights.iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn test_same_category_index_same_embedding() {
        let device = Default::default();
        let model  = scenario_config().init::<TestBackend>(&device);
        let ids = Tensor::<TestBackend, 1, Int>::from_ints([2, 2], &device).reshape([2, 1]);
        let out = model.categorical_embeddings[0].forward(ids);
        let a = out.clone().slice([0..1, 0..1, 0..16]).into_data();
        let b = out.slice([1..2, 0..1, 0..16]).into_data();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scoring_is_deterministic_without_autodiff() {
        let device = Default::default();
        let model  = scenario_config().init::<TestBackend>(&device);
        let batch  = ArticleBatch::<TestBackend>::from_examples(&[example(1, 1), example(0, 2)], &device);
        let a = model.score(&batch).unwrap().scores.into_data();
        let b = model.score(&batch).unwrap().scores.into_data();
        assert_eq!(a, b);
    }
}
