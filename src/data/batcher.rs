// ============================================================
// Layer 4: Article, Pair, Title and Design-Matrix Batchers
// ============================================================
// Implements Burn's Batcher trait to turn Vec<ArticleExample>
// (or Vec<TrainingPair>) into device tensors.
//
//   Input:  N examples, each with a title of length L,
//           k numeric, m categorical, t topic, u user columns
//   Output: ArticleBatch
//             title_ids / title_mask  [N, L]  Int
//             numeric                 [N, k]  Float   (None if k = 0)
//             categorical             [N, m]  Int     (None if m = 0)
//             topics                  [N, t]  Float   (None if t = 0)
//             user                    [N, u]  Int
//
// TitleBatch carries only ids, mask and the class label for the
// text-only classifier.
//
// A missing modality is None rather than a zero-width tensor, so
// the model never stacks an empty slice.
//
// Every value is flattened row-major and reshaped:
//   [e1_c1, e1_c2, ..., eN_cW] → [N, W]
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::pairs::TrainingPair;
use crate::domain::example::ArticleExample;

fn int_matrix<B: Backend>(
    rows:   &[ArticleExample],
    width:  usize,
    column: impl Fn(&ArticleExample) -> &[u32],
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let flat: Vec<i32> = rows
        .iter()
        .flat_map(|ex| column(ex).iter().map(|&x| x as i32))
        .collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([rows.len(), width])
}

fn float_matrix<B: Backend>(
    rows:   &[ArticleExample],
    width:  usize,
    column: impl Fn(&ArticleExample) -> &[f32],
    device: &B::Device,
) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flat_map(|ex| column(ex).iter().copied()).collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([rows.len(), width])
}

// ─── ArticleBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ArticleBatch<B: Backend> {
    pub title_ids:   Tensor<B, 2, Int>,
    pub title_mask:  Tensor<B, 2, Int>,
    pub numeric:     Option<Tensor<B, 2>>,
    pub categorical: Option<Tensor<B, 2, Int>>,
    pub topics:      Option<Tensor<B, 2>>,
    pub user:        Tensor<B, 2, Int>,
}

impl<B: Backend> ArticleBatch<B> {
    /// Stack pre-padded examples. All examples share one column layout.
    pub fn from_examples(items: &[ArticleExample], device: &B::Device) -> Self {
        let first = &items[0];
        let title_len = first.title_ids.len();
        let (k, m, t, u) = (
            first.numeric.len(),
            first.categorical.len(),
            first.topics.len(),
            first.user.len(),
        );

        let title_ids  = int_matrix(items, title_len, |e| &e.title_ids, device);
        let title_mask = int_matrix(items, title_len, |e| &e.title_mask, device);

        let numeric     = (k > 0).then(|| float_matrix(items, k, |e| &e.numeric, device));
        let categorical = (m > 0).then(|| int_matrix(items, m, |e| &e.categorical, device));
        let topics      = (t > 0).then(|| float_matrix(items, t, |e| &e.topics, device));

        let user = int_matrix(items, u, |e| &e.user, device);

        Self { title_ids, title_mask, numeric, categorical, topics, user }
    }

    pub fn batch_size(&self) -> usize {
        self.title_ids.dims()[0]
    }
}

#[derive(Clone, Debug, Default)]
pub struct ArticleBatcher;

impl<B: Backend> Batcher<B, ArticleExample, ArticleBatch<B>> for ArticleBatcher {
    fn batch(&self, items: Vec<ArticleExample>, device: &B::Device) -> ArticleBatch<B> {
        ArticleBatch::from_examples(&items, device)
    }
}

// ─── PairBatch ────────────────────────────────────────────────────────────────
/// Row i of `positive` and row i of `negative` form one training pair.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    pub positive: ArticleBatch<B>,
    pub negative: ArticleBatch<B>,
}

#[derive(Clone, Debug, Default)]
pub struct PairBatcher;

impl<B: Backend> Batcher<B, TrainingPair, PairBatch<B>> for PairBatcher {
    fn batch(&self, items: Vec<TrainingPair>, device: &B::Device) -> PairBatch<B> {
        let (positives, negatives): (Vec<_>, Vec<_>) =
            items.into_iter().map(|p| (p.positive, p.negative)).unzip();
        PairBatch {
            positive: ArticleBatch::from_examples(&positives, device),
            negative: ArticleBatch::from_examples(&negatives, device),
        }
    }
}

// ─── TitleBatch ───────────────────────────────────────────────────────────────
/// Title-only inputs for the text classifier baseline.
#[derive(Debug, Clone)]
pub struct TitleBatch<B: Backend> {
    /// [N, L]
    pub ids:    Tensor<B, 2, Int>,
    /// [N, L]
    pub mask:   Tensor<B, 2, Int>,
    /// [N], class index 0 or 1
    pub labels: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug, Default)]
pub struct TitleBatcher;

impl<B: Backend> Batcher<B, ArticleExample, TitleBatch<B>> for TitleBatcher {
    fn batch(&self, items: Vec<ArticleExample>, device: &B::Device) -> TitleBatch<B> {
        let len = items[0].title_ids.len();
        let labels: Vec<i32> = items.iter().map(|e| i32::from(e.label)).collect();
        TitleBatch {
            ids:    int_matrix(&items, len, |e| &e.title_ids, device),
            mask:   int_matrix(&items, len, |e| &e.title_mask, device),
            labels: Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device),
        }
    }
}

// ─── DesignBatch ──────────────────────────────────────────────────────────────
/// Flat inputs for the baseline regressors.
#[derive(Debug, Clone)]
pub struct DesignBatch<B: Backend> {
    /// [N, p]: numeric | categorical codes | topics
    pub x: Tensor<B, 2>,
    /// [N, tasks]
    pub y: Tensor<B, 2>,
}

#[derive(Clone, Debug, Default)]
pub struct DesignMatrixBatcher;

impl<B: Backend> Batcher<B, ArticleExample, DesignBatch<B>> for DesignMatrixBatcher {
    fn batch(&self, items: Vec<ArticleExample>, device: &B::Device) -> DesignBatch<B> {
        let n = items.len();

        let rows: Vec<Vec<f32>> = items.iter().map(ArticleExample::design_row).collect();
        let p = rows[0].len();
        let x_flat: Vec<f32> = rows.into_iter().flatten().collect();

        let targets: Vec<Vec<f32>> = items.iter().map(ArticleExample::regression_targets).collect();
        let tasks = targets[0].len();
        let y_flat: Vec<f32> = targets.into_iter().flatten().collect();

        DesignBatch {
            x: Tensor::<B, 1>::from_floats(x_flat.as_slice(), device).reshape([n, p]),
            y: Tensor::<B, 1>::from_floats(y_flat.as_slice(), device).reshape([n, tasks]),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::fixtures::example;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_title_batch_carries_class_labels() {
        let device = Default::default();
        let batch: TitleBatch<TestBackend> =
            TitleBatcher.batch(vec![example(1, 1), example(0, 2)], &device);

        assert_eq!(batch.ids.dims(), [2, 8]);
        assert_eq!(batch.mask.dims(), [2, 8]);
        let labels: Vec<i64> = batch.labels.into_data().iter::<i64>().collect();
        assert_eq!(labels, vec![1, 0]);
    }

    #[test]
    fn test_article_batch_shapes() {
        let device = Default::default();
        let batch: ArticleBatch<TestBackend> =
            ArticleBatcher.batch(vec![example(1, 1), example(0, 2), example(0, 3)], &device);

        assert_eq!(batch.batch_size(), 3);
        assert_eq!(batch.title_ids.dims(), [3, 8]);
        assert_eq!(batch.numeric.as_ref().map(|t| t.dims()), Some([3, 2]));
        assert_eq!(batch.categorical.as_ref().map(|t| t.dims()), Some([3, 1]));
        assert_eq!(batch.topics.as_ref().map(|t| t.dims()), Some([3, 4]));
        assert_eq!(batch.user.dims(), [3, 1]);
    }

    #[test]
    fn test_missing_modalities_are_none() {
        let device = Default::default();
        let mut ex = example(1, 1);
        ex.numeric.clear();
        ex.topics.clear();
        let batch = ArticleBatch::<TestBackend>::from_examples(&[ex], &device);
        assert!(batch.numeric.is_none());
        assert!(batch.topics.is_none());
        assert!(batch.categorical.is_some());
    }

    #[test]
    fn test_pair_batch_keeps_rows_aligned() {
        let device = Default::default();
        let pairs = vec![
            TrainingPair { positive: example(1, 4), negative: example(0, 4) },
            TrainingPair { positive: example(1, 5), negative: example(0, 5) },
        ];
        let batch: PairBatch<TestBackend> = PairBatcher.batch(pairs, &device);
        let pos_user = batch.positive.user.into_data();
        let neg_user = batch.negative.user.into_data();
        assert_eq!(pos_user, neg_user);
    }

    #[test]
    fn test_design_batch_matches_design_rows() {
        let device = Default::default();
        let batch: DesignBatch<TestBackend> =
            DesignMatrixBatcher.batch(vec![example(1, 1), example(0, 1)], &device);
        assert_eq!(batch.x.dims(), [2, 7]);
        assert_eq!(batch.y.dims(), [2, 1]);
        let x = batch.x.into_data().to_vec::<f32>().unwrap_or_default();
        assert_eq!(&x[..7], example(1, 1).design_row().as_slice());
    }
}
