// ============================================================
// Layer 3: ArticleExample Domain Type
// ============================================================
// One (user, post) interaction instance, fully encoded:
//
//   title_ids / title_mask  fixed-length token ids + 1/0 mask
//   numeric                 one f32 per numeric column
//   categorical             one code per categorical column
//   topics                  topic distribution (non-negative)
//   user                    one code per user column
//   label                   1 = viral / top-k% by views
//
// Categorical and user codes are in [0, vocab_size] where
// 0 is reserved for a missing or unseen value.

use serde::{Deserialize, Serialize};

/// A raw input row keyed by column name, before encoding.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleExample {
    pub title_ids:   Vec<u32>,
    pub title_mask:  Vec<u32>,
    pub numeric:     Vec<f32>,
    pub categorical: Vec<u32>,
    pub topics:      Vec<f32>,
    pub user:        Vec<u32>,
    pub label:       u8,

    /// Regression targets used by the baseline models.
    /// Empty means "use the label as the only target".
    #[serde(default)]
    pub targets: Vec<f32>,
}

impl ArticleExample {
    pub fn is_positive(&self) -> bool {
        self.label == 1
    }

    /// Flat feature row for the baseline regressors:
    /// numeric values, then categorical codes as floats, then topics.
    /// Column order matches the order the fusion network stacks modalities.
    pub fn design_row(&self) -> Vec<f32> {
        let mut row = Vec::with_capacity(
            self.numeric.len() + self.categorical.len() + self.topics.len(),
        );
        row.extend_from_slice(&self.numeric);
        row.extend(self.categorical.iter().map(|&c| c as f32));
        row.extend_from_slice(&self.topics);
        row
    }

    pub fn regression_targets(&self) -> Vec<f32> {
        if self.targets.is_empty() {
            vec![self.label as f32]
        } else {
            self.targets.clone()
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::ArticleExample;

    /// Title of length 8 with the last two positions masked,
    /// 2 numeric columns, 1 categorical column, 4 topics, 1 user column.
    pub fn example(label: u8, user_code: u32) -> ArticleExample {
        ArticleExample {
            title_ids:   vec![101, 12, 13, 14, 15, 102, 0, 0],
            title_mask:  vec![1, 1, 1, 1, 1, 1, 0, 0],
            numeric:     vec![0.5, 1.5],
            categorical: vec![2],
            topics:      vec![0.1, 0.2, 0.3, 0.4],
            user:        vec![user_code],
            label,
            targets:     Vec::new(),
        }
    }
}
