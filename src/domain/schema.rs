// ============================================================
// Layer 3: Feature Schema and Modality Layout
// ============================================================
// FeatureSchema names the input columns of a dataset.
// ModalityLayout is the part of the schema the fusion network
// cares about: which modalities exist, in which order, and how
// many slots each one contributes to the stacked sequences.
//
// Post sequence order:  text, numeric×k, categorical×m, topic
// User sequence order:  user categorical×u
//
// Both the model configuration and the explanation report's
// feature labels are derived from the same ModalityLayout, so
// the label list always lines up with the attention slots.

use serde::{Deserialize, Serialize};

pub const TEXT_FEATURE: &str = "text";
pub const TOPIC_FEATURE: &str = "topic";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub title_col:        String,
    pub numeric_cols:     Vec<String>,
    pub categorical_cols: Vec<String>,
    pub topic_cols:       Vec<String>,
    pub user_cols:        Vec<String>,
    pub label_col:        String,
    #[serde(default)]
    pub target_cols:      Vec<String>,
    pub max_title_len:    usize,
}

impl FeatureSchema {
    pub fn layout(&self) -> ModalityLayout {
        ModalityLayout {
            numeric:     self.numeric_cols.clone(),
            categorical: self.categorical_cols.clone(),
            topic_count: self.topic_cols.len(),
            user:        self.user_cols.clone(),
        }
    }

    /// Width of the flat design matrix used by the baselines
    pub fn design_width(&self) -> usize {
        self.numeric_cols.len() + self.categorical_cols.len() + self.topic_cols.len()
    }

    pub fn task_count(&self) -> usize {
        self.target_cols.len().max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityLayout {
    pub numeric:     Vec<String>,
    pub categorical: Vec<String>,
    pub topic_count: usize,
    pub user:        Vec<String>,
}

impl ModalityLayout {
    pub fn has_topic(&self) -> bool {
        self.topic_count > 0
    }

    /// 1 (text) + numeric + categorical + (1 if any topic column)
    pub fn post_sequence_len(&self) -> usize {
        1 + self.numeric.len() + self.categorical.len() + usize::from(self.has_topic())
    }

    pub fn user_sequence_len(&self) -> usize {
        self.user.len()
    }

    pub fn feature_attention_len(&self) -> usize {
        self.post_sequence_len() + self.user_sequence_len()
    }

    /// Ordered names of every slot in the feature-attention vector.
    /// User slots are prefixed with `user:` since user columns often
    /// share names with post categorical columns.
    pub fn feature_labels(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.feature_attention_len());
        labels.push(TEXT_FEATURE.to_string());
        labels.extend(self.numeric.iter().cloned());
        labels.extend(self.categorical.iter().cloned());
        if self.has_topic() {
            labels.push(TOPIC_FEATURE.to_string());
        }
        labels.extend(self.user.iter().map(|u| format!("user:{u}")));
        labels
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::schema;

    #[test]
    fn test_post_sequence_len_counts_every_modality() {
        let layout = schema().layout();
        assert_eq!(layout.post_sequence_len(), 1 + 2 + 1 + 1);
        assert_eq!(layout.feature_attention_len(), 6);
    }

    #[test]
    fn test_empty_modalities_shrink_the_sequence() {
        let mut s = schema();
        s.numeric_cols.clear();
        s.topic_cols.clear();
        let layout = s.layout();
        assert_eq!(layout.post_sequence_len(), 2);
        assert_eq!(layout.feature_labels(), vec!["text", "stock_code", "user:article_source"]);
    }

    #[test]
    fn test_feature_labels_match_attention_slots() {
        let layout = schema().layout();
        let labels = layout.feature_labels();
        assert_eq!(labels.len(), layout.feature_attention_len());
        assert_eq!(labels[0], "text");
        assert_eq!(labels[4], "topic");
        assert_eq!(labels[5], "user:article_source");
    }
}
