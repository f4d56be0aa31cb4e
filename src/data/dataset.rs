use burn::data::dataset::Dataset;

use crate::data::pairs::TrainingPair;
use crate::domain::example::ArticleExample;

/// How many articles of each class a split holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.negative + self.positive
    }
}

pub struct ExampleDataset {
    examples: Vec<ArticleExample>,
}

impl ExampleDataset {
    pub fn new(examples: Vec<ArticleExample>) -> Self { Self { examples } }

    pub fn examples(&self) -> &[ArticleExample] { &self.examples }

    pub fn class_counts(&self) -> ClassCounts {
        self.examples.iter().fold(ClassCounts::default(), |mut c, ex| {
            if ex.is_positive() { c.positive += 1 } else { c.negative += 1 }
            c
        })
    }

    pub fn log_class_counts(&self, split: &str) {
        let c = self.class_counts();
        tracing::info!(
            "{} split: {} articles, {} viral / {} not viral",
            split, c.total(), c.positive, c.negative,
        );
    }
}

impl Dataset<ArticleExample> for ExampleDataset {
    fn get(&self, index: usize) -> Option<ArticleExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

pub struct PairDataset {
    pairs: Vec<TrainingPair>,
}

impl PairDataset {
    pub fn new(pairs: Vec<TrainingPair>) -> Self { Self { pairs } }
}

impl Dataset<TrainingPair> for PairDataset {
    fn get(&self, index: usize) -> Option<TrainingPair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::fixtures::example;

    #[test]
    fn test_class_counts() {
        let ds = ExampleDataset::new(vec![example(1, 1), example(0, 1), example(0, 2)]);
        assert_eq!(ds.class_counts(), ClassCounts { negative: 2, positive: 1 });
        assert_eq!(ds.class_counts().total(), ds.len());
        assert_eq!(ds.get(0).map(|e| e.label), Some(1));
        assert!(ds.get(3).is_none());
    }
}
