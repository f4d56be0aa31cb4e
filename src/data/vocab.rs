// ============================================================
// Layer 4: Category Vocabularies
// ============================================================
// Every categorical (post or user) column gets its own
// vocabulary, fitted on the loaded rows:
//
//   distinct non-null values, sorted  →  codes 1..=n
//   null / absent / unseen value      →  code 0
//
// so an Embedding with n + 1 rows covers every code.
//
// The fitted vocabularies are saved next to the checkpoints
// (schema.json) so evaluation encodes rows exactly like training.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use crate::data::error::SchemaError;
use crate::domain::{example::RawRecord, schema::FeatureSchema, traits::Persistable};

/// Render a JSON scalar as a category key. Null means "missing".
pub fn category_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocab {
    /// Sorted distinct values; code = index + 1
    values: Vec<String>,
}

impl CategoryVocab {
    pub fn fit<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let distinct: BTreeSet<String> = values.into_iter().flatten().collect();
        Self { values: distinct.into_iter().collect() }
    }

    pub fn code(&self, value: Option<&str>) -> u32 {
        value
            .and_then(|v| self.values.binary_search_by(|known| known.as_str().cmp(v)).ok())
            .map_or(0, |idx| idx as u32 + 1)
    }

    /// Number of known categories (excluding the reserved 0)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rows an embedding table needs to cover codes 0..=len
    pub fn embedding_rows(&self) -> usize {
        self.values.len() + 1
    }
}

/// Vocabularies for every categorical and user column, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabs {
    columns: BTreeMap<String, CategoryVocab>,
}

impl CategoryVocabs {
    pub fn fit(schema: &FeatureSchema, records: &[RawRecord]) -> Self {
        let columns = schema
            .categorical_cols
            .iter()
            .chain(&schema.user_cols)
            .map(|col| {
                let vocab = CategoryVocab::fit(
                    records.iter().map(|r| r.get(col).and_then(category_key)),
                );
                tracing::debug!("Vocabulary '{}': {} categories", col, vocab.len());
                (col.clone(), vocab)
            })
            .collect();
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Result<&CategoryVocab, SchemaError> {
        self.columns
            .get(column)
            .ok_or_else(|| SchemaError::UnknownVocabulary(column.to_string()))
    }

    /// Embedding row counts for the given columns, in order
    pub fn embedding_rows(&self, columns: &[String]) -> Result<Vec<usize>, SchemaError> {
        columns.iter().map(|c| self.get(c).map(CategoryVocab::embedding_rows)).collect()
    }
}

/// Everything needed to encode rows the same way again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingSnapshot {
    pub schema: FeatureSchema,
    pub vocabs: CategoryVocabs,
}

impl Persistable for EncodingSnapshot {
    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write schema to '{}'", path.display()))
    }

    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).with_context(|| {
            format!("Cannot read schema from '{}'. Has 'train' been run?", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::fixtures::schema;
    use serde_json::json;

    fn vocab() -> CategoryVocab {
        CategoryVocab::fit(
            ["sina", "eastmoney", "sina", "cnstock"].iter().map(|s| Some(s.to_string())).chain([None]),
        )
    }

    #[test]
    fn test_codes_are_sorted_and_start_at_one() {
        let v = vocab();
        assert_eq!(v.len(), 3);
        assert_eq!(v.embedding_rows(), 4);
        assert_eq!(v.code(Some("cnstock")), 1);
        assert_eq!(v.code(Some("eastmoney")), 2);
        assert_eq!(v.code(Some("sina")), 3);
    }

    #[test]
    fn test_missing_and_unseen_map_to_zero() {
        let v = vocab();
        assert_eq!(v.code(None), 0);
        assert_eq!(v.code(Some("reuters")), 0);
    }

    #[test]
    fn test_numbers_and_strings_are_keys() {
        assert_eq!(category_key(&json!(600519)), Some("600519".into()));
        assert_eq!(category_key(&json!("600519")), Some("600519".into()));
        assert_eq!(category_key(&json!(null)), None);
    }

    #[test]
    fn test_fit_covers_post_and_user_columns() {
        let rows: Vec<RawRecord> = [
            json!({"stock_code": 1, "article_source": "sina"}),
            json!({"stock_code": 2, "article_source": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();

        let s = schema();
        let vocabs = CategoryVocabs::fit(&s, &rows);
        assert_eq!(vocabs.embedding_rows(&s.categorical_cols).unwrap(), vec![3]);
        assert_eq!(vocabs.embedding_rows(&s.user_cols).unwrap(), vec![2]);
        assert!(vocabs.get("nope").is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let snapshot = EncodingSnapshot { schema: schema(), vocabs: CategoryVocabs::default() };
        snapshot.save(&path).unwrap();
        assert_eq!(EncodingSnapshot::load(&path).unwrap(), snapshot);
    }
}
