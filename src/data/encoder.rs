// ============================================================
// Layer 4: Example Encoder
// ============================================================
// Turns a raw JSON row into an ArticleExample:
//
//   title        → clean → tokenize → [CLS] tokens [SEP] [PAD]...
//   numeric      → f32 (numbers, numeric strings, booleans)
//   categorical  → vocabulary code, 0 for null / unseen
//   topics       → f32 per topic column
//   user         → vocabulary code per user column
//   label        → 0 or 1
//
// The title is truncated to max_title_len - 2 tokens so the
// [CLS] and [SEP] markers always fit.
//
// Rows that fail (missing column, non-numeric value, bad label)
// are skipped by encode_all with a warning.

use serde_json::Value;
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::data::{
    error::SchemaError,
    preprocessor::TitleCleaner,
    vocab::{category_key, CategoryVocabs, EncodingSnapshot},
};
use crate::domain::{
    example::{ArticleExample, RawRecord},
    schema::FeatureSchema,
};
use crate::infra::tokenizer_store::{CLS_TOKEN, PAD_TOKEN, SEP_TOKEN};

pub struct ExampleEncoder {
    schema:    FeatureSchema,
    vocabs:    CategoryVocabs,
    tokenizer: Arc<Tokenizer>,
    cleaner:   TitleCleaner,
    cls_id:    u32,
    sep_id:    u32,
    pad_id:    u32,
}

impl ExampleEncoder {
    pub fn new(snapshot: EncodingSnapshot, tokenizer: Arc<Tokenizer>) -> Result<Self, SchemaError> {
        if snapshot.schema.max_title_len < 2 {
            return Err(SchemaError::TitleTooShort(snapshot.schema.max_title_len));
        }
        let cls_id = tokenizer.token_to_id(CLS_TOKEN).unwrap_or(101);
        let sep_id = tokenizer.token_to_id(SEP_TOKEN).unwrap_or(102);
        let pad_id = tokenizer.token_to_id(PAD_TOKEN).unwrap_or(0);

        Ok(Self {
            schema: snapshot.schema,
            vocabs: snapshot.vocabs,
            tokenizer,
            cleaner: TitleCleaner::new(),
            cls_id,
            sep_id,
            pad_id,
        })
    }

    /// Encode every row, skipping (and logging) the ones that fail.
    pub fn encode_all(&self, records: &[RawRecord]) -> Vec<ArticleExample> {
        let mut skipped = 0usize;
        let examples: Vec<ArticleExample> = records
            .iter()
            .enumerate()
            .filter_map(|(row, record)| match self.encode(row, record) {
                Ok(ex) => Some(ex),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping {}", e);
                    None
                }
            })
            .collect();

        tracing::info!("Encoded {} articles ({} skipped)", examples.len(), skipped);
        examples
    }

    pub fn encode(&self, row: usize, record: &RawRecord) -> Result<ArticleExample, SchemaError> {
        let s = &self.schema;

        let title = match record.get(&s.title_col) {
            Some(Value::String(t)) => t.clone(),
            Some(Value::Null) | None => return Err(SchemaError::missing(row, &s.title_col)),
            Some(other) => other.to_string(),
        };
        let (title_ids, title_mask) = self.encode_title(&title)?;

        let numeric = s.numeric_cols
            .iter()
            .map(|col| numeric_value(row, col, record))
            .collect::<Result<Vec<_>, _>>()?;

        let categorical = self.codes(&s.categorical_cols, record)?;

        let topics = s.topic_cols
            .iter()
            .map(|col| numeric_value(row, col, record))
            .collect::<Result<Vec<_>, _>>()?;

        let user = self.codes(&s.user_cols, record)?;

        let label = label_value(row, &s.label_col, record)?;

        let targets = s.target_cols
            .iter()
            .map(|col| numeric_value(row, col, record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ArticleExample { title_ids, title_mask, numeric, categorical, topics, user, label, targets })
    }

    /// `[CLS] tokens [SEP]` padded with the pad id to max_title_len.
    pub fn encode_title(&self, title: &str) -> Result<(Vec<u32>, Vec<u32>), SchemaError> {
        let max_len = self.schema.max_title_len;
        let cleaned = self.cleaner.clean(title);

        let encoding = self.tokenizer
            .encode(cleaned.as_str(), false)
            .map_err(|e| SchemaError::Tokenizer(e.to_string()))?;

        let body = encoding.get_ids();
        let body = &body[..body.len().min(max_len - 2)];

        let mut ids = Vec::with_capacity(max_len);
        ids.push(self.cls_id);
        ids.extend_from_slice(body);
        ids.push(self.sep_id);

        let mut mask = vec![1u32; ids.len()];
        ids.resize(max_len, self.pad_id);
        mask.resize(max_len, 0);

        Ok((ids, mask))
    }

    fn codes(&self, columns: &[String], record: &RawRecord) -> Result<Vec<u32>, SchemaError> {
        columns
            .iter()
            .map(|col| {
                let key = record.get(col).and_then(category_key);
                Ok(self.vocabs.get(col)?.code(key.as_deref()))
            })
            .collect()
    }
}

fn numeric_value(row: usize, column: &str, record: &RawRecord) -> Result<f32, SchemaError> {
    match record.get(column) {
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| SchemaError::not_numeric(row, column, &Value::Number(n.clone()))),
        Some(Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        Some(v @ Value::String(s)) => s
            .trim()
            .parse::<f32>()
            .map_err(|_| SchemaError::not_numeric(row, column, v)),
        Some(Value::Null) | None => Err(SchemaError::missing(row, column)),
        Some(other) => Err(SchemaError::not_numeric(row, column, other)),
    }
}

fn label_value(row: usize, column: &str, record: &RawRecord) -> Result<u8, SchemaError> {
    let invalid = |v: &Value| SchemaError::InvalidLabel {
        row,
        column: column.to_string(),
        value:  v.to_string(),
    };
    match record.get(column) {
        Some(Value::Bool(b)) => Ok(u8::from(*b)),
        Some(v @ Value::Number(n)) => match n.as_f64() {
            Some(x) if x == 0.0 => Ok(0),
            Some(x) if x == 1.0 => Ok(1),
            _ => Err(invalid(v)),
        },
        Some(v @ Value::String(s)) => match s.trim() {
            "0" | "false" => Ok(0),
            "1" | "true" => Ok(1),
            _ => Err(invalid(v)),
        },
        Some(Value::Null) | None => Err(SchemaError::missing(row, column)),
        Some(other) => Err(invalid(other)),
    }
}
