// ============================================================
// Layer 6: Tokenizer Store
// ============================================================
// Manages building, saving, and loading the title tokenizer.
//
// Two sources:
//   1. --tokenizer <file>: an existing HuggingFace tokenizer.json
//      (e.g. the bert-base-chinese one that matches a pretrained
//      encoder record). It is copied into the checkpoint dir.
//   2. Otherwise a word-level vocabulary is counted from the
//      training titles and written as tokenizer JSON directly.
//      CJK characters are counted one per token, matching what
//      BertNormalizer's handle_chinese_chars does at encode time.
//
// Special ids follow the BERT convention:
//   [PAD]=0 [UNK]=1 [CLS]=101 [SEP]=102 [MASK]=103
//
// In tokenizers 0.15 train_from_files requires Trainer::Model
// to equal ModelWrapper, so the JSON is assembled by hand.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokenizers::Tokenizer;

pub const PAD_TOKEN: &str = "[PAD]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]", 0),
    ("[UNK]", 1),
    ("[CLS]", 101),
    ("[SEP]", 102),
    ("[MASK]", 103),
];
const FIRST_WORD_ID: u32 = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Use the pretrained tokenizer if one is given, else reuse the
    /// saved one, else build a fresh vocabulary from `titles`.
    pub fn load_or_build(
        &self,
        titles:     &[String],
        vocab_size: usize,
        pretrained: Option<&Path>,
    ) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        if let Some(src) = pretrained {
            tracing::info!("Using pretrained tokenizer '{}'", src.display());
            std::fs::copy(src, self.path())
                .with_context(|| format!("Cannot copy tokenizer from '{}'", src.display()))?;
            return self.load();
        }

        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(titles, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    fn build_and_save(&self, titles: &[String], vocab_size: usize) -> Result<Tokenizer> {
        let words = build_vocab(titles, vocab_size);
        let json  = tokenizer_json(&words);

        std::fs::write(self.path(), serde_json::to_string_pretty(&json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            words.len(),
            self.path().display()
        );
        self.load()
    }
}

/// Embedding rows needed to cover every id the tokenizer can emit.
/// Word-level vocabularies skip 2..=100, so this is max id + 1,
/// not the number of entries.
pub fn id_space(tokenizer: &Tokenizer) -> usize {
    tokenizer
        .get_vocab(true)
        .values()
        .max()
        .map_or(FIRST_WORD_ID as usize, |&max| max as usize + 1)
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF | 0x2A700..=0x2B73F
        | 0x2B740..=0x2B81F | 0x2B820..=0x2CEAF | 0xF900..=0xFAFF | 0x2F800..=0x2FA1F)
}

/// Split a title the way the saved tokenizer will: lowercase,
/// alphanumeric runs, one token per CJK character.
pub fn title_words(title: &str) -> Vec<String> {
    let mut words   = Vec::new();
    let mut current = String::new();

    for c in title.to_lowercase().chars() {
        if is_cjk(c) {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            words.push(c.to_string());
        } else if c.is_alphanumeric() {
            current.push(c);
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Most frequent words first (ties broken alphabetically), capped so
/// that words plus the 5 special tokens fit in `vocab_size`.
pub fn build_vocab(titles: &[String], vocab_size: usize) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for title in titles {
        for word in title_words(title) {
            *freq.entry(word).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));
    words.into_iter().map(|(w, _)| w).collect()
}

/// HuggingFace tokenizer JSON for a word-level model over `words`.
pub fn tokenizer_json(words: &[String]) -> serde_json::Value {
    let mut vocab = serde_json::Map::new();
    for (token, id) in SPECIAL_TOKENS {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }
    let mut next_id = FIRST_WORD_ID;
    for word in words {
        if !vocab.contains_key(word) {
            vocab.insert(word.clone(), serde_json::json!(next_id));
            next_id += 1;
        }
    }

    let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
        .iter()
        .map(|(content, id)| serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        }))
        .collect();

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    })
}

pub fn tokenizer_from_words(words: &[String]) -> Result<Tokenizer> {
    Tokenizer::from_str(&tokenizer_json(words).to_string())
        .map_err(|e| anyhow::anyhow!("Cannot build tokenizer: {e}"))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use tokenizers::Tokenizer;

    /// stocks=104 rally=105 on=106 earnings=107 茅=108 台=109
    pub fn tokenizer() -> Tokenizer {
        let words: Vec<String> = ["stocks", "rally", "on", "earnings", "茅", "台"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        super::tokenizer_from_words(&words).unwrap()
    }
}
