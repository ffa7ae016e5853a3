//! Name-based selection of embedder variants.
//!
//! Variants are registered under a category (`word_emb`) and a key. A config
//! object names its variant in a `name` field; the remaining fields are the
//! variant's own options.
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;
use wordemb_core::error::{Error, Result};

use crate::bpemb::{BpembConfig, BpembEmbedder};
use crate::embedder::AnyEmbedder;
use crate::glove::{GloveConfig, GloveEmbedder};
use crate::sentencepiece::{SentencePieceConfig, SentencePieceEmbedder};

pub const WORD_EMB: &str = "word_emb";

/// Builds a variant from its options (the config object minus `name`).
pub type Constructor = fn(Value) -> Result<AnyEmbedder>;

#[derive(Default)]
pub struct Registry {
    categories: BTreeMap<String, BTreeMap<String, Constructor>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// A registry holding the built-in `glove`, `bpemb` and `sentencepiece` variants.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(WORD_EMB, "glove", build_glove)
            .register(WORD_EMB, "bpemb", build_bpemb)
            .register(WORD_EMB, "sentencepiece", build_sentencepiece);
        registry
    }

    pub fn register(&mut self, category: &str, key: &str, ctor: Constructor) -> &mut Self {
        self.categories.entry(category.to_string()).or_default().insert(key.to_string(), ctor);
        self
    }

    pub fn lookup(&self, category: &str, key: &str) -> Result<Constructor> {
        self.categories
            .get(category)
            .and_then(|entries| entries.get(key))
            .copied()
            .ok_or_else(|| Error::UnknownVariant { category: category.to_string(), key: key.to_string() })
    }

    /// Registered keys of `category`, sorted.
    pub fn keys(&self, category: &str) -> Vec<&str> {
        self.categories
            .get(category)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Build the variant named by `config["name"]` within `category`.
    pub fn construct(&self, category: &str, config: &Value) -> Result<AnyEmbedder> {
        let Value::Object(fields) = config else {
            return Err(Error::InvalidConfig(format!("{category} config must be a table")));
        };
        let mut options = fields.clone();
        let key = match options.remove("name") {
            Some(Value::String(key)) => key,
            _ => return Err(Error::InvalidConfig(format!("{category} config needs a string 'name'"))),
        };
        let ctor = self.lookup(category, &key)?;
        info!(category, key = %key, "constructing embedder");
        ctor(Value::Object(options))
    }
}

fn options<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::InvalidConfig(format!("{key}: {e}")))
}

fn build_glove(value: Value) -> Result<AnyEmbedder> {
    let config: GloveConfig = options("glove", value)?;
    Ok(GloveEmbedder::new(&config)?.into())
}

fn build_bpemb(value: Value) -> Result<AnyEmbedder> {
    let config: BpembConfig = options("bpemb", value)?;
    Ok(BpembEmbedder::new(&config)?.into())
}

fn build_sentencepiece(value: Value) -> Result<AnyEmbedder> {
    let config: SentencePieceConfig = options("sentencepiece", value)?;
    Ok(SentencePieceEmbedder::new(&config)?.into())
}
