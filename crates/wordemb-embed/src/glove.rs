//! Fixed word-level vectors (GloVe) with CoreNLP tokenization.
use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use serde::Deserialize;
use tracing::{debug, info};
use wordemb_core::config::expand_path;
use wordemb_core::error::{Error, Result};
use wordemb_core::Embedder;

use crate::annotate::{Annotator, AnnotatorFactory, CoreNlpConfig};
use crate::cache::{TokenCache, DEFAULT_CAPACITY};
use crate::vectors::{TextVectors, VectorTable};

#[derive(Debug, Clone, Deserialize)]
pub struct GloveConfig {
    /// Which vector set to load, e.g. `6B`, `42B`, `840B`, `twitter.27B`.
    pub kind: String,
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default)]
    pub annotator: CoreNlpConfig,
}

fn default_dim() -> usize { 300 }
fn default_cache_dir() -> String { ".vector_cache".to_string() }

impl GloveConfig {
    pub fn vectors_path(&self) -> std::path::PathBuf {
        expand_path(&self.cache_dir).join(format!("glove.{}.{}d.txt", self.kind, self.dim))
    }
}

pub struct GloveEmbedder {
    stoi: HashMap<String, u32>,
    table: VectorTable,
    annotator: Option<Box<dyn Annotator>>,
    connect: AnnotatorFactory,
    cache: TokenCache,
}

impl GloveEmbedder {
    pub fn new(config: &GloveConfig) -> Result<Self> {
        Self::with_annotator(config, config.annotator.factory())
    }

    /// Load the configured vectors but tokenize through annotators built by `connect`.
    pub fn with_annotator(config: &GloveConfig, connect: AnnotatorFactory) -> Result<Self> {
        if config.dim == 0 {
            return Err(Error::InvalidConfig("glove dim must be positive".to_string()));
        }
        Self::from_file(&config.vectors_path(), config.dim, connect)
    }

    pub fn from_file(path: &Path, dim: usize, connect: AnnotatorFactory) -> Result<Self> {
        let vectors = TextVectors::read(path)?;
        if vectors.dim != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: vectors.dim });
        }
        let stoi = vectors.index();
        let table = vectors.into_table(&Device::Cpu)?;
        info!(path = %path.display(), words = stoi.len(), dim, "glove vectors ready");
        Ok(Self {
            stoi,
            table,
            annotator: None,
            connect,
            cache: TokenCache::new(DEFAULT_CAPACITY),
        })
    }

    pub fn vocab_size(&self) -> usize { self.stoi.len() }

    pub fn token_cache(&self) -> &TokenCache { &self.cache }

    /// Whether the annotation client has been started.
    pub fn is_connected(&self) -> bool { self.annotator.is_some() }

    fn annotator(&mut self) -> Result<&mut Box<dyn Annotator>> {
        let annotator = match self.annotator.take() {
            Some(annotator) => annotator,
            None => {
                info!("starting annotation client");
                (self.connect)()?
            }
        };
        Ok(self.annotator.insert(annotator))
    }
}

impl Embedder for GloveEmbedder {
    fn dim(&self) -> usize { self.table.dim() }

    fn tokenize(&mut self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() { return Ok(Vec::new()); }
        if let Some(tokens) = self.cache.get(text) {
            debug!("token cache hit");
            return Ok(tokens.clone());
        }
        let sentences = self.annotator()?.annotate(text)?;
        let tokens: Vec<String> = sentences.into_iter().flatten().map(|w| w.to_lowercase()).collect();
        self.cache.insert(text.to_string(), tokens.clone());
        Ok(tokens)
    }

    fn untokenize(&self, tokens: &[String]) -> Result<String> {
        Ok(tokens.join(" "))
    }

    fn lookup(&self, token: &str) -> Result<Option<Tensor>> {
        match self.stoi.get(token) {
            Some(&row) => self.table.row(row),
            None => Ok(None),
        }
    }

    fn contains(&self, token: &str) -> Result<bool> {
        Ok(self.stoi.contains_key(token))
    }

    fn to(&mut self, device: &Device) -> Result<()> {
        self.table.to_device(device)
    }

    fn requires_training(&self) -> bool { false }
}
