//! Pretrained byte-pair subword vectors (BPEmb).
//!
//! Expects the files of one BPEmb release under `<cache_dir>/<lang>/`:
//!
//! - `<lang>.wiki.bpe.vs<vocab_size>.model`: the sentencepiece subword model
//! - `<lang>.wiki.bpe.vs<vocab_size>.d<dim>.w2v.txt`: word2vec text vectors,
//!   one row per piece
//!
//! A model path ending in `.json` is read as a `tokenizers` file instead.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use serde::Deserialize;
use tokenizers::{Decoder, Tokenizer};
use tracing::{info, warn};
use wordemb_core::config::expand_path;
use wordemb_core::error::{Error, Result};
use wordemb_core::Embedder;

use crate::spm;
use crate::vectors::{TextVectors, VectorTable};

#[derive(Debug, Clone, Deserialize)]
pub struct BpembConfig {
    pub dim: usize,
    pub vocab_size: usize,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Lower-case and map digits to `0` before encoding, as the BPEmb models were trained.
    #[serde(default = "default_preprocess")]
    pub preprocess: bool,
    #[serde(default = "default_unk")]
    pub unk_token: String,
}

fn default_lang() -> String { "en".to_string() }
fn default_cache_dir() -> String { "~/.cache/bpemb".to_string() }
fn default_preprocess() -> bool { true }
fn default_unk() -> String { "<unk>".to_string() }

impl BpembConfig {
    fn model_dir(&self) -> PathBuf {
        expand_path(&self.cache_dir).join(&self.lang)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join(format!("{}.wiki.bpe.vs{}.model", self.lang, self.vocab_size))
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.model_dir().join(format!("{}.wiki.bpe.vs{}.d{}.w2v.txt", self.lang, self.vocab_size, self.dim))
    }
}

pub struct BpembEmbedder {
    tokenizer: Tokenizer,
    table: VectorTable,
    /// Piece id to table row.
    rows: HashMap<u32, u32>,
    unk_id: Option<u32>,
    preprocess: bool,
}

impl BpembEmbedder {
    pub fn new(config: &BpembConfig) -> Result<Self> {
        if config.dim == 0 || config.vocab_size == 0 {
            return Err(Error::InvalidConfig("bpemb dim and vocab_size must be positive".to_string()));
        }
        let embedder = Self::from_files(&config.model_path(), &config.vectors_path(), config.dim, &config.unk_token)?;
        Ok(embedder.with_preprocess(config.preprocess))
    }

    pub fn from_files(model_path: &Path, vectors_path: &Path, dim: usize, unk_token: &str) -> Result<Self> {
        if !model_path.is_file() {
            return Err(Error::NotFound(format!("subword model {}", model_path.display())));
        }
        let (tokenizer, unk_token) = if model_path.extension().is_some_and(|ext| ext == "json") {
            let tokenizer = Tokenizer::from_file(model_path)
                .map_err(|e| Error::ModelLoad(format!("{}: {}", model_path.display(), e)))?;
            (tokenizer, unk_token.to_string())
        } else {
            let model = spm::load(model_path)?;
            (model.tokenizer, model.unk_token.unwrap_or_else(|| unk_token.to_string()))
        };
        let vectors = TextVectors::read(vectors_path)?;
        if vectors.dim != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: vectors.dim });
        }

        let mut rows = HashMap::with_capacity(vectors.rows());
        let mut strays = 0usize;
        for (row, word) in vectors.words.iter().enumerate() {
            match tokenizer.token_to_id(word) {
                Some(id) => { rows.insert(id, row as u32); }
                None => strays += 1,
            }
        }
        let pieces = tokenizer.get_vocab_size(true);
        if strays > 0 || rows.len() != pieces {
            warn!(pieces, rows = vectors.rows(), matched = rows.len(), strays, "subword vocabulary and vector table differ");
        }
        let unk_id = tokenizer.token_to_id(&unk_token);
        let table = vectors.into_table(&Device::Cpu)?;
        info!(model = %model_path.display(), pieces, dim, "bpemb model ready");
        Ok(Self { tokenizer, table, rows, unk_id, preprocess: true })
    }

    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }

    fn normalize(&self, text: &str) -> String {
        if !self.preprocess { return text.to_string(); }
        text.to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_digit() { '0' } else { c })
            .collect()
    }
}

impl Embedder for BpembEmbedder {
    fn dim(&self) -> usize { self.table.dim() }

    fn tokenize(&mut self, text: &str) -> Result<Vec<String>> {
        let text = self.normalize(text);
        let encoding = self.tokenizer
            .encode(text.as_str(), false)
            .map_err(|e| Error::Tokenizer(format!("encode failed: {e}")))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn untokenize(&self, tokens: &[String]) -> Result<String> {
        match self.tokenizer.get_decoder() {
            Some(decoder) => decoder
                .decode(tokens.to_vec())
                .map_err(|e| Error::Tokenizer(format!("decode failed: {e}"))),
            None => Ok(tokens.concat()),
        }
    }

    fn lookup(&self, token: &str) -> Result<Option<Tensor>> {
        match self.tokenizer.token_to_id(token) {
            Some(id) if Some(id) != self.unk_id => match self.rows.get(&id) {
                Some(&row) => self.table.row(row),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn to(&mut self, device: &Device) -> Result<()> {
        self.table.to_device(device)
    }

    fn requires_training(&self) -> bool { false }
}
