//! Sentence-piece style segmentation fitted on the caller's own corpus.
//!
//! Sentences are collected with `add_sentence`; `finalize` trains a unigram
//! model over them, saves it next to `save_prefix`, and builds a vector table
//! for the fitted pieces.
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use candle_core::{Device, Tensor};
use serde::Deserialize;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::unigram::{Unigram, UnigramTrainer};
use tokenizers::models::TrainerWrapper;
use tokenizers::pre_tokenizers::metaspace::Metaspace;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::{AddedToken, Decoder, Tokenizer};
use tracing::{info, warn};
use twox_hash::XxHash64;
use wordemb_core::config::expand_path;
use wordemb_core::error::{Error, Result};
use wordemb_core::Embedder;

use crate::vectors::VectorTable;

#[derive(Debug, Clone, Deserialize)]
pub struct SentencePieceConfig {
    /// Path prefix the fitted model is written to (`<save_prefix>.tokenizer.json`).
    pub save_prefix: String,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: u32,
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default = "default_unk")]
    pub unk_token: String,
}

fn default_vocab_size() -> u32 { 8000 }
fn default_dim() -> usize { 300 }
fn default_unk() -> String { "<unk>".to_string() }

impl SentencePieceConfig {
    pub fn model_path(&self) -> PathBuf {
        expand_path(format!("{}.tokenizer.json", self.save_prefix))
    }
}

struct Fitted {
    tokenizer: Tokenizer,
    table: VectorTable,
    unk_id: Option<u32>,
}

pub struct SentencePieceEmbedder {
    config: SentencePieceConfig,
    sentences: Vec<String>,
    fitted: Option<Fitted>,
    device: Device,
}

impl SentencePieceEmbedder {
    pub fn new(config: &SentencePieceConfig) -> Result<Self> {
        if config.dim == 0 || config.vocab_size == 0 {
            return Err(Error::InvalidConfig("sentencepiece dim and vocab_size must be positive".to_string()));
        }
        Ok(Self { config: config.clone(), sentences: Vec::new(), fitted: None, device: Device::Cpu })
    }

    pub fn num_sentences(&self) -> usize { self.sentences.len() }

    pub fn is_fitted(&self) -> bool { self.fitted.is_some() }

    /// Number of pieces in the fitted vocabulary.
    pub fn vocab_size(&self) -> Result<usize> {
        Ok(self.fitted()?.table.rows())
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted.as_ref().ok_or(Error::NotFitted)
    }

    fn fit(&self) -> Result<Fitted> {
        let mut tokenizer = Tokenizer::new(Unigram::default());
        tokenizer.with_pre_tokenizer(PreTokenizerWrapper::Metaspace(Metaspace::default()));
        tokenizer.with_decoder(DecoderWrapper::Metaspace(Metaspace::default()));

        let unk = self.config.unk_token.clone();
        let trainer = UnigramTrainer::builder()
            .show_progress(false)
            .vocab_size(self.config.vocab_size)
            .special_tokens(vec![AddedToken::from(unk.clone(), true)])
            .unk_token(Some(unk.clone()))
            .build()
            .map_err(|e| Error::Tokenizer(format!("unigram trainer: {e}")))?;
        let mut trainer = TrainerWrapper::UnigramTrainer(trainer);
        tokenizer
            .train(&mut trainer, self.sentences.iter())
            .map_err(|e| Error::Tokenizer(format!("training failed: {e}")))?;

        let path = self.config.model_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        tokenizer
            .save(&path, false)
            .map_err(|e| Error::Tokenizer(format!("saving {}: {}", path.display(), e)))?;

        let pieces = pieces_by_id(&tokenizer);
        let dim = self.config.dim;
        let mut data = Vec::with_capacity(pieces.len() * dim);
        for piece in &pieces {
            data.extend(initial_vector(piece, dim));
        }
        let table = VectorTable::new(data, pieces.len(), dim, &self.device)?;
        let unk_id = tokenizer.token_to_id(&unk);
        info!(model = %path.display(), pieces = pieces.len(), sentences = self.sentences.len(), "fitted sentencepiece model");
        Ok(Fitted { tokenizer, table, unk_id })
    }
}

/// Fitted pieces ordered by id; ids with no piece become empty strings.
fn pieces_by_id(tokenizer: &Tokenizer) -> Vec<String> {
    let vocab = tokenizer.get_vocab(true);
    let rows = vocab.values().max().map_or(0, |&id| id as usize + 1);
    let mut pieces = vec![String::new(); rows];
    for (piece, id) in vocab {
        pieces[id as usize] = piece;
    }
    pieces
}

/// Deterministic unit-norm starting vector for `piece`.
fn initial_vector(piece: &str, dim: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dim)
        .map(|j| {
            let mut hasher = XxHash64::with_seed(j as u64);
            piece.hash(&mut hasher);
            let h = hasher.finish();
            ((h >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
        })
        .collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in &mut v { *x /= norm; }
    v
}

impl Embedder for SentencePieceEmbedder {
    fn dim(&self) -> usize { self.config.dim }

    fn tokenize(&mut self, text: &str) -> Result<Vec<String>> {
        let encoding = self.fitted()?
            .tokenizer
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(format!("encode failed: {e}")))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn untokenize(&self, tokens: &[String]) -> Result<String> {
        match self.fitted()?.tokenizer.get_decoder() {
            Some(decoder) => decoder
                .decode(tokens.to_vec())
                .map_err(|e| Error::Tokenizer(format!("decode failed: {e}"))),
            None => Ok(tokens.concat()),
        }
    }

    fn lookup(&self, token: &str) -> Result<Option<Tensor>> {
        let fitted = self.fitted()?;
        match fitted.tokenizer.token_to_id(token) {
            Some(id) if Some(id) != fitted.unk_id => fitted.table.row(id),
            _ => Ok(None),
        }
    }

    fn to(&mut self, device: &Device) -> Result<()> {
        if let Some(fitted) = self.fitted.as_mut() {
            fitted.table.to_device(device)?;
        }
        self.device = device.clone();
        Ok(())
    }

    fn requires_training(&self) -> bool { true }

    fn add_sentence(&mut self, sentence: &str) {
        self.sentences.push(sentence.to_string());
    }

    fn finalize(&mut self) -> Result<()> {
        if self.sentences.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if self.fitted.is_some() {
            warn!(sentences = self.sentences.len(), "refitting sentencepiece model from the full corpus");
        }
        self.fitted = Some(self.fit()?);
        Ok(())
    }
}
