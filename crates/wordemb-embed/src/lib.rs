//! Pretrained word and subword embedders behind the `wordemb_core::Embedder` contract.
//!
//! - [`GloveEmbedder`]: fixed word vectors, tokenized by a CoreNLP server
//! - [`BpembEmbedder`]: pretrained byte-pair subword vectors
//! - [`SentencePieceEmbedder`]: unigram segmentation fitted on a caller's corpus
//!
//! [`Registry`] builds any of them from a `word_emb` config table.
pub mod annotate;
pub mod bpemb;
pub mod cache;
pub mod embedder;
pub mod glove;
pub mod registry;
pub mod sentencepiece;
pub mod spm;
pub mod vectors;

pub use annotate::{Annotator, AnnotatorFactory, CoreNlpClient, CoreNlpConfig};
pub use bpemb::{BpembConfig, BpembEmbedder};
pub use embedder::AnyEmbedder;
pub use glove::{GloveConfig, GloveEmbedder};
pub use registry::{Registry, WORD_EMB};
pub use sentencepiece::{SentencePieceConfig, SentencePieceEmbedder};
pub use wordemb_core::{Embedder, Error, Result};

/// Build the embedder described by a `word_emb` config table.
pub fn from_config(config: &serde_json::Value) -> Result<AnyEmbedder> {
    Registry::with_defaults().construct(WORD_EMB, config)
}
