use candle_core::{Device, Tensor};
use wordemb_core::error::Result;
use wordemb_core::Embedder;

use crate::bpemb::BpembEmbedder;
use crate::glove::GloveEmbedder;
use crate::sentencepiece::SentencePieceEmbedder;

/// One of the built-in embedders, selected at runtime.
pub enum AnyEmbedder {
    Glove(GloveEmbedder),
    Bpemb(BpembEmbedder),
    SentencePiece(SentencePieceEmbedder),
}

impl AnyEmbedder {
    /// Registry key of the wrapped variant.
    pub fn key(&self) -> &'static str {
        match self {
            AnyEmbedder::Glove(_) => "glove",
            AnyEmbedder::Bpemb(_) => "bpemb",
            AnyEmbedder::SentencePiece(_) => "sentencepiece",
        }
    }

    fn inner(&self) -> &dyn Embedder {
        match self {
            AnyEmbedder::Glove(e) => e,
            AnyEmbedder::Bpemb(e) => e,
            AnyEmbedder::SentencePiece(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Embedder {
        match self {
            AnyEmbedder::Glove(e) => e,
            AnyEmbedder::Bpemb(e) => e,
            AnyEmbedder::SentencePiece(e) => e,
        }
    }
}

impl Embedder for AnyEmbedder {
    fn dim(&self) -> usize { self.inner().dim() }
    fn tokenize(&mut self, text: &str) -> Result<Vec<String>> { self.inner_mut().tokenize(text) }
    fn untokenize(&self, tokens: &[String]) -> Result<String> { self.inner().untokenize(tokens) }
    fn lookup(&self, token: &str) -> Result<Option<Tensor>> { self.inner().lookup(token) }
    fn contains(&self, token: &str) -> Result<bool> { self.inner().contains(token) }
    fn to(&mut self, device: &Device) -> Result<()> { self.inner_mut().to(device) }
    fn requires_training(&self) -> bool { self.inner().requires_training() }
    fn add_sentence(&mut self, sentence: &str) { self.inner_mut().add_sentence(sentence) }
    fn finalize(&mut self) -> Result<()> { self.inner_mut().finalize() }
}

impl From<GloveEmbedder> for AnyEmbedder {
    fn from(e: GloveEmbedder) -> Self { AnyEmbedder::Glove(e) }
}

impl From<BpembEmbedder> for AnyEmbedder {
    fn from(e: BpembEmbedder) -> Self { AnyEmbedder::Bpemb(e) }
}

impl From<SentencePieceEmbedder> for AnyEmbedder {
    fn from(e: SentencePieceEmbedder) -> Self { AnyEmbedder::SentencePiece(e) }
}
