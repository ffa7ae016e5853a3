use candle_core::{Device, Tensor};

use crate::error::Result;

/// Uniform surface over pretrained word and subword embedding sources.
///
/// A downstream model tokenizes raw text with [`Embedder::tokenize`] and maps
/// each token to a `[dim]` vector with [`Embedder::lookup`]. Tokens outside the
/// vocabulary yield `Ok(None)`; a miss is never an error.
///
/// Embedders whose [`Embedder::requires_training`] is `true` must be fed with
/// [`Embedder::add_sentence`] and fitted with [`Embedder::finalize`] before
/// any other call; until then those calls return [`crate::Error::NotFitted`].
pub trait Embedder: Send {
    /// Width of every vector returned by `lookup`.
    fn dim(&self) -> usize;

    /// Split `text` into lookup-ready tokens. Empty text yields no tokens.
    fn tokenize(&mut self, text: &str) -> Result<Vec<String>>;

    /// Approximate inverse of `tokenize`; whitespace and casing may be lost.
    fn untokenize(&self, tokens: &[String]) -> Result<String>;

    /// The `[dim]` vector for `token`, or `None` when it is not in the vocabulary.
    fn lookup(&self, token: &str) -> Result<Option<Tensor>>;

    fn contains(&self, token: &str) -> Result<bool> {
        Ok(self.lookup(token)?.is_some())
    }

    /// Move the vector table onto `device`, in place.
    fn to(&mut self, device: &Device) -> Result<()>;

    fn requires_training(&self) -> bool;

    /// Add a sentence to the training corpus. No-op for pretrained sources.
    fn add_sentence(&mut self, _sentence: &str) {}

    /// Fit the model on the sentences added so far. No-op for pretrained sources.
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}
