use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A training-required embedder was used before `finalize`.
    #[error("Model not yet fitted: call finalize() after adding sentences")]
    NotFitted,

    #[error("No training sentences were added before finalize()")]
    EmptyCorpus,

    #[error("Annotation failed: {0}")]
    Annotation(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Unknown {category} variant '{key}'")]
    UnknownVariant { category: String, key: String },

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
