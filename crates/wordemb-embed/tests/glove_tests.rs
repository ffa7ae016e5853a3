use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use candle_core::Device;
use tempfile::TempDir;
use wordemb_embed::{Annotator, AnnotatorFactory, Embedder, Error, GloveConfig, GloveEmbedder};

/// Splits on whitespace and treats '.' as a sentence end; counts calls.
struct CountingAnnotator {
    calls: Arc<AtomicUsize>,
}

impl Annotator for CountingAnnotator {
    fn annotate(&mut self, text: &str) -> wordemb_embed::Result<Vec<Vec<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text
            .split('.')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .collect())
    }
}

struct Fixture {
    _tmp: TempDir,
    config: GloveConfig,
    calls: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

impl Fixture {
    fn new(dim: usize) -> Self {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("glove.test.4d.txt"),
            "the 0.1 0.2 0.3 0.4\nhello 1 0 0 0\nworld 0 1 0 0\n",
        )
        .unwrap();
        let config: GloveConfig = serde_json::from_value(serde_json::json!({
            "kind": "test",
            "dim": dim,
            "cache_dir": tmp.path().to_string_lossy(),
        }))
        .unwrap();
        Self { _tmp: tmp, config, calls: Arc::default(), connects: Arc::default() }
    }

    fn factory(&self) -> AnnotatorFactory {
        let calls = self.calls.clone();
        let connects = self.connects.clone();
        Box::new(move || {
            connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingAnnotator { calls: calls.clone() }) as Box<dyn Annotator>)
        })
    }

    fn embedder(&self) -> GloveEmbedder {
        GloveEmbedder::with_annotator(&self.config, self.factory()).expect("glove")
    }
}

#[test]
fn tokenize_lowercases_and_flattens_sentences() {
    let fx = Fixture::new(4);
    let mut emb = fx.embedder();
    let tokens = emb.tokenize("Hello World. The end").unwrap();
    assert_eq!(tokens, vec!["hello", "world", "the", "end"]);
    assert_eq!(emb.untokenize(&tokens).unwrap(), "hello world the end");
}

#[test]
fn empty_text_does_not_start_the_client() {
    let fx = Fixture::new(4);
    let mut emb = fx.embedder();
    assert!(emb.tokenize("").unwrap().is_empty());
    assert!(emb.tokenize("   ").unwrap().is_empty());
    assert!(!emb.is_connected());
    assert_eq!(fx.connects.load(Ordering::SeqCst), 0);
}

#[test]
fn client_is_started_once_and_results_are_memoized() {
    let fx = Fixture::new(4);
    let mut emb = fx.embedder();
    let first = emb.tokenize("hello world").unwrap();
    let second = emb.tokenize("hello world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

    emb.tokenize("the world").unwrap();
    assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fx.connects.load(Ordering::SeqCst), 1);
}

#[test]
fn distinct_input_past_capacity_evicts_least_recently_used() {
    let fx = Fixture::new(4);
    let mut emb = fx.embedder();
    emb.tokenize("hello").unwrap();
    for i in 0..1023 {
        emb.tokenize(&format!("input {i}")).unwrap();
    }
    assert_eq!(emb.token_cache().len(), 1024);
    assert!(emb.token_cache().contains("hello"));

    // The 1025th distinct input pushes out "hello", the oldest entry.
    emb.tokenize("one more").unwrap();
    assert_eq!(emb.token_cache().len(), 1024);
    assert!(!emb.token_cache().contains("hello"));

    let before = fx.calls.load(Ordering::SeqCst);
    emb.tokenize("hello").unwrap();
    assert_eq!(fx.calls.load(Ordering::SeqCst), before + 1);
}

#[test]
fn lookup_and_contains_agree() {
    let fx = Fixture::new(4);
    let emb = fx.embedder();
    for token in ["the", "hello", "world", "missing", ""] {
        let found = emb.lookup(token).unwrap();
        assert_eq!(emb.contains(token).unwrap(), found.is_some(), "token {token:?}");
        if let Some(v) = found {
            assert_eq!(v.dims(), &[4]);
        }
    }
    let hello = emb.lookup("hello").unwrap().unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(hello, vec![1.0, 0.0, 0.0, 0.0]);
    assert_eq!(emb.vocab_size(), 3);
    assert!(!emb.requires_training());
}

#[test]
fn lookup_after_transfer_is_on_target_device() {
    let fx = Fixture::new(4);
    let mut emb = fx.embedder();
    emb.to(&Device::Cpu).unwrap();
    let v = emb.lookup("world").unwrap().expect("world is in vocabulary");
    assert!(v.device().is_cpu());
}

#[test]
fn width_mismatch_fails_at_construction() {
    let fx = Fixture::new(4);
    fs::copy(
        fx.config.vectors_path(),
        fx.config.vectors_path().with_file_name("glove.test.8d.txt"),
    )
    .unwrap();
    let mut config = fx.config.clone();
    config.dim = 8;
    let err = GloveEmbedder::with_annotator(&config, fx.factory()).err().expect("mismatch");
    assert!(matches!(err, Error::DimensionMismatch { expected: 8, actual: 4 }));
}

#[test]
fn missing_vectors_fail_at_construction() {
    let fx = Fixture::new(4);
    let mut config = fx.config.clone();
    config.kind = "absent".to_string();
    let err = GloveEmbedder::with_annotator(&config, fx.factory()).err().expect("missing");
    assert!(matches!(err, Error::NotFound(_)));
}
