use candle_core::Device;
use tempfile::TempDir;
use wordemb_embed::{Embedder, Error, SentencePieceConfig, SentencePieceEmbedder};

const CORPUS: &[&str] = &[
    "hello world",
    "the quick brown fox jumps over the lazy dog",
    "hello there, world",
    "a lazy dog sleeps in the sun",
    "the world says hello back",
];

fn config(tmp: &TempDir) -> SentencePieceConfig {
    serde_json::from_value(serde_json::json!({
        "save_prefix": tmp.path().join("models/spm").to_string_lossy(),
        "vocab_size": 100,
        "dim": 8,
    }))
    .unwrap()
}

fn trained(tmp: &TempDir) -> SentencePieceEmbedder {
    let mut emb = SentencePieceEmbedder::new(&config(tmp)).expect("sentencepiece");
    for _ in 0..4 {
        for sentence in CORPUS {
            emb.add_sentence(sentence);
        }
    }
    emb.finalize().expect("fit");
    emb
}

#[test]
fn requires_training_before_use() {
    let tmp = TempDir::new().unwrap();
    let mut emb = SentencePieceEmbedder::new(&config(&tmp)).unwrap();
    assert!(emb.requires_training());
    assert!(!emb.is_fitted());
    assert!(matches!(emb.tokenize("hello"), Err(Error::NotFitted)));
    assert!(matches!(emb.lookup("▁hello"), Err(Error::NotFitted)));
    assert!(matches!(emb.contains("▁hello"), Err(Error::NotFitted)));
    assert!(matches!(emb.untokenize(&["▁hello".to_string()]), Err(Error::NotFitted)));
}

#[test]
fn finalize_without_sentences_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let mut emb = SentencePieceEmbedder::new(&config(&tmp)).unwrap();
    assert!(matches!(emb.finalize(), Err(Error::EmptyCorpus)));
    assert!(!emb.is_fitted());
}

#[test]
fn sentences_accumulate_in_order_without_dedup() {
    let tmp = TempDir::new().unwrap();
    let mut emb = SentencePieceEmbedder::new(&config(&tmp)).unwrap();
    emb.add_sentence("hello");
    emb.add_sentence("hello");
    assert_eq!(emb.num_sentences(), 2);
}

#[test]
fn fitted_model_tokenizes_and_looks_up() {
    let tmp = TempDir::new().unwrap();
    let mut emb = trained(&tmp);
    assert!(emb.is_fitted());
    assert!(emb.vocab_size().unwrap() > 0);
    assert!(config(&tmp).model_path().is_file(), "fitted model is saved under save_prefix");

    let tokens = emb.tokenize("hello world").unwrap();
    assert!(!tokens.is_empty());
    for token in &tokens {
        let v = emb.lookup(token).unwrap();
        assert_eq!(emb.contains(token).unwrap(), v.is_some());
        if let Some(v) = v {
            assert_eq!(v.dims(), &[8]);
        }
    }
    assert!(emb.tokenize("").unwrap().is_empty());
    assert_eq!(emb.untokenize(&tokens).unwrap(), "hello world");
    assert!(emb.lookup("<unk>").unwrap().is_none());
}

#[test]
fn device_chosen_before_fit_hosts_the_table() {
    let tmp = TempDir::new().unwrap();
    let mut emb = SentencePieceEmbedder::new(&config(&tmp)).unwrap();
    emb.to(&Device::Cpu).unwrap();
    for sentence in CORPUS {
        emb.add_sentence(sentence);
    }
    emb.finalize().unwrap();
    let tokens = emb.tokenize("hello").unwrap();
    let v = emb.lookup(&tokens[0]).unwrap().expect("fitted piece");
    assert!(v.device().is_cpu());
}

#[test]
fn finalize_again_refits_on_the_whole_corpus() {
    let tmp = TempDir::new().unwrap();
    let mut emb = trained(&tmp);
    emb.add_sentence("zebra zone");
    emb.finalize().unwrap();
    let tokens = emb.tokenize("zebra").unwrap();
    assert!(tokens.iter().all(|t| emb.contains(t).unwrap()));
}
