//! Reader for sentencepiece `.model` files.
//!
//! A `.model` file is a serialized `ModelProto`. Only the fields needed to
//! rebuild the segmenter as a `tokenizers::Tokenizer` are declared here; prost
//! skips the rest.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use prost::Message;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::bpe::BPE;
use tokenizers::models::unigram::Unigram;
use tokenizers::normalizers::{NormalizerWrapper, NFKC};
use tokenizers::pre_tokenizers::metaspace::Metaspace;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::Tokenizer;
use tracing::debug;
use wordemb_core::error::{Error, Result};

#[derive(Clone, PartialEq, Message)]
pub struct ModelProto {
    #[prost(message, repeated, tag = "1")]
    pub pieces: Vec<SentencePiece>,
    #[prost(message, optional, tag = "2")]
    pub trainer_spec: Option<TrainerSpec>,
    #[prost(message, optional, tag = "3")]
    pub normalizer_spec: Option<NormalizerSpec>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SentencePiece {
    #[prost(string, optional, tag = "1")]
    pub piece: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub score: Option<f32>,
    #[prost(int32, optional, tag = "3")]
    pub r#type: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TrainerSpec {
    #[prost(int32, optional, tag = "3")]
    pub model_type: Option<i32>,
    #[prost(bool, optional, tag = "35")]
    pub byte_fallback: Option<bool>,
    #[prost(int32, optional, tag = "40")]
    pub unk_id: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NormalizerSpec {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(bool, optional, tag = "3")]
    pub add_dummy_prefix: Option<bool>,
}

pub const MODEL_UNIGRAM: i32 = 1;
pub const MODEL_BPE: i32 = 2;

pub const PIECE_NORMAL: i32 = 1;
pub const PIECE_UNKNOWN: i32 = 2;
pub const PIECE_CONTROL: i32 = 3;

impl SentencePiece {
    fn text(&self) -> &str { self.piece.as_deref().unwrap_or_default() }
    fn kind(&self) -> i32 { self.r#type.unwrap_or(PIECE_NORMAL) }
}

/// A sentencepiece model rebuilt as a `tokenizers` pipeline.
pub struct SpmModel {
    pub tokenizer: Tokenizer,
    pub unk_token: Option<String>,
}

pub fn load(path: &Path) -> Result<SpmModel> {
    let bytes = fs::read(path)?;
    let proto = ModelProto::decode(bytes.as_slice())
        .map_err(|e| Error::ModelLoad(format!("{}: {}", path.display(), e)))?;
    from_proto(&proto).map_err(|e| match e {
        Error::ModelLoad(msg) => Error::ModelLoad(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

pub fn from_proto(proto: &ModelProto) -> Result<SpmModel> {
    if proto.pieces.is_empty() {
        return Err(Error::ModelLoad("model has an empty vocabulary".to_string()));
    }
    let trainer = proto.trainer_spec.clone().unwrap_or_default();
    let normalizer = proto.normalizer_spec.clone().unwrap_or_default();

    let unk_id = trainer
        .unk_id
        .and_then(|id| usize::try_from(id).ok())
        .filter(|&id| id < proto.pieces.len())
        .or_else(|| proto.pieces.iter().position(|p| p.kind() == PIECE_UNKNOWN));
    let unk_token = unk_id.map(|id| proto.pieces[id].text().to_string());
    let byte_fallback = trainer.byte_fallback.unwrap_or(false);

    let mut tokenizer = match trainer.model_type.unwrap_or(MODEL_UNIGRAM) {
        MODEL_UNIGRAM => {
            let vocab = proto.pieces.iter().map(|p| (p.text().to_string(), p.score.unwrap_or(0.0) as f64)).collect();
            let model = Unigram::from(vocab, unk_id, byte_fallback)
                .map_err(|e| Error::ModelLoad(format!("unigram model: {e}")))?;
            Tokenizer::new(model)
        }
        MODEL_BPE => {
            let (vocab, merges) = bpe_vocab_and_merges(&proto.pieces);
            let mut builder = BPE::builder().vocab_and_merges(vocab, merges).byte_fallback(byte_fallback);
            if let Some(unk) = &unk_token {
                builder = builder.unk_token(unk.clone()).fuse_unk(true);
            }
            let model = builder.build().map_err(|e| Error::ModelLoad(format!("bpe model: {e}")))?;
            Tokenizer::new(model)
        }
        other => return Err(Error::ModelLoad(format!("unsupported sentencepiece model type {other}"))),
    };

    let name = normalizer.name.as_deref().unwrap_or("nmt_nfkc");
    if name.contains("nfkc") {
        tokenizer.with_normalizer(NormalizerWrapper::NFKC(NFKC));
    }
    let prefix = normalizer.add_dummy_prefix.unwrap_or(true);
    tokenizer.with_pre_tokenizer(PreTokenizerWrapper::Metaspace(Metaspace::new('▁', prefix)));
    tokenizer.with_decoder(DecoderWrapper::Metaspace(Metaspace::new('▁', prefix)));

    debug!(pieces = proto.pieces.len(), normalizer = name, "rebuilt sentencepiece model");
    Ok(SpmModel { tokenizer, unk_token })
}

/// Piece ids plus the merge list implied by a BPE vocabulary.
///
/// Sentencepiece BPE stores no merges. Every normal piece that splits into two
/// other pieces yields a merge, ranked by the merged piece's id, which follows
/// its score.
fn bpe_vocab_and_merges(pieces: &[SentencePiece]) -> (HashMap<String, u32>, Vec<(String, String)>) {
    let vocab: HashMap<String, u32> = pieces
        .iter()
        .enumerate()
        .map(|(id, p)| (p.text().to_string(), id as u32))
        .collect();

    let mut ranked: Vec<(u32, u32, u32, String, String)> = Vec::new();
    for (id, piece) in pieces.iter().enumerate() {
        if piece.kind() != PIECE_NORMAL { continue; }
        let text = piece.text();
        for (split, _) in text.char_indices().skip(1) {
            let (left, right) = text.split_at(split);
            if let (Some(&l), Some(&r)) = (vocab.get(left), vocab.get(right)) {
                ranked.push((id as u32, l, r, left.to_string(), right.to_string()));
            }
        }
    }
    ranked.sort_by_key(|&(id, l, r, _, _)| (id, l, r));
    let merges = ranked.into_iter().map(|(_, _, _, l, r)| (l, r)).collect();
    (vocab, merges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(text: &str, kind: i32) -> SentencePiece {
        SentencePiece { piece: Some(text.to_string()), score: Some(0.0), r#type: Some(kind) }
    }

    fn bpe_proto(texts: &[&str]) -> ModelProto {
        let mut pieces = vec![piece("<unk>", PIECE_UNKNOWN), piece("<s>", PIECE_CONTROL)];
        pieces.extend(texts.iter().map(|t| piece(t, PIECE_NORMAL)));
        for (i, p) in pieces.iter_mut().enumerate() {
            p.score = Some(-(i as f32));
        }
        ModelProto {
            pieces,
            trainer_spec: Some(TrainerSpec { model_type: Some(MODEL_BPE), unk_id: Some(0), ..Default::default() }),
            normalizer_spec: Some(NormalizerSpec { name: Some("identity".to_string()), add_dummy_prefix: Some(true) }),
        }
    }

    #[test]
    fn merges_follow_piece_rank() {
        let proto = bpe_proto(&["▁", "a", "b", "c", "ab", "▁ab", "abc", "▁abc"]);
        let (vocab, merges) = bpe_vocab_and_merges(&proto.pieces);
        assert_eq!(vocab["ab"], 6);
        assert_eq!(
            merges,
            vec![
                ("a".to_string(), "b".to_string()),
                ("▁".to_string(), "ab".to_string()),
                ("ab".to_string(), "c".to_string()),
                ("▁".to_string(), "abc".to_string()),
                ("▁ab".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn bpe_model_segments_with_merges() {
        let proto = bpe_proto(&["▁", "a", "b", "c", "ab", "▁ab", "abc", "▁abc"]);
        let model = from_proto(&proto).unwrap();
        assert_eq!(model.unk_token.as_deref(), Some("<unk>"));
        let enc = model.tokenizer.encode("abc ab", false).unwrap();
        assert_eq!(enc.get_tokens(), &["▁abc", "▁ab"]);
    }

    #[test]
    fn decoded_bytes_round_trip() {
        let proto = bpe_proto(&["▁", "x"]);
        let bytes = proto.encode_to_vec();
        assert_eq!(ModelProto::decode(bytes.as_slice()).unwrap(), proto);
    }

    #[test]
    fn unigram_model_uses_unknown_piece() {
        let mut proto = bpe_proto(&["▁", "a", "▁a"]);
        proto.trainer_spec = Some(TrainerSpec { model_type: Some(MODEL_UNIGRAM), ..Default::default() });
        let model = from_proto(&proto).unwrap();
        assert_eq!(model.unk_token.as_deref(), Some("<unk>"));
        assert_eq!(model.tokenizer.encode("a", false).unwrap().get_tokens(), &["▁a"]);
    }

    #[test]
    fn empty_vocabulary_is_rejected() {
        let proto = ModelProto { pieces: vec![], trainer_spec: None, normalizer_spec: None };
        assert!(matches!(from_proto(&proto), Err(Error::ModelLoad(_))));
    }
}
