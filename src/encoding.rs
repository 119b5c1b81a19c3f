/**
Bridge between an aligned `Sentence` and the sub-token space of the model. The sub-token encoder
is an external collaborator, represented by the `Encoder` trait. An `EncodedDocument` holds the
encoding of a sentence, the position of every token inside that encoding and the positive
entities and relations with their type indices.
*/
use crate::document::{Sentence, TokenSpan};
use crate::types::{EntityType, RelationType, TypeRegistry, UnknownTypeError};
use ahash::AHashMap;
use std::fmt::{self, Display};

/// Sub-token encoder, such as a word piece tokenizer.
pub trait Encoder {
    /// Encodes a single token into zero or more sub-token ids.
    fn encode(&self, token: &str) -> Vec<u32>;
    /// Id prepended to every encoding, if any.
    fn cls_id(&self) -> Option<u32> {
        None
    }
    /// Id appended to every encoding, if any.
    fn sep_id(&self) -> Option<u32> {
        None
    }
    /// Id used for a token that encodes to nothing.
    fn unk_id(&self) -> u32;
}

/// Whole-word vocabulary. Every known word is a single id and every unknown word is `[UNK]`. The
/// id `0` is kept for padding.
#[derive(Debug, Clone)]
pub struct WordVocab {
    ids: AHashMap<String, u32>,
    next_id: u32,
    cls: Option<u32>,
    sep: Option<u32>,
}

impl WordVocab {
    pub const PAD_ID: u32 = 0;
    pub const UNK_ID: u32 = 1;

    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = WordVocab {
            ids: AHashMap::new(),
            next_id: Self::UNK_ID + 1,
            cls: None,
            sep: None,
        };
        for word in words {
            vocab.insert(word);
        }
        vocab
    }

    /// Adds `word` to the vocabulary and returns its id.
    pub fn insert<S: Into<String>>(&mut self, word: S) -> u32 {
        let next_id = &mut self.next_id;
        *self.ids.entry(word.into()).or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            id
        })
    }

    /// Adds `[CLS]` and `[SEP]` around every encoding.
    pub fn with_special_tokens(mut self) -> Self {
        self.cls = Some(self.insert("[CLS]"));
        self.sep = Some(self.insert("[SEP]"));
        self
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.ids.get(word).copied()
    }

    /// Number of ids, padding and `[UNK]` included.
    pub fn len(&self) -> usize {
        self.next_id as usize
    }

    /// `true` when no word is stored. Padding and `[UNK]` always count in `len`.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for WordVocab {
    fn default() -> Self {
        WordVocab::new(Vec::<String>::new())
    }
}

impl Encoder for WordVocab {
    fn encode(&self, token: &str) -> Vec<u32> {
        if token.is_empty() {
            return vec![];
        }
        vec![self.id(token).unwrap_or(Self::UNK_ID)]
    }
    fn cls_id(&self) -> Option<u32> {
        self.cls
    }
    fn sep_id(&self) -> Option<u32> {
        self.sep
    }
    fn unk_id(&self) -> u32 {
        Self::UNK_ID
    }
}

/// Half-open range `[start, end)` of positions in the encoding of a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextSpan {
    pub start: usize,
    pub end: usize,
}

impl ContextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        ContextSpan { start, end }
    }
}

impl Display for ContextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

/// Positive (annotated) entity of an `EncodedDocument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositiveEntity {
    pub span: ContextSpan,
    /// Size of the entity in tokens.
    pub size: usize,
    pub entity_type: EntityType,
}

/// Positive relations sharing the same ordered pair of entities. `head` and `tail` index the
/// entity list of the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositiveRelation {
    pub head: usize,
    pub tail: usize,
    pub types: Vec<RelationType>,
}

/// A sentence encoded into sub-tokens, with its positive entities and relations resolved through
/// a `TypeRegistry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    pub(crate) orig_id: String,
    pub(crate) encoding: Vec<u32>,
    pub(crate) token_spans: Vec<ContextSpan>,
    pub(crate) entities: Vec<PositiveEntity>,
    pub(crate) relations: Vec<PositiveRelation>,
}

impl EncodedDocument {
    /// Encodes `sentence` with `encoder`. Fails if an entity or relation label is not part of
    /// `registry`.
    pub fn new<E: Encoder + ?Sized>(
        sentence: &Sentence,
        encoder: &E,
        registry: &TypeRegistry,
    ) -> Result<Self, UnknownTypeError> {
        let mut encoding = Vec::with_capacity(sentence.len() + 2);
        encoding.extend(encoder.cls_id());
        let mut token_spans = Vec::with_capacity(sentence.len());
        for token in sentence.tokens() {
            let mut ids = encoder.encode(token.text());
            if ids.is_empty() {
                ids.push(encoder.unk_id());
            }
            let start = encoding.len();
            encoding.extend(ids);
            token_spans.push(ContextSpan::new(start, encoding.len()));
        }
        encoding.extend(encoder.sep_id());

        let mut entities = Vec::with_capacity(sentence.entities().len());
        for entity in sentence.entities() {
            let span = entity.span();
            entities.push(PositiveEntity {
                span: Self::map_span(&token_spans, span),
                size: span.size(),
                entity_type: registry.entity_type(entity.label())?,
            });
        }

        let mut relations: Vec<PositiveRelation> = vec![];
        let mut pair_index: AHashMap<(usize, usize), usize> = AHashMap::new();
        for relation in sentence.relations() {
            let relation_type = registry.relation_type(relation.label())?;
            let pair = (relation.head(), relation.tail());
            match pair_index.get(&pair) {
                Some(i) => {
                    let types = &mut relations[*i].types;
                    if !types.contains(&relation_type) {
                        types.push(relation_type);
                    }
                }
                None => {
                    pair_index.insert(pair, relations.len());
                    relations.push(PositiveRelation {
                        head: pair.0,
                        tail: pair.1,
                        types: vec![relation_type],
                    });
                }
            }
        }

        Ok(EncodedDocument {
            orig_id: sentence.orig_id().to_string(),
            encoding,
            token_spans,
            entities,
            relations,
        })
    }

    fn map_span(token_spans: &[ContextSpan], span: TokenSpan) -> ContextSpan {
        ContextSpan::new(token_spans[span.start].start, token_spans[span.end - 1].end)
    }

    /// Position, inside the encoding, of the tokens `[span.start, span.end)`. The span must lie
    /// inside the sentence.
    pub fn context_span(&self, span: TokenSpan) -> ContextSpan {
        Self::map_span(&self.token_spans, span)
    }

    pub fn orig_id(&self) -> &str {
        &self.orig_id
    }
    pub fn encoding(&self) -> &[u32] {
        &self.encoding
    }
    /// Length of the encoding, special tokens included.
    pub fn context_size(&self) -> usize {
        self.encoding.len()
    }
    pub fn token_count(&self) -> usize {
        self.token_spans.len()
    }
    pub fn entities(&self) -> &[PositiveEntity] {
        &self.entities
    }
    pub fn relations(&self) -> &[PositiveRelation] {
        &self.relations
    }
}
