/**
Data model of the library. The raw records (`RawDocument`, `RawEntity`, `RawRelation`,
`CharToken`) are produced by dataset specific readers and use character offsets. The aligned
records (`Sentence`, `Entity`, `Relation`, `Token`) are built by the partitioner and only use token
indices. A `Sentence` can be converted to and from the `SentenceRecord` interchange form.
*/
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display};

/// Half-open range of characters, `[start, end)`. Offsets count unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

impl CharSpan {
    pub fn new(start: usize, end: usize) -> Self {
        CharSpan { start, end }
    }
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
    /// Is `other` fully inside this span? Partial overlaps do not count.
    pub fn contains(&self, other: &CharSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl Display for CharSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Half-open range of token indices, `[start, end)`. A token span is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> Self {
        TokenSpan { start, end }
    }
    /// Number of tokens covered by the span.
    pub fn size(&self) -> usize {
        self.end - self.start
    }
}

impl Display for TokenSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A token as given by the external tokenizer. The offsets are only needed while aligning the
/// entities and are discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharToken {
    pub text: String,
    pub start: usize,
    pub length: usize,
}

impl CharToken {
    /// Builds a token whose length is the number of chars of `text`.
    pub fn new<S: Into<String>>(text: S, start: usize) -> Self {
        let text = text.into();
        let length = text.chars().count();
        CharToken {
            text,
            start,
            length,
        }
    }
    pub fn end(&self) -> usize {
        self.start + self.length
    }
    pub fn char_span(&self) -> CharSpan {
        CharSpan::new(self.start, self.end())
    }
}

/// Entity annotation, as read from a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawEntity {
    pub id: String,
    pub label: String,
    pub span: CharSpan,
    /// Optional attribute of the mention, such as the i2b2 assertion (`present`, `absent`,
    /// ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl RawEntity {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        id: S1,
        label: S2,
        start: usize,
        end: usize,
    ) -> Self {
        RawEntity {
            id: id.into(),
            label: label.into(),
            span: CharSpan::new(start, end),
            attribute: None,
        }
    }
    pub fn with_attribute<S: Into<String>>(mut self, attribute: S) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

/// Relation annotation. The head and the tail refer to `RawEntity::id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawRelation {
    pub head: String,
    pub tail: String,
    pub label: String,
}

impl RawRelation {
    pub fn new<S1, S2, S3>(head: S1, tail: S2, label: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        RawRelation {
            head: head.into(),
            tail: tail.into(),
            label: label.into(),
        }
    }
}

/// A document (or segment, such as an abstract) with its annotations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub relations: Vec<RawRelation>,
}

/// Token of an aligned sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub(crate) text: String,
    pub(crate) index: usize,
}

impl Token {
    pub fn text(&self) -> &str {
        &self.text
    }
    /// Position of the token inside its sentence.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Entity of an aligned sentence. It is built once by the partitioner from a `RawEntity` and the
/// token span derived by the aligner, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) attribute: Option<String>,
    pub(crate) char_span: Option<CharSpan>,
    pub(crate) span: TokenSpan,
    pub(crate) ordinal: usize,
}

impl Entity {
    pub(crate) fn aligned(raw: &RawEntity, span: TokenSpan, ordinal: usize) -> Self {
        Entity {
            id: raw.id.clone(),
            label: raw.label.clone(),
            attribute: raw.attribute.clone(),
            char_span: Some(raw.span),
            span,
            ordinal,
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
    /// Character span of the annotation. `None` when the sentence was decoded from a
    /// `SentenceRecord`.
    pub fn char_span(&self) -> Option<CharSpan> {
        self.char_span
    }
    pub fn span(&self) -> TokenSpan {
        self.span
    }
    /// Position of the entity in the sorted entity list of its sentence.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

/// Relation between two entities of the same sentence, referenced by their ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relation {
    pub(crate) head: usize,
    pub(crate) tail: usize,
    pub(crate) label: String,
}

impl Relation {
    pub fn head(&self) -> usize {
        self.head
    }
    pub fn tail(&self) -> usize {
        self.tail
    }
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A sentence with its tokens, its token-aligned entities (sorted by start) and its
/// deduplicated relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub(crate) orig_id: String,
    pub(crate) tokens: Vec<Token>,
    pub(crate) entities: Vec<Entity>,
    pub(crate) relations: Vec<Relation>,
}

impl Sentence {
    pub fn orig_id(&self) -> &str {
        &self.orig_id
    }
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }
    pub fn len(&self) -> usize {
        self.tokens.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Converts the sentence into its interchange form.
    pub fn to_record(&self) -> SentenceRecord {
        SentenceRecord {
            tokens: self.tokens.iter().map(|t| t.text.clone()).collect(),
            entities: self
                .entities
                .iter()
                .map(|e| EntityRecord {
                    label: e.label.clone(),
                    start: e.span.start,
                    end: e.span.end,
                    attribute: e.attribute.clone(),
                })
                .collect(),
            relations: self
                .relations
                .iter()
                .map(|r| RelationRecord {
                    label: r.label.clone(),
                    head: r.head,
                    tail: r.tail,
                })
                .collect(),
            orig_id: self.orig_id.clone(),
        }
    }
}

/// Entity of a `SentenceRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "type")]
    pub label: String,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// Relation of a `SentenceRecord`. `head` and `tail` are indices into the entity list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationRecord {
    #[serde(rename = "type")]
    pub label: String,
    pub head: usize,
    pub tail: usize,
}

/// Interchange form of a sentence:
/// `{"tokens": [..], "entities": [{"type", "start", "end"}], "relations": [{"type", "head",
/// "tail"}], "orig_id": ".."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub tokens: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
    #[serde(default)]
    pub orig_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Error returned when a `SentenceRecord` does not describe a valid sentence.
pub enum RecordError {
    /// The entity span is empty or goes past the last token.
    InvalidEntitySpan {
        index: usize,
        start: usize,
        end: usize,
        token_count: usize,
    },
    /// Two entities share the same span.
    DuplicateEntitySpan { start: usize, end: usize },
    /// The head or the tail of the relation is not an entity of the sentence.
    InvalidRelation {
        head: usize,
        tail: usize,
        entity_count: usize,
    },
}

impl Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEntitySpan {
                index,
                start,
                end,
                token_count,
            } => write!(
                f,
                "Entity {} has an invalid span [{}, {}) for a sentence of {} tokens",
                index, start, end, token_count
            ),
            Self::DuplicateEntitySpan { start, end } => {
                write!(f, "Two entities share the span [{}, {})", start, end)
            }
            Self::InvalidRelation {
                head,
                tail,
                entity_count,
            } => write!(
                f,
                "Relation ({}, {}) is invalid for a sentence of {} entities",
                head, tail, entity_count
            ),
        }
    }
}

impl Error for RecordError {}

impl TryFrom<SentenceRecord> for Sentence {
    type Error = RecordError;
    fn try_from(value: SentenceRecord) -> Result<Self, Self::Error> {
        let token_count = value.tokens.len();
        let mut seen = AHashSet::with_capacity(value.entities.len());
        let mut entities = Vec::with_capacity(value.entities.len());
        for (ordinal, e) in value.entities.into_iter().enumerate() {
            if e.end <= e.start || e.end > token_count {
                return Err(RecordError::InvalidEntitySpan {
                    index: ordinal,
                    start: e.start,
                    end: e.end,
                    token_count,
                });
            }
            if !seen.insert((e.start, e.end)) {
                return Err(RecordError::DuplicateEntitySpan {
                    start: e.start,
                    end: e.end,
                });
            }
            entities.push(Entity {
                id: format!("T{}", ordinal),
                label: e.label,
                attribute: e.attribute,
                char_span: None,
                span: TokenSpan::new(e.start, e.end),
                ordinal,
            });
        }
        // Ordinals follow the order of the spans, relations are remapped onto them.
        entities.sort_by_key(|e| (e.span.start, e.span.end));
        let mut remap = vec![0; entities.len()];
        for (ordinal, e) in entities.iter_mut().enumerate() {
            remap[e.ordinal] = ordinal;
            e.ordinal = ordinal;
            e.id = format!("T{}", ordinal);
        }
        let entity_count = entities.len();
        let mut relations = Vec::with_capacity(value.relations.len());
        for r in value.relations {
            if r.head >= entity_count || r.tail >= entity_count || r.head == r.tail {
                return Err(RecordError::InvalidRelation {
                    head: r.head,
                    tail: r.tail,
                    entity_count,
                });
            }
            let relation = Relation {
                head: remap[r.head],
                tail: remap[r.tail],
                label: r.label,
            };
            if !relations.contains(&relation) {
                relations.push(relation);
            }
        }
        let tokens = value
            .tokens
            .into_iter()
            .enumerate()
            .map(|(index, text)| Token { text, index })
            .collect();
        Ok(Sentence {
            orig_id: value.orig_id,
            tokens,
            entities,
            relations,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Error describing an invalid entity annotation. The annotation is rejected, the first
/// definition of an entity always wins.
pub enum AnnotationError {
    /// The same id was used for two different mentions.
    ConflictingDuplicate {
        id: String,
        kept: (String, CharSpan),
        rejected: (String, CharSpan),
    },
    /// The character span of the entity is empty or inverted.
    EmptySpan { id: String, span: CharSpan },
}

impl Display for AnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingDuplicate { id, kept, rejected } => write!(
                f,
                "Entity `{}` is defined twice: kept ({}, {}), rejected ({}, {})",
                id, kept.0, kept.1, rejected.0, rejected.1
            ),
            Self::EmptySpan { id, span } => {
                write!(f, "Entity `{}` has an empty span {}", id, span)
            }
        }
    }
}

impl Error for AnnotationError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Error describing a relation that cannot be represented in a sentence. The relation is dropped.
pub enum UnsupportedRelationError {
    /// The relation references an entity id that does not exist (or was rejected).
    MissingEntity { label: String, id: String },
    /// The head and the tail ended up in two different sentences.
    CrossSentence {
        label: String,
        head: String,
        tail: String,
    },
    /// The head and the tail are the same mention.
    Reflexive { label: String, id: String },
}

impl Display for UnsupportedRelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEntity { label, id } => {
                write!(f, "Relation `{}` references a missing entity `{}`", label, id)
            }
            Self::CrossSentence { label, head, tail } => write!(
                f,
                "Relation `{}` between `{}` and `{}` spans two sentences",
                label, head, tail
            ),
            Self::Reflexive { label, id } => {
                write!(f, "Relation `{}` links `{}` to itself", label, id)
            }
        }
    }
}

impl Error for UnsupportedRelationError {}

/// Annotations of a `RawDocument` that passed validation, with the rejected ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Validated<'a> {
    pub entities: Vec<&'a RawEntity>,
    pub relations: Vec<&'a RawRelation>,
    pub annotation_errors: Vec<AnnotationError>,
    pub relation_errors: Vec<UnsupportedRelationError>,
}

/// Checks the annotations of `doc` before partitioning. The first definition of an entity id
/// wins: a later definition with the same label and span is ignored, a different one is rejected.
/// Relations referencing a rejected or unknown id, or linking a mention to itself, are rejected.
pub fn validate(doc: &RawDocument) -> Validated<'_> {
    let mut validated = Validated::default();
    let mut by_id: AHashMap<&str, &RawEntity> = AHashMap::with_capacity(doc.entities.len());
    for entity in doc.entities.iter() {
        if entity.span.is_empty() {
            validated.annotation_errors.push(AnnotationError::EmptySpan {
                id: entity.id.clone(),
                span: entity.span,
            });
            continue;
        }
        match by_id.get(entity.id.as_str()) {
            Some(kept) if kept.label == entity.label && kept.span == entity.span => (),
            Some(kept) => validated
                .annotation_errors
                .push(AnnotationError::ConflictingDuplicate {
                    id: entity.id.clone(),
                    kept: (kept.label.clone(), kept.span),
                    rejected: (entity.label.clone(), entity.span),
                }),
            None => {
                by_id.insert(&entity.id, entity);
                validated.entities.push(entity);
            }
        }
    }
    for relation in doc.relations.iter() {
        if let Some(missing) = [&relation.head, &relation.tail]
            .into_iter()
            .find(|id| !by_id.contains_key(id.as_str()))
        {
            validated
                .relation_errors
                .push(UnsupportedRelationError::MissingEntity {
                    label: relation.label.clone(),
                    id: missing.clone(),
                });
        } else if relation.head == relation.tail {
            validated
                .relation_errors
                .push(UnsupportedRelationError::Reflexive {
                    label: relation.label.clone(),
                    id: relation.head.clone(),
                });
        } else {
            validated.relations.push(relation);
        }
    }
    validated
}
