/**
Partition of the documents into sentences. The sentence boundaries and the tokens come from a
`Segmenter`. Each sentence keeps the entities fully inside its boundaries, aligned onto its tokens,
and the relations whose head and tail both survived. An entity straddling two sentences is
dropped, never truncated.

Every sentence of a document gives a `Sentence`, even when it holds no entity, so the ids stay
continuous with the sentence ids of the source.
*/
use crate::align::{align, AlignmentError};
use crate::config::{AlignmentPolicy, SamplingConfig};
use crate::document::{
    validate, AnnotationError, CharSpan, CharToken, Entity, RawDocument, RawEntity, Relation,
    Sentence, Token, TokenSpan, UnsupportedRelationError,
};
use crate::reporter::PreparationReport;
use ahash::AHashMap;
use rayon::prelude::*;
use std::error::Error;
use std::fmt::{self, Display};
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

/// Splits a text into sentences and the sentences into tokens. Every offset counts unicode scalar
/// values from the start of the text.
pub trait Segmenter {
    /// Character spans of the sentences, in order.
    fn sentences(&self, text: &str) -> Vec<CharSpan>;
    /// Tokens of the sentence `sentence` of `text`.
    fn tokenize(&self, text: &str, sentence: CharSpan) -> Vec<CharToken>;
}

/// Segmenter based on the unicode sentence and word boundaries (UAX #29). Whitespace is never a
/// token.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeSegmenter;

fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .map(|(byte, _)| byte)
        .nth(char_offset)
        .unwrap_or(text.len())
}

impl Segmenter for UnicodeSegmenter {
    fn sentences(&self, text: &str) -> Vec<CharSpan> {
        let mut spans = vec![];
        let mut chars = 0;
        let mut last_byte = 0;
        for (byte, sentence) in text.split_sentence_bound_indices() {
            chars += text[last_byte..byte].chars().count();
            last_byte = byte;
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                continue;
            }
            let leading = sentence.chars().take_while(|c| c.is_whitespace()).count();
            let start = chars + leading;
            spans.push(CharSpan::new(start, start + trimmed.chars().count()));
        }
        spans
    }

    fn tokenize(&self, text: &str, sentence: CharSpan) -> Vec<CharToken> {
        let start = byte_offset(text, sentence.start);
        let end = byte_offset(text, sentence.end).max(start);
        let slice = &text[start..end];
        let mut tokens = vec![];
        let mut chars = sentence.start;
        let mut last_byte = 0;
        for (byte, word) in slice.split_word_bound_indices() {
            chars += slice[last_byte..byte].chars().count();
            last_byte = byte;
            if !word.trim().is_empty() {
                tokens.push(CharToken::new(word, chars));
            }
        }
        tokens
    }
}

/// A sentence boundary and its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceTokens {
    pub span: CharSpan,
    pub tokens: Vec<CharToken>,
}

impl SentenceTokens {
    pub fn new(span: CharSpan, tokens: Vec<CharToken>) -> Self {
        SentenceTokens { span, tokens }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Any problem found while preparing a document.
pub enum PreparationError {
    Alignment(AlignmentError),
    Annotation(AnnotationError),
    Relation(UnsupportedRelationError),
}

impl Display for PreparationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alignment(e) => std::fmt::Display::fmt(e, f),
            Self::Annotation(e) => std::fmt::Display::fmt(e, f),
            Self::Relation(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

impl Error for PreparationError {}

impl From<AlignmentError> for PreparationError {
    fn from(value: AlignmentError) -> Self {
        Self::Alignment(value)
    }
}

impl From<AnnotationError> for PreparationError {
    fn from(value: AnnotationError) -> Self {
        Self::Annotation(value)
    }
}

impl From<UnsupportedRelationError> for PreparationError {
    fn from(value: UnsupportedRelationError) -> Self {
        Self::Relation(value)
    }
}

/// Sentences of a partitioned document and every recoverable problem met on the way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionOutcome {
    pub sentences: Vec<Sentence>,
    pub issues: Vec<PreparationError>,
    /// Entities merged into an earlier entity with the same token span.
    pub collapsed: usize,
    /// Entities crossing a sentence boundary.
    pub straddling: usize,
}

/// Partitions `doc` into the given sentences.
///
/// With `AlignmentPolicy::Drop`, an entity that overlaps no token is dropped and reported in the
/// outcome; with `AlignmentPolicy::Abort`, the first such entity aborts the document. Any other
/// problem only drops the offending annotation.
pub fn partition(
    doc: &RawDocument,
    sentences: &[SentenceTokens],
    policy: AlignmentPolicy,
) -> Result<PartitionOutcome, PreparationError> {
    let validated = validate(doc);
    let mut outcome = PartitionOutcome::default();
    outcome.issues.extend(
        validated
            .annotation_errors
            .into_iter()
            .map(PreparationError::from),
    );
    outcome.issues.extend(
        validated
            .relation_errors
            .into_iter()
            .map(PreparationError::from),
    );

    // entity id -> (sentence, ordinal)
    let mut placement: AHashMap<&str, (usize, usize)> = AHashMap::new();
    let mut placed_entities = 0;
    for (i, sentence) in sentences.iter().enumerate() {
        let mut inside: Vec<&RawEntity> = validated
            .entities
            .iter()
            .filter(|e| sentence.span.contains(&e.span))
            .copied()
            .collect();
        inside.sort_by_key(|e| e.span.start);
        let spans: Vec<CharSpan> = inside.iter().map(|e| e.span).collect();

        let mut entities: Vec<Entity> = Vec::with_capacity(inside.len());
        let mut by_span: AHashMap<TokenSpan, usize> = AHashMap::with_capacity(inside.len());
        for (raw, aligned) in inside.iter().copied().zip(align(&sentence.tokens, &spans)) {
            placed_entities += 1;
            let span = match aligned {
                Ok(span) => span,
                Err(e) => {
                    let e = e.with_entity(raw.id.as_str());
                    match policy {
                        AlignmentPolicy::Drop => {
                            warn!(document = doc.id.as_str(), error = %e, "Dropped an entity");
                            outcome.issues.push(e.into());
                            continue;
                        }
                        AlignmentPolicy::Abort => return Err(e.into()),
                    }
                }
            };
            if let Some(ordinal) = by_span.get(&span) {
                debug!(
                    document = doc.id.as_str(),
                    entity = raw.id.as_str(),
                    "Collapsed an entity into an earlier one with the same span {}",
                    span
                );
                placement.insert(raw.id.as_str(), (i, *ordinal));
                outcome.collapsed += 1;
                continue;
            }
            let ordinal = entities.len();
            by_span.insert(span, ordinal);
            placement.insert(raw.id.as_str(), (i, ordinal));
            entities.push(Entity::aligned(raw, span, ordinal));
        }

        let tokens = sentence
            .tokens
            .iter()
            .enumerate()
            .map(|(index, t)| Token {
                text: t.text.clone(),
                index,
            })
            .collect();
        outcome.sentences.push(Sentence {
            orig_id: format!("D{}S{}", doc.id, i),
            tokens,
            entities,
            relations: vec![],
        });
    }
    outcome.straddling = validated.entities.len().saturating_sub(placed_entities);

    for relation in validated.relations {
        let head = placement.get(relation.head.as_str());
        let tail = placement.get(relation.tail.as_str());
        let error = match (head, tail) {
            (Some((head_sentence, head)), Some((tail_sentence, tail))) => {
                if head_sentence != tail_sentence {
                    UnsupportedRelationError::CrossSentence {
                        label: relation.label.clone(),
                        head: relation.head.clone(),
                        tail: relation.tail.clone(),
                    }
                } else if head == tail {
                    UnsupportedRelationError::Reflexive {
                        label: relation.label.clone(),
                        id: relation.head.clone(),
                    }
                } else {
                    let relations = &mut outcome.sentences[*head_sentence].relations;
                    let relation = Relation {
                        head: *head,
                        tail: *tail,
                        label: relation.label.clone(),
                    };
                    if !relations.contains(&relation) {
                        relations.push(relation);
                    }
                    continue;
                }
            }
            (None, _) => UnsupportedRelationError::MissingEntity {
                label: relation.label.clone(),
                id: relation.head.clone(),
            },
            (_, None) => UnsupportedRelationError::MissingEntity {
                label: relation.label.clone(),
                id: relation.tail.clone(),
            },
        };
        warn!(document = doc.id.as_str(), error = %error, "Dropped a relation");
        outcome.issues.push(error.into());
    }
    Ok(outcome)
}

/// Segments and tokenizes `doc` with `segmenter`, then partitions it.
pub fn partition_document<S: Segmenter + ?Sized>(
    doc: &RawDocument,
    segmenter: &S,
    policy: AlignmentPolicy,
) -> Result<PartitionOutcome, PreparationError> {
    let sentences: Vec<SentenceTokens> = segmenter
        .sentences(&doc.text)
        .into_iter()
        .map(|span| SentenceTokens::new(span, segmenter.tokenize(&doc.text, span)))
        .collect();
    partition(doc, &sentences, policy)
}

/// Sentences of a corpus, in document order, with the statistics of their preparation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Corpus {
    pub sentences: Vec<Sentence>,
    pub report: PreparationReport,
}

/// Partitions every document of `docs`. A document aborted by the alignment policy is skipped
/// and counted in the report. When `config.parallel()` is set, the documents are partitioned on
/// the rayon thread pool; the order of the sentences does not change.
pub fn prepare_corpus<S: Segmenter + Sync + ?Sized>(
    docs: &[RawDocument],
    segmenter: &S,
    config: &SamplingConfig,
) -> Corpus {
    let policy = config.alignment_policy();
    let outcomes: Vec<Result<PartitionOutcome, PreparationError>> = if config.parallel() {
        docs.par_iter()
            .map(|doc| partition_document(doc, segmenter, policy))
            .collect()
    } else {
        docs.iter()
            .map(|doc| partition_document(doc, segmenter, policy))
            .collect()
    };
    let mut corpus = Corpus::default();
    for (doc, outcome) in docs.iter().zip(outcomes) {
        match outcome {
            Ok(outcome) => {
                corpus.report.record_outcome(&outcome);
                corpus.sentences.extend(outcome.sentences);
            }
            Err(e) => {
                warn!(document = doc.id.as_str(), error = %e, "Aborted a document");
                corpus.report.record_failure(&e);
            }
        }
    }
    corpus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::tests::char_tokens;
    use crate::config::SamplingConfigBuilder;
    use crate::document::RawRelation;
    use rstest::rstest;

    fn egfr_document() -> RawDocument {
        RawDocument {
            id: String::from("1"),
            text: String::from("EGFR mutations cause resistance"),
            entities: vec![
                RawEntity::new("T2", "Problem", 21, 31),
                RawEntity::new("T1", "Gene", 0, 4),
            ],
            relations: vec![RawRelation::new("T1", "T2", "Cause")],
        }
    }

    fn single_sentence(text: &str) -> Vec<SentenceTokens> {
        vec![SentenceTokens::new(
            CharSpan::new(0, text.chars().count()),
            char_tokens(text),
        )]
    }

    fn two_sentences() -> RawDocument {
        RawDocument {
            id: String::from("7"),
            text: String::from("EGFR binds ligands. It causes cancer."),
            entities: vec![
                RawEntity::new("T1", "Gene", 0, 4),
                RawEntity::new("T2", "Chemical", 11, 18),
                RawEntity::new("T3", "Problem", 30, 36),
                RawEntity::new("T4", "Problem", 16, 23),
            ],
            relations: vec![
                RawRelation::new("T1", "T2", "Binds"),
                RawRelation::new("T1", "T3", "Cause"),
                RawRelation::new("T1", "T4", "Cause"),
            ],
        }
    }

    #[test]
    fn test_partition_sorts_and_links() {
        let doc = egfr_document();
        let outcome = partition(&doc, &single_sentence(&doc.text), AlignmentPolicy::Drop).unwrap();
        assert!(outcome.issues.is_empty());
        let sentence = &outcome.sentences[0];
        assert_eq!(sentence.orig_id(), "D1S0");
        assert_eq!(sentence.entities()[0].id(), "T1");
        assert_eq!(sentence.entities()[0].span(), TokenSpan::new(0, 1));
        assert_eq!(sentence.entities()[1].span(), TokenSpan::new(3, 4));
        assert_eq!(sentence.entities()[1].ordinal(), 1);
        assert_eq!(sentence.relations()[0].head(), 0);
        assert_eq!(sentence.relations()[0].tail(), 1);
    }

    #[rstest]
    #[case(AlignmentPolicy::Drop)]
    #[case(AlignmentPolicy::Abort)]
    fn test_partition_whitespace_entity(#[case] policy: AlignmentPolicy) {
        let mut doc = egfr_document();
        doc.entities.push(RawEntity::new("T3", "Gene", 4, 5));
        let result = partition(&doc, &single_sentence(&doc.text), policy);
        let expected = AlignmentError {
            entity_id: Some(String::from("T3")),
            span: CharSpan::new(4, 5),
        };
        match policy {
            AlignmentPolicy::Drop => {
                let outcome = result.unwrap();
                assert_eq!(outcome.sentences[0].entities().len(), 2);
                assert_eq!(outcome.issues, vec![PreparationError::Alignment(expected)]);
            }
            AlignmentPolicy::Abort => {
                assert_eq!(result, Err(PreparationError::Alignment(expected)))
            }
        }
    }

    #[test]
    fn test_partition_collapses_duplicate_spans() {
        let mut doc = egfr_document();
        // Same tokens as T1 once aligned.
        doc.entities.push(RawEntity::new("T3", "Gene", 1, 3));
        doc.relations.push(RawRelation::new("T3", "T2", "Cause"));
        doc.relations.push(RawRelation::new("T3", "T1", "Cause"));
        let outcome = partition(&doc, &single_sentence(&doc.text), AlignmentPolicy::Drop).unwrap();
        let sentence = &outcome.sentences[0];
        assert_eq!(outcome.collapsed, 1);
        assert_eq!(sentence.entities().len(), 2);
        assert_eq!(sentence.relations().len(), 1);
        assert!(matches!(
            outcome.issues.as_slice(),
            [PreparationError::Relation(
                UnsupportedRelationError::Reflexive { .. }
            )]
        ));
    }

    #[test]
    fn test_partition_over_two_sentences() {
        let doc = two_sentences();
        let sentences = vec![
            SentenceTokens::new(CharSpan::new(0, 19), char_tokens("EGFR binds ligands.")),
            SentenceTokens::new(
                CharSpan::new(20, 37),
                char_tokens("EGFR binds ligands. It causes cancer.")
                    .into_iter()
                    .skip(3)
                    .collect(),
            ),
            SentenceTokens::new(CharSpan::new(37, 37), vec![]),
        ];
        let outcome = partition(&doc, &sentences, AlignmentPolicy::Drop).unwrap();
        assert_eq!(outcome.sentences.len(), 3);
        assert_eq!(outcome.sentences[1].orig_id(), "D7S1");
        assert!(outcome.sentences[2].is_empty());
        assert_eq!(outcome.straddling, 1);
        assert_eq!(outcome.sentences[0].relations().len(), 1);
        assert_eq!(outcome.sentences[1].entities()[0].id(), "T3");
        assert_eq!(
            outcome.issues,
            vec![
                PreparationError::Relation(UnsupportedRelationError::CrossSentence {
                    label: String::from("Cause"),
                    head: String::from("T1"),
                    tail: String::from("T3"),
                }),
                PreparationError::Relation(UnsupportedRelationError::MissingEntity {
                    label: String::from("Cause"),
                    id: String::from("T4"),
                }),
            ]
        );
    }

    #[test]
    fn test_unicode_segmenter() {
        let text = "Les mutations d'EGFR causent une résistance. Elles sont rares.  ";
        let segmenter = UnicodeSegmenter;
        let sentences = segmenter.sentences(text);
        assert_eq!(sentences, vec![CharSpan::new(0, 44), CharSpan::new(45, 62)]);
        let tokens = segmenter.tokenize(text, sentences[0]);
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            words,
            vec!["Les", "mutations", "d'EGFR", "causent", "une", "résistance", "."]
        );
        assert_eq!(tokens[5].start, 33);
        assert_eq!(tokens[5].end(), 43);
        let second = segmenter.tokenize(text, sentences[1]);
        assert_eq!(second[0].start, 45);
        assert_eq!(second[0].text, "Elles");
    }

    #[test]
    fn test_partition_document_with_segmenter() {
        let doc = two_sentences();
        let outcome = partition_document(&doc, &UnicodeSegmenter, AlignmentPolicy::Drop).unwrap();
        assert_eq!(outcome.sentences.len(), 2);
        assert_eq!(
            outcome.sentences[0].entities()[1].span(),
            TokenSpan::new(2, 3)
        );
        assert_eq!(outcome.sentences[1].entities()[0].span(), TokenSpan::new(2, 3));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_prepare_corpus(#[case] parallel: bool) {
        let mut broken = egfr_document();
        broken.id = String::from("2");
        broken.entities.push(RawEntity::new("T3", "Gene", 4, 5));
        let docs = vec![egfr_document(), broken, two_sentences()];
        let config = SamplingConfigBuilder::new()
            .alignment_policy(AlignmentPolicy::Abort)
            .parallel(parallel)
            .build();
        let corpus = prepare_corpus(&docs, &UnicodeSegmenter, &config);
        let ids: Vec<&str> = corpus.sentences.iter().map(|s| s.orig_id()).collect();
        assert_eq!(ids, vec!["D1S0", "D7S0", "D7S1"]);
        assert_eq!(corpus.report.documents(), 3);
        assert_eq!(corpus.report.failed_documents(), 1);
    }
}
