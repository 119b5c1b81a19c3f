/*!
This library prepares the instances of span-based joint entity and relation extraction models. It
takes annotated documents (a text, character-offset entity spans and relations between them) and
turns them into sentence-scoped, token-aligned sentences, then into fixed-shape training and
evaluation instances, and finally into padded batches.

# PIPELINE
* Alignment: the character spans of the entities are mapped onto token indices with a single
    merge-like scan (`align`).
* Partition: a document is split into its sentences. Each sentence keeps the entities fully inside
    it and the relations whose mentions both survived (`partition`, `partition_document`,
    `prepare_corpus`).
* Encoding: the tokens of a sentence are encoded into sub-tokens by an external `Encoder`. The
    labels are resolved into indices by a `TypeRegistry` (`EncodedDocument`).
* Sampling: at training time, negative spans and negative pairs of entities are drawn from the
    candidate pools, with a random generator given by the caller (`create_train_sample`). At
    evaluation time, every span candidate is kept (`create_eval_sample`).
* Collation: the instances of a batch are stacked and padded to the largest one (`Collate`).

# Terminology
* A span is a contiguous range of tokens `[start, end)` of a sentence.
* The context is the encoded sentence. Every mask is defined over the context.
* A pooling mask is a boolean vector selecting the positions of the context used to represent a
    span or a relation.
* A positive example is an annotated entity or relation. A negative example is a sampled span or
    pair of entities without any label. Negatives always get the background type, whose index is
    `0`.

# Example
```rust
use rand::rngs::StdRng;
use rand::SeedableRng;
use spanrel::{
    create_train_sample, partition_document, AlignmentPolicy, EncodedDocument, RawDocument,
    RawEntity, RawRelation, SamplingConfig, TypeRegistry, UnicodeSegmenter, WordVocab,
};

let doc = RawDocument {
    id: String::from("1"),
    text: String::from("EGFR mutations cause resistance."),
    entities: vec![
        RawEntity::new("T1", "Gene", 0, 4),
        RawEntity::new("T2", "Problem", 21, 31),
    ],
    relations: vec![RawRelation::new("T1", "T2", "Cause")],
};
let outcome = partition_document(&doc, &UnicodeSegmenter, AlignmentPolicy::Drop).unwrap();
let registry = TypeRegistry::new(["Gene", "Problem"], ["Cause"]);
let vocab = WordVocab::new(["EGFR", "mutations", "cause", "resistance"]);
let encoded = EncodedDocument::new(&outcome.sentences[0], &vocab, &registry).unwrap();

let mut rng = StdRng::seed_from_u64(0);
let config = SamplingConfig::default();
let sample = create_train_sample(&encoded, &config, registry.relation_type_count(), &mut rng);
assert_eq!(sample.entity_types[0], 1);
assert_eq!(sample.rels.row(0).to_vec(), vec![0i64, 1]);
```
*/

mod align;
mod collate;
mod config;
mod document;
mod encoding;
mod partition;
mod reporter;
mod sampling;
mod span;
mod tensor;
mod types;

// The public api starts here
pub use align::{align, AlignmentError};

pub use collate::{
    padded_stack, Collate, CollateError, EvalBatch, EvalField, TrainBatch, TrainField,
};

pub use config::{
    AlignmentPolicy, ParsingAlignmentPolicyError, SamplingConfig, SamplingConfigBuilder,
};

pub use document::{
    validate, AnnotationError, CharSpan, CharToken, Entity, EntityRecord, RawDocument, RawEntity,
    RawRelation, RecordError, Relation, RelationRecord, Sentence, SentenceRecord, Token, TokenSpan,
    UnsupportedRelationError, Validated,
};

pub use encoding::{
    ContextSpan, EncodedDocument, Encoder, PositiveEntity, PositiveRelation, WordVocab,
};

pub use partition::{
    partition, partition_document, prepare_corpus, Corpus, PartitionOutcome, PreparationError,
    Segmenter, SentenceTokens, UnicodeSegmenter,
};

pub use reporter::PreparationReport;

pub use sampling::{
    negative_entity_pool, negative_relation_pool, sample_negative_entities,
    sample_negative_relations, EntityPair, SpanSample,
};

pub use span::{candidate_count, SpanCandidate, SpanCandidates};

pub use tensor::{
    create_eval_sample, create_train_sample, entity_mask, relation_mask, EvalSample, TrainSample,
};

pub use types::{
    EntityType, RegistryError, RelationType, TypeRegistry, UnknownTypeError, NONE_LABEL,
};
