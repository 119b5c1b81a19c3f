/**
Construction of the numeric instances fed to the model. Every instance covers a single encoded
sentence (the context). The entity and relation representations are pooled through boolean masks
over the context.

Positive samples always come before the negative ones. When an instance has no entity (or no
relation) at all, a single placeholder row is emitted with a sample mask set to `false`, so every
axis keeps a nonzero size.
*/
use crate::config::SamplingConfig;
use crate::encoding::{ContextSpan, EncodedDocument};
use crate::sampling::{
    negative_entity_pool, negative_relation_pool, sample_negative_entities,
    sample_negative_relations, EntityPair, SpanSample,
};
use crate::span::SpanCandidates;
use ndarray::prelude::*;
use rand::Rng;
use tracing::debug;

/// Mask of length `context_size`, `true` exactly on `[start, end)`.
///
/// # Example
/// ```rust
/// use spanrel::entity_mask;
///
/// let mask = entity_mask(1, 3, 5);
/// assert_eq!(mask.to_vec(), vec![false, true, true, false, false]);
/// ```
pub fn entity_mask(start: usize, end: usize, context_size: usize) -> Array1<bool> {
    let mut mask = Array1::from_elem(context_size, false);
    let end = end.min(context_size);
    if start < end {
        mask.slice_mut(s![start..end]).fill(true);
    }
    mask
}

/// Mask of the context strictly between the two mentions of a relation. It does not depend on
/// which mention is the head. It is all `false` when the mentions are adjacent or overlap.
pub fn relation_mask(head: ContextSpan, tail: ContextSpan, context_size: usize) -> Array1<bool> {
    let (start, end) = if head.end < tail.start {
        (head.end, tail.start)
    } else {
        (tail.end, head.start)
    };
    entity_mask(start, end, context_size)
}

fn mask_rows<I>(masks: I, row_count: usize, context_size: usize) -> Array2<bool>
where
    I: IntoIterator<Item = Array1<bool>>,
{
    let mut rows = Array2::from_elem((row_count, context_size), false);
    for (i, mask) in masks.into_iter().enumerate() {
        rows.row_mut(i).assign(&mask);
    }
    rows
}

fn encodings(doc: &EncodedDocument) -> Array1<i64> {
    doc.encoding().iter().map(|id| *id as i64).collect()
}

/// Training instance of a single sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSample {
    /// `[C]` sub-token ids.
    pub encodings: Array1<i64>,
    /// `[C]` true on every real position of the context.
    pub context_masks: Array1<bool>,
    /// `[E, C]`
    pub entity_masks: Array2<bool>,
    /// `[E]` entity sizes in tokens.
    pub entity_sizes: Array1<i64>,
    /// `[E]` entity type indices, `0` for the negatives.
    pub entity_types: Array1<i64>,
    /// `[E]`
    pub entity_sample_masks: Array1<bool>,
    /// `[R, 2]` head and tail, as indices into the entity rows.
    pub rels: Array2<i64>,
    /// `[R, C]`
    pub rel_masks: Array2<bool>,
    /// `[R, K - 1]` multi-hot relation types, without the background column.
    pub rel_types: Array2<f32>,
    /// `[R]`
    pub rel_sample_masks: Array1<bool>,
}

impl TrainSample {
    /// Number of entity rows, placeholder included.
    pub fn entity_rows(&self) -> usize {
        self.entity_sizes.len()
    }
    /// Number of relation rows, placeholder included.
    pub fn relation_rows(&self) -> usize {
        self.rels.nrows()
    }
}

/// Builds the training instance of `doc`: every positive entity and relation, followed by at most
/// `config.neg_entity_count()` negative spans and `config.neg_relation_count()` negative pairs.
///
/// * `relation_type_count`: number of relation types, background type included
/// * `rng`: source of the negative sampling
pub fn create_train_sample<R: Rng + ?Sized>(
    doc: &EncodedDocument,
    config: &SamplingConfig,
    relation_type_count: usize,
    rng: &mut R,
) -> TrainSample {
    let context_size = doc.context_size();

    let pool = negative_entity_pool(doc, config.max_span_size());
    let negative_entities: Vec<SpanSample> =
        sample_negative_entities(&pool, config.neg_entity_count(), rng);
    let pair_pool = negative_relation_pool(doc);
    let negative_pairs: Vec<EntityPair> =
        sample_negative_relations(&pair_pool, config.neg_relation_count(), rng);
    debug!(
        orig_id = doc.orig_id(),
        positive_entities = doc.entities().len(),
        negative_entities = negative_entities.len(),
        positive_relations = doc.relations().len(),
        negative_relations = negative_pairs.len(),
        "Created a training sample"
    );

    let mut spans: Vec<SpanSample> = doc
        .entities()
        .iter()
        .map(|e| SpanSample {
            span: e.span,
            size: e.size,
        })
        .collect();
    spans.extend(negative_entities);
    let entity_count = spans.len();
    let entity_rows = entity_count.max(1);

    let entity_masks = mask_rows(
        spans
            .iter()
            .map(|s| entity_mask(s.span.start, s.span.end, context_size)),
        entity_rows,
        context_size,
    );
    let mut entity_sizes = Array1::zeros(entity_rows);
    let mut entity_types = Array1::zeros(entity_rows);
    for (i, sample) in spans.iter().enumerate() {
        entity_sizes[i] = sample.size as i64;
    }
    for (i, entity) in doc.entities().iter().enumerate() {
        entity_types[i] = entity.entity_type.index() as i64;
    }
    let mut entity_sample_masks = Array1::from_elem(entity_rows, false);
    entity_sample_masks.slice_mut(s![..entity_count]).fill(true);

    let pairs: Vec<EntityPair> = doc
        .relations()
        .iter()
        .map(|r| (r.head, r.tail))
        .chain(negative_pairs)
        .collect();
    let relation_count = pairs.len();
    let relation_rows = relation_count.max(1);
    let type_columns = relation_type_count.saturating_sub(1);

    let mut rels = Array2::zeros((relation_rows, 2));
    for (i, (head, tail)) in pairs.iter().enumerate() {
        rels[[i, 0]] = *head as i64;
        rels[[i, 1]] = *tail as i64;
    }
    let rel_masks = mask_rows(
        pairs
            .iter()
            .map(|(h, t)| relation_mask(spans[*h].span, spans[*t].span, context_size)),
        relation_rows,
        context_size,
    );
    let mut rel_types = Array2::zeros((relation_rows, type_columns));
    for (i, relation) in doc.relations().iter().enumerate() {
        for relation_type in relation.types.iter() {
            let index = relation_type.index();
            if index > 0 && index <= type_columns {
                rel_types[[i, index - 1]] = 1.0;
            }
        }
    }
    let mut rel_sample_masks = Array1::from_elem(relation_rows, false);
    rel_sample_masks.slice_mut(s![..relation_count]).fill(true);

    TrainSample {
        encodings: encodings(doc),
        context_masks: Array1::from_elem(context_size, true),
        entity_masks,
        entity_sizes,
        entity_types,
        entity_sample_masks,
        rels,
        rel_masks,
        rel_types,
        rel_sample_masks,
    }
}

/// Evaluation instance of a single sentence. Every span candidate is an entity row.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSample {
    pub encodings: Array1<i64>,
    pub context_masks: Array1<bool>,
    pub entity_masks: Array2<bool>,
    pub entity_sizes: Array1<i64>,
    /// `[E, 2]` start and end of each candidate in the context.
    pub entity_spans: Array2<i64>,
    pub entity_sample_masks: Array1<bool>,
}

impl EvalSample {
    /// Number of entity rows, placeholder included.
    pub fn entity_rows(&self) -> usize {
        self.entity_sizes.len()
    }
}

/// Builds the evaluation instance of `doc`. No sampling takes place: the rows are the span
/// candidates of at most `max_span_size` tokens, in candidate order.
pub fn create_eval_sample(doc: &EncodedDocument, max_span_size: usize) -> EvalSample {
    let context_size = doc.context_size();
    let candidates: Vec<SpanSample> = SpanCandidates::new(doc.token_count(), max_span_size)
        .map(|c| SpanSample {
            span: doc.context_span(c.token_span()),
            size: c.size,
        })
        .collect();
    let entity_count = candidates.len();
    let entity_rows = entity_count.max(1);

    let entity_masks = mask_rows(
        candidates
            .iter()
            .map(|c| entity_mask(c.span.start, c.span.end, context_size)),
        entity_rows,
        context_size,
    );
    let mut entity_sizes = Array1::zeros(entity_rows);
    let mut entity_spans = Array2::zeros((entity_rows, 2));
    for (i, candidate) in candidates.iter().enumerate() {
        entity_sizes[i] = candidate.size as i64;
        entity_spans[[i, 0]] = candidate.span.start as i64;
        entity_spans[[i, 1]] = candidate.span.end as i64;
    }
    let mut entity_sample_masks = Array1::from_elem(entity_rows, false);
    entity_sample_masks.slice_mut(s![..entity_count]).fill(true);

    EvalSample {
        encodings: encodings(doc),
        context_masks: Array1::from_elem(context_size, true),
        entity_masks,
        entity_sizes,
        entity_spans,
        entity_sample_masks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfigBuilder;
    use crate::document::tests::sentence_record;
    use crate::encoding::tests::encoded;
    use crate::encoding::WordVocab;
    use quickcheck::{QuickCheck, TestResult};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn config(max_span_size: usize) -> SamplingConfig {
        SamplingConfigBuilder::new()
            .max_span_size(max_span_size)
            .build()
    }

    #[rstest]
    #[case(0, 1, 4, vec![true, false, false, false])]
    #[case(1, 3, 4, vec![false, true, true, false])]
    #[case(2, 2, 4, vec![false, false, false, false])]
    #[case(3, 6, 4, vec![false, false, false, true])]
    fn test_entity_mask(
        #[case] start: usize,
        #[case] end: usize,
        #[case] context_size: usize,
        #[case] expected: Vec<bool>,
    ) {
        assert_eq!(entity_mask(start, end, context_size).to_vec(), expected);
    }

    #[rstest]
    #[case((0, 1), (3, 4), vec![false, true, true, false])]
    #[case((0, 2), (3, 4), vec![false, false, true, false])]
    #[case((3, 4), (0, 2), vec![false, false, true, false])]
    #[case((0, 2), (2, 4), vec![false, false, false, false])]
    #[case((0, 3), (1, 4), vec![false, false, false, false])]
    #[case((1, 4), (0, 2), vec![false, false, false, false])]
    fn test_relation_mask(
        #[case] head: (usize, usize),
        #[case] tail: (usize, usize),
        #[case] expected: Vec<bool>,
    ) {
        let head = ContextSpan::new(head.0, head.1);
        let tail = ContextSpan::new(tail.0, tail.1);
        assert_eq!(relation_mask(head, tail, 4).to_vec(), expected);
    }

    #[test]
    fn test_property_relation_mask_marks_the_gap() {
        fn gap(a: (u8, u8), b: (u8, u8)) -> TestResult {
            let context_size = 30;
            let span = |(s, l): (u8, u8)| {
                let start = s as usize % 25;
                ContextSpan::new(start, start + 1 + l as usize % 4)
            };
            let (head, tail) = (span(a), span(b));
            let mask = relation_mask(head, tail, context_size);
            let (first, second) = if head.start <= tail.start {
                (head, tail)
            } else {
                (tail, head)
            };
            let disjoint = first.end < second.start;
            let expected: Vec<bool> = (0..context_size)
                .map(|i| disjoint && first.end <= i && i < second.start)
                .collect();
            TestResult::from_bool(
                mask.to_vec() == expected && disjoint == mask.iter().any(|m| *m),
            )
        }
        let mut qc = QuickCheck::new().tests(1000);
        qc.quickcheck(gap as fn((u8, u8), (u8, u8)) -> TestResult)
    }

    #[test]
    fn test_train_sample() {
        let doc = encoded(sentence_record(), &WordVocab::default());
        let mut rng = StdRng::seed_from_u64(3);
        let sample = create_train_sample(&doc, &config(2), 3, &mut rng);
        assert_eq!(sample.encodings, array![1i64, 1, 1, 1]);
        assert_eq!(sample.context_masks, array![true, true, true, true]);
        assert_eq!(sample.entity_rows(), 7);
        assert_eq!(sample.entity_masks.shape(), &[7, 4]);
        assert_eq!(sample.entity_types.slice(s![..2]), array![1i64, 2]);
        assert!(sample.entity_types.slice(s![2..]).iter().all(|t| *t == 0));
        assert!(sample.entity_sample_masks.iter().all(|m| *m));
        assert_eq!(sample.entity_masks.row(1), array![false, false, false, true]);
        // The positive relation, then the reverse pair as the only negative.
        assert_eq!(sample.rels, array![[0i64, 1], [1, 0]]);
        assert_eq!(sample.rel_masks.row(0), array![false, true, true, false]);
        assert_eq!(sample.rel_types, array![[1.0f32, 0.0], [0.0, 0.0]]);
        assert_eq!(sample.rel_sample_masks, array![true, true]);
    }

    #[test]
    fn test_train_sample_gap_between_mentions() {
        let mut record = sentence_record();
        // "EGFR mutations" and "resistance"
        record.entities[0].end = 2;
        let doc = encoded(record, &WordVocab::default());
        let mut rng = StdRng::seed_from_u64(3);
        let sample = create_train_sample(&doc, &config(2), 3, &mut rng);
        assert_eq!(sample.entity_rows(), 7);
        assert_eq!(sample.rel_masks.row(0), array![false, false, true, false]);
    }

    #[test]
    fn test_train_sample_placeholders() {
        let mut record = sentence_record();
        record.entities.clear();
        record.relations.clear();
        record.tokens.truncate(1);
        let doc = encoded(record, &WordVocab::default());
        let config = SamplingConfigBuilder::new()
            .neg_entity_count(0)
            .neg_relation_count(0)
            .build();
        let mut rng = StdRng::seed_from_u64(0);
        let sample = create_train_sample(&doc, &config, 3, &mut rng);
        assert_eq!(sample.entity_masks, Array2::from_elem((1, 1), false));
        assert_eq!(sample.entity_sizes, array![0i64]);
        assert_eq!(sample.entity_types, array![0i64]);
        assert_eq!(sample.entity_sample_masks, array![false]);
        assert_eq!(sample.rels, Array2::<i64>::zeros((1, 2)));
        assert_eq!(sample.rel_types, Array2::<f32>::zeros((1, 2)));
        assert_eq!(sample.rel_sample_masks, array![false]);
    }

    #[test]
    fn test_negative_relations_only_among_positives() {
        let doc = encoded(sentence_record(), &WordVocab::default());
        let mut rng = StdRng::seed_from_u64(11);
        let sample = create_train_sample(&doc, &config(4), 3, &mut rng);
        assert!(sample.rels.iter().all(|i| *i < 2));
    }

    #[test]
    fn test_eval_sample() {
        let doc = encoded(sentence_record(), &WordVocab::default().with_special_tokens());
        let sample = create_eval_sample(&doc, 2);
        // [CLS] and [SEP] surround the four tokens.
        assert_eq!(sample.encodings.len(), 6);
        assert_eq!(sample.entity_rows(), 7);
        assert_eq!(sample.entity_spans.row(0), array![1i64, 2]);
        assert_eq!(sample.entity_spans.row(6), array![3i64, 5]);
        assert_eq!(sample.entity_sizes, array![1i64, 1, 1, 1, 2, 2, 2]);
        assert_eq!(
            sample.entity_masks.row(4),
            array![false, true, true, false, false, false]
        );
        assert!(sample.entity_sample_masks.iter().all(|m| *m));
    }

    #[test]
    fn test_eval_sample_without_tokens() {
        let mut record = sentence_record();
        record.tokens.clear();
        record.entities.clear();
        record.relations.clear();
        let doc = encoded(record, &WordVocab::default());
        let sample = create_eval_sample(&doc, 3);
        assert_eq!(sample.entity_masks.shape(), &[1, 0]);
        assert_eq!(sample.entity_spans, Array2::<i64>::zeros((1, 2)));
        assert_eq!(sample.entity_sample_masks, array![false]);
    }
}
