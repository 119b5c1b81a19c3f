/**
Negative sampling for the training instances. The negatives are drawn uniformly and without
replacement from a candidate pool. When the pool is smaller than the requested count, the whole
pool is returned. The random generator is always given by the caller: seeding it makes the
sampling reproducible.
*/
use crate::encoding::{ContextSpan, EncodedDocument};
use crate::span::SpanCandidates;
use ahash::AHashSet;
use itertools::Itertools;
use rand::seq::index;
use rand::Rng;

/// Span sample in the encoding space, with its size in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanSample {
    pub span: ContextSpan,
    pub size: usize,
}

/// Ordered pair of entities, as indices into the positive entity list of a document.
pub type EntityPair = (usize, usize);

/// Every span candidate of `doc` that is not a positive entity, in candidate order.
pub fn negative_entity_pool(doc: &EncodedDocument, max_span_size: usize) -> Vec<SpanSample> {
    let positives: AHashSet<ContextSpan> = doc.entities().iter().map(|e| e.span).collect();
    SpanCandidates::new(doc.token_count(), max_span_size)
        .map(|candidate| SpanSample {
            span: doc.context_span(candidate.token_span()),
            size: candidate.size,
        })
        .filter(|sample| !positives.contains(&sample.span))
        .collect()
}

/// Every ordered pair of distinct positive entities without a positive relation for that exact
/// pair. The reverse pair of a positive relation stays eligible.
pub fn negative_relation_pool(doc: &EncodedDocument) -> Vec<EntityPair> {
    let related: AHashSet<EntityPair> = doc.relations().iter().map(|r| (r.head, r.tail)).collect();
    let entity_count = doc.entities().len();
    (0..entity_count)
        .cartesian_product(0..entity_count)
        .filter(|(head, tail)| head != tail && !related.contains(&(*head, *tail)))
        .collect()
}

/// Draws `min(count, pool.len())` distinct elements of `pool`.
fn sample_without_replacement<T: Clone, R: Rng + ?Sized>(
    pool: &[T],
    count: usize,
    rng: &mut R,
) -> Vec<T> {
    let amount = count.min(pool.len());
    index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}

pub fn sample_negative_entities<R: Rng + ?Sized>(
    pool: &[SpanSample],
    count: usize,
    rng: &mut R,
) -> Vec<SpanSample> {
    sample_without_replacement(pool, count, rng)
}

pub fn sample_negative_relations<R: Rng + ?Sized>(
    pool: &[EntityPair],
    count: usize,
    rng: &mut R,
) -> Vec<EntityPair> {
    sample_without_replacement(pool, count, rng)
}
