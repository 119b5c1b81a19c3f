/**
Enumeration of the span candidates of a sentence. A candidate is any contiguous range of at most
`max_span_size` tokens. The candidates are generated on demand and never stored by the library.
*/
use crate::document::TokenSpan;

/// A span candidate `[start, end)` and its size in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanCandidate {
    pub start: usize,
    pub end: usize,
    pub size: usize,
}

impl SpanCandidate {
    pub fn token_span(&self) -> TokenSpan {
        TokenSpan::new(self.start, self.end)
    }
}

/// Number of candidates of a sentence of `token_count` tokens: `T*M - M(M-1)/2` when `T >= M`,
/// `T(T+1)/2` otherwise.
pub fn candidate_count(token_count: usize, max_span_size: usize) -> usize {
    let m = max_span_size.min(token_count);
    token_count * m - m * (m.saturating_sub(1)) / 2
}

/// Iterator over every span candidate of a sentence, ordered by size and then by start.
///
/// # Example
/// ```rust
/// use spanrel::SpanCandidates;
///
/// let spans: Vec<(usize, usize)> = SpanCandidates::new(3, 2).map(|c| (c.start, c.end)).collect();
/// assert_eq!(spans, vec![(0, 1), (1, 2), (2, 3), (0, 2), (1, 3)]);
/// ```
#[derive(Debug, Clone)]
pub struct SpanCandidates {
    token_count: usize,
    max_span_size: usize,
    size: usize,
    start: usize,
}

impl SpanCandidates {
    pub fn new(token_count: usize, max_span_size: usize) -> Self {
        SpanCandidates {
            token_count,
            max_span_size,
            size: 1,
            start: 0,
        }
    }
}

impl Iterator for SpanCandidates {
    type Item = SpanCandidate;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.size > self.max_span_size || self.size > self.token_count {
                return None;
            }
            let end = self.start + self.size;
            if end <= self.token_count {
                let candidate = SpanCandidate {
                    start: self.start,
                    end,
                    size: self.size,
                };
                self.start += 1;
                return Some(candidate);
            }
            self.size += 1;
            self.start = 0;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = candidate_count(self.token_count, self.max_span_size);
        let done = candidate_count(self.token_count, self.size.saturating_sub(1)) + self.start;
        let remaining = total.saturating_sub(done);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SpanCandidates {}
