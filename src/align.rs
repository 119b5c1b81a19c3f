/**
Alignment of character offsets onto token indices. The tokens and the entity spans live in the
same character coordinate system. Both lists are sorted by their start offset, which allows a
single merge-like scan over the two lists.
*/
use crate::document::{CharSpan, CharToken, TokenSpan};
use std::error::Error;
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Error returned when an entity span does not overlap a single token, for example when its
/// offsets fall in the whitespace between two tokens or past the end of the text.
pub struct AlignmentError {
    pub entity_id: Option<String>,
    pub span: CharSpan,
}

impl AlignmentError {
    pub(crate) fn with_entity<S: Into<String>>(mut self, id: S) -> Self {
        self.entity_id = Some(id.into());
        self
    }
}

impl Display for AlignmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_id {
            Some(id) => write!(
                f,
                "Entity `{}` with span {} does not overlap any token",
                id, self.span
            ),
            None => write!(f, "Span {} does not overlap any token", self.span),
        }
    }
}

impl Error for AlignmentError {}

/// Keeps the first and the last token index seen for an entity.
#[derive(Debug, Clone, Copy, Default)]
struct Collected(Option<(usize, usize)>);

impl Collected {
    fn record(&mut self, token_index: usize) {
        self.0 = match self.0 {
            None => Some((token_index, token_index)),
            Some((first, last)) => Some((first.min(token_index), last.max(token_index))),
        }
    }
}

/// Aligns the character spans onto the tokens. Returns, for each span and in the same order, the
/// token span made of every token it overlaps. A span that overlaps no token gives an
/// `AlignmentError`; what to do with it is up to the caller.
///
/// The tokens must be sorted and must not overlap. The spans must be sorted by their start
/// offset. Each token only scans the spans from a low-water mark onwards: a span starting after
/// the token stops the scan, a span ending before the token is skipped, and when that span is the
/// one at the mark, the mark moves forward for good.
///
/// * `tokens`: Tokens of the sentence (or document)
/// * `spans`: Character spans of the entities, sorted by start
///
/// # Example
/// ```rust
/// use spanrel::{align, CharSpan, CharToken, TokenSpan};
///
/// let tokens = vec![
///     CharToken::new("EGFR", 0),
///     CharToken::new("mutations", 5),
///     CharToken::new("cause", 15),
/// ];
/// let spans = vec![CharSpan::new(0, 14), CharSpan::new(4, 5)];
/// let aligned = align(&tokens, &spans);
/// assert_eq!(aligned[0], Ok(TokenSpan::new(0, 2)));
/// assert!(aligned[1].is_err());
/// ```
pub fn align(tokens: &[CharToken], spans: &[CharSpan]) -> Vec<Result<TokenSpan, AlignmentError>> {
    let mut collected = vec![Collected::default(); spans.len()];
    let mut low_water_mark = 0;
    for (token_index, token) in tokens.iter().enumerate() {
        let token_start = token.start;
        let token_end = token.end();
        let mut span_index = low_water_mark;
        while span_index < spans.len() {
            let span = &spans[span_index];
            if span.start >= token_end {
                break;
            } else if span.end <= token_start {
                // Only moves past finished spans at the mark, so spans nested in a longer one
                // are rescanned until it ends.
                if span_index == low_water_mark {
                    low_water_mark += 1;
                }
            } else {
                collected[span_index].record(token_index);
            }
            span_index += 1;
        }
    }
    collected
        .into_iter()
        .zip(spans)
        .map(|(c, span)| match c.0 {
            Some((first, last)) => Ok(TokenSpan::new(first, last + 1)),
            None => Err(AlignmentError {
                entity_id: None,
                span: *span,
            }),
        })
        .collect()
}
