/*
 * This modules contains the configuration of the preparation of the instances. Most importantly,
 * it contains the `SamplingConfig` struct, which implements the default trait. This config can be
 * passed to `create_train_sample` or `prepare_corpus` to simplify their arguments.
*/
use enum_iterator::Sequence;
use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

/// What to do with an entity that cannot be aligned onto the tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Sequence)]
pub enum AlignmentPolicy {
    /// Drop the entity (and its relations) and report it.
    #[default]
    Drop,
    /// Abort the whole document.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Error returned when parsing an `AlignmentPolicy` from a string.
pub struct ParsingAlignmentPolicyError<S: Debug + Display>(S);

impl<S: Debug + Display> Display for ParsingAlignmentPolicyError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not parse the alignment policy. Expected `drop` or `abort`, got {}",
            self.0
        )
    }
}

impl<S: Debug + Display> Error for ParsingAlignmentPolicyError<S> {}

impl FromStr for AlignmentPolicy {
    type Err = ParsingAlignmentPolicyError<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" | "skip" => Ok(AlignmentPolicy::Drop),
            "abort" | "error" => Ok(AlignmentPolicy::Abort),
            _ => Err(ParsingAlignmentPolicyError(String::from(s))),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
/// Config struct used to simplify the inputs of the sampling and preparation functions. It
/// implements the default trait.
pub struct SamplingConfig {
    /// Maximum number of negative entity spans sampled per instance.
    pub(crate) neg_entity_count: usize,
    /// Maximum number of negative relation pairs sampled per instance.
    pub(crate) neg_relation_count: usize,
    /// Maximum size (in tokens) of a span candidate. Must be at least 1.
    pub(crate) max_span_size: usize,
    /// What to do with entities that overlap no token.
    pub(crate) alignment_policy: AlignmentPolicy,
    /// Can we use multiple cores to partition the documents of a corpus? The sampling itself is
    /// never parallelized.
    pub(crate) parallel: bool,
}

impl SamplingConfig {
    pub fn neg_entity_count(&self) -> usize {
        self.neg_entity_count
    }
    pub fn neg_relation_count(&self) -> usize {
        self.neg_relation_count
    }
    pub fn max_span_size(&self) -> usize {
        self.max_span_size
    }
    pub fn alignment_policy(&self) -> AlignmentPolicy {
        self.alignment_policy
    }
    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            neg_entity_count: 100,
            neg_relation_count: 100,
            max_span_size: 10,
            alignment_policy: AlignmentPolicy::Drop,
            parallel: false,
        }
    }
}

impl Display for SamplingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = format!("Negative entities per instance: {}\n Negative relations per instance: {}\n Maximum span size: {}\n Alignment policy: {:?}\n Using parallel computations: {}", self.neg_entity_count, self.neg_relation_count, self.max_span_size, self.alignment_policy, self.parallel);
        write!(f, "{}", string)
    }
}

/// This builder can be used to build and customize a `SamplingConfig` stucture.
#[derive(Clone, Debug, Default)]
pub struct SamplingConfigBuilder {
    config: SamplingConfig,
}

impl SamplingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn neg_entity_count(mut self, neg_entity_count: usize) -> Self {
        self.config.neg_entity_count = neg_entity_count;
        self
    }
    pub fn neg_relation_count(mut self, neg_relation_count: usize) -> Self {
        self.config.neg_relation_count = neg_relation_count;
        self
    }
    /// A span size of 0 would produce no candidate at all; it is raised to 1.
    pub fn max_span_size(mut self, max_span_size: usize) -> Self {
        self.config.max_span_size = max_span_size.max(1);
        self
    }
    pub fn alignment_policy(mut self, alignment_policy: AlignmentPolicy) -> Self {
        self.config.alignment_policy = alignment_policy;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }
    pub fn build(self) -> SamplingConfig {
        self.config
    }
}

impl From<SamplingConfigBuilder> for SamplingConfig {
    fn from(value: SamplingConfigBuilder) -> Self {
        value.build()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use enum_iterator::all;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(250)]
    fn test_builder_setters_neg_entity_count(#[case] count: usize) {
        let config = SamplingConfigBuilder::default()
            .neg_entity_count(count)
            .build();
        assert_eq!(config.neg_entity_count(), count);
        assert_eq!(config.neg_relation_count(), 100)
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    fn test_builder_setters_neg_relation_count(#[case] count: usize) {
        let config = SamplingConfigBuilder::default()
            .neg_relation_count(count)
            .build();
        assert_eq!(config.neg_relation_count(), count)
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(8, 8)]
    fn test_builder_setters_max_span_size(#[case] size: usize, #[case] expected: usize) {
        let config = SamplingConfigBuilder::default().max_span_size(size).build();
        assert_eq!(config.max_span_size(), expected)
    }

    #[test]
    fn test_builder_setters_policy() {
        for policy in all::<AlignmentPolicy>() {
            let config = SamplingConfigBuilder::default()
                .alignment_policy(policy)
                .build();
            assert_eq!(config.alignment_policy(), policy)
        }
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_builder_setters_parallel(#[case] parallel: bool) {
        let config = SamplingConfigBuilder::default().parallel(parallel).build();
        assert_eq!(config.parallel(), parallel)
    }

    #[rstest]
    #[case("drop", Ok(AlignmentPolicy::Drop))]
    #[case("Skip", Ok(AlignmentPolicy::Drop))]
    #[case("ABORT", Ok(AlignmentPolicy::Abort))]
    #[case("truncate", Err(ParsingAlignmentPolicyError(String::from("truncate"))))]
    fn test_policy_from_str(
        #[case] input: &str,
        #[case] expected: Result<AlignmentPolicy, ParsingAlignmentPolicyError<String>>,
    ) {
        assert_eq!(AlignmentPolicy::from_str(input), expected)
    }

    #[test]
    fn test_default_config() {
        let config = SamplingConfig::default();
        assert_eq!(config, SamplingConfigBuilder::new().build());
        assert_eq!(config.max_span_size(), 10);
        assert_eq!(config.alignment_policy(), AlignmentPolicy::Drop);
    }
}
