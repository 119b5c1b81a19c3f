/**
Statistics about the preparation of a corpus. They are displayed as a small two-column dataframe,
which is handy to compare the splits of a dataset.
*/
use crate::partition::{PartitionOutcome, PreparationError};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Counters gathered while partitioning the documents of a corpus.
///
/// # Example
///
/// ```rust
/// use spanrel::PreparationReport;
///
/// let report = PreparationReport::default();
/// assert_eq!(report.malformed_rate(), 0.0);
/// assert!(report.to_string().starts_with("Counter, Value\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreparationReport {
    pub(crate) documents: usize,
    pub(crate) failed_documents: usize,
    pub(crate) malformed_documents: usize,
    pub(crate) sentences: usize,
    pub(crate) entities: usize,
    pub(crate) relations: usize,
    pub(crate) dropped_entities: usize,
    pub(crate) rejected_annotations: usize,
    pub(crate) unsupported_relations: usize,
    pub(crate) collapsed_entities: usize,
    pub(crate) straddling_entities: usize,
}

impl PreparationReport {
    /// Counts a partitioned document. A document with at least one issue counts as malformed.
    pub fn record_outcome(&mut self, outcome: &PartitionOutcome) {
        self.documents += 1;
        if !outcome.issues.is_empty() {
            self.malformed_documents += 1;
        }
        self.sentences += outcome.sentences.len();
        for sentence in outcome.sentences.iter() {
            self.entities += sentence.entities().len();
            self.relations += sentence.relations().len();
        }
        for issue in outcome.issues.iter() {
            self.count_issue(issue);
        }
        self.collapsed_entities += outcome.collapsed;
        self.straddling_entities += outcome.straddling;
    }

    /// Counts a document aborted with `error`.
    pub fn record_failure(&mut self, error: &PreparationError) {
        self.documents += 1;
        self.failed_documents += 1;
        self.malformed_documents += 1;
        self.count_issue(error);
    }

    fn count_issue(&mut self, issue: &PreparationError) {
        match issue {
            PreparationError::Alignment(_) => self.dropped_entities += 1,
            PreparationError::Annotation(_) => self.rejected_annotations += 1,
            PreparationError::Relation(_) => self.unsupported_relations += 1,
        }
    }

    /// Adds the counters of `other` to this report.
    pub fn merge(&mut self, other: &PreparationReport) {
        self.documents += other.documents;
        self.failed_documents += other.failed_documents;
        self.malformed_documents += other.malformed_documents;
        self.sentences += other.sentences;
        self.entities += other.entities;
        self.relations += other.relations;
        self.dropped_entities += other.dropped_entities;
        self.rejected_annotations += other.rejected_annotations;
        self.unsupported_relations += other.unsupported_relations;
        self.collapsed_entities += other.collapsed_entities;
        self.straddling_entities += other.straddling_entities;
    }

    /// Share of the documents that were aborted or had at least one issue. `0` for an empty
    /// corpus.
    pub fn malformed_rate(&self) -> f32 {
        if self.documents == 0 {
            0.0
        } else {
            self.malformed_documents as f32 / self.documents as f32
        }
    }

    pub fn documents(&self) -> usize {
        self.documents
    }
    pub fn failed_documents(&self) -> usize {
        self.failed_documents
    }
    pub fn malformed_documents(&self) -> usize {
        self.malformed_documents
    }
    pub fn sentences(&self) -> usize {
        self.sentences
    }
    pub fn entities(&self) -> usize {
        self.entities
    }
    pub fn relations(&self) -> usize {
        self.relations
    }
    pub fn dropped_entities(&self) -> usize {
        self.dropped_entities
    }
    pub fn rejected_annotations(&self) -> usize {
        self.rejected_annotations
    }
    pub fn unsupported_relations(&self) -> usize {
        self.unsupported_relations
    }
    pub fn collapsed_entities(&self) -> usize {
        self.collapsed_entities
    }
    pub fn straddling_entities(&self) -> usize {
        self.straddling_entities
    }

    fn rows(&self) -> [(&'static str, usize); 11] {
        [
            ("Documents", self.documents),
            ("Failed_Documents", self.failed_documents),
            ("Malformed_Documents", self.malformed_documents),
            ("Sentences", self.sentences),
            ("Entities", self.entities),
            ("Relations", self.relations),
            ("Dropped_Entities", self.dropped_entities),
            ("Rejected_Annotations", self.rejected_annotations),
            ("Unsupported_Relations", self.unsupported_relations),
            ("Collapsed_Entities", self.collapsed_entities),
            ("Straddling_Entities", self.straddling_entities),
        ]
    }
}

/// The report acts as a dataframe when displayed.
impl Display for PreparationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Counter, Value")?;
        for (name, value) in self.rows() {
            writeln!(f, "{}, {}", name, value)?
        }
        writeln!(f, "Malformed_Rate, {}", self.malformed_rate())
    }
}
