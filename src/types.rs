/**
This module holds the closed enumeration of entity and relation types. Labels are resolved once
through a `TypeRegistry` into stable indices, which are then used uniformly by the tensor builder
and by the serialization of the sentences. The index `0` is always reserved for the background
type (i.e. "no entity" or "no relation").
*/
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display};

/// Index of an entity type inside a `TypeRegistry`. `EntityType::NONE` is the background type
/// given to every negative entity sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityType(pub(crate) usize);

/// Index of a relation type inside a `TypeRegistry`. `RelationType::NONE` is the background type
/// given to every negative relation sample. It is never a column of the one-hot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationType(pub(crate) usize);

impl EntityType {
    pub const NONE: EntityType = EntityType(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

impl RelationType {
    pub const NONE: RelationType = RelationType(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Label used for the reserved background type.
pub const NONE_LABEL: &str = "None";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Returned when a label is not part of the registry.
pub struct UnknownTypeError(pub String);

impl Display for UnknownTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The type `{}` is not registered", self.0)
    }
}

impl Error for UnknownTypeError {}

#[derive(Debug)]
/// Error returned when a types file cannot be read.
pub enum RegistryError {
    Json(serde_json::Error),
    ReservedLabel(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(json_err) => std::fmt::Display::fmt(json_err, f),
            Self::ReservedLabel(label) => write!(
                f,
                "The label `{}` is reserved for the background type",
                label
            ),
        }
    }
}

impl Error for RegistryError {}

impl From<serde_json::Error> for RegistryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Maps the entity and relation labels to stable indices. The labels keep the order in which they
/// were given and are numbered starting at `1`.
///
/// # Example
/// ```rust
/// use spanrel::TypeRegistry;
///
/// let registry = TypeRegistry::new(["Gene", "Problem"], ["Cause"]);
/// assert_eq!(registry.entity_type("Problem").unwrap().index(), 2);
/// assert_eq!(registry.relation_type_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entity_labels: Vec<String>,
    relation_labels: Vec<String>,
    entity_index: AHashMap<String, usize>,
    relation_index: AHashMap<String, usize>,
}

#[derive(Deserialize)]
struct TypesFile {
    entities: serde_json::Map<String, serde_json::Value>,
    relations: serde_json::Map<String, serde_json::Value>,
}

fn register<I, S>(labels: I) -> (Vec<String>, AHashMap<String, usize>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ordered = vec![String::from(NONE_LABEL)];
    let mut index = AHashMap::new();
    for label in labels {
        let label = label.into();
        if label == NONE_LABEL || index.contains_key(&label) {
            continue;
        }
        index.insert(label.clone(), ordered.len());
        ordered.push(label);
    }
    (ordered, index)
}

impl TypeRegistry {
    pub fn new<E, R, S1, S2>(entity_labels: E, relation_labels: R) -> Self
    where
        E: IntoIterator<Item = S1>,
        R: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        let (entity_labels, entity_index) = register(entity_labels);
        let (relation_labels, relation_index) = register(relation_labels);
        Self {
            entity_labels,
            relation_labels,
            entity_index,
            relation_index,
        }
    }

    /// Reads a types file of the form `{"entities": {"Gene": {..}}, "relations": {"Cause":
    /// {..}}}`. Only the keys are used; their order in the file gives the indices.
    pub fn from_json_str(content: &str) -> Result<Self, RegistryError> {
        let file: TypesFile = serde_json::from_str(content)?;
        if let Some(label) = file
            .entities
            .keys()
            .chain(file.relations.keys())
            .find(|l| l.as_str() == NONE_LABEL)
        {
            return Err(RegistryError::ReservedLabel(label.clone()));
        }
        Ok(Self::new(
            file.entities.into_iter().map(|(k, _)| k),
            file.relations.into_iter().map(|(k, _)| k),
        ))
    }

    pub fn entity_type(&self, label: &str) -> Result<EntityType, UnknownTypeError> {
        self.entity_index
            .get(label)
            .map(|i| EntityType(*i))
            .ok_or_else(|| UnknownTypeError(String::from(label)))
    }

    pub fn relation_type(&self, label: &str) -> Result<RelationType, UnknownTypeError> {
        self.relation_index
            .get(label)
            .map(|i| RelationType(*i))
            .ok_or_else(|| UnknownTypeError(String::from(label)))
    }

    pub fn entity_label(&self, entity_type: EntityType) -> Option<&str> {
        self.entity_labels.get(entity_type.0).map(|s| s.as_str())
    }

    pub fn relation_label(&self, relation_type: RelationType) -> Option<&str> {
        self.relation_labels.get(relation_type.0).map(|s| s.as_str())
    }

    /// Number of entity types, background type included.
    pub fn entity_type_count(&self) -> usize {
        self.entity_labels.len()
    }

    /// Number of relation types, background type included.
    pub fn relation_type_count(&self) -> usize {
        self.relation_labels.len()
    }
}
