/**
Collation of the instances of a batch. Every field is stacked along a new leading batch axis; the
ragged axes (context length, entity rows, relation rows) are padded to the largest instance of the
batch with the default value of the element type (`0`, `0.0` or `false`). Padding is therefore
never a valid sample: its sample and context masks are `false` and its type indices are the
background type.
*/
use crate::tensor::{EvalSample, TrainSample};
use enum_iterator::Sequence;
use ndarray::prelude::*;
use ndarray::{ShapeError, SliceInfoElem};
use std::error::Error;
use std::fmt::{self, Display};

#[derive(Debug, Clone)]
pub enum CollateError {
    /// A batch needs at least one instance.
    EmptyBatch,
    /// Two instances disagree on the number of dimensions of a field.
    RankMismatch { expected: usize, found: usize },
    Shape(ShapeError),
}

impl Display for CollateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBatch => write!(f, "Cannot collate an empty batch"),
            Self::RankMismatch { expected, found } => write!(
                f,
                "Cannot stack an array of {} dimensions with arrays of {} dimensions",
                found, expected
            ),
            Self::Shape(e) => std::fmt::Display::fmt(e, f),
        }
    }
}

impl Error for CollateError {}

impl From<ShapeError> for CollateError {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

/// Stacks the arrays along a new first axis. Every other axis is padded with `A::default()` up to
/// the largest size found among the arrays.
///
/// # Example
/// ```rust
/// use ndarray::array;
/// use spanrel::padded_stack;
///
/// let a = array![1, 2, 3];
/// let b = array![4];
/// let stacked = padded_stack([a.view(), b.view()]).unwrap();
/// assert_eq!(stacked, array![[1, 2, 3], [4, 0, 0]]);
/// ```
pub fn padded_stack<'a, A, D, I>(arrays: I) -> Result<Array<A, D::Larger>, CollateError>
where
    A: Clone + Default + 'a,
    D: Dimension,
    I: IntoIterator<Item = ArrayView<'a, A, D>>,
{
    let arrays: Vec<ArrayView<'a, A, D>> = arrays.into_iter().collect();
    let first = arrays.first().ok_or(CollateError::EmptyBatch)?;
    let mut max_shape = first.shape().to_vec();
    for array in arrays.iter() {
        if array.ndim() != max_shape.len() {
            return Err(CollateError::RankMismatch {
                expected: max_shape.len(),
                found: array.ndim(),
            });
        }
        for (max, size) in max_shape.iter_mut().zip(array.shape()) {
            *max = (*max).max(*size);
        }
    }
    let mut shape = Vec::with_capacity(max_shape.len() + 1);
    shape.push(arrays.len());
    shape.extend(max_shape);

    let mut stacked = ArrayD::from_elem(IxDyn(&shape), A::default());
    for (i, array) in arrays.iter().enumerate() {
        let region: Vec<SliceInfoElem> = array
            .shape()
            .iter()
            .map(|size| SliceInfoElem::from(..*size))
            .collect();
        stacked
            .index_axis_mut(Axis(0), i)
            .slice_mut(region.as_slice())
            .assign(&array.view().into_dyn());
    }
    Ok(stacked.into_dimensionality::<D::Larger>()?)
}

/// Instances that can be collated into a batch.
pub trait Collate: Sized {
    type Batch;
    fn collate(samples: &[Self]) -> Result<Self::Batch, CollateError>;
}

/// Fields of a `TrainBatch`, named as the model expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum TrainField {
    Encodings,
    ContextMasks,
    EntityMasks,
    EntitySizes,
    EntityTypes,
    EntitySampleMasks,
    Rels,
    RelMasks,
    RelTypes,
    RelSampleMasks,
}

impl TrainField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Encodings => "encodings",
            Self::ContextMasks => "context_masks",
            Self::EntityMasks => "entity_masks",
            Self::EntitySizes => "entity_sizes",
            Self::EntityTypes => "entity_types",
            Self::EntitySampleMasks => "entity_sample_masks",
            Self::Rels => "rels",
            Self::RelMasks => "rel_masks",
            Self::RelTypes => "rel_types",
            Self::RelSampleMasks => "rel_sample_masks",
        }
    }
}

/// Fields of an `EvalBatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum EvalField {
    Encodings,
    ContextMasks,
    EntityMasks,
    EntitySizes,
    EntitySpans,
    EntitySampleMasks,
}

impl EvalField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Encodings => "encodings",
            Self::ContextMasks => "context_masks",
            Self::EntityMasks => "entity_masks",
            Self::EntitySizes => "entity_sizes",
            Self::EntitySpans => "entity_spans",
            Self::EntitySampleMasks => "entity_sample_masks",
        }
    }
}

/// Padded training batch. `B` is the batch size; `C`, `E` and `R` are the largest context, entity
/// and relation counts of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainBatch {
    /// `[B, C]`
    pub encodings: Array2<i64>,
    /// `[B, C]`
    pub context_masks: Array2<bool>,
    /// `[B, E, C]`
    pub entity_masks: Array3<bool>,
    /// `[B, E]`
    pub entity_sizes: Array2<i64>,
    /// `[B, E]`
    pub entity_types: Array2<i64>,
    /// `[B, E]`
    pub entity_sample_masks: Array2<bool>,
    /// `[B, R, 2]`
    pub rels: Array3<i64>,
    /// `[B, R, C]`
    pub rel_masks: Array3<bool>,
    /// `[B, R, K - 1]`
    pub rel_types: Array3<f32>,
    /// `[B, R]`
    pub rel_sample_masks: Array2<bool>,
}

impl TrainBatch {
    pub fn shape(&self, field: TrainField) -> &[usize] {
        match field {
            TrainField::Encodings => self.encodings.shape(),
            TrainField::ContextMasks => self.context_masks.shape(),
            TrainField::EntityMasks => self.entity_masks.shape(),
            TrainField::EntitySizes => self.entity_sizes.shape(),
            TrainField::EntityTypes => self.entity_types.shape(),
            TrainField::EntitySampleMasks => self.entity_sample_masks.shape(),
            TrainField::Rels => self.rels.shape(),
            TrainField::RelMasks => self.rel_masks.shape(),
            TrainField::RelTypes => self.rel_types.shape(),
            TrainField::RelSampleMasks => self.rel_sample_masks.shape(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.encodings.nrows()
    }
}

impl Collate for TrainSample {
    type Batch = TrainBatch;
    fn collate(samples: &[Self]) -> Result<Self::Batch, CollateError> {
        Ok(TrainBatch {
            encodings: padded_stack(samples.iter().map(|s| s.encodings.view()))?,
            context_masks: padded_stack(samples.iter().map(|s| s.context_masks.view()))?,
            entity_masks: padded_stack(samples.iter().map(|s| s.entity_masks.view()))?,
            entity_sizes: padded_stack(samples.iter().map(|s| s.entity_sizes.view()))?,
            entity_types: padded_stack(samples.iter().map(|s| s.entity_types.view()))?,
            entity_sample_masks: padded_stack(
                samples.iter().map(|s| s.entity_sample_masks.view()),
            )?,
            rels: padded_stack(samples.iter().map(|s| s.rels.view()))?,
            rel_masks: padded_stack(samples.iter().map(|s| s.rel_masks.view()))?,
            rel_types: padded_stack(samples.iter().map(|s| s.rel_types.view()))?,
            rel_sample_masks: padded_stack(samples.iter().map(|s| s.rel_sample_masks.view()))?,
        })
    }
}

/// Padded evaluation batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalBatch {
    pub encodings: Array2<i64>,
    pub context_masks: Array2<bool>,
    pub entity_masks: Array3<bool>,
    pub entity_sizes: Array2<i64>,
    pub entity_spans: Array3<i64>,
    pub entity_sample_masks: Array2<bool>,
}

impl EvalBatch {
    pub fn shape(&self, field: EvalField) -> &[usize] {
        match field {
            EvalField::Encodings => self.encodings.shape(),
            EvalField::ContextMasks => self.context_masks.shape(),
            EvalField::EntityMasks => self.entity_masks.shape(),
            EvalField::EntitySizes => self.entity_sizes.shape(),
            EvalField::EntitySpans => self.entity_spans.shape(),
            EvalField::EntitySampleMasks => self.entity_sample_masks.shape(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.encodings.nrows()
    }
}

impl Collate for EvalSample {
    type Batch = EvalBatch;
    fn collate(samples: &[Self]) -> Result<Self::Batch, CollateError> {
        Ok(EvalBatch {
            encodings: padded_stack(samples.iter().map(|s| s.encodings.view()))?,
            context_masks: padded_stack(samples.iter().map(|s| s.context_masks.view()))?,
            entity_masks: padded_stack(samples.iter().map(|s| s.entity_masks.view()))?,
            entity_sizes: padded_stack(samples.iter().map(|s| s.entity_sizes.view()))?,
            entity_spans: padded_stack(samples.iter().map(|s| s.entity_spans.view()))?,
            entity_sample_masks: padded_stack(
                samples.iter().map(|s| s.entity_sample_masks.view()),
            )?,
        })
    }
}
