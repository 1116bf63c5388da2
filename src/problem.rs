//! Logical transform descriptions and the memoization key
//!
//! A [`LogicalProblem`] is everything that determines a plan: two problems
//! that compare equal may share a cached plan, two that differ in any field
//! may not. Per-call facts (which buffers, which direction) stay out of it.

use crate::dtype::DType;
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Discrete cosine transform variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DctType {
    /// DCT-I
    I,
    /// DCT-II (the common "DCT")
    II,
    /// DCT-III (inverse of DCT-II)
    III,
    /// DCT-IV
    IV,
}

impl DctType {
    /// Conventional numbering, 1 through 4
    pub const fn number(self) -> u64 {
        match self {
            DctType::I => 1,
            DctType::II => 2,
            DctType::III => 3,
            DctType::IV => 4,
        }
    }

    /// Parse the conventional numbering
    pub fn from_number(n: u64) -> Result<Self> {
        match n {
            1 => Ok(DctType::I),
            2 => Ok(DctType::II),
            3 => Ok(DctType::III),
            4 => Ok(DctType::IV),
            other => Err(Error::configuration(format!(
                "DCT type must be 1..=4, got {}",
                other
            ))),
        }
    }
}

/// Kind of Fourier-family transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// Complex to complex
    C2C,
    /// Real to half-spectrum complex
    R2C,
    /// Half-spectrum complex to real
    C2R,
    /// Real discrete cosine transform
    Dct(DctType),
}

impl TransformKind {
    /// Whether this kind pairs a real buffer with a half spectrum
    pub const fn is_real_pair(self) -> bool {
        matches!(self, TransformKind::R2C | TransformKind::C2R)
    }
}

/// Transform direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Forward (time/space to frequency)
    Forward,
    /// Backward (frequency to time/space)
    Backward,
}

/// Which direction, if any, a 1/N scale is applied in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Normalization {
    /// No scaling in either direction
    #[default]
    None,
    /// Forward pass scales by 1/N
    Forward,
    /// Backward pass scales by 1/N
    Backward,
}

/// An f64 stored by bit pattern so override maps stay hashable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatBits(u64);

impl FloatBits {
    /// Wrap a float value
    pub fn new(value: f64) -> Self {
        FloatBits(value.to_bits())
    }

    /// Recover the float value
    pub fn get(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// A raw configuration override value
///
/// Overrides are applied after every derived field, unvalidated. They are part
/// of the memoization key: changing one forces a fresh plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OverrideValue {
    /// Boolean flag
    Bool(bool),
    /// Unsigned integer field
    UInt(u64),
    /// Floating-point field, stored by bit pattern
    Float(FloatBits),
}

impl OverrideValue {
    /// Wrap a float value
    pub fn float(value: f64) -> Self {
        OverrideValue::Float(FloatBits::new(value))
    }
}

/// Complete logical description of a transform, and the plan-cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalProblem {
    /// Identity of the compute context the plan is bound to
    pub context_id: usize,
    /// Logical N-dimensional shape (slowest axis first)
    pub shape: Vec<usize>,
    /// Element type of the transform input
    pub dtype: DType,
    /// Transform kind
    pub kind: TransformKind,
    /// Whether input and output occupy the same allocation at the same offset
    pub in_place: bool,
    /// Axes to transform; `None` means all axes
    pub axes: Option<Vec<usize>>,
    /// Number of batched transforms along an implicit leading axis
    pub batch: usize,
    /// Normalization convention
    pub norm: Normalization,
    /// Raw engine-level overrides, canonically ordered for stable hashing
    pub overrides: BTreeMap<String, OverrideValue>,
}

impl LogicalProblem {
    /// Describe a transform with default options: out-of-place, all axes,
    /// batch of one, no normalization, no overrides.
    pub fn new(context_id: usize, shape: &[usize], dtype: DType, kind: TransformKind) -> Self {
        LogicalProblem {
            context_id,
            shape: shape.to_vec(),
            dtype,
            kind,
            in_place: false,
            axes: None,
            batch: 1,
            norm: Normalization::None,
            overrides: BTreeMap::new(),
        }
    }

    /// Mark the transform as in-place
    pub fn with_in_place(mut self, in_place: bool) -> Self {
        self.in_place = in_place;
        self
    }

    /// Restrict the transform to a subset of axes
    pub fn with_axes(mut self, axes: Option<&[usize]>) -> Self {
        self.axes = axes.map(|a| a.to_vec());
        self
    }

    /// Set the batch count
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    /// Set the normalization convention
    pub fn with_norm(mut self, norm: Normalization) -> Self {
        self.norm = norm;
        self
    }

    /// Attach a raw engine-level override
    pub fn with_override(mut self, key: impl Into<String>, value: OverrideValue) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }

    /// Number of logical dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of axes actually transformed
    pub fn transformed_axes(&self) -> usize {
        match &self.axes {
            Some(axes) => axes.iter().filter(|&&a| a < self.ndim()).count(),
            None => self.ndim(),
        }
    }

    /// Total element count of the logical shape
    pub fn num_elements(&self) -> usize {
        crate::shape::num_elements(&self.shape)
    }

    /// Backend-independent validity checks, run before any plan is built
    pub fn validate(&self) -> Result<()> {
        if self.shape.is_empty() {
            return Err(Error::configuration("transform shape must not be empty"));
        }
        if let Some(axes) = &self.axes {
            if let Some(&bad) = axes.iter().find(|&&a| a >= self.ndim()) {
                return Err(Error::configuration(format!(
                    "axis {} out of range for a {}-dimensional transform",
                    bad,
                    self.ndim()
                )));
            }
            if self.kind.is_real_pair() && !axes.contains(&(self.ndim() - 1)) {
                return Err(Error::configuration(
                    "the last axis of a real transform cannot be omitted",
                ));
            }
        }
        if self.transformed_axes() > 3 {
            return Err(Error::configuration(format!(
                "at most 3 axes can be transformed, got {}",
                self.transformed_axes()
            )));
        }
        if self.ndim() >= 4 && self.batch > 1 {
            return Err(Error::configuration(
                "cannot batch a transform that is already 4-dimensional",
            ));
        }
        Ok(())
    }
}
