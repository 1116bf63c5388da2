//! Element types handled by the transform layer
//!
//! Only the four Fourier-relevant element types exist here: real and complex,
//! single and double precision. The real/complex maps encode which spectrum
//! type an r2c transform produces and which real type a c2r transform yields.

use crate::error::{Error, Result};
use std::fmt;

/// Element type of a device array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Complex with f32 components (8 bytes, interleaved)
    Complex64,
    /// Complex with f64 components (16 bytes, interleaved)
    Complex128,
}

/// Floating-point precision class of an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    /// f32 components
    Single,
    /// f64 components
    Double,
}

impl DType {
    /// Size of one element in bytes
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
            DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    /// Whether this is a complex type
    pub const fn is_complex(self) -> bool {
        matches!(self, DType::Complex64 | DType::Complex128)
    }

    /// Whether this is a real type
    pub const fn is_real(self) -> bool {
        !self.is_complex()
    }

    /// Precision class, shared between a real type and its spectrum type
    pub const fn precision(self) -> Precision {
        match self {
            DType::F32 | DType::Complex64 => Precision::Single,
            DType::F64 | DType::Complex128 => Precision::Double,
        }
    }

    /// Spectrum type produced by an r2c transform of this real type
    pub fn to_complex(self) -> Result<DType> {
        match self {
            DType::F32 => Ok(DType::Complex64),
            DType::F64 => Ok(DType::Complex128),
            other => Err(Error::unsupported_dtype(other, "to_complex")),
        }
    }

    /// Real type produced by a c2r transform of this spectrum type
    pub fn to_real(self) -> Result<DType> {
        match self {
            DType::Complex64 => Ok(DType::F32),
            DType::Complex128 => Ok(DType::F64),
            other => Err(Error::unsupported_dtype(other, "to_real")),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        };
        write!(f, "{}", name)
    }
}
