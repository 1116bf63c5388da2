//! Error types for gpufft operations

use crate::dtype::DType;
use crate::problem::TransformKind;
use crate::roles::BufferRole;
use thiserror::Error;

/// Result type alias for gpufft operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or executing a transform
#[derive(Error, Debug)]
pub enum Error {
    /// Element type is not usable for the requested operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The element type that was rejected
        dtype: DType,
        /// Operation that rejected it
        op: &'static str,
    },

    /// The selected backend cannot perform this transform kind
    #[error("Backend '{backend}' does not support {kind:?} transforms")]
    UnsupportedTransform {
        /// Backend name
        backend: &'static str,
        /// The rejected transform kind
        kind: TransformKind,
    },

    /// A problem description that no plan can be built for
    #[error("Unsupported configuration: {reason}")]
    UnsupportedConfiguration {
        /// Human-readable description of the conflict
        reason: String,
    },

    /// A buffer role the plan requires was not supplied by the caller
    #[error("Missing {role} buffer required by '{op}'")]
    MissingBuffer {
        /// The unfilled role
        role: BufferRole,
        /// Operation that needed it
        op: &'static str,
    },

    /// The selected backend cannot address sub-buffer offsets
    #[error("Backend '{backend}' does not support buffer offsets (got byte offset {offset})")]
    OffsetNotSupported {
        /// Backend name
        backend: &'static str,
        /// The offending byte offset
        offset: usize,
    },

    /// No engine has been installed for the selected backend
    #[error("Backend '{backend}' is not available: no engine installed")]
    BackendUnavailable {
        /// Backend name
        backend: &'static str,
    },

    /// The native engine failed to initialize a plan
    #[error("Backend '{backend}' plan initialization failed: {status}")]
    EngineInit {
        /// Backend name
        backend: &'static str,
        /// Native status name reported by the engine
        status: &'static str,
    },

    /// The native engine failed while executing a plan
    #[error("Backend '{backend}' execution failed: {status}")]
    EngineExec {
        /// Backend name
        backend: &'static str,
        /// Native status name reported by the engine
        status: &'static str,
    },

    /// Buffers from a different compute context were passed to a plan
    #[error("Context mismatch: all buffers must belong to the plan's context")]
    ContextMismatch,

    /// An array's shape does not match what the operation expects
    #[error("Shape mismatch for '{op}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Operation that checked the shape
        op: &'static str,
        /// Expected shape
        expected: Vec<usize>,
        /// Shape that was supplied
        got: Vec<usize>,
    },

    /// Device allocation failed
    #[error("Allocation of {size} bytes failed on context {context_id}")]
    AllocationFailed {
        /// Requested size in bytes
        size: usize,
        /// Context the allocation was attempted on
        context_id: usize,
    },

    /// Host/device staging size mismatch
    #[error("Buffer size mismatch for '{op}': array holds {array_bytes} bytes, host side has {host_bytes}")]
    SizeMismatch {
        /// Operation that checked the sizes
        op: &'static str,
        /// Byte length of the device array
        array_bytes: usize,
        /// Byte length of the host slice
        host_bytes: usize,
    },
}

impl Error {
    /// Helper to create an UnsupportedDType error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Error::UnsupportedDType { dtype, op }
    }

    /// Helper to create an UnsupportedConfiguration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Error::UnsupportedConfiguration {
            reason: reason.into(),
        }
    }

    /// Helper to create a MissingBuffer error
    pub fn missing_buffer(role: BufferRole, op: &'static str) -> Self {
        Error::MissingBuffer { role, op }
    }
}
