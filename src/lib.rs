//! # gpufft
//!
//! A configuration-and-dispatch layer for GPU Fourier-family transforms.
//! gpufft turns a logical description of an N-dimensional transform (c2c,
//! r2c, c2r, or DCT 1 to 4, forward or backward, in or out of place) into a
//! fully specified plan against one of two structurally different native FFT
//! engines, memoizes the plan, and dispatches execution onto user-supplied
//! device buffers.
//!
//! The native engines and the compute context are opaque collaborators:
//! embedders implement [`device::ContextOps`] over their device/queue object
//! and install an engine through [`backend::vkf::install_engine`] or
//! [`backend::clf::install_engine`]. Everything above those seams, shape and
//! stride derivation, buffer-role resolution, configuration building,
//! caching, and validation, is handled here.
//!
//! ## Example
//!
//! ```ignore
//! use gpufft::{fftn, ifftn, TransformArgs};
//!
//! let spectrum = fftn(&signal, TransformArgs::default())?;
//! let restored = ifftn(&spectrum, TransformArgs {
//!     norm: gpufft::problem::Normalization::Backward,
//!     ..Default::default()
//! })?;
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod backend;
pub mod cache;
pub mod complex;
pub mod device;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod problem;
pub mod roles;
pub mod shape;

pub use api::{
    cache_stats, clear_cache, dctn, default_backend, fftn, idctn, ifftn, irfftn, rfftn,
    set_backend, TransformArgs,
};
pub use cache::CacheStats;
pub use complex::{Complex128, Complex64};
pub use device::{BufferAllocator, Context, ContextOps, DeviceArray};
pub use dispatch::BackendKind;
pub use dtype::DType;
pub use error::{Error, Result};
pub use problem::{DctType, Direction, LogicalProblem, Normalization, TransformKind};
