//! High-level transform entry points
//!
//! Shaped after numpy's interface: each function takes an input array and an
//! options struct, allocates whatever the caller did not supply, resolves the
//! plan through the cache, and returns the array holding the result. In-place
//! real transforms return a dtype-reinterpreting view of the input buffer.

use crate::device::{is_in_place, BufferAllocator, DeviceArray};
use crate::dispatch::{self, BackendKind, CallBuffers};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::problem::{DctType, Direction, LogicalProblem, Normalization, TransformKind};
use crate::shape;
use std::sync::Arc;

pub use crate::cache::CacheStats;
pub use crate::dispatch::{cache_stats, clear_cache, default_backend, set_backend};

/// Options shared by every transform entry point, all defaulted
#[derive(Default)]
pub struct TransformArgs<'a> {
    /// Destination array; allocated automatically when absent. Pass the input
    /// itself (a clone of it) for an in-place transform.
    pub output: Option<&'a DeviceArray>,
    /// Scratch array for plans that need one
    pub temp: Option<&'a DeviceArray>,
    /// Allocator for automatic allocations; the context's default otherwise
    pub allocator: Option<&'a Arc<dyn BufferAllocator>>,
    /// Backend override; the process-wide default otherwise
    pub backend: Option<BackendKind>,
    /// Axes to transform; all axes otherwise
    pub axes: Option<&'a [usize]>,
    /// Batch count along an implicit leading axis
    pub batch: Option<usize>,
    /// Normalization convention
    pub norm: Normalization,
}

fn alloc(
    like: &DeviceArray,
    shape: &[usize],
    dtype: DType,
    args: &TransformArgs<'_>,
) -> Result<DeviceArray> {
    match args.allocator {
        Some(allocator) => DeviceArray::empty_with(like.context(), shape, dtype, allocator),
        None => DeviceArray::empty(like.context(), shape, dtype),
    }
}

fn build_problem(
    input: &DeviceArray,
    shape: &[usize],
    dtype: DType,
    kind: TransformKind,
    in_place: bool,
    args: &TransformArgs<'_>,
) -> LogicalProblem {
    LogicalProblem::new(input.context().id(), shape, dtype, kind)
        .with_in_place(in_place)
        .with_axes(args.axes)
        .with_batch(args.batch.unwrap_or(1))
        .with_norm(args.norm)
}

fn c2c(
    input: &DeviceArray,
    args: TransformArgs<'_>,
    direction: Direction,
    op: &'static str,
) -> Result<DeviceArray> {
    if !input.dtype().is_complex() {
        return Err(Error::unsupported_dtype(input.dtype(), op));
    }

    let owned;
    let output = match args.output {
        Some(o) => o,
        None => {
            owned = alloc(input, input.shape(), input.dtype(), &args)?;
            &owned
        }
    };
    let in_place = is_in_place(Some(input), Some(output));

    let problem = build_problem(
        input,
        input.shape(),
        input.dtype(),
        TransformKind::C2C,
        in_place,
        &args,
    );
    dispatch::execute(
        args.backend,
        &problem,
        direction,
        &CallBuffers {
            input,
            output: Some(output),
            temp: args.temp,
        },
    )?;

    Ok(if in_place {
        input.clone()
    } else {
        output.clone()
    })
}

/// N-dimensional forward complex-to-complex transform
pub fn fftn(input: &DeviceArray, args: TransformArgs<'_>) -> Result<DeviceArray> {
    c2c(input, args, Direction::Forward, "fftn")
}

/// N-dimensional backward complex-to-complex transform
pub fn ifftn(input: &DeviceArray, args: TransformArgs<'_>) -> Result<DeviceArray> {
    c2c(input, args, Direction::Backward, "ifftn")
}

fn check_even_last_axis(logical: &[usize], op: &'static str) -> Result<()> {
    if let Some(&last) = logical.last() {
        if last % 2 != 0 {
            return Err(Error::configuration(format!(
                "{}: odd last-axis length {} is unsupported for real transforms",
                op, last
            )));
        }
    }
    Ok(())
}

/// N-dimensional real-to-complex transform.
///
/// For an in-place transform the input's last axis must carry two padding
/// elements; the returned array is the input buffer viewed as the complex
/// half spectrum. Out of place, the result has `n/2 + 1` elements on its
/// last axis.
pub fn rfftn(input: &DeviceArray, args: TransformArgs<'_>) -> Result<DeviceArray> {
    if !input.dtype().is_real() {
        return Err(Error::unsupported_dtype(input.dtype(), "rfftn"));
    }

    let in_place = is_in_place(Some(input), args.output);
    let cdtype = input.dtype().to_complex()?;
    let cshape = shape::real_to_complex_shape(input.shape(), in_place);
    let mut logical = input.shape().to_vec();
    if in_place {
        let last = logical.last_mut().ok_or_else(|| {
            Error::configuration("rfftn input must have at least one axis")
        })?;
        *last -= 2;
    }
    check_even_last_axis(&logical, "rfftn")?;

    let owned;
    let output = match args.output {
        Some(o) => o,
        None => {
            owned = alloc(input, &cshape, cdtype, &args)?;
            &owned
        }
    };

    let problem = build_problem(
        input,
        &logical,
        input.dtype(),
        TransformKind::R2C,
        in_place,
        &args,
    );
    dispatch::execute(
        args.backend,
        &problem,
        Direction::Forward,
        &CallBuffers {
            input,
            output: Some(output),
            temp: args.temp,
        },
    )?;

    if in_place {
        input.reinterpret(cdtype, &cshape)
    } else {
        Ok(output.clone())
    }
}

/// N-dimensional complex-to-real transform.
///
/// The input holds a Hermitian half spectrum. Out of place a scratch buffer
/// the size of the input is allocated when none is supplied. For an in-place
/// transform the returned array is the input buffer viewed as the padded real
/// array.
pub fn irfftn(input: &DeviceArray, args: TransformArgs<'_>) -> Result<DeviceArray> {
    if !input.dtype().is_complex() {
        return Err(Error::unsupported_dtype(input.dtype(), "irfftn"));
    }

    let in_place = is_in_place(Some(input), args.output);
    let rdtype = input.dtype().to_real()?;
    let logical = shape::complex_to_real_shape(input.shape(), false);

    let owned_output;
    let output = match args.output {
        Some(o) => o,
        None => {
            owned_output = alloc(input, &logical, rdtype, &args)?;
            &owned_output
        }
    };
    let owned_temp;
    let temp = match args.temp {
        Some(t) => Some(t),
        None if !in_place => {
            owned_temp = alloc(input, input.shape(), input.dtype(), &args)?;
            Some(&owned_temp)
        }
        None => None,
    };

    let problem = build_problem(input, &logical, rdtype, TransformKind::C2R, in_place, &args);
    dispatch::execute(
        args.backend,
        &problem,
        Direction::Backward,
        &CallBuffers {
            input,
            output: Some(output),
            temp,
        },
    )?;

    if in_place {
        let padded = shape::complex_to_real_shape(input.shape(), true);
        input.reinterpret(rdtype, &padded)
    } else {
        Ok(output.clone())
    }
}

fn dct(
    input: &DeviceArray,
    ty: DctType,
    args: TransformArgs<'_>,
    direction: Direction,
    op: &'static str,
) -> Result<DeviceArray> {
    if !input.dtype().is_real() {
        return Err(Error::unsupported_dtype(input.dtype(), op));
    }
    let backend = match args.backend {
        Some(BackendKind::Clfft) => {
            return Err(Error::UnsupportedTransform {
                backend: "clfft",
                kind: TransformKind::Dct(ty),
            })
        }
        _ => Some(BackendKind::Vkfft),
    };

    let owned;
    let output = match args.output {
        Some(o) => o,
        None => {
            owned = alloc(input, input.shape(), input.dtype(), &args)?;
            &owned
        }
    };
    let in_place = is_in_place(Some(input), Some(output));

    let problem = build_problem(
        input,
        input.shape(),
        input.dtype(),
        TransformKind::Dct(ty),
        in_place,
        &args,
    );
    dispatch::execute(
        backend,
        &problem,
        direction,
        &CallBuffers {
            input,
            output: Some(output),
            temp: args.temp,
        },
    )?;

    Ok(if in_place {
        input.clone()
    } else {
        output.clone()
    })
}

/// N-dimensional forward discrete cosine transform (vkfft backend only)
pub fn dctn(input: &DeviceArray, ty: DctType, args: TransformArgs<'_>) -> Result<DeviceArray> {
    dct(input, ty, args, Direction::Forward, "dctn")
}

/// N-dimensional backward discrete cosine transform (vkfft backend only)
pub fn idctn(input: &DeviceArray, ty: DctType, args: TransformArgs<'_>) -> Result<DeviceArray> {
    dct(input, ty, args, Direction::Backward, "idctn")
}
