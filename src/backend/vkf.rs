//! VkFFT-style backend
//!
//! This engine takes one up-front configuration record describing the whole
//! transform and compiles an application object from it; buffers and offsets
//! are supplied per launch. Field names on [`Configuration`] and
//! [`LaunchParams`] mirror the native ABI.
//!
//! Out-of-place real transforms need direction-specific plans because the
//! buffer count and strides differ between the forward and inverse pass, so
//! r2c plans are built forward-only and c2r plans inverse-only.

use crate::cache::{CacheStats, PlanCache};
use crate::device::{Context, DeviceArray};
use crate::dispatch::{CallBuffers, FftBackend};
use crate::dtype::Precision;
use crate::error::{Error, Result};
use crate::problem::{
    Direction, LogicalProblem, Normalization, OverrideValue, TransformKind,
};
use crate::roles;
use crate::shape;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Canonical name of this backend
pub const BACKEND_NAME: &str = "vkfft";

/// Native direction code for a forward pass
pub const FORWARD: i32 = -1;
/// Native direction code for a backward pass
pub const BACKWARD: i32 = 1;

/// Native direction code for `direction`
pub const fn direction_code(direction: Direction) -> i32 {
    match direction {
        Direction::Forward => FORWARD,
        Direction::Backward => BACKWARD,
    }
}

/// Status codes reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VkfResult {
    Success,
    MallocFailed,
    InsufficientCodeBuffer,
    InsufficientTempBuffer,
    PlanNotInitialized,
    NullTempPassed,
    InvalidDevice,
    InvalidQueue,
    OnlyForwardFftInitialized,
    OnlyInverseFftInitialized,
    InvalidContext,
    InvalidPlatform,
    EmptyFftDim,
    EmptySize,
    EmptyBufferSize,
    EmptyBuffer,
    EmptyTempBuffer,
    EmptyInputBuffer,
    EmptyOutputBuffer,
    UnsupportedRadix,
    UnsupportedFftLength,
    UnsupportedFftLengthR2c,
    UnsupportedFftLengthDct,
    UnsupportedFftOmit,
    FailedToAllocate,
    FailedToCompileProgram,
    FailedToCreateProgram,
    FailedToLaunchKernel,
    FailedToSynchronize,
}

impl VkfResult {
    /// Whether this status signals success
    pub const fn is_success(self) -> bool {
        matches!(self, VkfResult::Success)
    }

    /// Native name of the status code
    pub const fn name(self) -> &'static str {
        match self {
            VkfResult::Success => "SUCCESS",
            VkfResult::MallocFailed => "MALLOC_FAILED",
            VkfResult::InsufficientCodeBuffer => "INSUFFICIENT_CODE_BUFFER",
            VkfResult::InsufficientTempBuffer => "INSUFFICIENT_TEMP_BUFFER",
            VkfResult::PlanNotInitialized => "PLAN_NOT_INITIALIZED",
            VkfResult::NullTempPassed => "NULL_TEMP_PASSED",
            VkfResult::InvalidDevice => "INVALID_DEVICE",
            VkfResult::InvalidQueue => "INVALID_QUEUE",
            VkfResult::OnlyForwardFftInitialized => "ONLY_FORWARD_FFT_INITIALIZED",
            VkfResult::OnlyInverseFftInitialized => "ONLY_INVERSE_FFT_INITIALIZED",
            VkfResult::InvalidContext => "INVALID_CONTEXT",
            VkfResult::InvalidPlatform => "INVALID_PLATFORM",
            VkfResult::EmptyFftDim => "EMPTY_FFTdim",
            VkfResult::EmptySize => "EMPTY_size",
            VkfResult::EmptyBufferSize => "EMPTY_bufferSize",
            VkfResult::EmptyBuffer => "EMPTY_buffer",
            VkfResult::EmptyTempBuffer => "EMPTY_tempBuffer",
            VkfResult::EmptyInputBuffer => "EMPTY_inputBuffer",
            VkfResult::EmptyOutputBuffer => "EMPTY_outputBuffer",
            VkfResult::UnsupportedRadix => "UNSUPPORTED_RADIX",
            VkfResult::UnsupportedFftLength => "UNSUPPORTED_FFT_LENGTH",
            VkfResult::UnsupportedFftLengthR2c => "UNSUPPORTED_FFT_LENGTH_R2C",
            VkfResult::UnsupportedFftLengthDct => "UNSUPPORTED_FFT_LENGTH_DCT",
            VkfResult::UnsupportedFftOmit => "UNSUPPORTED_FFT_OMIT",
            VkfResult::FailedToAllocate => "FAILED_TO_ALLOCATE",
            VkfResult::FailedToCompileProgram => "FAILED_TO_COMPILE_PROGRAM",
            VkfResult::FailedToCreateProgram => "FAILED_TO_CREATE_PROGRAM",
            VkfResult::FailedToLaunchKernel => "FAILED_TO_LAUNCH_KERNEL",
            VkfResult::FailedToSynchronize => "FAILED_TO_SYNCHRONIZE",
        }
    }
}

/// Complete plan configuration handed to the engine at initialization
///
/// Lengths and strides run fastest-varying axis first, the engine's
/// convention. Strides are cumulative products and include the total element
/// count as their last entry.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Number of transformed dimensions
    pub fft_dim: usize,
    /// Axis lengths, fastest first
    pub size: Vec<u64>,
    /// Batched transforms along an implicit leading axis
    pub number_batches: u64,
    /// Per-axis skip markers, fastest first; 1 = axis not transformed.
    /// Empty when every axis is transformed.
    pub omit_dimension: Vec<u64>,
    /// f64 element components
    pub double_precision: bool,
    /// Real-to-complex (or complex-to-real) mode
    pub perform_r2c: bool,
    /// DCT type 1 to 4, or 0 for none
    pub perform_dct: u64,
    /// Scale the backward pass by 1/N inside the engine
    pub normalize: bool,
    /// Buffer offsets arrive with each launch instead of the configuration
    pub specify_offsets_at_launch: bool,
    /// A distinct input buffer with its own strides exists
    pub is_input_formatted: bool,
    /// A distinct output buffer with its own strides exists
    pub is_output_formatted: bool,
    /// Input strides, cumulative products fastest first
    pub input_buffer_stride: Vec<u64>,
    /// Working-buffer strides, cumulative products fastest first
    pub buffer_stride: Vec<u64>,
    /// Output strides, cumulative products fastest first
    pub output_buffer_stride: Vec<u64>,
    /// Compile only the forward kernels
    pub make_forward_plan_only: bool,
    /// Compile only the inverse kernels
    pub make_inverse_plan_only: bool,
    /// Unrecognized overrides passed through to the engine untouched
    pub extra: BTreeMap<String, OverrideValue>,
}

/// One buffer binding at launch: base handle plus byte offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferSlot {
    /// Base allocation handle
    pub handle: u64,
    /// Byte offset into the allocation
    pub offset: u64,
}

impl BufferSlot {
    fn of(array: &DeviceArray) -> Self {
        BufferSlot {
            handle: array.base_handle(),
            offset: array.byte_offset() as u64,
        }
    }
}

/// Per-launch buffer bindings
#[derive(Debug, Clone, Default)]
pub struct LaunchParams {
    /// Working buffer (the only buffer when in place)
    pub buffer: Option<BufferSlot>,
    /// Distinct input buffer for out-of-place transforms
    pub input_buffer: Option<BufferSlot>,
    /// Distinct output buffer when the working buffer cannot serve as one
    pub output_buffer: Option<BufferSlot>,
    /// Engine-internal temporary buffer
    pub temp_buffer: Option<BufferSlot>,
    /// Convolution kernel buffer
    pub kernel: Option<BufferSlot>,
}

/// A compiled application object, ready to execute launches
pub trait VkfApplication: Send + Sync {
    /// Execute one pass. `inverse` is [`FORWARD`] or [`BACKWARD`].
    fn append(&self, inverse: i32, params: &LaunchParams) -> VkfResult;
}

/// The engine itself: compiles configurations into applications
pub trait VkfEngine: Send + Sync {
    /// Compile `config` against `context`
    fn initialize(
        &self,
        context: &Context,
        config: &Configuration,
    ) -> std::result::Result<Box<dyn VkfApplication>, VkfResult>;
}

static ENGINE: OnceLock<Arc<dyn VkfEngine>> = OnceLock::new();

/// Install the engine implementation. The first installation wins; later
/// calls are ignored.
pub fn install_engine(engine: Arc<dyn VkfEngine>) {
    let _ = ENGINE.set(engine);
}

/// Whether an engine implementation has been installed
pub fn engine_installed() -> bool {
    ENGINE.get().is_some()
}

fn engine() -> Result<&'static Arc<dyn VkfEngine>> {
    ENGINE.get().ok_or(Error::BackendUnavailable {
        backend: BACKEND_NAME,
    })
}

fn cumprod(values: &[u64]) -> Vec<u64> {
    let mut acc = 1u64;
    values
        .iter()
        .map(|&v| {
            acc *= v;
            acc
        })
        .collect()
}

/// Derive the full engine configuration from a logical problem.
pub fn build_configuration(problem: &LogicalProblem) -> Result<Configuration> {
    let mut config = Configuration {
        fft_dim: problem.ndim(),
        size: problem.shape.iter().rev().map(|&s| s as u64).collect(),
        number_batches: problem.batch as u64,
        specify_offsets_at_launch: true,
        ..Configuration::default()
    };

    if let Some(axes) = &problem.axes {
        config.omit_dimension = (0..problem.ndim())
            .map(|i| u64::from(!axes.contains(&i)))
            .rev()
            .collect();
    }

    if !problem.in_place {
        config.is_input_formatted = true;
        let cshape: Vec<u64> = shape::real_to_complex_shape(&problem.shape, false)
            .iter()
            .rev()
            .map(|&s| s as u64)
            .collect();
        match problem.kind {
            TransformKind::C2C => {
                config.input_buffer_stride = cumprod(&config.size);
                config.buffer_stride = cumprod(&config.size);
            }
            TransformKind::R2C => {
                config.make_forward_plan_only = true;
                config.input_buffer_stride = cumprod(&config.size);
                config.buffer_stride = cumprod(&cshape);
            }
            TransformKind::C2R => {
                config.make_inverse_plan_only = true;
                config.input_buffer_stride = cumprod(&cshape);
                config.buffer_stride = cumprod(&cshape);
                config.is_output_formatted = true;
                config.output_buffer_stride = cumprod(&config.size);
            }
            // the engine derives DCT layouts itself
            TransformKind::Dct(_) => {}
        }
    }

    config.double_precision = problem.dtype.precision() == Precision::Double;

    match problem.kind {
        TransformKind::R2C | TransformKind::C2R => config.perform_r2c = true,
        TransformKind::Dct(ty) => config.perform_dct = ty.number(),
        TransformKind::C2C => {}
    }

    config.normalize = match problem.norm {
        Normalization::None => false,
        Normalization::Backward => true,
        Normalization::Forward => {
            return Err(Error::configuration(
                "vkfft only normalizes the backward transform; \
                 forward normalization is unsupported",
            ))
        }
    };

    // overrides win over every derived field; unvalidated by design of the
    // escape hatch
    for (key, value) in &problem.overrides {
        apply_override(&mut config, key, value);
    }

    Ok(config)
}

fn apply_override(config: &mut Configuration, key: &str, value: &OverrideValue) {
    match (key, value) {
        ("normalize", OverrideValue::Bool(b)) => config.normalize = *b,
        ("numberBatches", OverrideValue::UInt(n)) => config.number_batches = *n,
        ("makeForwardPlanOnly", OverrideValue::Bool(b)) => config.make_forward_plan_only = *b,
        ("makeInversePlanOnly", OverrideValue::Bool(b)) => config.make_inverse_plan_only = *b,
        ("doublePrecision", OverrideValue::Bool(b)) => config.double_precision = *b,
        _ => {
            config.extra.insert(key.to_string(), value.clone());
        }
    }
}

/// A built plan: its configuration and the compiled application
pub struct VkfPlan {
    config: Configuration,
    app: Box<dyn VkfApplication>,
    context: Context,
    kind: TransformKind,
    in_place: bool,
    separate_buffer_required: bool,
}

impl VkfPlan {
    /// The configuration this plan was compiled from
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    fn launch(&self, direction: Direction, buffers: &CallBuffers<'_>) -> Result<()> {
        for array in std::iter::once(buffers.input)
            .chain(buffers.output)
            .chain(buffers.temp)
        {
            if !array.context().is_same(&self.context) {
                return Err(Error::ContextMismatch);
            }
        }

        let set = roles::resolve(self.kind, self.in_place, direction, false);
        set.check(
            "vkfft transform",
            buffers.output.is_some(),
            buffers.temp.is_some(),
        )?;

        let mut pars = LaunchParams::default();
        if self.in_place {
            pars.buffer = Some(BufferSlot::of(buffers.input));
        } else {
            pars.input_buffer = Some(BufferSlot::of(buffers.input));
            let output = buffers.output.ok_or(Error::MissingBuffer {
                role: roles::BufferRole::Output,
                op: "vkfft transform",
            })?;

            if self.separate_buffer_required && direction == Direction::Backward {
                pars.output_buffer = Some(BufferSlot::of(output));
                let temp = buffers.temp.ok_or(Error::MissingBuffer {
                    role: roles::BufferRole::Scratch,
                    op: "vkfft transform",
                })?;
                pars.buffer = Some(BufferSlot::of(temp));
            } else {
                pars.buffer = Some(BufferSlot::of(output));
            }
        }

        // the engine has no event plumbing yet, so force synchronization
        // around the call
        self.context.finish();
        let res = self.app.append(direction_code(direction), &pars);
        if !res.is_success() {
            return Err(Error::EngineExec {
                backend: BACKEND_NAME,
                status: res.name(),
            });
        }
        self.context.finish();
        Ok(())
    }
}

fn build_plan(problem: &LogicalProblem, context: &Context) -> Result<VkfPlan> {
    info!(
        kind = ?problem.kind,
        shape = ?problem.shape,
        in_place = problem.in_place,
        "initializing vkfft plan"
    );
    let config = build_configuration(problem)?;
    let app = engine()?
        .initialize(context, &config)
        .map_err(|status| Error::EngineInit {
            backend: BACKEND_NAME,
            status: status.name(),
        })?;
    Ok(VkfPlan {
        config,
        app,
        context: context.clone(),
        kind: problem.kind,
        in_place: problem.in_place,
        separate_buffer_required: problem.kind == TransformKind::C2R && !problem.in_place,
    })
}

fn plan_cache() -> &'static PlanCache<VkfPlan> {
    static CACHE: OnceLock<PlanCache<VkfPlan>> = OnceLock::new();
    CACHE.get_or_init(PlanCache::new)
}

/// Dispatch-facing handle for this backend
pub struct VkfBackend;

impl FftBackend for VkfBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn available(&self) -> bool {
        engine_installed()
    }

    fn supports(&self, _kind: TransformKind) -> bool {
        true
    }

    fn supports_offsets(&self) -> bool {
        true
    }

    fn engine_allocates_scratch(&self) -> bool {
        false
    }

    fn run(
        &self,
        problem: &LogicalProblem,
        direction: Direction,
        buffers: &CallBuffers<'_>,
    ) -> Result<()> {
        if problem.context_id != buffers.input.context().id() {
            return Err(Error::ContextMismatch);
        }
        let context = buffers.input.context().clone();
        let plan = plan_cache().lookup_or_build(problem, || build_plan(problem, &context))?;
        plan.launch(direction, buffers)
    }

    fn clear_plans(&self) {
        plan_cache().clear();
    }

    fn plan_stats(&self) -> CacheStats {
        plan_cache().stats()
    }
}
