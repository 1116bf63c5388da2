//! clFFT-style backend
//!
//! This engine builds a mutable plan object field by field, then bakes it on
//! first enqueue. It has no DCT support and no notion of buffer offsets, it
//! normalizes through explicit per-direction scale factors, and it allocates
//! its own intermediate buffer when the caller supplies none. It also demands
//! one-time library setup before the first plan and an at-most-once teardown
//! that every plan destructor must respect.

use crate::cache::{CacheStats, PlanCache};
use crate::device::{Context, DeviceArray};
use crate::dispatch::{CallBuffers, FftBackend};
use crate::dtype::Precision;
use crate::error::{Error, Result};
use crate::problem::{Direction, LogicalProblem, Normalization, OverrideValue, TransformKind};
use crate::roles;
use crate::shape;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Canonical name of this backend
pub const BACKEND_NAME: &str = "clfft";

/// Status codes reported by the engine: the standard OpenCL set extended
/// with the library's own codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ClfStatus {
    Success,
    InvalidValue,
    InvalidCommandQueue,
    InvalidContext,
    InvalidMemObject,
    OutOfResources,
    OutOfHostMemory,
    Bugcheck,
    NotImplemented,
    TransposedNotImplemented,
    FileNotFound,
    FileCreateFailure,
    VersionMismatch,
    InvalidPlan,
    DeviceNoDouble,
    DeviceMismatch,
}

impl ClfStatus {
    /// Whether this status signals success
    pub const fn is_success(self) -> bool {
        matches!(self, ClfStatus::Success)
    }

    /// Native name of the status code
    pub const fn name(self) -> &'static str {
        match self {
            ClfStatus::Success => "SUCCESS",
            ClfStatus::InvalidValue => "INVALID_VALUE",
            ClfStatus::InvalidCommandQueue => "INVALID_COMMAND_QUEUE",
            ClfStatus::InvalidContext => "INVALID_CONTEXT",
            ClfStatus::InvalidMemObject => "INVALID_MEM_OBJECT",
            ClfStatus::OutOfResources => "OUT_OF_RESOURCES",
            ClfStatus::OutOfHostMemory => "OUT_OF_HOST_MEMORY",
            ClfStatus::Bugcheck => "BUGCHECK",
            ClfStatus::NotImplemented => "NOTIMPLEMENTED",
            ClfStatus::TransposedNotImplemented => "TRANSPOSED_NOTIMPLEMENTED",
            ClfStatus::FileNotFound => "FILE_NOT_FOUND",
            ClfStatus::FileCreateFailure => "FILE_CREATE_FAILURE",
            ClfStatus::VersionMismatch => "VERSION_MISMATCH",
            ClfStatus::InvalidPlan => "INVALID_PLAN",
            ClfStatus::DeviceNoDouble => "DEVICE_NO_DOUBLE",
            ClfStatus::DeviceMismatch => "DEVICE_MISMATCH",
        }
    }
}

/// Buffer memory layouts the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// (re, im) pairs in one buffer
    ComplexInterleaved,
    /// Real and imaginary parts in separate buffers
    ComplexPlanar,
    /// Half spectrum, (re, im) pairs in one buffer
    HermitianInterleaved,
    /// Half spectrum, separate real and imaginary buffers
    HermitianPlanar,
    /// Real values only
    Real,
}

/// Computation precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClfPrecision {
    /// f32
    Single,
    /// f64
    Double,
}

/// Native direction selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClfDirection {
    /// Forward (also called minus)
    Forward,
    /// Backward (also called plus)
    Backward,
}

impl From<Direction> for ClfDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => ClfDirection::Forward,
            Direction::Backward => ClfDirection::Backward,
        }
    }
}

/// Whether results land in the input buffers or separate output buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultLocation {
    /// Results overwrite the inputs
    Inplace,
    /// Results go to distinct output buffers
    Outofplace,
}

/// Whether the engine may leave the result transposed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTransposition {
    /// Normal axis order
    NoTranspose,
    /// Engine-chosen transposed order
    Transposed,
}

/// Complete plan description handed to the engine
///
/// Lengths and strides run fastest-varying axis first. Strides are in
/// elements of the respective buffer's type. A distance of 0 lets the engine
/// pick the batch stride itself.
#[derive(Debug, Clone)]
pub struct PlanSettings {
    /// Number of transformed dimensions
    pub dimension: usize,
    /// Axis lengths, fastest first
    pub lengths: Vec<usize>,
    /// Number of batched transforms
    pub batch_size: usize,
    /// Computation precision
    pub precision: ClfPrecision,
    /// Multiplier applied by the forward pass
    pub forward_scale: f64,
    /// Multiplier applied by the backward pass
    pub backward_scale: f64,
    /// Input strides in elements, fastest first
    pub input_strides: Vec<usize>,
    /// Output strides in elements, fastest first
    pub output_strides: Vec<usize>,
    /// Element distance between batched inputs, 0 for engine default
    pub input_distance: usize,
    /// Element distance between batched outputs, 0 for engine default
    pub output_distance: usize,
    /// Input buffer layout
    pub input_layout: Layout,
    /// Output buffer layout
    pub output_layout: Layout,
    /// In-place or out-of-place execution
    pub placeness: ResultLocation,
    /// Result transposition mode
    pub transposed: ResultTransposition,
}

/// A baked plan, ready to enqueue transforms
pub trait ClfPlanExec: Send + Sync {
    /// Enqueue one pass over the given base-allocation handles. `outputs` is
    /// `None` for in-place plans; `temp` is an optional caller-owned scratch
    /// allocation.
    fn enqueue(
        &self,
        direction: ClfDirection,
        inputs: &[u64],
        outputs: Option<&[u64]>,
        temp: Option<u64>,
    ) -> ClfStatus;

    /// Release the native plan
    fn destroy(&self);
}

/// The engine itself
pub trait ClfEngine: Send + Sync {
    /// One-time library initialization
    fn setup(&self) -> ClfStatus;

    /// Create and bake a plan for `settings` against `context`
    fn create_plan(
        &self,
        context: &Context,
        settings: &PlanSettings,
    ) -> std::result::Result<Box<dyn ClfPlanExec>, ClfStatus>;

    /// Global library teardown
    fn teardown(&self);
}

static ENGINE: OnceLock<Arc<dyn ClfEngine>> = OnceLock::new();
static TORN_DOWN: AtomicBool = AtomicBool::new(false);

/// Install the engine implementation. The first installation wins; later
/// calls are ignored.
pub fn install_engine(engine: Arc<dyn ClfEngine>) {
    let _ = ENGINE.set(engine);
}

/// Whether an engine implementation has been installed
pub fn engine_installed() -> bool {
    ENGINE.get().is_some()
}

fn engine() -> Result<&'static Arc<dyn ClfEngine>> {
    ENGINE.get().ok_or(Error::BackendUnavailable {
        backend: BACKEND_NAME,
    })
}

fn ensure_setup() -> Result<()> {
    static SETUP: OnceLock<ClfStatus> = OnceLock::new();
    let engine = engine()?;
    let status = *SETUP.get_or_init(|| engine.setup());
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::EngineInit {
            backend: BACKEND_NAME,
            status: status.name(),
        })
    }
}

/// Tear the library down, at most once. Plans dropped afterwards skip their
/// destroy call, since the library they belong to is gone. Embedders wire
/// this to their shutdown path.
pub fn teardown() {
    if TORN_DOWN.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(engine) = ENGINE.get() {
        engine.teardown();
    }
}

pub(crate) fn torn_down() -> bool {
    TORN_DOWN.load(Ordering::SeqCst)
}

/// Derive the full plan settings from a logical problem.
pub fn build_settings(problem: &LogicalProblem) -> Result<PlanSettings> {
    if problem.axes.is_some() {
        return Err(Error::configuration(
            "clfft transforms always cover all axes; axis selection is unsupported",
        ));
    }

    let logical = &problem.shape;
    let cshape = shape::real_to_complex_shape(logical, false);
    // padded real shape when the transform runs in place
    let rshape = shape::complex_to_real_shape(&cshape, problem.in_place);

    let rev = |s: &[usize]| -> Vec<usize> { s.iter().rev().copied().collect() };
    let strides_of = |s: &[usize]| -> Vec<usize> { rev(&shape::row_major_strides(s)) };

    let (input_strides, output_strides, input_layout, output_layout) = match problem.kind {
        TransformKind::C2C => (
            strides_of(logical),
            strides_of(logical),
            Layout::ComplexInterleaved,
            Layout::ComplexInterleaved,
        ),
        TransformKind::R2C => (
            strides_of(&rshape),
            strides_of(&cshape),
            Layout::Real,
            Layout::HermitianInterleaved,
        ),
        TransformKind::C2R => (
            strides_of(&cshape),
            strides_of(&rshape),
            Layout::HermitianInterleaved,
            Layout::Real,
        ),
        TransformKind::Dct(_) => {
            return Err(Error::UnsupportedTransform {
                backend: BACKEND_NAME,
                kind: problem.kind,
            })
        }
    };

    let total = shape::num_elements(logical) as f64;
    let (forward_scale, backward_scale) = match problem.norm {
        Normalization::None => (1.0, 1.0),
        Normalization::Forward => (1.0 / total, 1.0),
        Normalization::Backward => (1.0, 1.0 / total),
    };

    let mut settings = PlanSettings {
        dimension: logical.len(),
        lengths: rev(logical),
        batch_size: problem.batch,
        precision: match problem.dtype.precision() {
            Precision::Single => ClfPrecision::Single,
            Precision::Double => ClfPrecision::Double,
        },
        forward_scale,
        backward_scale,
        input_strides,
        output_strides,
        input_distance: 0,
        output_distance: 0,
        input_layout,
        output_layout,
        placeness: if problem.in_place {
            ResultLocation::Inplace
        } else {
            ResultLocation::Outofplace
        },
        transposed: ResultTransposition::NoTranspose,
    };

    // overrides win over every derived field; unvalidated by design of the
    // escape hatch
    for (key, value) in &problem.overrides {
        apply_override(&mut settings, key, value);
    }

    Ok(settings)
}

fn apply_override(settings: &mut PlanSettings, key: &str, value: &OverrideValue) {
    match (key, value) {
        ("forward_scale", OverrideValue::Float(f)) => settings.forward_scale = f.get(),
        ("backward_scale", OverrideValue::Float(f)) => settings.backward_scale = f.get(),
        ("batch_size", OverrideValue::UInt(n)) => settings.batch_size = *n as usize,
        ("input_distance", OverrideValue::UInt(n)) => settings.input_distance = *n as usize,
        ("output_distance", OverrideValue::UInt(n)) => settings.output_distance = *n as usize,
        // unknown keys have no plan field to land on
        _ => {}
    }
}

/// A built plan bound to its context
pub struct ClfPlan {
    settings: PlanSettings,
    exec: Box<dyn ClfPlanExec>,
    context: Context,
    kind: TransformKind,
    in_place: bool,
}

impl ClfPlan {
    /// The settings this plan was created from
    pub fn settings(&self) -> &PlanSettings {
        &self.settings
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

        let set = roles::resolve(self.kind, self.in_place, direction, true);
        set.check(
            "clfft transform",
            buffers.output.is_some(),
            buffers.temp.is_some(),
        )?;

        let inputs = [buffers.input.base_handle()];
        let outputs = if self.in_place {
            None
        } else {
            buffers.output.map(|o| [o.base_handle()])
        };
        let temp = buffers.temp.map(DeviceArray::base_handle);

        // no forced synchronization here: the engine chains on the caller's
        // queue and event semantics
        let status = self.exec.enqueue(
            direction.into(),
            &inputs,
            outputs.as_ref().map(|o| o.as_slice()),
            temp,
        );
        if !status.is_success() {
            return Err(Error::EngineExec {
                backend: BACKEND_NAME,
                status: status.name(),
            });
        }
        Ok(())
    }
}

impl Drop for ClfPlan {
    fn drop(&mut self) {
        // after global teardown the native plan is already gone
        if !torn_down() {
            self.exec.destroy();
        }
    }
}

fn build_plan(problem: &LogicalProblem, context: &Context) -> Result<ClfPlan> {
    ensure_setup()?;
    info!(
        kind = ?problem.kind,
        shape = ?problem.shape,
        in_place = problem.in_place,
        "creating clfft plan"
    );
    let settings = build_settings(problem)?;
    let exec = engine()?
        .create_plan(context, &settings)
        .map_err(|status| Error::EngineInit {
            backend: BACKEND_NAME,
            status: status.name(),
        })?;
    Ok(ClfPlan {
        settings,
        exec,
        context: context.clone(),
        kind: problem.kind,
        in_place: problem.in_place,
    })
}

fn plan_cache() -> &'static PlanCache<ClfPlan> {
    static CACHE: OnceLock<PlanCache<ClfPlan>> = OnceLock::new();
    CACHE.get_or_init(PlanCache::new)
}

/// Dispatch-facing handle for this backend
pub struct ClfBackend;

impl FftBackend for ClfBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn available(&self) -> bool {
        engine_installed()
    }

    fn supports(&self, kind: TransformKind) -> bool {
        !matches!(kind, TransformKind::Dct(_))
    }

    fn supports_offsets(&self) -> bool {
        false
    }

    fn engine_allocates_scratch(&self) -> bool {
        true
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
