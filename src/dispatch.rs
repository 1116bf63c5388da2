//! Backend selection and the execution entry point
//!
//! Both engines hide behind [`FftBackend`]; callers pick one explicitly or
//! fall back to the process-wide default. All backend-independent validation
//! happens here, before any engine is touched.

use crate::cache::CacheStats;
use crate::device::DeviceArray;
use crate::error::{Error, Result};
use crate::problem::{Direction, LogicalProblem, TransformKind};
use std::sync::atomic::{AtomicU8, Ordering};

/// The two backend engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// VkFFT-style engine: offsets at launch, DCT support, omit-axis bitmap
    Vkfft,
    /// clFFT-style engine: explicit scales, self-allocated scratch
    Clfft,
}

impl BackendKind {
    /// Canonical lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Vkfft => "vkfft",
            BackendKind::Clfft => "clfft",
        }
    }

    /// Parse a canonical name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "vkfft" => Ok(BackendKind::Vkfft),
            "clfft" => Ok(BackendKind::Clfft),
            other => Err(Error::configuration(format!(
                "unknown backend '{}', expected 'vkfft' or 'clfft'",
                other
            ))),
        }
    }
}

static DEFAULT_BACKEND: AtomicU8 = AtomicU8::new(0);

/// Set the process-wide default backend
pub fn set_backend(kind: BackendKind) {
    let code = match kind {
        BackendKind::Vkfft => 0,
        BackendKind::Clfft => 1,
    };
    DEFAULT_BACKEND.store(code, Ordering::Relaxed);
}

/// Current process-wide default backend (initially [`BackendKind::Vkfft`])
pub fn default_backend() -> BackendKind {
    match DEFAULT_BACKEND.load(Ordering::Relaxed) {
        0 => BackendKind::Vkfft,
        _ => BackendKind::Clfft,
    }
}

/// Buffers supplied for one invocation
pub struct CallBuffers<'a> {
    /// Transform input (the primary buffer when in place)
    pub input: &'a DeviceArray,
    /// Out-of-place destination, if any
    pub output: Option<&'a DeviceArray>,
    /// Intermediate workspace, if any
    pub temp: Option<&'a DeviceArray>,
}

impl CallBuffers<'_> {
    fn supplied(&self) -> impl Iterator<Item = &DeviceArray> {
        std::iter::once(self.input)
            .chain(self.output)
            .chain(self.temp)
    }
}

/// Capability and execution surface of one backend
pub trait FftBackend: Send + Sync {
    /// Canonical backend name
    fn name(&self) -> &'static str;

    /// Whether an engine is installed for this backend
    fn available(&self) -> bool;

    /// Whether this backend can perform `kind` at all
    fn supports(&self, kind: TransformKind) -> bool;

    /// Whether buffers may sit at non-zero byte offsets
    fn supports_offsets(&self) -> bool;

    /// Whether the engine allocates its own scratch when none is supplied
    fn engine_allocates_scratch(&self) -> bool;

    /// Resolve (or reuse) the plan for `problem` and run it
    fn run(
        &self,
        problem: &LogicalProblem,
        direction: Direction,
        buffers: &CallBuffers<'_>,
    ) -> Result<()>;

    /// Drop every cached plan for this backend
    fn clear_plans(&self);

    /// Hit/miss counters of this backend's plan cache
    fn plan_stats(&self) -> CacheStats;
}

static VKF: crate::backend::vkf::VkfBackend = crate::backend::vkf::VkfBackend;
static CLF: crate::backend::clf::ClfBackend = crate::backend::clf::ClfBackend;

/// Backend singleton for `kind`
pub fn backend(kind: BackendKind) -> &'static dyn FftBackend {
    match kind {
        BackendKind::Vkfft => &VKF,
        BackendKind::Clfft => &CLF,
    }
}

/// Validate and execute one transform on `kind` (or the default backend).
///
/// Ordering matters here: availability, problem validity, kind support, and
/// offset support are all checked before role resolution, and role resolution
/// before any engine call, so a bad invocation never reaches a native engine.
pub fn execute(
    kind: Option<BackendKind>,
    problem: &LogicalProblem,
    direction: Direction,
    buffers: &CallBuffers<'_>,
) -> Result<()> {
    let kind = kind.unwrap_or_else(default_backend);
    let backend = backend(kind);

    if !backend.available() {
        return Err(Error::BackendUnavailable {
            backend: backend.name(),
        });
    }
    problem.validate()?;
    if !backend.supports(problem.kind) {
        return Err(Error::UnsupportedTransform {
            backend: backend.name(),
            kind: problem.kind,
        });
    }
    if !backend.supports_offsets() {
        for array in buffers.supplied() {
            if array.byte_offset() != 0 {
                return Err(Error::OffsetNotSupported {
                    backend: backend.name(),
                    offset: array.byte_offset(),
                });
            }
        }
    }
    backend.run(problem, direction, buffers)
}

/// Drop every cached plan on both backends. Harmless when a backend has no
/// engine installed.
pub fn clear_cache() {
    backend(BackendKind::Vkfft).clear_plans();
    backend(BackendKind::Clfft).clear_plans();
}

/// Plan-cache counters for one backend
pub fn cache_stats(kind: BackendKind) -> CacheStats {
    backend(kind).plan_stats()
}
