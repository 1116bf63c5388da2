//! Shared fixtures: a host-memory compute context and reference engines
//! implementing both backend traits with the naive transforms from `dft`.
#![allow(dead_code)]

pub mod dft;

use gpufft::backend::clf::{
    self, ClfDirection, ClfEngine, ClfPlanExec, ClfStatus, Layout, PlanSettings, ResultLocation,
};
use gpufft::backend::vkf::{
    self, Configuration, LaunchParams, VkfApplication, VkfEngine, VkfResult,
};
use gpufft::{Complex128, Context, ContextOps};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

// ---------------------------------------------------------------------------
// Host allocation registry
// ---------------------------------------------------------------------------

fn registry() -> &'static Mutex<HashMap<u64, Vec<u8>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Vec<u8>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static NEXT_CONTEXT: AtomicUsize = AtomicUsize::new(0);

/// A compute context backed by plain host memory
pub struct HostContext {
    id: usize,
}

impl ContextOps for HostContext {
    fn id(&self) -> usize {
        self.id
    }

    fn allocate(&self, size_bytes: usize) -> gpufft::Result<u64> {
        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        registry().lock().unwrap().insert(handle, vec![0u8; size_bytes]);
        Ok(handle)
    }

    fn deallocate(&self, handle: u64, _size_bytes: usize) {
        registry().lock().unwrap().remove(&handle);
    }

    fn finish(&self) {}

    fn upload(&self, handle: u64, byte_offset: usize, src: &[u8]) -> gpufft::Result<()> {
        let mut allocs = registry().lock().unwrap();
        let buf = allocs.get_mut(&handle).expect("unknown handle");
        buf[byte_offset..byte_offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn download(&self, handle: u64, byte_offset: usize, dst: &mut [u8]) -> gpufft::Result<()> {
        let allocs = registry().lock().unwrap();
        let buf = allocs.get(&handle).expect("unknown handle");
        dst.copy_from_slice(&buf[byte_offset..byte_offset + dst.len()]);
        Ok(())
    }
}

/// Fresh host context with a unique id
pub fn context() -> Context {
    Context::new(Arc::new(HostContext {
        id: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
    }))
}

fn read_scalars(handle: u64, byte_offset: usize, count: usize, double: bool) -> Vec<f64> {
    let width = if double { 8 } else { 4 };
    let allocs = registry().lock().unwrap();
    let buf = allocs.get(&handle).expect("unknown handle");
    let bytes = &buf[byte_offset..byte_offset + count * width];
    (0..count)
        .map(|i| {
            if double {
                f64::from_ne_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap())
            } else {
                f32::from_ne_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap()) as f64
            }
        })
        .collect()
}

fn write_scalars(handle: u64, byte_offset: usize, values: &[f64], double: bool) {
    let width = if double { 8 } else { 4 };
    let mut allocs = registry().lock().unwrap();
    let buf = allocs.get_mut(&handle).expect("unknown handle");
    let bytes = &mut buf[byte_offset..byte_offset + values.len() * width];
    for (i, &v) in values.iter().enumerate() {
        if double {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&v.to_ne_bytes());
        } else {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&(v as f32).to_ne_bytes());
        }
    }
}

fn read_complex(handle: u64, byte_offset: usize, count: usize, double: bool) -> Vec<Complex128> {
    let scalars = read_scalars(handle, byte_offset, count * 2, double);
    scalars
        .chunks_exact(2)
        .map(|c| Complex128::new(c[0], c[1]))
        .collect()
}

fn write_complex(handle: u64, byte_offset: usize, values: &[Complex128], double: bool) {
    let scalars: Vec<f64> = values.iter().flat_map(|z| [z.re, z.im]).collect();
    write_scalars(handle, byte_offset, &scalars, double);
}

/// Read a real array whose last axis may carry two padding elements.
fn read_real(handle: u64, byte_offset: usize, shape: &[usize], padded: bool, double: bool) -> Vec<f64> {
    let last = *shape.last().unwrap();
    let rows: usize = shape[..shape.len() - 1].iter().product::<usize>().max(1);
    if !padded {
        return read_scalars(handle, byte_offset, rows * last, double);
    }
    let width = if double { 8 } else { 4 };
    let stride = last + 2;
    let mut out = Vec::with_capacity(rows * last);
    for row in 0..rows {
        let off = byte_offset + row * stride * width;
        out.extend(read_scalars(handle, off, last, double));
    }
    out
}

/// Write a real array, spreading rows apart when the storage is padded.
fn write_real(
    handle: u64,
    byte_offset: usize,
    shape: &[usize],
    values: &[f64],
    padded: bool,
    double: bool,
) {
    let last = *shape.last().unwrap();
    let rows: usize = shape[..shape.len() - 1].iter().product::<usize>().max(1);
    if !padded {
        write_scalars(handle, byte_offset, values, double);
        return;
    }
    let width = if double { 8 } else { 4 };
    let stride = last + 2;
    for row in 0..rows {
        let off = byte_offset + row * stride * width;
        write_scalars(handle, off, &values[row * last..(row + 1) * last], double);
    }
}

// ---------------------------------------------------------------------------
// VkFFT-style reference engine
// ---------------------------------------------------------------------------

struct HostVkfApp {
    config: Configuration,
}

impl HostVkfApp {
    fn logical_shape(&self) -> Vec<usize> {
        self.config.size.iter().rev().map(|&s| s as usize).collect()
    }

    /// Axes actually transformed, honoring the reversed omit bitmap
    fn active_axes(&self, ndim: usize) -> Vec<usize> {
        if self.config.omit_dimension.is_empty() {
            return (0..ndim).collect();
        }
        (0..ndim)
            .filter(|&ax| self.config.omit_dimension[ndim - 1 - ax] == 0)
            .collect()
    }

    fn run(&self, inverse: i32, pars: &LaunchParams) -> Option<()> {
        let shape = self.logical_shape();
        let ndim = shape.len();
        let double = self.config.double_precision;
        let backward = inverse == vkf::BACKWARD;
        let in_place = !self.config.is_input_formatted;
        let axes = self.active_axes(ndim);
        let sign = if backward { 1.0 } else { -1.0 };

        let src = if in_place {
            pars.buffer?
        } else {
            pars.input_buffer?
        };

        if self.config.perform_dct > 0 {
            let dst = if in_place { src } else { pars.buffer? };
            let ty = if backward {
                dft::dct_inverse_pair(self.config.perform_dct)
            } else {
                self.config.perform_dct
            };
            let mut data = read_real(src.handle, src.offset as usize, &shape, false, double);
            for &ax in &axes {
                dft::dct_axis(&mut data, &shape, ax, ty);
            }
            if backward && self.config.normalize {
                let factor: f64 = axes
                    .iter()
                    .map(|&ax| dft::dct_norm_factor(self.config.perform_dct, shape[ax]))
                    .product();
                for v in &mut data {
                    *v /= factor;
                }
            }
            write_real(dst.handle, dst.offset as usize, &shape, &data, false, double);
        } else if self.config.perform_r2c && !backward {
            // real to half spectrum
            let dst = if in_place { src } else { pars.buffer? };
            let real = read_real(src.handle, src.offset as usize, &shape, in_place, double);
            let mut data: Vec<Complex128> = real.iter().map(|&v| Complex128::from(v)).collect();
            for &ax in &axes {
                dft::dft_axis(&mut data, &shape, ax, sign);
            }
            let half = dft::slice_half_spectrum(&data, &shape);
            write_complex(dst.handle, dst.offset as usize, &half, double);
        } else if self.config.perform_r2c {
            // half spectrum back to real
            let dst = if in_place {
                src
            } else {
                pars.output_buffer.or(pars.buffer)?
            };
            let cshape = gpufft::shape::real_to_complex_shape(&shape, false);
            let total: usize = cshape.iter().product();
            let half = read_complex(src.handle, src.offset as usize, total, double);
            let (mut full, full_shape) = dft::expand_hermitian(&half, &cshape);
            for &ax in &axes {
                dft::dft_axis(&mut full, &full_shape, ax, sign);
            }
            let mut real: Vec<f64> = full.iter().map(|z| z.re).collect();
            if self.config.normalize {
                let factor: f64 = axes.iter().map(|&ax| shape[ax] as f64).product();
                for v in &mut real {
                    *v /= factor;
                }
            }
            write_real(dst.handle, dst.offset as usize, &shape, &real, in_place, double);
        } else {
            // complex to complex
            let dst = if in_place { src } else { pars.buffer? };
            let total: usize = shape.iter().product();
            let mut data = read_complex(src.handle, src.offset as usize, total, double);
            for &ax in &axes {
                dft::dft_axis(&mut data, &shape, ax, sign);
            }
            if backward && self.config.normalize {
                let factor: f64 = axes.iter().map(|&ax| shape[ax] as f64).product();
                for z in &mut data {
                    *z = z.scale(1.0 / factor);
                }
            }
            write_complex(dst.handle, dst.offset as usize, &data, double);
        }
        Some(())
    }
}

impl VkfApplication for HostVkfApp {
    fn append(&self, inverse: i32, params: &LaunchParams) -> VkfResult {
        match self.run(inverse, params) {
            Some(()) => VkfResult::Success,
            None => VkfResult::EmptyBuffer,
        }
    }
}

struct HostVkfEngine;

impl VkfEngine for HostVkfEngine {
    fn initialize(
        &self,
        _context: &Context,
        config: &Configuration,
    ) -> Result<Box<dyn VkfApplication>, VkfResult> {
        if config.fft_dim == 0 {
            return Err(VkfResult::EmptyFftDim);
        }
        Ok(Box::new(HostVkfApp {
            config: config.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// clFFT-style reference engine
// ---------------------------------------------------------------------------

struct HostClfPlan {
    settings: PlanSettings,
}

impl ClfPlanExec for HostClfPlan {
    fn enqueue(
        &self,
        direction: ClfDirection,
        inputs: &[u64],
        outputs: Option<&[u64]>,
        _temp: Option<u64>,
    ) -> ClfStatus {
        let s = &self.settings;
        let shape: Vec<usize> = s.lengths.iter().rev().copied().collect();
        let double = s.precision == clf::ClfPrecision::Double;
        let in_place = s.placeness == ResultLocation::Inplace;
        let forward = direction == ClfDirection::Forward;
        let sign = if forward { -1.0 } else { 1.0 };
        let scale = if forward {
            s.forward_scale
        } else {
            s.backward_scale
        };

        let src = inputs[0];
        let dst = if in_place {
            src
        } else {
            match outputs.and_then(|o| o.first().copied()) {
                Some(handle) => handle,
                None => return ClfStatus::InvalidValue,
            }
        };

        match (s.input_layout, s.output_layout) {
            (Layout::ComplexInterleaved, Layout::ComplexInterleaved) => {
                let total: usize = shape.iter().product();
                let mut data = read_complex(src, 0, total, double);
                for ax in 0..shape.len() {
                    dft::dft_axis(&mut data, &shape, ax, sign);
                }
                for z in &mut data {
                    *z = z.scale(scale);
                }
                write_complex(dst, 0, &data, double);
            }
            (Layout::Real, Layout::HermitianInterleaved) => {
                if !forward {
                    return ClfStatus::InvalidPlan;
                }
                let real = read_real(src, 0, &shape, in_place, double);
                let mut data: Vec<Complex128> =
                    real.iter().map(|&v| Complex128::from(v)).collect();
                for ax in 0..shape.len() {
                    dft::dft_axis(&mut data, &shape, ax, sign);
                }
                let mut half = dft::slice_half_spectrum(&data, &shape);
                for z in &mut half {
                    *z = z.scale(scale);
                }
                write_complex(dst, 0, &half, double);
            }
            (Layout::HermitianInterleaved, Layout::Real) => {
                if forward {
                    return ClfStatus::InvalidPlan;
                }
                let cshape = gpufft::shape::real_to_complex_shape(&shape, false);
                let total: usize = cshape.iter().product();
                let half = read_complex(src, 0, total, double);
                let (mut full, full_shape) = dft::expand_hermitian(&half, &cshape);
                for ax in 0..shape.len() {
                    dft::dft_axis(&mut full, &full_shape, ax, sign);
                }
                let real: Vec<f64> = full.iter().map(|z| z.re * scale).collect();
                write_real(dst, 0, &shape, &real, in_place, double);
            }
            _ => return ClfStatus::NotImplemented,
        }
        ClfStatus::Success
    }

    fn destroy(&self) {}
}

struct HostClfEngine;

impl ClfEngine for HostClfEngine {
    fn setup(&self) -> ClfStatus {
        ClfStatus::Success
    }

    fn create_plan(
        &self,
        _context: &Context,
        settings: &PlanSettings,
    ) -> Result<Box<dyn ClfPlanExec>, ClfStatus> {
        if settings.dimension == 0 || settings.dimension > 3 {
            return Err(ClfStatus::InvalidValue);
        }
        Ok(Box::new(HostClfPlan {
            settings: settings.clone(),
        }))
    }

    fn teardown(&self) {}
}

// ---------------------------------------------------------------------------
// Setup and assertion helpers
// ---------------------------------------------------------------------------

/// Install both reference engines. Safe to call from every test; the first
/// installation wins.
pub fn setup() {
    vkf::install_engine(Arc::new(HostVkfEngine));
    clf::install_engine(Arc::new(HostClfEngine));
}

/// Assert complex slices match within `max_tol` peak-relative elementwise
/// error and `avg_tol` peak-relative mean error.
pub fn assert_close_complex(got: &[Complex128], want: &[Complex128], max_tol: f64, avg_tol: f64) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    let peak = want
        .iter()
        .map(|z| z.magnitude())
        .fold(1e-30f64, f64::max);
    let mut sum = 0.0;
    let mut worst = 0.0f64;
    for (g, w) in got.iter().zip(want) {
        let err = (*g - *w).magnitude() / peak;
        sum += err;
        worst = worst.max(err);
    }
    let avg = sum / want.len() as f64;
    assert!(
        worst <= max_tol && avg <= avg_tol,
        "max err {:.3e} (tol {:.1e}), avg err {:.3e} (tol {:.1e})",
        worst,
        max_tol,
        avg,
        avg_tol
    );
}

/// Real-valued counterpart of [`assert_close_complex`]
pub fn assert_close_real(got: &[f64], want: &[f64], max_tol: f64, avg_tol: f64) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    let peak = want.iter().map(|v| v.abs()).fold(1e-30f64, f64::max);
    let mut sum = 0.0;
    let mut worst = 0.0f64;
    for (g, w) in got.iter().zip(want) {
        let err = (g - w).abs() / peak;
        sum += err;
        worst = worst.max(err);
    }
    let avg = sum / want.len() as f64;
    assert!(
        worst <= max_tol && avg <= avg_tol,
        "max err {:.3e} (tol {:.1e}), avg err {:.3e} (tol {:.1e})",
        worst,
        max_tol,
        avg,
        avg_tol
    );
}
