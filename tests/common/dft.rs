//! Naive separable reference transforms over host memory.
//!
//! Everything computes in f64 regardless of the array precision; the engine
//! wrappers convert at the buffer boundary. All kernels are the unnormalized
//! textbook sums, so normalization behavior stays with the engine wrappers.

use gpufft::shape::row_major_strides;
use gpufft::Complex128;
use std::f64::consts::PI;

/// Base offset of line `line` along `axis` for a row-major array.
fn line_base(shape: &[usize], strides: &[usize], axis: usize, line: usize) -> usize {
    let mut base = 0;
    let mut rem = line;
    for ax in (0..shape.len()).rev() {
        if ax == axis {
            continue;
        }
        let idx = rem % shape[ax];
        rem /= shape[ax];
        base += idx * strides[ax];
    }
    base
}

/// In-place DFT along one axis. `sign` is -1.0 forward, +1.0 backward.
pub fn dft_axis(data: &mut [Complex128], shape: &[usize], axis: usize, sign: f64) {
    let n = shape[axis];
    let total: usize = shape.iter().product();
    if n == 0 || total == 0 {
        return;
    }
    let strides = row_major_strides(shape);
    let stride = strides[axis];
    let lines = total / n;
    let mut line = vec![Complex128::ZERO; n];

    for l in 0..lines {
        let base = line_base(shape, &strides, axis, l);
        for (k, slot) in line.iter_mut().enumerate() {
            *slot = data[base + k * stride];
        }
        for k in 0..n {
            let mut acc = Complex128::ZERO;
            for (m, &v) in line.iter().enumerate() {
                let ang = sign * 2.0 * PI * ((k * m) % n) as f64 / n as f64;
                acc = acc + v * Complex128::from_polar(1.0, ang);
            }
            data[base + k * stride] = acc;
        }
    }
}

/// Unnormalized DCT kernel coefficient: weight of input element `m` in
/// output element `k` for a length-`n` transform of the given type.
fn dct_coefficient(ty: u64, k: usize, m: usize, n: usize) -> f64 {
    let (kf, mf, nf) = (k as f64, m as f64, n as f64);
    match ty {
        1 => {
            if m == 0 {
                1.0
            } else if m == n - 1 {
                if k % 2 == 0 {
                    1.0
                } else {
                    -1.0
                }
            } else {
                2.0 * (PI * kf * mf / (nf - 1.0)).cos()
            }
        }
        2 => 2.0 * (PI * kf * (2.0 * mf + 1.0) / (2.0 * nf)).cos(),
        3 => {
            if m == 0 {
                1.0
            } else {
                2.0 * (PI * mf * (2.0 * kf + 1.0) / (2.0 * nf)).cos()
            }
        }
        4 => 2.0 * (PI * (2.0 * mf + 1.0) * (2.0 * kf + 1.0) / (4.0 * nf)).cos(),
        other => panic!("no DCT type {}", other),
    }
}

/// The DCT type whose unnormalized kernel inverts type `ty`
pub fn dct_inverse_pair(ty: u64) -> u64 {
    match ty {
        1 => 1,
        2 => 3,
        3 => 2,
        4 => 4,
        other => panic!("no DCT type {}", other),
    }
}

/// Normalization factor of a forward/backward pair along one axis
pub fn dct_norm_factor(ty: u64, n: usize) -> f64 {
    match ty {
        1 => 2.0 * (n as f64 - 1.0),
        _ => 2.0 * n as f64,
    }
}

/// In-place unnormalized DCT of the given type along one axis
pub fn dct_axis(data: &mut [f64], shape: &[usize], axis: usize, ty: u64) {
    let n = shape[axis];
    let total: usize = shape.iter().product();
    if n == 0 || total == 0 {
        return;
    }
    let strides = row_major_strides(shape);
    let stride = strides[axis];
    let lines = total / n;
    let mut line = vec![0.0f64; n];

    for l in 0..lines {
        let base = line_base(shape, &strides, axis, l);
        for (k, slot) in line.iter_mut().enumerate() {
            *slot = data[base + k * stride];
        }
        for k in 0..n {
            let mut acc = 0.0;
            for (m, &v) in line.iter().enumerate() {
                acc += v * dct_coefficient(ty, k, m, n);
            }
            data[base + k * stride] = acc;
        }
    }
}

/// Expand a Hermitian half spectrum of shape `cshape` into the full spectrum
/// of the corresponding real array (last axis `2 * (h - 1)` wide).
pub fn expand_hermitian(half: &[Complex128], cshape: &[usize]) -> (Vec<Complex128>, Vec<usize>) {
    let ndim = cshape.len();
    let h = cshape[ndim - 1];
    let mut full_shape = cshape.to_vec();
    full_shape[ndim - 1] = 2 * (h - 1);

    let half_strides = row_major_strides(cshape);
    let full_total: usize = full_shape.iter().product();
    let mut full = vec![Complex128::ZERO; full_total];

    for (linear, slot) in full.iter_mut().enumerate() {
        // decompose the linear index over the full shape
        let mut idx = vec![0usize; ndim];
        let mut rem = linear;
        for ax in (0..ndim).rev() {
            idx[ax] = rem % full_shape[ax];
            rem /= full_shape[ax];
        }
        if idx[ndim - 1] < h {
            let mut off = 0;
            for ax in 0..ndim {
                off += idx[ax] * half_strides[ax];
            }
            *slot = half[off];
        } else {
            // F(k) = conj(F(-k)) with every axis negated modulo its length
            let mut off = 0;
            for ax in 0..ndim {
                let neg = if ax == ndim - 1 {
                    full_shape[ax] - idx[ax]
                } else if idx[ax] == 0 {
                    0
                } else {
                    full_shape[ax] - idx[ax]
                };
                off += neg * half_strides[ax];
            }
            *slot = half[off].conj();
        }
    }
    (full, full_shape)
}

/// Keep only the first `h` entries of the last axis of a full spectrum.
pub fn slice_half_spectrum(full: &[Complex128], full_shape: &[usize]) -> Vec<Complex128> {
    let ndim = full_shape.len();
    let n_last = full_shape[ndim - 1];
    let h = n_last / 2 + 1;
    let rows: usize = full_shape[..ndim - 1].iter().product::<usize>().max(1);
    let mut out = Vec::with_capacity(rows * h);
    for row in 0..rows {
        let base = row * n_last;
        out.extend_from_slice(&full[base..base + h]);
    }
    out
}
