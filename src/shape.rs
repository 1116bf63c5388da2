//! Pure shape and stride arithmetic shared by both backend builders
//!
//! These functions are unvalidated on purpose: odd last-axis lengths truncate
//! the way integer division does, and callers that care reject them up front.

/// Complex-spectrum shape of a real array of logical shape `shape`.
///
/// The last axis becomes `n/2 + 1` (Hermitian symmetry stores only half the
/// spectrum). For an in-place transform the real buffer carries two padding
/// elements on the last axis, so those are subtracted first.
pub fn real_to_complex_shape(shape: &[usize], in_place: bool) -> Vec<usize> {
    let mut out = shape.to_vec();
    if let Some(last) = out.last_mut() {
        let mut n = *last;
        if in_place {
            n -= 2;
        }
        *last = n / 2 + 1;
    }
    out
}

/// Real-array shape recovered from a complex spectrum of shape `shape`.
///
/// The last axis becomes `2 * (n - 1)`; an in-place transform adds back the
/// two padding elements.
pub fn complex_to_real_shape(shape: &[usize], in_place: bool) -> Vec<usize> {
    let mut out = shape.to_vec();
    if let Some(last) = out.last_mut() {
        let mut n = 2 * (*last - 1);
        if in_place {
            n += 2;
        }
        *last = n;
    }
    out
}

/// Row-major (C-order) strides in elements for a contiguous array.
///
/// The fastest axis has stride 1. Zero-length axes contribute a factor of 1
/// so surrounding strides stay well defined.
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1].max(1);
    }
    strides
}

/// Number of elements in a shape
pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}
