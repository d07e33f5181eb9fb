// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Multi-Dimensional Array Service
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Element-wise and block operations on dense complex arrays.
//!
//! All arrays are `ArrayD<Complex64>` whose rank equals the rank of the
//! [`Dims`] they are described by. Broadcasting follows the usual rule: an
//! axis of extent one is repeated along the other operand. Shape contract
//! violations panic.

use moba_types::dims::{Dims, FFT_AXES};
use ndarray::{ArrayD, Axis, IxDyn, Slice, Zip};
use num_complex::Complex64;

/// Dense complex array used throughout the workspace.
pub type CArray = ArrayD<Complex64>;

/// Zero-initialised array of the given shape.
pub fn alloc(dims: &Dims) -> CArray {
    CArray::zeros(dims.ix())
}

pub fn zfill(dst: &mut CArray, val: Complex64) {
    dst.fill(val);
}

/// Expand `src` to `dims` by repeating singleton axes.
///
/// # Panics
/// If `src` does not broadcast to `dims`.
pub fn broadcast(src: &CArray, dims: &Dims) -> CArray {
    src.broadcast(dims.ix())
        .unwrap_or_else(|| panic!("cannot broadcast {:?} to {:?}", src.shape(), dims.as_slice()))
        .to_owned()
}

/// Element-wise product; each axis of the result is the larger of the two extents.
pub fn zmul(a: &CArray, b: &CArray) -> CArray {
    assert_eq!(a.ndim(), b.ndim(), "zmul: rank mismatch");
    let shape: Vec<usize> = a
        .shape()
        .iter()
        .zip(b.shape())
        .map(|(&x, &y)| x.max(y))
        .collect();
    let target = IxDyn(&shape);
    let av = a
        .broadcast(target.clone())
        .unwrap_or_else(|| panic!("zmul: {:?} vs {:?}", a.shape(), shape));
    let bv = b
        .broadcast(target)
        .unwrap_or_else(|| panic!("zmul: {:?} vs {:?}", b.shape(), shape));
    Zip::from(&av).and(&bv).map_collect(|&x, &y| x * y)
}

/// Sum over every axis that is one in `dims` but larger in `src`.
///
/// Adjoint of [`broadcast`].
pub fn sum_to(src: &CArray, dims: &Dims) -> CArray {
    assert_eq!(src.ndim(), dims.rank(), "sum_to: rank mismatch");
    let mut out = src.clone();
    for ax in 0..dims.rank() {
        let n = dims.get(ax);
        if out.shape()[ax] == n {
            continue;
        }
        assert!(
            n == 1,
            "sum_to: cannot reduce axis {ax} from {} to {n}",
            out.shape()[ax]
        );
        out = out.sum_axis(Axis(ax)).insert_axis(Axis(ax));
    }
    out
}

/// Slice `index` of `axis`, keeping the axis with extent one.
pub fn select_param(src: &CArray, axis: usize, index: usize) -> CArray {
    src.slice_axis(Axis(axis), Slice::from(index..index + 1))
        .to_owned()
}

/// Concatenate slices along `axis`.
///
/// # Panics
/// If the parts disagree on any other axis.
pub fn stack_params(parts: &[CArray], axis: usize) -> CArray {
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    ndarray::concatenate(Axis(axis), &views)
        .unwrap_or_else(|e| panic!("stack_params along axis {axis}: {e}"))
}

/// Copy the block of shape `block` starting at `offset` out of `src`.
pub fn copy_block_out(src: &CArray, offset: &[usize], block: &Dims) -> CArray {
    assert_eq!(offset.len(), src.ndim(), "copy_block_out: offset rank");
    src.slice_each_axis(|ad| {
        let i = ad.axis.index();
        Slice::from(offset[i]..offset[i] + block.get(i))
    })
    .to_owned()
}

/// Write `block` into `dst` starting at `offset`.
pub fn copy_block_in(dst: &mut CArray, offset: &[usize], block: &CArray) {
    assert_eq!(offset.len(), dst.ndim(), "copy_block_in: offset rank");
    let shape = block.shape().to_vec();
    dst.slice_each_axis_mut(|ad| {
        let i = ad.axis.index();
        Slice::from(offset[i]..offset[i] + shape[i])
    })
    .assign(block);
}

/// ⟨a, b⟩ = Σ conj(a)·b
pub fn zscalar(a: &CArray, b: &CArray) -> Complex64 {
    assert_eq!(a.shape(), b.shape(), "zscalar: shape mismatch");
    Zip::from(a)
        .and(b)
        .fold(Complex64::new(0.0, 0.0), |acc, x, y| acc + x.conj() * y)
}

/// Re⟨a, b⟩, the inner product of the arrays seen as real vectors.
pub fn zscalar_real(a: &CArray, b: &CArray) -> f64 {
    assert_eq!(a.shape(), b.shape(), "zscalar_real: shape mismatch");
    Zip::from(a)
        .and(b)
        .fold(0.0, |acc, x, y| acc + x.re * y.re + x.im * y.im)
}

pub fn znorm(a: &CArray) -> f64 {
    a.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

/// ‖reference − actual‖ / ‖reference‖, or the plain error norm when the
/// reference is zero.
pub fn znrmse(reference: &CArray, actual: &CArray) -> f64 {
    assert_eq!(reference.shape(), actual.shape(), "znrmse: shape mismatch");
    let err = Zip::from(reference)
        .and(actual)
        .fold(0.0, |acc, r, x| acc + (r - x).norm_sqr())
        .sqrt();
    let scale = znorm(reference);
    if scale > 0.0 {
        err / scale
    } else {
        err
    }
}

/// Keep elements whose real part exceeds `floor`, replace the rest by `floor`.
pub fn zsmax(src: &CArray, floor: f64) -> CArray {
    src.mapv(|z| {
        if z.re > floor {
            z
        } else {
            Complex64::new(floor, 0.0)
        }
    })
}

pub fn zreal(src: &CArray) -> CArray {
    src.mapv(|z| Complex64::new(z.re, 0.0))
}

pub fn all_finite(a: &CArray) -> bool {
    a.iter().all(|z| z.re.is_finite() && z.im.is_finite())
}

/// Centered ellipsoid over the spatial axes of `dims`, one inside, zero
/// outside. `restrict` gives the semi-axes relative to half the extent.
pub fn compute_mask(dims: &Dims, restrict: [f64; 3]) -> CArray {
    let mdims = dims.select(FFT_AXES);
    CArray::from_shape_fn(mdims.ix(), |idx| {
        let mut r2 = 0.0;
        for (ax, &semi) in restrict.iter().enumerate().take(mdims.rank()) {
            let n = mdims.get(ax);
            if n <= 1 {
                continue;
            }
            let half = n as f64 / 2.0;
            let x = (idx[ax] as f64 - half) / (half * semi);
            r2 += x * x;
        }
        if r2 <= 1.0 {
            Complex64::new(1.0, 0.0)
        } else {
            Complex64::new(0.0, 0.0)
        }
    })
}
