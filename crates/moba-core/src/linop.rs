// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Linear Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Linear operators with explicit adjoints.
//!
//! Forward and adjoint are only *claimed* to be Hermitian transposes of each
//! other; `lintest::linop_test_adjoint` checks the claim numerically.

use moba_math::fft::{fft_axes, ifft_axes};
use moba_math::multind::{broadcast, zmul, CArray};
use moba_types::dims::{AxisSet, Dims};
use moba_types::error::{MobaError, MobaResult};
use num_complex::Complex64;

use crate::probe::LiveToken;

/// Panic unless `arr` has exactly the extents of `dims`.
pub fn check_shape(context: &str, dims: &Dims, arr: &CArray) {
    assert!(
        arr.shape() == dims.as_slice(),
        "{context}: array shape {:?} does not match {:?}",
        arr.shape(),
        dims.as_slice()
    );
}

pub trait LinearOperator {
    fn domain(&self) -> &Dims;
    fn codomain(&self) -> &Dims;

    /// `A·x`. Panics if `src` does not have the domain shape.
    fn forward(&self, src: &CArray) -> CArray;

    /// `Aᴴ·y`. Panics if `src` does not have the codomain shape.
    fn adjoint(&self, src: &CArray) -> CArray;

    /// `AᴴA·x`.
    fn normal(&self, src: &CArray) -> CArray {
        self.adjoint(&self.forward(src))
    }

    /// `(AᴴA + λI)⁻¹·x` when a closed form exists.
    fn normal_inverse(&self, _lambda: f64, _src: &CArray) -> Option<CArray> {
        None
    }
}

// ── Identity / Zero ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Identity {
    dims: Dims,
    _live: LiveToken,
}

impl Identity {
    pub fn new(dims: Dims) -> Self {
        Identity {
            dims,
            _live: LiveToken::new(),
        }
    }
}

impl LinearOperator for Identity {
    fn domain(&self) -> &Dims {
        &self.dims
    }
    fn codomain(&self) -> &Dims {
        &self.dims
    }
    fn forward(&self, src: &CArray) -> CArray {
        check_shape("identity forward", &self.dims, src);
        src.clone()
    }
    fn adjoint(&self, src: &CArray) -> CArray {
        check_shape("identity adjoint", &self.dims, src);
        src.clone()
    }
    fn normal_inverse(&self, lambda: f64, src: &CArray) -> Option<CArray> {
        check_shape("identity normal inverse", &self.dims, src);
        Some(src.mapv(|z| z / (1.0 + lambda)))
    }
}

/// Maps everything to zero; used for vanishing cross-derivatives.
#[derive(Debug, Clone)]
pub struct Zero {
    domain: Dims,
    codomain: Dims,
    _live: LiveToken,
}

impl Zero {
    pub fn new(domain: Dims, codomain: Dims) -> Self {
        Zero {
            domain,
            codomain,
            _live: LiveToken::new(),
        }
    }
}

impl LinearOperator for Zero {
    fn domain(&self) -> &Dims {
        &self.domain
    }
    fn codomain(&self) -> &Dims {
        &self.codomain
    }
    fn forward(&self, src: &CArray) -> CArray {
        check_shape("zero forward", &self.domain, src);
        CArray::zeros(self.codomain.ix())
    }
    fn adjoint(&self, src: &CArray) -> CArray {
        check_shape("zero adjoint", &self.codomain, src);
        CArray::zeros(self.domain.ix())
    }
}

// ── Diagonal ─────────────────────────────────────────────────────────

/// Point-wise multiplication by a weight broadcast over `dims`.
#[derive(Debug, Clone)]
pub struct Diagonal {
    dims: Dims,
    diag: CArray,
    _live: LiveToken,
}

impl Diagonal {
    pub fn new(dims: Dims, diag: CArray) -> MobaResult<Self> {
        let ddims = Dims::new(diag.shape());
        if !ddims.broadcasts_to(&dims) {
            return Err(MobaError::shape_mismatch(
                "diagonal weight",
                dims.as_slice(),
                diag.shape(),
            ));
        }
        Ok(Diagonal {
            dims,
            diag,
            _live: LiveToken::new(),
        })
    }
}

impl LinearOperator for Diagonal {
    fn domain(&self) -> &Dims {
        &self.dims
    }
    fn codomain(&self) -> &Dims {
        &self.dims
    }
    fn forward(&self, src: &CArray) -> CArray {
        check_shape("diagonal forward", &self.dims, src);
        zmul(&broadcast(&self.diag, &self.dims), src)
    }
    fn adjoint(&self, src: &CArray) -> CArray {
        check_shape("diagonal adjoint", &self.dims, src);
        zmul(&broadcast(&self.diag.mapv(|z| z.conj()), &self.dims), src)
    }
    fn normal(&self, src: &CArray) -> CArray {
        check_shape("diagonal normal", &self.dims, src);
        let w = self.diag.mapv(|z| Complex64::new(z.norm_sqr(), 0.0));
        zmul(&broadcast(&w, &self.dims), src)
    }
    fn normal_inverse(&self, lambda: f64, src: &CArray) -> Option<CArray> {
        check_shape("diagonal normal inverse", &self.dims, src);
        let w = self
            .diag
            .mapv(|z| Complex64::new(1.0 / (z.norm_sqr() + lambda), 0.0));
        Some(zmul(&broadcast(&w, &self.dims), src))
    }
}

// ── Fourier ──────────────────────────────────────────────────────────

/// Unitary FFT over `axes`.
#[derive(Debug, Clone)]
pub struct Fourier {
    dims: Dims,
    axes: AxisSet,
    _live: LiveToken,
}

impl Fourier {
    pub fn new(dims: Dims, axes: AxisSet) -> Self {
        Fourier {
            dims,
            axes,
            _live: LiveToken::new(),
        }
    }
}

impl LinearOperator for Fourier {
    fn domain(&self) -> &Dims {
        &self.dims
    }
    fn codomain(&self) -> &Dims {
        &self.dims
    }
    fn forward(&self, src: &CArray) -> CArray {
        check_shape("fourier forward", &self.dims, src);
        fft_axes(src, self.axes)
    }
    fn adjoint(&self, src: &CArray) -> CArray {
        check_shape("fourier adjoint", &self.dims, src);
        ifft_axes(src, self.axes)
    }
    fn normal(&self, src: &CArray) -> CArray {
        check_shape("fourier normal", &self.dims, src);
        src.clone()
    }
    fn normal_inverse(&self, lambda: f64, src: &CArray) -> Option<CArray> {
        check_shape("fourier normal inverse", &self.dims, src);
        Some(src.mapv(|z| z / (1.0 + lambda)))
    }
}

// ── Closure-backed ───────────────────────────────────────────────────

/// Operator defined by a pair of closures.
pub struct FnOperator<F, G> {
    domain: Dims,
    codomain: Dims,
    forward: F,
    adjoint: G,
    _live: LiveToken,
}

impl<F, G> FnOperator<F, G>
where
    F: Fn(&CArray) -> CArray,
    G: Fn(&CArray) -> CArray,
{
    pub fn new(domain: Dims, codomain: Dims, forward: F, adjoint: G) -> Self {
        FnOperator {
            domain,
            codomain,
            forward,
            adjoint,
            _live: LiveToken::new(),
        }
    }
}

impl<F, G> LinearOperator for FnOperator<F, G>
where
    F: Fn(&CArray) -> CArray,
    G: Fn(&CArray) -> CArray,
{
    fn domain(&self) -> &Dims {
        &self.domain
    }
    fn codomain(&self) -> &Dims {
        &self.codomain
    }
    fn forward(&self, src: &CArray) -> CArray {
        check_shape("fn forward", &self.domain, src);
        let out = (self.forward)(src);
        check_shape("fn forward result", &self.codomain, &out);
        out
    }
    fn adjoint(&self, src: &CArray) -> CArray {
        check_shape("fn adjoint", &self.codomain, src);
        let out = (self.adjoint)(src);
        check_shape("fn adjoint result", &self.domain, &out);
        out
    }
}

// ── Chain ────────────────────────────────────────────────────────────

/// `second ∘ first`.
pub struct Chain<'a> {
    first: Box<dyn LinearOperator + 'a>,
    second: Box<dyn LinearOperator + 'a>,
    _live: LiveToken,
}

/// Compose two operators; the codomain of `first` must be the domain of `second`.
pub fn chain<'a>(
    first: Box<dyn LinearOperator + 'a>,
    second: Box<dyn LinearOperator + 'a>,
) -> MobaResult<Chain<'a>> {
    if first.codomain() != second.domain() {
        return Err(MobaError::shape_mismatch(
            "chain",
            second.domain().as_slice(),
            first.codomain().as_slice(),
        ));
    }
    Ok(Chain {
        first,
        second,
        _live: LiveToken::new(),
    })
}

impl LinearOperator for Chain<'_> {
    fn domain(&self) -> &Dims {
        self.first.domain()
    }
    fn codomain(&self) -> &Dims {
        self.second.codomain()
    }
    fn forward(&self, src: &CArray) -> CArray {
        self.second.forward(&self.first.forward(src))
    }
    fn adjoint(&self, src: &CArray) -> CArray {
        self.first.adjoint(&self.second.adjoint(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lintest::{linop_test_adjoint, linop_test_normal};
    use crate::probe::live_operators;
    use moba_math::multind::znrmse;
    use ndarray::IxDyn;

    fn weight() -> CArray {
        CArray::from_shape_fn(IxDyn(&[4, 1, 3]), |i| {
            Complex64::new(1.0 + i[0] as f64, 0.5 * i[2] as f64)
        })
    }

    #[test]
    fn test_diagonal_adjoint_and_normal() {
        let d = Diagonal::new(Dims::from([4, 5, 3]), weight()).unwrap();
        assert!(linop_test_adjoint(&d) < 1e-12);
        assert!(linop_test_normal(&d) < 1e-12);
    }

    #[test]
    fn test_diagonal_normal_inverse() {
        let dims = Dims::from([4, 5, 3]);
        let d = Diagonal::new(dims.clone(), weight()).unwrap();
        let x = CArray::from_elem(dims.ix(), Complex64::new(1.0, -2.0));
        let y = d.normal(&x) + x.mapv(|z| z * 0.3);
        let back = d.normal_inverse(0.3, &y).unwrap();
        assert!(znrmse(&x, &back) < 1e-12);
    }

    #[test]
    fn test_diagonal_rejects_bad_weight() {
        let err = Diagonal::new(Dims::from([4, 5, 2]), weight()).unwrap_err();
        assert!(matches!(err, MobaError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_fourier_chain_adjoint() {
        let dims = Dims::from([4, 6, 3]);
        let f: Box<dyn LinearOperator> = Box::new(Fourier::new(dims.clone(), AxisSet::from_axes(&[0, 1])));
        let d: Box<dyn LinearOperator> = Box::new(Diagonal::new(dims, weight()).unwrap());
        let c = chain(d, f).unwrap();
        assert!(linop_test_adjoint(&c) < 1e-10);
    }

    #[test]
    fn test_chain_rejects_mismatch() {
        let a: Box<dyn LinearOperator> = Box::new(Identity::new(Dims::from([3])));
        let b: Box<dyn LinearOperator> = Box::new(Identity::new(Dims::from([4])));
        assert!(chain(a, b).is_err());
    }

    #[test]
    fn test_fn_operator_matrix() {
        // y = [[1, i], [0, 2]] x
        let op = FnOperator::new(
            Dims::from([2]),
            Dims::from([2]),
            |x: &CArray| {
                let i = Complex64::new(0.0, 1.0);
                CArray::from_shape_vec(IxDyn(&[2]), vec![x[[0]] + i * x[[1]], x[[1]] * 2.0]).unwrap()
            },
            |y: &CArray| {
                let i = Complex64::new(0.0, 1.0);
                CArray::from_shape_vec(IxDyn(&[2]), vec![y[[0]], -i * y[[0]] + y[[1]] * 2.0]).unwrap()
            },
        );
        assert!(linop_test_adjoint(&op) < 1e-12);
    }

    #[test]
    fn test_zero_operator() {
        let z = Zero::new(Dims::from([3, 2]), Dims::from([5]));
        let y = z.forward(&CArray::from_elem(IxDyn(&[3, 2]), Complex64::new(1.0, 1.0)));
        assert_eq!(y.shape(), &[5]);
        assert!(y.iter().all(|v| v.norm() == 0.0));
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_shape_violation_panics() {
        let id = Identity::new(Dims::from([3]));
        let _ = id.forward(&CArray::zeros(IxDyn(&[4])));
    }

    #[test]
    fn test_create_drop_leaves_probe_at_baseline() {
        let base = live_operators();
        {
            let dims = Dims::from([4, 4]);
            let a: Box<dyn LinearOperator> = Box::new(Identity::new(dims.clone()));
            let b: Box<dyn LinearOperator> = Box::new(Fourier::new(dims, AxisSet::all(2)));
            let _c = chain(a, b).unwrap();
            assert_eq!(live_operators(), base + 3);
        }
        assert_eq!(live_operators(), base);
    }
}
