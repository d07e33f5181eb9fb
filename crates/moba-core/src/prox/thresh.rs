// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Thresholding
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Joint soft thresholding and hard top-k (NIHT) thresholding.
//!
//! A *group* is the set of elements that differ only along the joint axes;
//! both operators act on the Euclidean norm of each group.

use std::cell::Cell;

use moba_math::multind::{broadcast, sum_to, zmul, CArray};
use moba_types::dims::{AxisSet, Dims};
use moba_types::error::{MobaError, MobaResult};
use num_complex::Complex64;

use super::{check_io, ProximalOperator, Unitary};
use crate::linop::LinearOperator;
use crate::probe::LiveToken;

/// Group norms, one per group, with the joint axes reduced to one.
fn group_norms(src: &CArray, dims: &Dims, joint: AxisSet) -> CArray {
    let gdims = dims.select(joint.complement(dims.rank()));
    let power = src.mapv(|z| Complex64::new(z.norm_sqr(), 0.0));
    sum_to(&power, &gdims).mapv(|p| Complex64::new(p.re.sqrt(), 0.0))
}

/// Operators with an adjustable threshold.
pub trait ThresholdParameter {
    fn lambda(&self) -> f64;
    fn set_lambda(&self, lambda: f64);
}

// ── Soft threshold ───────────────────────────────────────────────────

/// `x · max(0, 1 − μλ/‖x‖_group)`.
#[derive(Debug)]
pub struct Thresh {
    dims: Dims,
    joint: AxisSet,
    lambda: Cell<f64>,
    _live: LiveToken,
}

impl ThresholdParameter for Thresh {
    fn lambda(&self) -> f64 {
        self.lambda.get()
    }

    fn set_lambda(&self, lambda: f64) {
        self.lambda.set(lambda);
    }
}

impl ProximalOperator for Thresh {
    fn dims(&self) -> &Dims {
        &self.dims
    }

    fn apply(&self, mu: f64, dst: &mut CArray, src: &CArray) {
        check_io("prox thresh", &self.dims, dst, src);
        let t = mu * self.lambda.get();
        let scale = group_norms(src, &self.dims, self.joint).mapv(|n| {
            let n = n.re;
            let s = if n > t { 1.0 - t / n } else { 0.0 };
            Complex64::new(s, 0.0)
        });
        dst.assign(&zmul(&broadcast(&scale, &self.dims), src));
    }
}

fn check_lambda(lambda: f64) -> MobaResult<()> {
    if lambda.is_finite() && lambda >= 0.0 {
        Ok(())
    } else {
        Err(MobaError::ConfigError(format!(
            "threshold lambda must be finite and >= 0, got {lambda}"
        )))
    }
}

fn check_joint(dims: &Dims, joint: AxisSet) -> MobaResult<()> {
    if joint.intersection(AxisSet::all(dims.rank())) != joint {
        return Err(MobaError::ConfigError(format!(
            "joint axes {joint:?} exceed rank {}",
            dims.rank()
        )));
    }
    Ok(())
}

/// Soft threshold with joint group norm over `joint`.
pub fn prox_thresh_create(dims: Dims, lambda: f64, joint: AxisSet) -> MobaResult<Thresh> {
    check_lambda(lambda)?;
    check_joint(&dims, joint)?;
    Ok(Thresh {
        dims,
        joint,
        lambda: Cell::new(lambda),
        _live: LiveToken::new(),
    })
}

/// Soft threshold applied to the coefficients `U·x` of a unitary transform.
pub fn prox_unithresh_create(
    unitary: Box<dyn LinearOperator>,
    lambda: f64,
    joint: AxisSet,
) -> MobaResult<Unitary<Thresh>> {
    let thresh = prox_thresh_create(unitary.codomain().clone(), lambda, joint)?;
    Unitary::new(thresh, unitary)
}

impl<P: ProximalOperator + ThresholdParameter> ThresholdParameter for Unitary<P> {
    fn lambda(&self) -> f64 {
        self.inner().lambda()
    }

    fn set_lambda(&self, lambda: f64) {
        self.inner().set_lambda(lambda);
    }
}

pub fn set_thresh_lambda(op: &dyn ThresholdParameter, lambda: f64) {
    op.set_lambda(lambda);
}

pub fn get_thresh_lambda(op: &dyn ThresholdParameter) -> f64 {
    op.lambda()
}

// ── Hard top-k threshold ─────────────────────────────────────────────

/// Keep the `k` groups of largest norm, zero the rest. Ties go to the
/// group with the lower flat index. `μ` is ignored.
#[derive(Debug)]
pub struct NihtThresh {
    dims: Dims,
    joint: AxisSet,
    k: usize,
    _live: LiveToken,
}

impl NihtThresh {
    pub fn k(&self) -> usize {
        self.k
    }
}

impl ProximalOperator for NihtThresh {
    fn dims(&self) -> &Dims {
        &self.dims
    }

    fn apply(&self, _mu: f64, dst: &mut CArray, src: &CArray) {
        check_io("prox niht", &self.dims, dst, src);
        let norms = group_norms(src, &self.dims, self.joint);
        let flat: Vec<f64> = norms.iter().map(|n| n.re).collect();

        let mut order: Vec<usize> = (0..flat.len()).collect();
        // stable: equal norms keep ascending index order
        order.sort_by(|&a, &b| {
            flat[b]
                .partial_cmp(&flat[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut keep = vec![Complex64::new(0.0, 0.0); flat.len()];
        for &g in order.iter().take(self.k) {
            keep[g] = Complex64::new(1.0, 0.0);
        }

        let mask = CArray::from_shape_vec(norms.raw_dim(), keep)
            .unwrap_or_else(|e| panic!("niht mask: {e}"));
        dst.assign(&zmul(&broadcast(&mask, &self.dims), src));
    }
}

/// Top-`k` group selection with group norm over `joint`.
pub fn prox_niht_thresh_create(dims: Dims, k: usize, joint: AxisSet) -> MobaResult<NihtThresh> {
    check_joint(&dims, joint)?;
    Ok(NihtThresh {
        dims,
        joint,
        k,
        _live: LiveToken::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linop::Fourier;
    use moba_math::multind::{znorm, znrmse};
    use ndarray::IxDyn;

    fn vec1(vals: &[f64]) -> CArray {
        CArray::from_shape_vec(
            IxDyn(&[vals.len()]),
            vals.iter().map(|&v| Complex64::new(v, 0.0)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_soft_threshold_scalar_groups() {
        let op = prox_thresh_create(Dims::from([4]), 1.0, AxisSet::EMPTY).unwrap();
        let x = vec1(&[3.0, -0.5, -2.0, 1.0]);
        let mut y = CArray::zeros(x.raw_dim());
        op.apply(1.0, &mut y, &x);
        assert!(znrmse(&vec1(&[2.0, 0.0, -1.0, 0.0]), &y) < 1e-15);
    }

    #[test]
    fn test_joint_threshold_shrinks_whole_groups() {
        // groups along axis 1: (3,4) has norm 5, (0.3,0.4) has norm 0.5
        let x = CArray::from_shape_vec(
            IxDyn(&[2, 2]),
            vec![3.0, 4.0, 0.3, 0.4].into_iter().map(|v| Complex64::new(v, 0.0)).collect(),
        )
        .unwrap();
        let op = prox_thresh_create(Dims::from([2, 2]), 1.0, AxisSet::single(1)).unwrap();
        let mut y = CArray::zeros(x.raw_dim());
        op.apply(1.0, &mut y, &x);
        assert!((y[[0, 0]].re - 3.0 * 0.8).abs() < 1e-14);
        assert!((y[[0, 1]].re - 4.0 * 0.8).abs() < 1e-14);
        assert_eq!(y[[1, 0]], Complex64::new(0.0, 0.0));
        assert_eq!(y[[1, 1]], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_lambda_accessors() {
        let op = prox_thresh_create(Dims::from([4]), 0.1, AxisSet::EMPTY).unwrap();
        assert_eq!(get_thresh_lambda(&op), 0.1);
        set_thresh_lambda(&op, 2.5);
        assert_eq!(get_thresh_lambda(&op), 2.5);

        let x = vec1(&[2.0, 2.0, 2.0, 2.0]);
        let mut y = CArray::zeros(x.raw_dim());
        op.apply(1.0, &mut y, &x);
        assert_eq!(znorm(&y), 0.0);
    }

    #[test]
    fn test_negative_lambda_rejected() {
        assert!(prox_thresh_create(Dims::from([4]), -1.0, AxisSet::EMPTY).is_err());
        assert!(prox_thresh_create(Dims::from([4]), 1.0, AxisSet::single(3)).is_err());
    }

    #[test]
    fn test_unithresh_zero_lambda_is_identity() {
        let dims = Dims::from([8, 8]);
        let op = prox_unithresh_create(
            Box::new(Fourier::new(dims.clone(), AxisSet::all(2))),
            0.0,
            AxisSet::EMPTY,
        )
        .unwrap();
        let x = CArray::from_shape_fn(dims.ix(), |i| Complex64::new(i[0] as f64, i[1] as f64));
        let mut y = CArray::zeros(x.raw_dim());
        op.apply(1.0, &mut y, &x);
        assert!(znrmse(&x, &y) < 1e-12);

        set_thresh_lambda(&op, 1e9);
        op.apply(1.0, &mut y, &x);
        assert!(znorm(&y) < 1e-9);
    }

    #[test]
    fn test_niht_keeps_k_largest() {
        let op = prox_niht_thresh_create(Dims::from([5]), 2, AxisSet::EMPTY).unwrap();
        let x = vec1(&[1.0, -4.0, 2.0, 3.0, 0.5]);
        let mut y = CArray::zeros(x.raw_dim());
        op.apply(123.0, &mut y, &x);
        assert!(znrmse(&vec1(&[0.0, -4.0, 0.0, 3.0, 0.0]), &y) < 1e-15);
    }

    #[test]
    fn test_niht_ties_prefer_lower_index() {
        let op = prox_niht_thresh_create(Dims::from([4]), 2, AxisSet::EMPTY).unwrap();
        let x = vec1(&[1.0, 2.0, -2.0, 2.0]);
        let mut y = CArray::zeros(x.raw_dim());
        op.apply(1.0, &mut y, &x);
        assert!(znrmse(&vec1(&[0.0, 2.0, -2.0, 0.0]), &y) < 1e-15);
        assert_eq!(op.k(), 2);
    }

    #[test]
    fn test_niht_k_exceeding_groups_is_identity() {
        let op = prox_niht_thresh_create(Dims::from([3]), 10, AxisSet::EMPTY).unwrap();
        let x = vec1(&[1.0, -1.0, 0.0]);
        let mut y = CArray::zeros(x.raw_dim());
        op.apply(1.0, &mut y, &x);
        assert_eq!(y, x);
    }
}
