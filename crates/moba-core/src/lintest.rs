// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Linear Operator Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Numerical self-checks for [`LinearOperator`] implementations.
//!
//! Each check returns a relative discrepancy; callers decide the tolerance.
//! The plain variants use a fixed seed, the `_with_rng` variants take the
//! generator from the caller.

use moba_math::multind::{znrmse, zscalar, zscalar_real};
use moba_math::rand::{gaussian_rand, real_gaussian_rand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::linop::LinearOperator;

/// Seed of the plain check variants.
pub const LINTEST_SEED: u64 = 0x6d6f_6261;

fn relative(sc1: f64, diff: f64) -> f64 {
    if sc1 == 0.0 {
        diff
    } else {
        diff / sc1
    }
}

/// |⟨Au, v⟩ − ⟨u, Aᴴv⟩| / |⟨Au, v⟩| for complex Gaussian u, v.
pub fn linop_test_adjoint(op: &dyn LinearOperator) -> f64 {
    linop_test_adjoint_with_rng(op, &mut StdRng::seed_from_u64(LINTEST_SEED))
}

pub fn linop_test_adjoint_with_rng<R: Rng + ?Sized>(op: &dyn LinearOperator, rng: &mut R) -> f64 {
    let u = gaussian_rand(op.domain(), rng);
    let v = gaussian_rand(op.codomain(), rng);

    let sc1 = zscalar(&op.forward(&u), &v);
    let sc2 = zscalar(&u, &op.adjoint(&v));
    tracing::debug!(
        sc1_re = sc1.re,
        sc1_im = sc1.im,
        sc2_re = sc2.re,
        sc2_im = sc2.im,
        "adjoint test"
    );
    relative(sc1.norm(), (sc1 - sc2).norm())
}

/// Adjoint check in the real inner product, with real Gaussian u, v.
///
/// Suitable for operators that are only real-linear, e.g. those taking the
/// real part of their input.
pub fn linop_test_adjoint_real(op: &dyn LinearOperator) -> f64 {
    linop_test_adjoint_real_with_rng(op, &mut StdRng::seed_from_u64(LINTEST_SEED))
}

pub fn linop_test_adjoint_real_with_rng<R: Rng + ?Sized>(
    op: &dyn LinearOperator,
    rng: &mut R,
) -> f64 {
    let u = real_gaussian_rand(op.domain(), rng);
    let v = real_gaussian_rand(op.codomain(), rng);

    let sc1 = zscalar_real(&op.forward(&u), &v);
    let sc2 = zscalar_real(&u, &op.adjoint(&v));
    tracing::debug!(sc1, sc2, "real adjoint test");
    relative(sc1.abs(), (sc1 - sc2).abs())
}

/// ‖normal(u) − Aᴴ(A u)‖ / ‖Aᴴ(A u)‖.
pub fn linop_test_normal(op: &dyn LinearOperator) -> f64 {
    let mut rng = StdRng::seed_from_u64(LINTEST_SEED);
    let u = gaussian_rand(op.domain(), &mut rng);
    let reference = op.adjoint(&op.forward(&u));
    znrmse(&reference, &op.normal(&u))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linop::FnOperator;
    use moba_math::multind::CArray;
    use moba_types::dims::Dims;
    use num_complex::Complex64;

    #[test]
    fn test_wrong_adjoint_is_detected() {
        // adjoint is missing the conjugation
        let w = Complex64::new(0.3, 2.0);
        let op = FnOperator::new(
            Dims::from([16]),
            Dims::from([16]),
            move |x: &CArray| x.mapv(|z| z * w),
            move |y: &CArray| y.mapv(|z| z * w),
        );
        assert!(linop_test_adjoint(&op) > 0.1);
    }

    #[test]
    fn test_real_part_operator_passes_real_test_only() {
        // x ↦ w·Re(x) has the real-inner-product adjoint y ↦ Re(conj(w)·y)
        let w = Complex64::new(0.7, -1.3);
        let op = FnOperator::new(
            Dims::from([32]),
            Dims::from([32]),
            move |x: &CArray| x.mapv(|z| w * z.re),
            move |y: &CArray| y.mapv(|z| Complex64::new((w.conj() * z).re, 0.0)),
        );
        assert!(linop_test_adjoint_real(&op) < 1e-12);
        assert!(linop_test_adjoint(&op) > 1e-3);
    }

    #[test]
    fn test_seeded_checks_are_deterministic() {
        let op = FnOperator::new(
            Dims::from([8]),
            Dims::from([8]),
            |x: &CArray| x.mapv(|z| z * 2.0),
            |y: &CArray| y.mapv(|z| z * 2.0),
        );
        let a = linop_test_adjoint_with_rng(&op, &mut StdRng::seed_from_u64(5));
        let b = linop_test_adjoint_with_rng(&op, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
        assert!(linop_test_normal(&op) < 1e-14);
    }
}
