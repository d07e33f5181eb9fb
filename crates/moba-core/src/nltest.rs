// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Nonlinear Operator Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Finite-difference checks of nonlinear-operator derivatives.
//!
//! The derivative test probes `F(x + s·h) − F(x) − s·DF(x)·h` for a fixed
//! direction `h` (unit RMS) while halving `s` ten times from 0.01. For a
//! correct derivative the remainder divided by `s` shrinks linearly with
//! `s`; the returned ratio between the last and the first (or last
//! increasing) value is then about 2⁻⁹ ≈ 2e-3. A wrong derivative
//! leaves a ratio near one.
//!
//! The checks perturb input 0 and observe output 0; other inputs stay fixed.

use moba_math::multind::{znorm, CArray};
use moba_math::rand::gaussian_rand;
use moba_types::error::MobaResult;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::lintest::{linop_test_adjoint, linop_test_adjoint_real};
use crate::nlop::NonlinearOperator;

/// Seed of the plain check variants.
pub const NLTEST_SEED: u64 = 0x6e6c_6f70;

const HALVINGS: usize = 10;
const INITIAL_SCALE: f64 = 0.01;

/// Derivative test at a random point.
pub fn nlop_test_derivative(op: &mut dyn NonlinearOperator) -> MobaResult<f64> {
    let mut rng = StdRng::seed_from_u64(NLTEST_SEED);
    let inputs: Vec<CArray> = op
        .domain()
        .iter()
        .map(|d| gaussian_rand(d, &mut rng))
        .collect();
    let refs: Vec<&CArray> = inputs.iter().collect();
    nlop_test_derivative_with_rng(op, &refs, &mut rng)
}

/// Derivative test at the given point.
pub fn nlop_test_derivative_at(op: &mut dyn NonlinearOperator, x: &[&CArray]) -> MobaResult<f64> {
    nlop_test_derivative_with_rng(op, x, &mut StdRng::seed_from_u64(NLTEST_SEED))
}

pub fn nlop_test_derivative_with_rng<R: Rng + ?Sized>(
    op: &mut dyn NonlinearOperator,
    x: &[&CArray],
    rng: &mut R,
) -> MobaResult<f64> {
    let y0 = op.apply(x)?.swap_remove(0);

    let mut h = gaussian_rand(&op.domain()[0], rng);
    let rms = znorm(&h) / (h.len() as f64).sqrt();
    if rms > 0.0 {
        h.mapv_inplace(|z| z / rms);
    }
    let dy = op.derivative(0, 0)?.forward(&h);

    let mut scale = INITIAL_SCALE;
    let mut val0 = 0.0;
    let mut prev = f64::NEG_INFINITY;
    let mut val = 0.0;

    for step in 0..HALVINGS {
        let x1 = x[0] + &h.mapv(|z| z * scale);
        let mut perturbed: Vec<&CArray> = x.to_vec();
        perturbed[0] = &x1;
        let y1 = op.apply(&perturbed)?.swap_remove(0);

        let remainder = y1 - &y0 - dy.mapv(|z| z * Complex64::new(scale, 0.0));
        val = znorm(&remainder) / scale;
        tracing::debug!(step, scale, val, "derivative test");

        if step == 0 || val > prev {
            val0 = val;
        }
        prev = val;
        scale /= 2.0;
    }

    // leave the operator linearized at x
    op.apply(x)?;

    Ok(if val0 == 0.0 { 0.0 } else { val / val0 })
}

/// Apply at `x`, then run the complex adjoint test on ∂out₀/∂in₀.
pub fn nlop_test_adjoint(op: &mut dyn NonlinearOperator, x: &[&CArray]) -> MobaResult<f64> {
    op.apply(x)?;
    let d = op.derivative(0, 0)?;
    Ok(linop_test_adjoint(&*d))
}

/// As [`nlop_test_adjoint`] in the real inner product.
pub fn nlop_test_adjoint_real(op: &mut dyn NonlinearOperator, x: &[&CArray]) -> MobaResult<f64> {
    op.apply(x)?;
    let d = op.derivative(0, 0)?;
    Ok(linop_test_adjoint_real(&*d))
}
