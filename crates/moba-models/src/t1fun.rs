// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Look-Locker T1 Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Inversion recovery `S(TI) = Mss − (Mss + M0)·exp(−TI·R1*)`.
//!
//! Parameters along the coefficient axis: `[Mss, M0, R1*]`; M0 and R1* are
//! stored divided by their scaling factors.

use moba_core::nlop::{ForwardModel, Nlop};
use moba_math::multind::CArray;
use moba_types::dims::{Dims, COEFF_DIM};
use moba_types::error::{MobaError, MobaResult};
use num_complex::Complex64;

use crate::pointwise::{check_model_dims, flat, param_flat, unflat, PointwiseJacobian};

/// Timing vector as an array of shape `dims`.
pub(crate) fn timing_array(
    context: &str,
    dims: &Dims,
    values: &[Complex64],
    out: &Dims,
) -> MobaResult<CArray> {
    if values.len() != dims.size() {
        return Err(MobaError::ConfigError(format!(
            "{context}: {} values for dims {:?}",
            values.len(),
            dims.as_slice()
        )));
    }
    if !dims.broadcasts_to(out) {
        return Err(MobaError::shape_mismatch(context, out.as_slice(), dims.as_slice()));
    }
    unflat(dims, values.to_vec())
}

pub struct T1Model {
    map_dims: Dims,
    out_dims: Dims,
    in_dims: Dims,
    ti: CArray,
    scale_m0: f64,
    scale_r1s: f64,
}

impl ForwardModel for T1Model {
    type Linearization = PointwiseJacobian;

    fn input_dims(&self) -> &Dims {
        &self.in_dims
    }

    fn output_dims(&self) -> &Dims {
        &self.out_dims
    }

    fn evaluate(&self, x: &CArray) -> MobaResult<(CArray, PointwiseJacobian)> {
        let out = &self.out_dims;
        let mss = param_flat(x, COEFF_DIM, 0, 1.0, out);
        let m0 = param_flat(x, COEFF_DIM, 1, self.scale_m0, out);
        let r1s = param_flat(x, COEFF_DIM, 2, self.scale_r1s, out);
        let ti = flat(&self.ti, out);

        let n = out.size();
        let mut y = Vec::with_capacity(n);
        let mut d_mss = Vec::with_capacity(n);
        let mut d_m0 = Vec::with_capacity(n);
        let mut d_r1s = Vec::with_capacity(n);
        for i in 0..n {
            let e = (-ti[i] * r1s[i]).exp();
            y.push(mss[i] - (mss[i] + m0[i]) * e);
            d_mss.push(1.0 - e);
            d_m0.push(-e * self.scale_m0);
            d_r1s.push((mss[i] + m0[i]) * ti[i] * e * self.scale_r1s);
        }

        let partials = vec![unflat(out, d_mss)?, unflat(out, d_m0)?, unflat(out, d_r1s)?];
        let jac = PointwiseJacobian::new(self.map_dims.clone(), COEFF_DIM, partials, false);
        Ok((unflat(out, y)?, jac))
    }

    fn derivative(&self, lin: &PointwiseJacobian, dx: &CArray) -> CArray {
        lin.forward(dx)
    }

    fn adjoint(&self, lin: &PointwiseJacobian, dy: &CArray) -> CArray {
        lin.adjoint(dy)
    }
}

/// T1 operator on maps of shape `map_dims` with three parameters along the
/// coefficient axis of `in_dims`. `ti` holds the inversion times with shape
/// `ti_dims`.
pub fn nlop_t1_create(
    map_dims: &Dims,
    out_dims: &Dims,
    in_dims: &Dims,
    ti_dims: &Dims,
    ti: &[Complex64],
    scale_m0: f64,
    scale_r1s: f64,
) -> MobaResult<Nlop<T1Model>> {
    check_model_dims("T1fun", map_dims, out_dims, in_dims, COEFF_DIM, 3)?;
    let ti = timing_array("T1fun TI", ti_dims, ti, out_dims)?;
    if !(scale_m0.is_finite() && scale_r1s.is_finite()) || scale_m0 == 0.0 || scale_r1s == 0.0 {
        return Err(MobaError::ConfigError(format!(
            "T1fun scalings must be finite and non-zero, got {scale_m0}, {scale_r1s}"
        )));
    }
    tracing::debug!(?ti_dims, scale_m0, scale_r1s, "T1fun");
    Ok(Nlop::new(T1Model {
        map_dims: map_dims.clone(),
        out_dims: out_dims.clone(),
        in_dims: in_dims.clone(),
        ti,
        scale_m0,
        scale_r1s,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use moba_core::nlop::NonlinearOperator;
    use moba_types::dims::TE_DIM;
    use ndarray::IxDyn;

    fn c(re: f64) -> Complex64 {
        Complex64::new(re, 0.0)
    }

    fn setup() -> Nlop<T1Model> {
        let maps = Dims::from([2, 2, 1, 1, 1, 1, 1]);
        nlop_t1_create(
            &maps,
            &maps.with(TE_DIM, 3),
            &maps.with(COEFF_DIM, 3),
            &Dims::ones(7).with(TE_DIM, 3),
            &[c(0.0), c(0.5), c(10.0)],
            2.0,
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_recovery_curve() {
        let mut op = setup();
        // Mss = 1, M0 = 2·0.5, R1* = 1
        let x = CArray::from_shape_fn(IxDyn(&[2, 2, 1, 1, 1, 1, 3]), |i| {
            [c(1.0), c(0.5), c(1.0)][i[COEFF_DIM]]
        });
        let y = op.forward(&x).unwrap();
        assert!((y[IxDyn(&[0, 0, 0, 0, 0, 0, 0])] - c(-1.0)).norm() < 1e-12);
        let expected = 1.0 - 2.0 * (-0.5f64).exp();
        assert!((y[IxDyn(&[1, 1, 0, 0, 0, 1, 0])] - c(expected)).norm() < 1e-12);
        assert!((y[IxDyn(&[0, 1, 0, 0, 0, 2, 0])] - c(1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_derivative_requires_apply() {
        let op = setup();
        assert!(matches!(
            op.derivative(0, 0).err(),
            Some(MobaError::NoLinearizationPoint)
        ));
    }

    #[test]
    fn test_bad_timing_rejected() {
        let maps = Dims::from([2, 2, 1, 1, 1, 1, 1]);
        let res = nlop_t1_create(
            &maps,
            &maps.with(TE_DIM, 3),
            &maps.with(COEFF_DIM, 3),
            &Dims::ones(7).with(TE_DIM, 3),
            &[c(0.0), c(0.5)],
            1.0,
            1.0,
        );
        assert!(res.is_err());
        let res = nlop_t1_create(
            &maps,
            &maps.with(TE_DIM, 3),
            &maps.with(COEFF_DIM, 2),
            &Dims::ones(7).with(TE_DIM, 3),
            &[c(0.0), c(0.5), c(1.0)],
            1.0,
            1.0,
        );
        assert!(res.is_err());
    }
}
