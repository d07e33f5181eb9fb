// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Physical T1 Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Look-Locker recovery parameterized by physical quantities.
//!
//! Parameters `[M0, R1, B1]` are mapped to the apparent recovery through
//!
//! ```text
//! R1* = R1 − ln(cos(B1·α)) / TR
//! Mss = M0·R1 / R1*
//! S   = Mss − (Mss + M0)·exp(−TI·R1*)
//! ```
//!
//! with the excitation flip angle α and repetition time TR of the sequence.

use moba_core::nlop::{ForwardModel, Nlop};
use moba_math::multind::CArray;
use moba_types::config::MobaConfig;
use moba_types::dims::{Dims, COEFF_DIM};
use moba_types::error::{MobaError, MobaResult};
use num_complex::Complex64;

use crate::pointwise::{check_model_dims, flat, param_flat, unflat, PointwiseJacobian};
use crate::t1fun::timing_array;

pub struct T1PhyModel {
    map_dims: Dims,
    out_dims: Dims,
    in_dims: Dims,
    ti: CArray,
    /// Nominal flip angle in radians.
    alpha: f64,
    tr: f64,
}

impl T1PhyModel {
    pub fn flip_angle(&self) -> f64 {
        self.alpha
    }

    pub fn tr(&self) -> f64 {
        self.tr
    }
}

impl ForwardModel for T1PhyModel {
    type Linearization = PointwiseJacobian;

    fn input_dims(&self) -> &Dims {
        &self.in_dims
    }

    fn output_dims(&self) -> &Dims {
        &self.out_dims
    }

    fn evaluate(&self, x: &CArray) -> MobaResult<(CArray, PointwiseJacobian)> {
        let out = &self.out_dims;
        let m0 = param_flat(x, COEFF_DIM, 0, 1.0, out);
        let r1 = param_flat(x, COEFF_DIM, 1, 1.0, out);
        let b1 = param_flat(x, COEFF_DIM, 2, 1.0, out);
        let ti = flat(&self.ti, out);

        let n = out.size();
        let mut y = Vec::with_capacity(n);
        let mut d_m0 = Vec::with_capacity(n);
        let mut d_r1 = Vec::with_capacity(n);
        let mut d_b1 = Vec::with_capacity(n);
        for i in 0..n {
            let angle = b1[i] * self.alpha;
            let r1s = r1[i] - angle.cos().ln() / self.tr;
            let dr1s_db1 = angle.tan() * self.alpha / self.tr;

            let mss = m0[i] * r1[i] / r1s;
            let dmss_dm0 = r1[i] / r1s;
            let dmss_dr1 = m0[i] / r1s - mss / r1s;
            let dmss_db1 = -mss / r1s * dr1s_db1;

            let e = (-ti[i] * r1s).exp();
            let ds_dr1s = (mss + m0[i]) * ti[i] * e;

            y.push(mss - (mss + m0[i]) * e);
            d_m0.push((1.0 - e) * dmss_dm0 - e);
            d_r1.push((1.0 - e) * dmss_dr1 + ds_dr1s);
            d_b1.push((1.0 - e) * dmss_db1 + ds_dr1s * dr1s_db1);
        }

        let partials = vec![unflat(out, d_m0)?, unflat(out, d_r1)?, unflat(out, d_b1)?];
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

/// Physical T1 operator; flip angle and TR come from the sequence in `cfg`.
pub fn nlop_t1_phy_create(
    map_dims: &Dims,
    out_dims: &Dims,
    in_dims: &Dims,
    ti_dims: &Dims,
    ti: &[Complex64],
    cfg: &MobaConfig,
) -> MobaResult<Nlop<T1PhyModel>> {
    check_model_dims("T1phyfun", map_dims, out_dims, in_dims, COEFF_DIM, 3)?;
    let ti = timing_array("T1phyfun TI", ti_dims, ti, out_dims)?;
    let tr = cfg.sim.seq.tr;
    let alpha = cfg.sim.pulse.sinc.flip_angle.to_radians();
    if !(tr.is_finite() && tr > 0.0) {
        return Err(MobaError::ConfigError(format!("T1phyfun needs TR > 0, got {tr}")));
    }
    tracing::debug!(tr, alpha, "T1phyfun");
    Ok(Nlop::new(T1PhyModel {
        map_dims: map_dims.clone(),
        out_dims: out_dims.clone(),
        in_dims: in_dims.clone(),
        ti,
        alpha,
        tr,
    }))
}
