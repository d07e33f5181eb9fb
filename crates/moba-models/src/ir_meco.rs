// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Inversion-Recovery Multi-Echo Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Joint T1, water/fat, R2* and B0 model for inversion-recovery multi-echo
//! acquisitions.
//!
//! ```text
//! S(TI, TE) = [W(TI) + F(TI)·z(TE)] · exp((−R2* + i2π·fB0)·TE)
//! W(TI)     = Mss_w − (Mss_w + M0_w)·exp(−TI·R1_w)
//! F(TI)     = Mss_f − (Mss_f + M0_f)·exp(−TI·R1_f)
//! z(TE)     = Σₚ aₚ·exp(i2π·fₚ·TE)
//! ```
//!
//! TI is in seconds, TE in milliseconds; R2* and fB0 are therefore in 1/ms
//! and kHz. Coefficient order: `[Mss_w, M0_w, R1_w, Mss_f, M0_f, R1_f, R2*,
//! fB0]`, each multiplied by its scaling. The fB0 coefficient lives in the
//! Sobolev domain of [`SobolevWeight`].

use moba_core::linop::LinearOperator;
use moba_core::nlop::{ForwardModel, Nlop};
use moba_math::multind::{copy_block_in, select_param, CArray};
use moba_types::config::{MobaConfig, ModelOtherConfig};
use moba_types::constants::{ppm_to_khz, FAT_PEAKS_PPM, FAT_PEAK_AMPLITUDES};
use moba_types::dims::{Dims, COEFF_DIM};
use moba_types::error::{MobaError, MobaResult};
use num_complex::Complex64;
use std::f64::consts::PI;

use crate::fb0::SobolevWeight;
use crate::pointwise::{check_model_dims, flat, param_flat, unflat, PointwiseJacobian};
use crate::t1fun::timing_array;

pub const IR_MECO_PARAMS: usize = 8;
const R2S: usize = 6;
const FB0: usize = 7;

pub struct IrMecoModel {
    map_dims: Dims,
    out_dims: Dims,
    in_dims: Dims,
    ti: CArray,
    te: CArray,
    scale: [f64; IR_MECO_PARAMS],
    sobolev: SobolevWeight,
    /// Fat peak frequencies (kHz) and relative amplitudes.
    fat: Vec<(f64, f64)>,
}

impl IrMecoModel {
    /// Complex fat signal at echo time `te` (ms), relative to water.
    pub fn fat_spectrum(&self, te: f64) -> Complex64 {
        self.fat
            .iter()
            .map(|&(f, a)| Complex64::from_polar(a, 2.0 * PI * f * te))
            .sum()
    }

    /// Image-domain B0 map (kHz) of the coefficients `x`.
    pub fn field_map(&self, x: &CArray) -> CArray {
        let coeff = select_param(x, COEFF_DIM, FB0);
        self.sobolev.forward(&coeff).mapv(|z| z * self.scale[FB0])
    }

    /// Coefficients with the fB0 slice passed through `op`.
    fn map_fb0(&self, x: &CArray, op: impl Fn(&CArray) -> CArray) -> CArray {
        let mut out = x.clone();
        let mut offset = vec![0; x.ndim()];
        offset[COEFF_DIM] = FB0;
        copy_block_in(&mut out, &offset, &op(&select_param(x, COEFF_DIM, FB0)));
        out
    }
}

impl ForwardModel for IrMecoModel {
    type Linearization = PointwiseJacobian;

    fn input_dims(&self) -> &Dims {
        &self.in_dims
    }

    fn output_dims(&self) -> &Dims {
        &self.out_dims
    }

    fn evaluate(&self, x: &CArray) -> MobaResult<(CArray, PointwiseJacobian)> {
        let out = &self.out_dims;
        let s = &self.scale;
        let p: Vec<Vec<Complex64>> = (0..=R2S)
            .map(|k| param_flat(x, COEFF_DIM, k, s[k], out))
            .collect();
        let fb0 = flat(&self.field_map(x), out);
        let ti = flat(&self.ti, out);
        let te = flat(&self.te, out);

        let n = out.size();
        let mut y = Vec::with_capacity(n);
        let mut d: Vec<Vec<Complex64>> = vec![Vec::with_capacity(n); IR_MECO_PARAMS];
        let i2pi = Complex64::new(0.0, 2.0 * PI);
        for i in 0..n {
            let (mss_w, m0_w, r1_w) = (p[0][i], p[1][i], p[2][i]);
            let (mss_f, m0_f, r1_f) = (p[3][i], p[4][i], p[5][i]);
            let ew = (-ti[i] * r1_w).exp();
            let ef = (-ti[i] * r1_f).exp();
            let water = mss_w - (mss_w + m0_w) * ew;
            let fat = mss_f - (mss_f + m0_f) * ef;

            let z = self.fat_spectrum(te[i].re);
            let decay = ((-p[R2S][i] + i2pi * fb0[i]) * te[i]).exp();
            let sig = (water + fat * z) * decay;
            y.push(sig);

            d[0].push((1.0 - ew) * decay * s[0]);
            d[1].push(-ew * decay * s[1]);
            d[2].push((mss_w + m0_w) * ti[i] * ew * decay * s[2]);
            d[3].push((1.0 - ef) * z * decay * s[3]);
            d[4].push(-ef * z * decay * s[4]);
            d[5].push((mss_f + m0_f) * ti[i] * ef * z * decay * s[5]);
            d[R2S].push(-te[i] * sig * s[R2S]);
            d[FB0].push(i2pi * te[i] * sig * s[FB0]);
        }

        let partials = d
            .into_iter()
            .map(|v| unflat(out, v))
            .collect::<MobaResult<Vec<_>>>()?;
        let jac = PointwiseJacobian::new(self.map_dims.clone(), COEFF_DIM, partials, false);
        Ok((unflat(out, y)?, jac))
    }

    fn derivative(&self, lin: &PointwiseJacobian, dx: &CArray) -> CArray {
        lin.forward(&self.map_fb0(dx, |c| self.sobolev.forward(c)))
    }

    fn adjoint(&self, lin: &PointwiseJacobian, dy: &CArray) -> CArray {
        self.map_fb0(&lin.adjoint(dy), |g| self.sobolev.adjoint(g))
    }
}

/// IR multi-echo operator.
///
/// `scale_others` multiplies each coefficient. The Sobolev weighting of the
/// field map (`cfg.other.fb0_a`, `cfg.other.fb0_b`) and the field strength
/// placing the fat peaks (`cfg.other.field_strength`) come from `cfg`.
#[allow(clippy::too_many_arguments)]
pub fn nlop_ir_meco_create(
    map_dims: &Dims,
    out_dims: &Dims,
    in_dims: &Dims,
    ti_dims: &Dims,
    ti: &[Complex64],
    te_dims: &Dims,
    te: &[Complex64],
    scale_others: [f64; IR_MECO_PARAMS],
    cfg: &MobaConfig,
) -> MobaResult<Nlop<IrMecoModel>> {
    check_model_dims("ir_meco", map_dims, out_dims, in_dims, COEFF_DIM, IR_MECO_PARAMS)?;
    let ti = timing_array("ir_meco TI", ti_dims, ti, out_dims)?;
    let te = timing_array("ir_meco TE", te_dims, te, out_dims)?;
    let ModelOtherConfig {
        fb0_a,
        fb0_b,
        field_strength,
        ..
    } = cfg.other;
    if scale_others.iter().any(|s| !s.is_finite()) {
        return Err(MobaError::ConfigError(
            "ir_meco scalings must be finite".to_string(),
        ));
    }
    if !(fb0_a.is_finite() && fb0_a >= 0.0 && fb0_b.is_finite() && fb0_b >= 0.0) {
        return Err(MobaError::ConfigError(format!(
            "ir_meco Sobolev weight needs finite a, b >= 0, got a = {fb0_a}, b = {fb0_b}"
        )));
    }
    if !(field_strength.is_finite() && field_strength > 0.0) {
        return Err(MobaError::ConfigError(format!(
            "ir_meco field strength must be > 0, got {field_strength}"
        )));
    }

    let fat = FAT_PEAKS_PPM
        .iter()
        .zip(FAT_PEAK_AMPLITUDES.iter())
        .map(|(&ppm, &a)| (ppm_to_khz(ppm, field_strength), a))
        .collect();
    tracing::debug!(fb0_a, fb0_b, ?scale_others, field_strength, "ir_meco");

    Ok(Nlop::new(IrMecoModel {
        map_dims: map_dims.clone(),
        out_dims: out_dims.clone(),
        in_dims: in_dims.clone(),
        ti,
        te,
        scale: scale_others,
        sobolev: SobolevWeight::new(map_dims.clone(), fb0_a, fb0_b),
        fat,
    }))
}
