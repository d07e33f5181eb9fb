// ─────────────────────────────────────────────────────────────────────
// MoBa Core — ODE Integrators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Explicit Runge-Kutta integration of first-order systems.
//!
//! This module provides the adaptive Dormand-Prince 5(4) pair used by the
//! Bloch simulation (local error O(h⁵), error estimate from the embedded
//! fourth-order solution), plus a fixed-step RK4 reference stepper for
//! regression comparison.

use moba_types::error::{MobaError, MobaResult};

/// Right-hand side contract `dy/dt = f(t, y)`.
pub trait OdeSystem {
    /// Length of the state vector.
    fn dim(&self) -> usize;
    /// Write `f(t, y)` into `dydt`.
    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]);
}

/// Adaptive step control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdeConfig {
    /// Mixed absolute/relative local error tolerance.
    pub tol: f64,
    /// First trial step; later intervals reuse the last accepted step.
    pub initial_step: f64,
    pub max_steps: usize,
}

impl Default for OdeConfig {
    fn default() -> Self {
        OdeConfig {
            tol: 1e-6,
            initial_step: 1e-5,
            max_steps: 100_000,
        }
    }
}

/// Work done by one call of [`ode_interval`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OdeStats {
    pub accepted: usize,
    pub rejected: usize,
    pub rhs_evals: usize,
}

/// One classical RK4 step in place.
pub fn rk4_step<S: OdeSystem + ?Sized>(system: &S, t: f64, y: &mut [f64], h: f64) {
    if !h.is_finite() || h == 0.0 {
        return;
    }
    let n = y.len();
    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut tmp = vec![0.0; n];

    system.rhs(t, y, &mut k1);
    for i in 0..n {
        tmp[i] = y[i] + 0.5 * h * k1[i];
    }
    system.rhs(t + 0.5 * h, &tmp, &mut k2);
    for i in 0..n {
        tmp[i] = y[i] + 0.5 * h * k2[i];
    }
    system.rhs(t + 0.5 * h, &tmp, &mut k3);
    for i in 0..n {
        tmp[i] = y[i] + h * k3[i];
    }
    system.rhs(t + h, &tmp, &mut k4);

    for i in 0..n {
        y[i] += h * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]) / 6.0;
    }
}

// Dormand-Prince 5(4) tableau.
const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A: [[f64; 6]; 7] = [
    [0.0; 6],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];
const B5: [f64; 7] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
const B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

/// One Dormand-Prince step from `(t, y)` with step `h`.
///
/// Writes the fifth-order solution to `y_new` and the difference to the
/// embedded fourth-order solution to `err`.
pub fn dormand_prince_step<S: OdeSystem + ?Sized>(
    system: &S,
    t: f64,
    y: &[f64],
    h: f64,
    y_new: &mut [f64],
    err: &mut [f64],
) {
    let n = y.len();
    let mut k = vec![vec![0.0; n]; 7];
    let mut tmp = vec![0.0; n];

    system.rhs(t, y, &mut k[0]);
    for s in 1..7 {
        for i in 0..n {
            let mut acc = 0.0;
            for (j, kj) in k.iter().enumerate().take(s) {
                acc += A[s][j] * kj[i];
            }
            tmp[i] = y[i] + h * acc;
        }
        system.rhs(t + C[s] * h, &tmp, &mut k[s]);
    }

    for i in 0..n {
        let mut hi = 0.0;
        let mut lo = 0.0;
        for s in 0..7 {
            hi += B5[s] * k[s][i];
            lo += B4[s] * k[s][i];
        }
        y_new[i] = y[i] + h * hi;
        err[i] = h * (hi - lo);
    }
}

/// Integrate `y` from `t0` to `t1` with adaptive Dormand-Prince steps.
///
/// `step` carries the step size between successive intervals: it is read as
/// the first trial step (falling back to `config.initial_step` when not
/// positive) and updated to the last proposed step on return.
pub fn ode_interval<S: OdeSystem + ?Sized>(
    system: &S,
    t0: f64,
    t1: f64,
    y: &mut [f64],
    step: &mut f64,
    config: &OdeConfig,
) -> MobaResult<OdeStats> {
    if y.len() != system.dim() {
        return Err(MobaError::shape_mismatch("ode state", &[system.dim()], &[y.len()]));
    }
    let mut stats = OdeStats::default();
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(stats);
    }
    if !(config.tol.is_finite() && config.tol > 0.0) {
        return Err(MobaError::ConfigError(format!(
            "ode tolerance must be > 0, got {}",
            config.tol
        )));
    }

    let n = y.len();
    let mut y_new = vec![0.0; n];
    let mut err = vec![0.0; n];
    let mut t = t0;
    let mut h = if step.is_finite() && *step > 0.0 {
        *step
    } else {
        config.initial_step
    };
    let h_min = span * 1e-12;

    while t < t1 {
        if stats.accepted + stats.rejected >= config.max_steps {
            return Err(MobaError::OdeDiverged {
                time: t,
                message: format!("step budget of {} exhausted", config.max_steps),
            });
        }

        let last = t + h >= t1;
        let h_try = if last { t1 - t } else { h };

        dormand_prince_step(system, t, y, h_try, &mut y_new, &mut err);
        stats.rhs_evals += 7;

        let mut e2 = 0.0;
        let mut finite = true;
        for i in 0..n {
            if !y_new[i].is_finite() {
                finite = false;
            }
            let sc = config.tol * (1.0 + y[i].abs().max(y_new[i].abs()));
            e2 += (err[i] / sc) * (err[i] / sc);
        }
        let e = if n > 0 { (e2 / n as f64).sqrt() } else { 0.0 };

        if !finite || !e.is_finite() {
            h = h_try * 0.2;
            stats.rejected += 1;
        } else if e <= 1.0 {
            t = if last { t1 } else { t + h_try };
            y.copy_from_slice(&y_new);
            stats.accepted += 1;
            let fac = if e == 0.0 {
                5.0
            } else {
                (0.9 * e.powf(-0.2)).clamp(0.2, 5.0)
            };
            // A truncated final step says nothing about the natural step size.
            h = if last { h.max(h_try) } else { h_try * fac };
        } else {
            h = h_try * (0.9 * e.powf(-0.2)).clamp(0.2, 1.0);
            stats.rejected += 1;
        }

        if h < h_min && t < t1 {
            return Err(MobaError::OdeDiverged {
                time: t,
                message: format!("step size underflow ({h:e})"),
            });
        }
    }

    *step = h;
    tracing::trace!(
        t0,
        t1,
        accepted = stats.accepted,
        rejected = stats.rejected,
        "ode interval"
    );
    Ok(stats)
}
