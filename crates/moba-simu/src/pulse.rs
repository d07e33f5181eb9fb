// ─────────────────────────────────────────────────────────────────────
// MoBa Core — RF Pulse Shapes
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! RF pulse envelopes in angular-frequency units (rad/s).
//!
//! Time runs from 0 at the start of the pulse to `duration` at its end.

use moba_types::config::{HypSecPulse, SincPulse};
use moba_types::error::{MobaError, MobaResult};

/// Minimum number of Simpson intervals used to normalise a pulse.
const MIN_SAMPLES: usize = 100;

/// Windowed sinc excitation scaled to a given flip angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SincShape {
    duration: f64,
    bwtp: f64,
    alpha: f64,
    flip_angle: f64,
    amplitude: f64,
}

impl SincShape {
    /// Shape with area `flip_angle_deg` (in degrees), integrated at
    /// `sampling_rate` samples per second.
    pub fn new(pulse: &SincPulse, flip_angle_deg: f64, sampling_rate: f64) -> MobaResult<Self> {
        if !(pulse.duration > 0.0 && pulse.bwtp > 0.0) {
            return Err(MobaError::ConfigError(
                "sinc pulse needs positive duration and bandwidth-time product".to_string(),
            ));
        }
        let mut shape = SincShape {
            duration: pulse.duration,
            bwtp: pulse.bwtp,
            alpha: pulse.alpha,
            flip_angle: flip_angle_deg.to_radians(),
            amplitude: 1.0,
        };

        let n = ((pulse.duration * sampling_rate).ceil() as usize).max(MIN_SAMPLES);
        let area = simpson(|t| shape.envelope(t), pulse.duration, n);
        if area.abs() < 1e-300 {
            return Err(MobaError::ConfigError("sinc pulse has zero area".to_string()));
        }
        shape.amplitude = shape.flip_angle / area;
        Ok(shape)
    }

    fn envelope(&self, t: f64) -> f64 {
        let tc = t - self.duration / 2.0;
        let x = self.bwtp * tc / self.duration;
        let sinc = if x.abs() < 1e-12 {
            1.0
        } else {
            (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x)
        };
        let window =
            (1.0 - self.alpha) + self.alpha * (2.0 * std::f64::consts::PI * tc / self.duration).cos();
        window * sinc
    }

    /// Nutation frequency ω₁(t); zero outside the pulse.
    pub fn omega1(&self, t: f64) -> f64 {
        if !(0.0..=self.duration).contains(&t) {
            return 0.0;
        }
        self.amplitude * self.envelope(t)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Nominal flip angle in radians.
    pub fn flip_angle(&self) -> f64 {
        self.flip_angle
    }

    /// Copy with the flip angle scaled by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        SincShape {
            flip_angle: self.flip_angle * factor,
            amplitude: self.amplitude * factor,
            ..*self
        }
    }
}

/// Adiabatic hyperbolic-secant inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypSecShape {
    a0: f64,
    beta: f64,
    mu: f64,
    duration: f64,
}

impl HypSecShape {
    pub fn new(pulse: &HypSecPulse) -> Self {
        HypSecShape {
            a0: pulse.a0,
            beta: pulse.beta,
            mu: pulse.mu,
            duration: pulse.duration,
        }
    }

    /// ω₁(t) = A₀·sech(β(t − d/2)).
    pub fn omega1(&self, t: f64) -> f64 {
        if !(0.0..=self.duration).contains(&t) {
            return 0.0;
        }
        self.a0 / (self.beta * (t - self.duration / 2.0)).cosh()
    }

    /// Frequency sweep Δω(t) = −μβ·tanh(β(t − d/2)).
    pub fn sweep(&self, t: f64) -> f64 {
        if !(0.0..=self.duration).contains(&t) {
            return 0.0;
        }
        -self.mu * self.beta * (self.beta * (t - self.duration / 2.0)).tanh()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Composite Simpson rule on [0, len] with `n` (rounded up to even) intervals.
fn simpson(f: impl Fn(f64) -> f64, len: f64, n: usize) -> f64 {
    let n = n + n % 2;
    let h = len / n as f64;
    let mut acc = f(0.0) + f(len);
    for i in 1..n {
        let w = if i % 2 == 1 { 4.0 } else { 2.0 };
        acc += w * f(i as f64 * h);
    }
    acc * h / 3.0
}
