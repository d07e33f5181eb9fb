// ─────────────────────────────────────────────────────────────────────
// MoBa Core — N-D FFT
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Unitary FFT over a set of axes, wrapping rustfft.
//!
//! Both directions scale by 1/sqrt(n) per transformed axis, so
//! `ifft_axes` is the adjoint and the inverse of `fft_axes`. Output is in
//! natural (uncentered) order; [`frequency`] gives the matching grid.

use moba_types::dims::AxisSet;
use ndarray::Axis;
use num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

use crate::multind::CArray;

fn transform(input: &CArray, axes: AxisSet, direction: FftDirection) -> CArray {
    let mut data = input.clone();
    let mut planner = FftPlanner::new();
    let rank = data.ndim();

    for ax in axes.iter().filter(|&a| a < rank) {
        let n = data.shape()[ax];
        if n <= 1 {
            continue;
        }
        let fft = planner.plan_fft(n, direction);
        let norm = 1.0 / (n as f64).sqrt();
        let mut buf = vec![Complex64::new(0.0, 0.0); n];

        // Lanes along `ax` are strided in general; go through a buffer.
        for mut lane in data.lanes_mut(Axis(ax)) {
            for (b, v) in buf.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            fft.process(&mut buf);
            for (v, b) in lane.iter_mut().zip(buf.iter()) {
                *v = *b * norm;
            }
        }
    }

    data
}

/// Unitary forward FFT along every axis of `axes`.
pub fn fft_axes(input: &CArray, axes: AxisSet) -> CArray {
    transform(input, axes, FftDirection::Forward)
}

/// Unitary inverse FFT along every axis of `axes`.
pub fn ifft_axes(input: &CArray, axes: AxisSet) -> CArray {
    transform(input, axes, FftDirection::Inverse)
}

/// Normalised frequency of FFT bin `i` on an axis of extent `n`, in [-0.5, 0.5).
pub fn frequency(i: usize, n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let k = if i < n.div_ceil(2) {
        i as f64
    } else {
        i as f64 - n as f64
    };
    k / n as f64
}
