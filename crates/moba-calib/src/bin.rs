// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Quadrature Binning
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Respiratory/cardiac binning of self-gating labels.
//!
//! Two real label channels form a quadrature signal `z = l₀ + i·l₁` per
//! motion. Respiration is binned by the phase of `z` (or by its amplitude),
//! cardiac motion always by phase. Each time sample lands in one of
//! `n_resp × n_card` bins; [`bin_average`] then reduces data along the
//! cluster axis to one mean per bin.

use moba_math::multind::CArray;
use moba_types::dims::{Dims, TIME2_DIM, TIME_DIM};
use moba_types::error::{MobaError, MobaResult};
use ndarray::{Array2, Axis, Dimension, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinConfig {
    /// Respiratory bins (default: 1)
    pub n_resp: usize,
    /// Cardiac bins (default: 1)
    pub n_card: usize,
    /// Moving-average window of the respiratory signal, 0 or 1 disables (default: 0)
    pub mavg_window: usize,
    /// Moving-average window of the cardiac signal, 0 or 1 disables (default: 0)
    pub mavg_window_card: usize,
    /// Axis of the data holding the time samples (default: TIME_DIM)
    pub cluster_dim: usize,
    /// Label channels forming the respiratory quadrature signal (default: [0, 1])
    pub resp_labels_idx: [usize; 2],
    /// Label channels forming the cardiac quadrature signal (default: [2, 3])
    pub card_labels_idx: [usize; 2],
    /// JSON file receiving the smoothed cardiac signal (default: none)
    pub card_out: Option<String>,
    /// Phase offsets in radians added before binning, [resp, card] (default: [0, 0])
    pub offset_angle: [f64; 2],
    /// Bin respiration by amplitude instead of phase (default: false)
    pub amplitude: bool,
}

pub const BIN_DEFAULTS: BinConfig = BinConfig {
    n_resp: 1,
    n_card: 1,
    mavg_window: 0,
    mavg_window_card: 0,
    cluster_dim: TIME_DIM,
    resp_labels_idx: [0, 1],
    card_labels_idx: [2, 3],
    card_out: None,
    offset_angle: [0.0, 0.0],
    amplitude: false,
};

impl Default for BinConfig {
    fn default() -> Self {
        BIN_DEFAULTS
    }
}

impl BinConfig {
    pub fn from_file(path: &str) -> MobaResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_bins(mut self, n_resp: usize, n_card: usize) -> Self {
        self.n_resp = n_resp;
        self.n_card = n_card;
        self
    }

    pub fn with_windows(mut self, resp: usize, card: usize) -> Self {
        self.mavg_window = resp;
        self.mavg_window_card = card;
        self
    }

    pub fn validate(&self) -> MobaResult<()> {
        if self.n_resp == 0 || self.n_card == 0 {
            return Err(MobaError::ConfigError(format!(
                "bin counts must be >= 1, got {} x {}",
                self.n_resp, self.n_card
            )));
        }
        if self.offset_angle.iter().any(|a| !a.is_finite()) {
            return Err(MobaError::ConfigError(
                "offset_angle must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Centered moving average; the window shrinks at the ends.
pub fn moving_average(signal: &[Complex64], window: usize) -> Vec<Complex64> {
    if window <= 1 {
        return signal.to_vec();
    }
    let n = signal.len();
    let before = (window - 1) / 2;
    let after = window - 1 - before;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(Complex64::new(0.0, 0.0));
    for &z in signal {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + z);
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after + 1).min(n);
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

fn phase_bin(z: Complex64, offset: f64, n: usize) -> usize {
    let angle = (z.arg() + offset).rem_euclid(2.0 * PI);
    ((angle / (2.0 * PI) * n as f64) as usize).min(n - 1)
}

fn amplitude_bins(signal: &[Complex64], offset: f64, n: usize) -> Vec<usize> {
    let rot = Complex64::from_polar(1.0, offset);
    let amp: Vec<f64> = signal.iter().map(|&z| (z * rot).re).collect();
    let lo = amp.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = amp.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi <= lo {
        return vec![0; amp.len()];
    }
    amp.iter()
        .map(|&a| (((a - lo) / (hi - lo) * n as f64) as usize).min(n - 1))
        .collect()
}

#[derive(Debug, Clone)]
pub struct BinResult {
    /// Respiratory bin of each time sample.
    pub resp: Vec<usize>,
    /// Cardiac bin of each time sample.
    pub card: Vec<usize>,
    /// Samples per bin, `n_resp × n_card`.
    pub counts: Array2<usize>,
}

impl BinResult {
    pub fn samples(&self) -> usize {
        self.resp.len()
    }

    pub fn empty_bins(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }
}

fn quadrature(labels: &Array2<f64>, idx: [usize; 2]) -> Vec<Complex64> {
    labels
        .axis_iter(Axis(0))
        .map(|row| Complex64::new(row[idx[0]], row[idx[1]]))
        .collect()
}

/// Assign each row of `labels` (time samples × label channels) to a bin.
pub fn bin_quadrature(labels: &Array2<f64>, conf: &BinConfig) -> MobaResult<BinResult> {
    conf.validate()?;
    let channels = labels.ncols();
    if let Some(&bad) = conf
        .resp_labels_idx
        .iter()
        .chain(conf.card_labels_idx.iter())
        .find(|&&c| c >= channels)
    {
        return Err(MobaError::ConfigError(format!(
            "label channel {bad} out of range for {channels} channels"
        )));
    }
    if labels.iter().any(|v| !v.is_finite()) {
        return Err(MobaError::NonFinite("bin labels".to_string()));
    }

    let resp_sig = moving_average(&quadrature(labels, conf.resp_labels_idx), conf.mavg_window);
    let card_sig = moving_average(
        &quadrature(labels, conf.card_labels_idx),
        conf.mavg_window_card,
    );

    if let Some(path) = &conf.card_out {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &card_sig)?;
        tracing::debug!(path = %path, samples = card_sig.len(), "cardiac signal written");
    }

    let resp = if conf.amplitude {
        amplitude_bins(&resp_sig, conf.offset_angle[0], conf.n_resp)
    } else {
        resp_sig
            .iter()
            .map(|&z| phase_bin(z, conf.offset_angle[0], conf.n_resp))
            .collect()
    };
    let card: Vec<usize> = card_sig
        .iter()
        .map(|&z| phase_bin(z, conf.offset_angle[1], conf.n_card))
        .collect();

    let mut counts = Array2::zeros((conf.n_resp, conf.n_card));
    for (&r, &c) in resp.iter().zip(&card) {
        counts[[r, c]] += 1;
    }
    let result = BinResult { resp, card, counts };
    let empty = result.empty_bins();
    if empty > 0 {
        tracing::warn!(empty, bins = conf.n_resp * conf.n_card, "empty bins");
    }
    tracing::debug!(
        samples = result.samples(),
        n_resp = conf.n_resp,
        n_card = conf.n_card,
        amplitude = conf.amplitude,
        "quadrature binning"
    );
    Ok(result)
}

/// Per-bin mean of `data` along `conf.cluster_dim`.
///
/// The cluster axis collapses to one; respiratory bins go to `TIME_DIM`,
/// cardiac bins to `TIME2_DIM`. Empty bins stay zero.
pub fn bin_average(data: &CArray, bins: &BinResult, conf: &BinConfig) -> MobaResult<CArray> {
    conf.validate()?;
    let dims = Dims::new(data.shape());
    let axis = conf.cluster_dim;
    if (axis == TIME_DIM && conf.n_resp > 1) || (axis == TIME2_DIM && conf.n_card > 1) {
        return Err(MobaError::ConfigError(format!(
            "cluster_dim {axis} collides with a bin axis"
        )));
    }
    if axis >= dims.rank() || dims.rank() <= TIME2_DIM {
        return Err(MobaError::ConfigError(format!(
            "bin data of rank {} needs cluster_dim {axis} and the bin axes",
            dims.rank()
        )));
    }
    if dims.get(axis) != bins.samples() {
        return Err(MobaError::shape_mismatch(
            "bin data cluster axis",
            &[bins.samples()],
            &[dims.get(axis)],
        ));
    }
    if bins.counts.dim() != (conf.n_resp, conf.n_card) {
        return Err(MobaError::ConfigError(
            "bin result does not match the configured bin counts".to_string(),
        ));
    }
    for bin_axis in [TIME_DIM, TIME2_DIM] {
        if bin_axis != axis && dims.get(bin_axis) != 1 {
            return Err(MobaError::ConfigError(format!(
                "bin data must be singleton along axis {bin_axis}"
            )));
        }
    }

    let out_dims = dims
        .with(axis, 1)
        .with(TIME_DIM, conf.n_resp)
        .with(TIME2_DIM, conf.n_card);
    let mut out = CArray::zeros(out_dims.ix());
    for (idx, &v) in data.indexed_iter() {
        let mut pos = idx.slice().to_vec();
        let t = pos[axis];
        pos[axis] = 0;
        pos[TIME_DIM] = bins.resp[t];
        pos[TIME2_DIM] = bins.card[t];
        out[IxDyn(&pos)] += v;
    }
    for (idx, z) in out.indexed_iter_mut() {
        let n = bins.counts[[idx[TIME_DIM], idx[TIME2_DIM]]];
        if n > 1 {
            *z /= n as f64;
        }
    }
    Ok(out)
}
