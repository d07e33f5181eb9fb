// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Cramér-Rao Bounds
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Precision analysis of a sequence from its signal derivatives.
//!
//! For white complex Gaussian noise of unit variance the Fisher information
//! of real parameters is `F = Re(JᴴJ)`, with one row of `J` per unknown.
//! The Cramér-Rao bound of parameter `i` is `sqrt((F⁻¹)ᵢᵢ)`.

use moba_math::linalg::{condition_number, invert};
use moba_types::error::{MobaError, MobaResult};
use ndarray::Array2;
use num_complex::Complex64;
use std::fmt;

/// Names of the parameter rows, in derivative order.
pub const PARAM_LABELS: [&str; 5] = ["R1", "M0", "R2", "B1", "w"];

/// Fisher matrices above this condition number are rejected.
pub const MAX_CONDITION: f64 = 1e12;

/// Indices of the parameters treated as unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnknownSet {
    indices: Vec<usize>,
}

impl UnknownSet {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }
}

/// Unknown set from bit flags: bit `i` marks parameter `i` as unknown.
pub fn getidxunknowns(unknowns: u64, max_params: usize) -> MobaResult<UnknownSet> {
    if max_params < 64 && unknowns >> max_params != 0 {
        return Err(MobaError::ConfigError(format!(
            "unknown flags {unknowns:#b} exceed {max_params} parameters"
        )));
    }
    let indices = (0..max_params.min(64))
        .filter(|i| unknowns & (1 << i) != 0)
        .collect();
    Ok(UnknownSet { indices })
}

#[derive(Debug, Clone)]
pub struct CrbResult {
    /// Complex Gram matrix `JᴴJ`.
    pub gram: Array2<Complex64>,
    /// Real Fisher information `Re(JᴴJ)`.
    pub fisher: Array2<f64>,
    /// Diagonal of the inverse Fisher matrix.
    pub variances: Vec<f64>,
    /// Square roots of `variances`.
    pub bounds: Vec<f64>,
    /// Parameter index of each row; `None` is the signal reference.
    pub params: Vec<Option<usize>>,
    pub labels: Vec<String>,
}

/// Cramér-Rao bounds of the unknown parameters.
///
/// `derivatives[i]` is `∂signal/∂pᵢ` over `N` samples. When `signal` is
/// given it becomes the first unknown, which makes the bounds invariant to
/// an unknown global scaling.
pub fn compute_crb(
    derivatives: &[Vec<Complex64>],
    signal: Option<&[Complex64]>,
    unknowns: &UnknownSet,
) -> MobaResult<CrbResult> {
    let mut params: Vec<Option<usize>> = Vec::with_capacity(unknowns.len() + 1);
    let mut rows: Vec<&[Complex64]> = Vec::with_capacity(unknowns.len() + 1);
    if let Some(s) = signal {
        params.push(None);
        rows.push(s);
    }
    for &i in unknowns.indices() {
        let d = derivatives.get(i).ok_or_else(|| {
            MobaError::ConfigError(format!(
                "unknown {i} has no derivative ({} given)",
                derivatives.len()
            ))
        })?;
        params.push(Some(i));
        rows.push(d);
    }
    if rows.is_empty() {
        return Err(MobaError::ConfigError(
            "no unknowns selected for the CRB".to_string(),
        ));
    }
    let n = rows[0].len();
    if let Some(bad) = rows.iter().find(|r| r.len() != n) {
        return Err(MobaError::shape_mismatch("compute_crb", &[n], &[bad.len()]));
    }

    let p = rows.len();
    let gram = Array2::from_shape_fn((p, p), |(i, j)| {
        rows[i]
            .iter()
            .zip(rows[j])
            .map(|(a, b)| a.conj() * b)
            .sum::<Complex64>()
    });
    let fisher = gram.mapv(|z| z.re);

    let condition = condition_number(&fisher)?;
    if !condition.is_finite() || condition > MAX_CONDITION {
        tracing::warn!(condition, unknowns = p, "ill-conditioned Fisher information");
        return Err(MobaError::SingularFisher { condition });
    }
    let inverse = invert(&fisher)?;
    let variances: Vec<f64> = (0..p).map(|i| inverse[[i, i]]).collect();
    let bounds = standard_deviations(&variances, condition)?;

    let labels = params
        .iter()
        .map(|p| match p {
            None => "signal".to_string(),
            Some(i) => PARAM_LABELS
                .get(*i)
                .map_or_else(|| format!("p{i}"), |s| s.to_string()),
        })
        .collect();

    Ok(CrbResult {
        gram,
        fisher,
        variances,
        bounds,
        params,
        labels,
    })
}

/// Square roots of the inverse-Fisher diagonal. A negative or non-finite
/// variance means the inversion broke down.
fn standard_deviations(variances: &[f64], condition: f64) -> MobaResult<Vec<f64>> {
    if let Some(v) = variances.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
        tracing::warn!(variance = *v, condition, "negative variance in inverse Fisher");
        return Err(MobaError::SingularFisher { condition });
    }
    Ok(variances.iter().map(|v| v.sqrt()).collect())
}

/// Nominal tissue values used to express bounds relative to the parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrbNormalization {
    /// Longitudinal relaxation time (s).
    pub t1: f64,
    /// Transverse relaxation time (s).
    pub t2: f64,
    pub b1: f64,
    /// Off-resonance (rad/s).
    pub omega: f64,
}

impl Default for CrbNormalization {
    fn default() -> Self {
        CrbNormalization {
            t1: 1.0,
            t2: 0.1,
            b1: 1.0,
            omega: 0.0,
        }
    }
}

impl CrbNormalization {
    fn nominal(&self, param: Option<usize>) -> f64 {
        let v = match param {
            Some(0) => 1.0 / self.t1,
            Some(2) => 1.0 / self.t2,
            Some(3) => self.b1,
            Some(4) => self.omega,
            _ => 1.0,
        };
        if v == 0.0 || !v.is_finite() {
            1.0
        } else {
            v.abs()
        }
    }
}

/// Relative bounds normalized to the acquisition time `N·TR`:
/// `sqrt(var·N·TR) / |nominal|`. Comparable across sequences of different
/// length.
pub fn normalize_crb(result: &CrbResult, n: usize, tr: f64, nominal: &CrbNormalization) -> Vec<f64> {
    let time = n as f64 * tr;
    result
        .params
        .iter()
        .zip(&result.variances)
        .map(|(p, v)| (v.max(0.0) * time).sqrt() / nominal.nominal(*p))
        .collect()
}

impl fmt::Display for CrbResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fisher information:")?;
        write!(f, "{:>8}", "")?;
        for l in &self.labels {
            write!(f, " {l:>12}")?;
        }
        writeln!(f)?;
        for (i, l) in self.labels.iter().enumerate() {
            write!(f, "{l:>8}")?;
            for j in 0..self.labels.len() {
                write!(f, " {:>12.4e}", self.fisher[[i, j]])?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Cramér-Rao bounds:")?;
        for (l, b) in self.labels.iter().zip(&self.bounds) {
            writeln!(f, "{l:>8} {b:>12.4e}")?;
        }
        Ok(())
    }
}

/// Formatted Fisher matrix and bounds; also logged at info level.
pub fn display_crb(result: &CrbResult) -> String {
    let text = result.to_string();
    tracing::info!("\n{text}");
    text
}
