// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Small Dense Linear Algebra
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Linear algebra utilities.
//!
//! Symmetric eigenvalues by cyclic Jacobi rotations, Gauss-Jordan inversion
//! with partial pivoting, spectral condition number. Sized for Fisher
//! matrices (a handful of unknowns).

use moba_types::error::{MobaError, MobaResult};
use ndarray::{Array1, Array2};

const JACOBI_MAX_SWEEPS: usize = 100;

fn check_square(a: &Array2<f64>, context: &str) -> MobaResult<usize> {
    let (m, n) = a.dim();
    if m != n {
        return Err(MobaError::LinAlg(format!(
            "{context}: matrix is {m}x{n}, expected square"
        )));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(MobaError::NonFinite(format!("{context}: matrix entries")));
    }
    Ok(n)
}

/// Eigenvalues of a real symmetric matrix, ascending.
pub fn jacobi_eigenvalues(a: &Array2<f64>) -> MobaResult<Array1<f64>> {
    let n = check_square(a, "jacobi_eigenvalues")?;
    let mut s = a.clone();
    let scale = s.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-300);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off_diag = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                off_diag += s[[i, j]].abs();
            }
        }
        if off_diag < 1e-15 * scale {
            break;
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if s[[i, j]].abs() < 1e-300 {
                    continue;
                }
                let tau = (s[[j, j]] - s[[i, i]]) / (2.0 * s[[i, j]]);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let cos = 1.0 / (1.0 + t * t).sqrt();
                let sin = t * cos;

                let aii = s[[i, i]];
                let ajj = s[[j, j]];
                let aij = s[[i, j]];
                s[[i, i]] = cos * cos * aii - 2.0 * sin * cos * aij + sin * sin * ajj;
                s[[j, j]] = sin * sin * aii + 2.0 * sin * cos * aij + cos * cos * ajj;
                s[[i, j]] = 0.0;
                s[[j, i]] = 0.0;

                for r in 0..n {
                    if r == i || r == j {
                        continue;
                    }
                    let ri = s[[r, i]];
                    let rj = s[[r, j]];
                    s[[r, i]] = cos * ri - sin * rj;
                    s[[i, r]] = s[[r, i]];
                    s[[r, j]] = sin * ri + cos * rj;
                    s[[j, r]] = s[[r, j]];
                }
            }
        }
    }

    let mut eig: Vec<f64> = (0..n).map(|i| s[[i, i]]).collect();
    eig.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    Ok(Array1::from(eig))
}

/// |λ_max| / |λ_min| of a symmetric matrix; infinite when singular.
pub fn condition_number(a: &Array2<f64>) -> MobaResult<f64> {
    let eig = jacobi_eigenvalues(a)?;
    let (lo, hi) = eig
        .iter()
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), v| {
            (lo.min(v.abs()), hi.max(v.abs()))
        });
    if eig.is_empty() {
        return Ok(1.0);
    }
    if lo == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(hi / lo)
}

/// Inverse by Gauss-Jordan elimination with partial pivoting.
pub fn invert(a: &Array2<f64>) -> MobaResult<Array2<f64>> {
    let n = check_square(a, "invert")?;
    let mut m = a.clone();
    let mut inv = Array2::<f64>::eye(n);
    let scale = m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&p, &q| {
                m[[p, col]]
                    .abs()
                    .partial_cmp(&m[[q, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        let pv = m[[pivot, col]];
        if pv.abs() <= 1e-14 * scale || pv == 0.0 {
            return Err(MobaError::LinAlg(format!(
                "invert: singular matrix (pivot {pv:e} in column {col})"
            )));
        }
        if pivot != col {
            for k in 0..n {
                m.swap([pivot, k], [col, k]);
                inv.swap([pivot, k], [col, k]);
            }
        }

        let inv_p = 1.0 / pv;
        for k in 0..n {
            m[[col, k]] *= inv_p;
            inv[[col, k]] *= inv_p;
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let f = m[[r, col]];
            if f == 0.0 {
                continue;
            }
            for k in 0..n {
                m[[r, k]] -= f * m[[col, k]];
                inv[[r, k]] -= f * inv[[col, k]];
            }
        }
    }

    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_eigenvalues_diagonal() {
        let a = array![[3.0, 0.0], [0.0, 5.0]];
        let eig = jacobi_eigenvalues(&a).unwrap();
        assert!((eig[0] - 3.0).abs() < 1e-10);
        assert!((eig[1] - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_eigenvalues_symmetric() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let eig = jacobi_eigenvalues(&a).unwrap();
        assert!((eig[0] - 1.0).abs() < 1e-10);
        assert!((eig[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_eigenvalue_sum_is_trace() {
        let a = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];
        let eig = jacobi_eigenvalues(&a).unwrap();
        assert!((eig.sum() - 8.0).abs() < 1e-10);
        assert!(eig.windows(2).into_iter().all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_invert_roundtrip() {
        let a = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];
        let inv = invert(&a).unwrap();
        let prod = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (prod[[i, j]] - expected).abs() < 1e-12,
                    "A·A⁻¹ failed at ({i}, {j})"
                );
            }
        }
    }

    #[test]
    fn test_invert_needs_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let inv = invert(&a).unwrap();
        assert_eq!(inv, a);
    }

    #[test]
    fn test_invert_singular_errors() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let err = invert(&a).unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn test_condition_number() {
        let a = array![[10.0, 0.0], [0.0, 0.1]];
        assert!((condition_number(&a).unwrap() - 100.0).abs() < 1e-9);
        let s = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(condition_number(&s).unwrap() > 1e12);
    }

    #[test]
    fn test_non_square_rejected() {
        let a = Array2::<f64>::zeros((2, 3));
        assert!(invert(&a).is_err());
        assert!(jacobi_eigenvalues(&a).is_err());
    }
}
