// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Pointwise Jacobians
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Jacobians of voxel-wise signal models.
//!
//! Every model in this crate maps a stack of parameter maps (one per
//! position along the coefficient axis) to a signal whose extra axes
//! (inversion times, echoes, repetitions) only depend on the voxel's own
//! parameters. The derivative is then a sum over parameters of partial
//! derivative arrays multiplied with the broadcast parameter update.

use moba_math::multind::{broadcast, select_param, stack_params, sum_to, zmul, zreal, CArray};
use moba_types::dims::Dims;
use moba_types::error::{MobaError, MobaResult};
use num_complex::Complex64;

/// Check the shape contract shared by the voxel-wise models: equal rank,
/// `P` parameters along `axis` of the input, and parameter maps that
/// broadcast to the output.
pub fn check_model_dims(
    context: &str,
    map_dims: &Dims,
    out_dims: &Dims,
    in_dims: &Dims,
    axis: usize,
    params: usize,
) -> MobaResult<()> {
    if in_dims.rank() != out_dims.rank() || map_dims.rank() != out_dims.rank() {
        return Err(MobaError::ShapeMismatch {
            context: context.to_string(),
            expected: out_dims.as_slice().to_vec(),
            found: in_dims.as_slice().to_vec(),
        });
    }
    if axis >= in_dims.rank() || in_dims.get(axis) != params {
        return Err(MobaError::ConfigError(format!(
            "{context}: expected {params} parameters along axis {axis}, input dims {:?}",
            in_dims.as_slice()
        )));
    }
    let maps = in_dims.with(axis, 1);
    if maps != *map_dims || !maps.broadcasts_to(out_dims) {
        return Err(MobaError::shape_mismatch(
            context,
            map_dims.as_slice(),
            maps.as_slice(),
        ));
    }
    Ok(())
}

/// Flatten `src` broadcast to `dims`, in logical (row-major) order.
pub fn flat(src: &CArray, dims: &Dims) -> Vec<Complex64> {
    broadcast(src, dims).iter().copied().collect()
}

/// Inverse of [`flat`].
pub fn unflat(dims: &Dims, data: Vec<Complex64>) -> MobaResult<CArray> {
    CArray::from_shape_vec(dims.ix(), data).map_err(|e| MobaError::ShapeMismatch {
        context: format!("unflat: {e}"),
        expected: dims.as_slice().to_vec(),
        found: Vec::new(),
    })
}

/// Parameter `k` of `x`, scaled and broadcast to `out` in flat order.
pub fn param_flat(x: &CArray, axis: usize, k: usize, scale: f64, out: &Dims) -> Vec<Complex64> {
    broadcast(&select_param(x, axis, k), out)
        .iter()
        .map(|&z| z * scale)
        .collect()
}

/// `dy = Σₖ Jₖ ⊙ dxₖ`, with `Jₖ` stored at output shape.
#[derive(Debug, Clone)]
pub struct PointwiseJacobian {
    map_dims: Dims,
    axis: usize,
    partials: Vec<CArray>,
    real: bool,
}

impl PointwiseJacobian {
    /// `real` restricts the parameters to real values: the derivative uses
    /// `Re(dx)` and the adjoint returns real parameter updates.
    pub fn new(map_dims: Dims, axis: usize, partials: Vec<CArray>, real: bool) -> Self {
        PointwiseJacobian {
            map_dims,
            axis,
            partials,
            real,
        }
    }

    pub fn partial(&self, k: usize) -> &CArray {
        &self.partials[k]
    }

    pub fn num_params(&self) -> usize {
        self.partials.len()
    }

    pub fn forward(&self, dx: &CArray) -> CArray {
        let mut acc: Option<CArray> = None;
        for (k, jk) in self.partials.iter().enumerate() {
            let mut d = select_param(dx, self.axis, k);
            if self.real {
                d = zreal(&d);
            }
            let term = zmul(jk, &d);
            acc = Some(match acc {
                Some(a) => a + term,
                None => term,
            });
        }
        acc.unwrap_or_else(|| CArray::zeros(self.map_dims.ix()))
    }

    pub fn adjoint(&self, dy: &CArray) -> CArray {
        let parts: Vec<CArray> = self
            .partials
            .iter()
            .map(|jk| {
                let g = sum_to(&zmul(&jk.mapv(|z| z.conj()), dy), &self.map_dims);
                if self.real {
                    zreal(&g)
                } else {
                    g
                }
            })
            .collect();
        stack_params(&parts, self.axis)
    }
}
