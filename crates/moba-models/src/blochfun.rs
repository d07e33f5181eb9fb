// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Bloch Signal Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Voxel-wise Bloch simulation as a differentiable operator.
//!
//! Coefficients `[R1, M0, R2, B1]` (each multiplied by `other.scale`) are
//! real parameters: imaginary parts are ignored by the forward model, the
//! derivative uses `Re(dx)` and the adjoint returns real updates. An
//! optional B1 map multiplies the B1 coefficient, an optional B0 map (rad/s)
//! replaces the configured off-resonance. Voxels with identical parameters
//! are simulated once per apply.

use moba_math::multind::CArray;
use moba_simu::bloch::{simulate, SimulationOutput, TissueParams, N_SENS, SENS_B1};
use moba_types::config::MobaConfig;
use moba_types::dims::{Dims, COEFF_DIM, TE_DIM};
use moba_types::error::{MobaError, MobaResult};
use ndarray::{Dimension, IxDyn};
use num_complex::Complex64;
use std::collections::HashMap;

use moba_core::nlop::{ForwardModel, Nlop};

use crate::pointwise::{check_model_dims, PointwiseJacobian};

pub struct BlochModel {
    map_dims: Dims,
    out_dims: Dims,
    in_dims: Dims,
    cfg: MobaConfig,
    b1_map: Option<CArray>,
    b0_map: Option<CArray>,
}

impl BlochModel {
    pub fn config(&self) -> &MobaConfig {
        &self.cfg
    }

    fn tissue(&self, x: &CArray, pos: &mut [usize], idx: &IxDyn) -> TissueParams {
        let mut p = [0.0; N_SENS];
        for (k, v) in p.iter_mut().enumerate() {
            pos[COEFF_DIM] = k;
            *v = x[IxDyn(&*pos)].re * self.cfg.other.scale[k];
        }
        pos[COEFF_DIM] = 0;
        TissueParams {
            r1: p[0],
            m0: p[1],
            r2: p[2],
            b1: p[3] * self.b1_scale(idx),
            w: self
                .b0_map
                .as_ref()
                .map_or(self.cfg.sim.voxel.w, |m| m[idx.clone()].re),
        }
    }

    fn b1_scale(&self, idx: &IxDyn) -> f64 {
        self.b1_map.as_ref().map_or(1.0, |m| m[idx.clone()].re)
    }
}

fn cache_key(p: &TissueParams) -> [u64; 5] {
    [p.r1, p.m0, p.r2, p.b1, p.w].map(f64::to_bits)
}

impl ForwardModel for BlochModel {
    type Linearization = PointwiseJacobian;

    fn input_dims(&self) -> &Dims {
        &self.in_dims
    }

    fn output_dims(&self) -> &Dims {
        &self.out_dims
    }

    fn evaluate(&self, x: &CArray) -> MobaResult<(CArray, PointwiseJacobian)> {
        let reps = self.out_dims.get(TE_DIM);
        let scale = self.cfg.other.scale;
        let mut signal = CArray::zeros(self.out_dims.ix());
        let mut partials: Vec<CArray> = (0..N_SENS)
            .map(|_| CArray::zeros(self.out_dims.ix()))
            .collect();
        let mut cache: HashMap<[u64; 5], SimulationOutput> = HashMap::new();
        let mut voxels = 0usize;

        for idx in ndarray::indices(self.map_dims.ix()) {
            let mut pos = idx.slice().to_vec();
            let tissue = self.tissue(x, &mut pos, &idx);
            let sim = match cache.entry(cache_key(&tissue)) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(simulate(&self.cfg.sim, &tissue)?)
                }
            };
            let b1_scale = self.b1_scale(&idx);
            for r in 0..reps {
                pos[TE_DIM] = r;
                let at = IxDyn(&pos);
                signal[at.clone()] = sim.signal[r];
                for (k, part) in partials.iter_mut().enumerate() {
                    let mut d = sim.sens[k][r] * scale[k];
                    if k == SENS_B1 {
                        d *= b1_scale;
                    }
                    part[at.clone()] = d;
                }
            }
            voxels += 1;
        }
        tracing::debug!(voxels, simulations = cache.len(), "bloch model");

        let jac = PointwiseJacobian::new(self.map_dims.clone(), COEFF_DIM, partials, true);
        Ok((signal, jac))
    }

    fn derivative(&self, lin: &PointwiseJacobian, dx: &CArray) -> CArray {
        lin.forward(dx)
    }

    fn adjoint(&self, lin: &PointwiseJacobian, dy: &CArray) -> CArray {
        lin.adjoint(dy)
    }
}

/// Bloch operator producing `seq.rep_num` samples along the echo axis.
///
/// `b1` and `b0` must have the map shape when given.
pub fn nlop_bloch_create(
    map_dims: &Dims,
    out_dims: &Dims,
    in_dims: &Dims,
    b1: Option<&CArray>,
    b0: Option<&CArray>,
    cfg: &MobaConfig,
) -> MobaResult<Nlop<BlochModel>> {
    check_model_dims("blochfun", map_dims, out_dims, in_dims, COEFF_DIM, N_SENS)?;
    cfg.validate()?;
    let reps = cfg.sim.seq.rep_num;
    if out_dims.get(TE_DIM) != reps || *out_dims != map_dims.with(TE_DIM, reps) {
        return Err(MobaError::shape_mismatch(
            "blochfun output",
            map_dims.with(TE_DIM, reps).as_slice(),
            out_dims.as_slice(),
        ));
    }
    for (name, map) in [("B1", b1), ("B0", b0)] {
        if let Some(m) = map {
            if m.shape() != map_dims.as_slice() {
                return Err(MobaError::shape_mismatch(
                    &format!("blochfun {name} map"),
                    map_dims.as_slice(),
                    m.shape(),
                ));
            }
        }
    }
    tracing::debug!(
        reps,
        seq = ?cfg.sim.seq.seq_type,
        sim = ?cfg.sim.seq.sim_type,
        b1_map = b1.is_some(),
        b0_map = b0.is_some(),
        "blochfun"
    );
    Ok(Nlop::new(BlochModel {
        map_dims: map_dims.clone(),
        out_dims: out_dims.clone(),
        in_dims: in_dims.clone(),
        cfg: cfg.clone(),
        b1_map: b1.cloned(),
        b0_map: b0.cloned(),
    }))
}
