// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Proximal Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Proximal operators `prox(μ, x)` for constrained iterative solvers.
//!
//! Operators have a fixed shape; `apply` writes only `dst` and panics when
//! either array has the wrong shape.

mod nonneg;
mod thresh;

pub use nonneg::nonneg_stack;
pub use thresh::{
    get_thresh_lambda, prox_niht_thresh_create, prox_thresh_create, prox_unithresh_create,
    set_thresh_lambda, NihtThresh, Thresh, ThresholdParameter,
};

use moba_math::multind::{copy_block_in, copy_block_out, zsmax, CArray};
use moba_types::dims::Dims;
use moba_types::error::{MobaError, MobaResult};

use crate::linop::{check_shape, LinearOperator};
use crate::probe::LiveToken;

pub trait ProximalOperator {
    fn dims(&self) -> &Dims;

    /// `dst ← prox(μ, src)`.
    fn apply(&self, mu: f64, dst: &mut CArray, src: &CArray);
}

fn check_io(context: &str, dims: &Dims, dst: &CArray, src: &CArray) {
    check_shape(context, dims, src);
    check_shape(context, dims, dst);
}

// ── Elementary operators ─────────────────────────────────────────────

/// Proximal operator of the zero function: the identity.
#[derive(Debug, Clone)]
pub struct ProxZero {
    dims: Dims,
    _live: LiveToken,
}

impl ProxZero {
    pub fn new(dims: Dims) -> Self {
        ProxZero {
            dims,
            _live: LiveToken::new(),
        }
    }
}

impl ProximalOperator for ProxZero {
    fn dims(&self) -> &Dims {
        &self.dims
    }

    fn apply(&self, _mu: f64, dst: &mut CArray, src: &CArray) {
        check_io("prox zero", &self.dims, dst, src);
        dst.assign(src);
    }
}

/// Projection onto `Re(x) ≥ floor`.
#[derive(Debug, Clone)]
pub struct Zsmax {
    dims: Dims,
    floor: f64,
    _live: LiveToken,
}

impl Zsmax {
    pub fn new(dims: Dims, floor: f64) -> Self {
        Zsmax {
            dims,
            floor,
            _live: LiveToken::new(),
        }
    }
}

impl ProximalOperator for Zsmax {
    fn dims(&self) -> &Dims {
        &self.dims
    }

    fn apply(&self, _mu: f64, dst: &mut CArray, src: &CArray) {
        check_io("prox zsmax", &self.dims, dst, src);
        dst.assign(&zsmax(src, self.floor));
    }
}

// ── Stack ────────────────────────────────────────────────────────────

/// One operator per position along `axis`, each acting on its slice.
pub struct Stack {
    dims: Dims,
    axis: usize,
    ops: Vec<Box<dyn ProximalOperator>>,
    _live: LiveToken,
}

impl Stack {
    /// Every operator must have the shape of a single slice.
    pub fn new(dims: Dims, axis: usize, ops: Vec<Box<dyn ProximalOperator>>) -> MobaResult<Self> {
        if axis >= dims.rank() {
            return Err(MobaError::ConfigError(format!(
                "stack axis {axis} out of range for rank {}",
                dims.rank()
            )));
        }
        if ops.len() != dims.get(axis) {
            return Err(MobaError::ConfigError(format!(
                "stack needs {} operators, got {}",
                dims.get(axis),
                ops.len()
            )));
        }
        let slice = dims.with(axis, 1);
        if let Some(bad) = ops.iter().find(|op| op.dims() != &slice) {
            return Err(MobaError::shape_mismatch(
                "stacked operator",
                slice.as_slice(),
                bad.dims().as_slice(),
            ));
        }
        Ok(Stack {
            dims,
            axis,
            ops,
            _live: LiveToken::new(),
        })
    }
}

impl ProximalOperator for Stack {
    fn dims(&self) -> &Dims {
        &self.dims
    }

    fn apply(&self, mu: f64, dst: &mut CArray, src: &CArray) {
        check_io("prox stack", &self.dims, dst, src);
        let slice = self.dims.with(self.axis, 1);
        let mut offset = vec![0; self.dims.rank()];
        let mut out = CArray::zeros(slice.ix());

        for (pos, op) in self.ops.iter().enumerate() {
            offset[self.axis] = pos;
            let part = copy_block_out(src, &offset, &slice);
            op.apply(mu, &mut out, &part);
            copy_block_in(dst, &offset, &out);
        }
    }
}

// ── Unitary ──────────────────────────────────────────────────────────

/// `Uᴴ·prox(μ, U·x)` for a unitary `U`.
pub struct Unitary<P> {
    prox: P,
    unitary: Box<dyn LinearOperator>,
    _live: LiveToken,
}

impl<P: ProximalOperator> Unitary<P> {
    pub fn new(prox: P, unitary: Box<dyn LinearOperator>) -> MobaResult<Self> {
        if unitary.codomain() != prox.dims() {
            return Err(MobaError::shape_mismatch(
                "unitary prox",
                prox.dims().as_slice(),
                unitary.codomain().as_slice(),
            ));
        }
        Ok(Unitary {
            prox,
            unitary,
            _live: LiveToken::new(),
        })
    }

    pub fn inner(&self) -> &P {
        &self.prox
    }
}

impl<P: ProximalOperator> ProximalOperator for Unitary<P> {
    fn dims(&self) -> &Dims {
        self.unitary.domain()
    }

    fn apply(&self, mu: f64, dst: &mut CArray, src: &CArray) {
        check_io("prox unitary", self.unitary.domain(), dst, src);
        let coeffs = self.unitary.forward(src);
        let mut shrunk = CArray::zeros(coeffs.raw_dim());
        self.prox.apply(mu, &mut shrunk, &coeffs);
        dst.assign(&self.unitary.adjoint(&shrunk));
    }
}
