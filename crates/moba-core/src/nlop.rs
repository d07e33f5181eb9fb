// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Nonlinear Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Differentiable operators with cached linearization points.
//!
//! `apply` evaluates the operator and stores whatever the derivative needs in
//! `last_point`. Derivatives borrow that point, so the borrow checker rejects
//! a derivative that would outlive the next `apply`.

use moba_math::multind::{all_finite, CArray};
use moba_types::dims::Dims;
use moba_types::error::{MobaError, MobaResult};

use crate::linop::{check_shape, LinearOperator, Zero};
use crate::probe::LiveToken;

/// A (multi-input, multi-output) differentiable function.
pub trait NonlinearOperator {
    fn domain(&self) -> &[Dims];
    fn codomain(&self) -> &[Dims];

    /// Evaluate at `inputs` and record the linearization point.
    ///
    /// Panics if the number or shapes of the inputs differ from `domain()`.
    fn apply(&mut self, inputs: &[&CArray]) -> MobaResult<Vec<CArray>>;

    /// ∂output_o / ∂input_i at the last point.
    ///
    /// Panics if `o` or `i` is out of range.
    fn derivative(&self, o: usize, i: usize) -> MobaResult<Box<dyn LinearOperator + '_>>;
}

/// A single-input, single-output forward model.
pub trait ForwardModel {
    /// Data kept between `evaluate` and the derivative calls.
    type Linearization;

    fn input_dims(&self) -> &Dims;
    fn output_dims(&self) -> &Dims;

    fn evaluate(&self, x: &CArray) -> MobaResult<(CArray, Self::Linearization)>;

    /// Directional derivative `DF(x)·dx`.
    fn derivative(&self, lin: &Self::Linearization, dx: &CArray) -> CArray;

    /// Adjoint derivative `DF(x)ᴴ·dy`.
    fn adjoint(&self, lin: &Self::Linearization, dy: &CArray) -> CArray;
}

/// [`NonlinearOperator`] wrapper around a [`ForwardModel`].
pub struct Nlop<M: ForwardModel> {
    model: M,
    domain: [Dims; 1],
    codomain: [Dims; 1],
    last_point: Option<M::Linearization>,
    _live: LiveToken,
}

impl<M: ForwardModel> Nlop<M> {
    pub fn new(model: M) -> Self {
        let domain = [model.input_dims().clone()];
        let codomain = [model.output_dims().clone()];
        Nlop {
            model,
            domain,
            codomain,
            last_point: None,
            _live: LiveToken::new(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn last_point(&self) -> Option<&M::Linearization> {
        self.last_point.as_ref()
    }

    /// Single-input convenience for [`NonlinearOperator::apply`].
    pub fn forward(&mut self, x: &CArray) -> MobaResult<CArray> {
        let mut out = self.apply(&[x])?;
        Ok(out.remove(0))
    }
}

impl<M: ForwardModel> NonlinearOperator for Nlop<M> {
    fn domain(&self) -> &[Dims] {
        &self.domain
    }

    fn codomain(&self) -> &[Dims] {
        &self.codomain
    }

    fn apply(&mut self, inputs: &[&CArray]) -> MobaResult<Vec<CArray>> {
        assert_eq!(inputs.len(), 1, "nlop apply: expected one input");
        check_shape("nlop apply", &self.domain[0], inputs[0]);

        self.last_point = None;
        let (out, lin) = self.model.evaluate(inputs[0])?;
        if !all_finite(&out) {
            return Err(MobaError::NonFinite("nlop output".to_string()));
        }
        self.last_point = Some(lin);
        Ok(vec![out])
    }

    fn derivative(&self, o: usize, i: usize) -> MobaResult<Box<dyn LinearOperator + '_>> {
        assert!(o == 0 && i == 0, "nlop derivative index ({o}, {i}) out of range");
        let lin = self
            .last_point
            .as_ref()
            .ok_or(MobaError::NoLinearizationPoint)?;
        Ok(Box::new(Derivative {
            model: &self.model,
            lin,
            domain: &self.domain[0],
            codomain: &self.codomain[0],
            _live: LiveToken::new(),
        }))
    }
}

/// Linearization of a [`ForwardModel`] at a recorded point.
pub struct Derivative<'a, M: ForwardModel> {
    model: &'a M,
    lin: &'a M::Linearization,
    domain: &'a Dims,
    codomain: &'a Dims,
    _live: LiveToken,
}

impl<M: ForwardModel> LinearOperator for Derivative<'_, M> {
    fn domain(&self) -> &Dims {
        self.domain
    }

    fn codomain(&self) -> &Dims {
        self.codomain
    }

    fn forward(&self, src: &CArray) -> CArray {
        check_shape("derivative forward", self.domain, src);
        self.model.derivative(self.lin, src)
    }

    fn adjoint(&self, src: &CArray) -> CArray {
        check_shape("derivative adjoint", self.codomain, src);
        self.model.adjoint(self.lin, src)
    }
}

// ── Combination ──────────────────────────────────────────────────────

/// Two independent operators side by side: inputs and outputs of `a` come
/// first, those of `b` after. Cross-derivatives are zero.
pub struct Combined<A, B> {
    a: A,
    b: B,
    domain: Vec<Dims>,
    codomain: Vec<Dims>,
}

impl<A: NonlinearOperator, B: NonlinearOperator> Combined<A, B> {
    pub fn new(a: A, b: B) -> Self {
        let domain = a.domain().iter().chain(b.domain()).cloned().collect();
        let codomain = a.codomain().iter().chain(b.codomain()).cloned().collect();
        Combined {
            a,
            b,
            domain,
            codomain,
        }
    }
}

impl<A: NonlinearOperator, B: NonlinearOperator> NonlinearOperator for Combined<A, B> {
    fn domain(&self) -> &[Dims] {
        &self.domain
    }

    fn codomain(&self) -> &[Dims] {
        &self.codomain
    }

    fn apply(&mut self, inputs: &[&CArray]) -> MobaResult<Vec<CArray>> {
        assert_eq!(
            inputs.len(),
            self.domain.len(),
            "combined apply: wrong number of inputs"
        );
        let split = self.a.domain().len();
        let mut out = self.a.apply(&inputs[..split])?;
        out.extend(self.b.apply(&inputs[split..])?);
        Ok(out)
    }

    fn derivative(&self, o: usize, i: usize) -> MobaResult<Box<dyn LinearOperator + '_>> {
        assert!(
            o < self.codomain.len() && i < self.domain.len(),
            "combined derivative index ({o}, {i}) out of range"
        );
        let (na_out, na_in) = (self.a.codomain().len(), self.a.domain().len());
        match (o < na_out, i < na_in) {
            (true, true) => self.a.derivative(o, i),
            (false, false) => self.b.derivative(o - na_out, i - na_in),
            _ => Ok(Box::new(Zero::new(
                self.domain[i].clone(),
                self.codomain[o].clone(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lintest::linop_test_adjoint;
    use crate::probe::live_operators;
    use ndarray::IxDyn;
    use num_complex::Complex64;

    /// y = x², element-wise.
    struct Square {
        dims: Dims,
    }

    impl ForwardModel for Square {
        type Linearization = CArray;

        fn input_dims(&self) -> &Dims {
            &self.dims
        }
        fn output_dims(&self) -> &Dims {
            &self.dims
        }
        fn evaluate(&self, x: &CArray) -> MobaResult<(CArray, CArray)> {
            Ok((x.mapv(|z| z * z), x.mapv(|z| z * 2.0)))
        }
        fn derivative(&self, lin: &CArray, dx: &CArray) -> CArray {
            lin * dx
        }
        fn adjoint(&self, lin: &CArray, dy: &CArray) -> CArray {
            lin.mapv(|z| z.conj()) * dy
        }
    }

    fn square(n: usize) -> Nlop<Square> {
        Nlop::new(Square {
            dims: Dims::from([n]),
        })
    }

    fn ramp(n: usize) -> CArray {
        CArray::from_shape_fn(IxDyn(&[n]), |i| Complex64::new(i[0] as f64, 1.0))
    }

    #[test]
    fn test_derivative_before_apply_errors() {
        let op = square(4);
        let err = op.derivative(0, 0).err().unwrap();
        assert!(matches!(err, MobaError::NoLinearizationPoint));
    }

    #[test]
    fn test_apply_then_derivative() {
        let mut op = square(4);
        let y = op.forward(&ramp(4)).unwrap();
        assert_eq!(y[[2]], Complex64::new(2.0, 1.0) * Complex64::new(2.0, 1.0));
        let d = op.derivative(0, 0).unwrap();
        assert!(linop_test_adjoint(&*d) < 1e-12);
    }

    #[test]
    fn test_non_finite_output_clears_point() {
        let mut op = square(2);
        op.forward(&ramp(2)).unwrap();
        let bad = CArray::from_elem(IxDyn(&[2]), Complex64::new(f64::INFINITY, 0.0));
        let err = op.forward(&bad).unwrap_err();
        assert!(err.is_numerical());
        assert!(op.last_point().is_none());
        assert!(op.derivative(0, 0).is_err());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_bad_derivative_index_panics() {
        let mut op = square(2);
        op.forward(&ramp(2)).unwrap();
        let _ = op.derivative(0, 1);
    }

    #[test]
    fn test_combined_cross_derivatives_vanish() {
        let mut op = Combined::new(square(3), square(5));
        assert_eq!(op.domain().len(), 2);
        let (x0, x1) = (ramp(3), ramp(5));
        let out = op.apply(&[&x0, &x1]).unwrap();
        assert_eq!(out[1].shape(), &[5]);

        let cross = op.derivative(1, 0).unwrap();
        assert_eq!(cross.domain(), &Dims::from([3]));
        assert_eq!(cross.codomain(), &Dims::from([5]));
        assert!(cross.forward(&x0).iter().all(|z| z.norm() == 0.0));

        let d11 = op.derivative(1, 1).unwrap();
        let dy = d11.forward(&x1);
        assert_eq!(dy[[4]], Complex64::new(8.0, 2.0) * Complex64::new(4.0, 1.0));
    }

    #[test]
    fn test_create_drop_leaves_probe_at_baseline() {
        let base = live_operators();
        {
            let mut op = square(3);
            op.forward(&ramp(3)).unwrap();
            let _d = op.derivative(0, 0).unwrap();
            assert_eq!(live_operators(), base + 2);
        }
        assert_eq!(live_operators(), base);
    }
}
