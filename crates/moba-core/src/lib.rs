// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Linear, nonlinear and proximal operators.
//!
//! linop/nlop: operator contracts and combinators
//! prox: constraints for iterative solvers
//! lintest/nltest: numerical self-checks

pub mod linop;
pub mod lintest;
pub mod nlop;
pub mod nltest;
pub mod probe;
pub mod prox;
