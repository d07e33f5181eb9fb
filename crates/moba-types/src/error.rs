// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Errors
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MobaError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shape mismatch in {context}: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("No linearization point: apply() must run before a derivative is requested")]
    NoLinearizationPoint,

    #[error("Non-finite values in {0}")]
    NonFinite(String),

    #[error("ODE integration diverged at t={time}: {message}")]
    OdeDiverged { time: f64, message: String },

    #[error("Singular Fisher information matrix (condition number {condition:e})")]
    SingularFisher { condition: f64 },

    #[error("Linear algebra error: {0}")]
    LinAlg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MobaError {
    /// True for failures of the numerics (as opposed to caller or I/O errors).
    /// Solvers branch on this to skip or flag the affected case.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            MobaError::NonFinite(_)
                | MobaError::OdeDiverged { .. }
                | MobaError::SingularFisher { .. }
                | MobaError::LinAlg(_)
        )
    }

    pub fn shape_mismatch(context: &str, expected: &[usize], found: &[usize]) -> Self {
        MobaError::ShapeMismatch {
            context: context.to_string(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

pub type MobaResult<T> = Result<T, MobaError>;
