// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Forward Models
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Differentiable MRI signal models.
//!
//! t1fun/t1phyfun: Look-Locker inversion recovery
//! ir_meco: joint T1, water/fat, R2* and B0
//! blochfun: voxel-wise Bloch simulation

pub mod blochfun;
pub mod fb0;
pub mod ir_meco;
pub mod pointwise;
pub mod t1fun;
pub mod t1phyfun;
