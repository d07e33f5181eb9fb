// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Simulation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Bloch simulation of MR sequences with parameter sensitivities, and
//! Cramér-Rao precision analysis built on them.

pub mod bloch;
pub mod crb;
pub mod pulse;
