// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Proton gyromagnetic ratio (rad s⁻¹ T⁻¹).
pub const GAMMA_H1: f64 = 2.675_221_874_4e8;

/// Proton gyromagnetic ratio over 2π (MHz/T).
pub const GAMMA_BAR_H1_MHZ: f64 = 42.577_478_518;

/// Main field strength used when none is configured (T).
pub const DEFAULT_FIELD_STRENGTH: f64 = 3.0;

/// Chemical shifts of the six-peak fat model relative to water (ppm).
/// Hernando et al., MRM 2010.
pub const FAT_PEAKS_PPM: [f64; 6] = [-3.80, -3.40, -2.60, -1.94, -0.39, 0.60];

/// Relative amplitudes of the six fat peaks (sum ≈ 1).
pub const FAT_PEAK_AMPLITUDES: [f64; 6] = [0.087, 0.693, 0.128, 0.004, 0.039, 0.048];

/// Chemical-shift frequency in kHz of a peak at `ppm` for field strength `b0` (T).
/// kHz pairs with echo times in ms.
pub fn ppm_to_khz(ppm: f64, b0: f64) -> f64 {
    ppm * GAMMA_BAR_H1_MHZ * b0 * 1e-3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fat_amplitudes_normalized() {
        let total: f64 = FAT_PEAK_AMPLITUDES.iter().sum();
        assert!((total - 1.0).abs() < 2e-3, "fat amplitudes sum to {total}");
    }

    #[test]
    fn test_main_fat_peak_at_3t() {
        // -3.4 ppm at 3 T is roughly -434 Hz
        let f = ppm_to_khz(-3.40, 3.0);
        assert!((f + 0.4343).abs() < 1e-3, "got {f} kHz");
    }
}
