// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Property-Based Tests (proptest) for moba-calib
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for moba-calib using proptest.
//!
//! Covers: constant data reproduces its mean in every bin, window-1 moving
//! average, bin counts partition the samples.

use moba_calib::bin::{bin_average, bin_quadrature, moving_average, BinConfig, BIN_DEFAULTS};
use moba_math::multind::CArray;
use moba_types::dims::{Dims, DIMS, SLICE_DIM, TIME2_DIM, TIME_DIM};
use ndarray::Array2;
use num_complex::Complex64;
use proptest::prelude::*;

fn labels(n: usize, values: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((n, 4), |(t, ch)| values[(t * 4 + ch) % values.len()])
}

proptest! {
    /// Every occupied bin of constant data averages to the constant.
    #[test]
    fn constant_data_keeps_global_mean(
        n in 4usize..40,
        n_resp in 1usize..5,
        n_card in 1usize..4,
        values in prop::collection::vec(-1.0f64..1.0, 16),
        re in -3.0f64..3.0,
        im in -3.0f64..3.0,
        amplitude in any::<bool>(),
    ) {
        let conf = BinConfig {
            cluster_dim: SLICE_DIM,
            amplitude,
            ..BIN_DEFAULTS.clone().with_bins(n_resp, n_card).with_windows(3, 2)
        };
        let bins = bin_quadrature(&labels(n, &values), &conf).unwrap();
        prop_assert_eq!(bins.counts.sum(), n);

        let value = Complex64::new(re, im);
        let data = CArray::from_elem(Dims::ones(DIMS).with(1, 2).with(SLICE_DIM, n).ix(), value);
        let avg = bin_average(&data, &bins, &conf).unwrap();
        for (idx, z) in avg.indexed_iter() {
            let count = bins.counts[[idx[TIME_DIM], idx[TIME2_DIM]]];
            if count > 0 {
                prop_assert!((z - value).norm() < 1e-12);
            } else {
                prop_assert_eq!(*z, Complex64::new(0.0, 0.0));
            }
        }
    }

    /// A window of one (or zero) returns the signal unchanged.
    #[test]
    fn unit_window_is_identity(
        parts in prop::collection::vec((-5.0f64..5.0, -5.0f64..5.0), 0..50),
        window in 0usize..2,
    ) {
        let sig: Vec<Complex64> = parts.iter().map(|&(a, b)| Complex64::new(a, b)).collect();
        prop_assert_eq!(moving_average(&sig, window), sig);
    }

    /// The moving average of a constant signal is that constant.
    #[test]
    fn moving_average_preserves_constants(
        n in 1usize..40,
        window in 1usize..12,
        v in -5.0f64..5.0,
    ) {
        let sig = vec![Complex64::new(v, -v); n];
        for z in moving_average(&sig, window) {
            prop_assert!((z - Complex64::new(v, -v)).norm() < 1e-12);
        }
    }
}
