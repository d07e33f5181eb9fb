// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Field-Map Smoothness Weighting
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Sobolev preconditioning of the B0 field map.
//!
//! The field is represented by k-space coefficients `c`; the image-domain
//! map is `F⁻¹(w·c)` with `w(k) = (1 + a‖k‖²)^(−b/2)` over normalised
//! spatial frequencies. Large `a` and `b` penalise high frequencies
//! strongly, so the reconstructed map stays smooth.

use moba_core::linop::{check_shape, LinearOperator};
use moba_core::probe::LiveToken;
use moba_math::fft::{fft_axes, frequency, ifft_axes};
use moba_math::multind::CArray;
use moba_types::dims::{Dims, FFT_AXES};
use num_complex::Complex64;

pub struct SobolevWeight {
    dims: Dims,
    weight: CArray,
    _live: LiveToken,
}

impl SobolevWeight {
    pub fn new(dims: Dims, a: f64, b: f64) -> Self {
        let spatial: Vec<usize> = FFT_AXES.iter().filter(|&ax| ax < dims.rank()).collect();
        let weight = CArray::from_shape_fn(dims.ix(), |idx| {
            let k2: f64 = spatial
                .iter()
                .map(|&ax| frequency(idx[ax], dims.get(ax)).powi(2))
                .sum();
            Complex64::new((1.0 + a * k2).powf(-b / 2.0), 0.0)
        });
        SobolevWeight {
            dims,
            weight,
            _live: LiveToken::new(),
        }
    }

    pub fn weight(&self) -> &CArray {
        &self.weight
    }
}

impl LinearOperator for SobolevWeight {
    fn domain(&self) -> &Dims {
        &self.dims
    }

    fn codomain(&self) -> &Dims {
        &self.dims
    }

    fn forward(&self, src: &CArray) -> CArray {
        check_shape("sobolev forward", &self.dims, src);
        ifft_axes(&(&self.weight * src), FFT_AXES)
    }

    fn adjoint(&self, src: &CArray) -> CArray {
        check_shape("sobolev adjoint", &self.dims, src);
        &self.weight * &fft_axes(src, FFT_AXES)
    }

    fn normal(&self, src: &CArray) -> CArray {
        check_shape("sobolev normal", &self.dims, src);
        src * &self.weight.mapv(|w| w * w)
    }

    fn normal_inverse(&self, lambda: f64, src: &CArray) -> Option<CArray> {
        check_shape("sobolev normal inverse", &self.dims, src);
        Some(src / &self.weight.mapv(|w| w * w + lambda))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moba_core::lintest::{linop_test_adjoint, linop_test_normal};
    use ndarray::IxDyn;

    #[test]
    fn test_weight_peaks_at_dc() {
        let op = SobolevWeight::new(Dims::from([8, 6, 1]), 22.0, 6.0);
        let w = op.weight();
        assert_eq!(w[IxDyn(&[0, 0, 0])], Complex64::new(1.0, 0.0));
        assert!(w.iter().all(|z| z.re > 0.0 && z.re <= 1.0 && z.im == 0.0));
        // Nyquist along the first axis: (1 + 22/4)^(−3)
        let nyq = (1.0f64 + 22.0 * 0.25).powf(-3.0);
        assert!((w[IxDyn(&[4, 0, 0])].re - nyq).abs() < 1e-15);
    }

    #[test]
    fn test_adjoint_and_normal() {
        let op = SobolevWeight::new(Dims::from([8, 5, 1, 2]), 222.0, 32.0);
        assert!(linop_test_adjoint(&op) < 1e-10);
        assert!(linop_test_normal(&op) < 1e-10);
    }

    #[test]
    fn test_constant_coefficient_gives_flat_map() {
        let dims = Dims::from([4, 4, 1]);
        let op = SobolevWeight::new(dims.clone(), 22.0, 6.0);
        let mut c = CArray::zeros(dims.ix());
        c[IxDyn(&[0, 0, 0])] = Complex64::new(4.0, 0.0);
        let map = op.forward(&c);
        assert!(map.iter().all(|z| (z - Complex64::new(1.0, 0.0)).norm() < 1e-12));
    }
}
