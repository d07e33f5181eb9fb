// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Random Arrays
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Gaussian random arrays for the verification utilities.
//!
//! Callers own the generator; seeding it makes every test reproducible.

use moba_types::dims::Dims;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::multind::CArray;

/// Circular complex Gaussian samples with E|z|² = 1.
pub fn gaussian_rand<R: Rng + ?Sized>(dims: &Dims, rng: &mut R) -> CArray {
    let s = std::f64::consts::FRAC_1_SQRT_2;
    CArray::from_shape_simple_fn(dims.ix(), || {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        Complex64::new(s * re, s * im)
    })
}

/// Standard normal real parts, zero imaginary parts.
pub fn real_gaussian_rand<R: Rng + ?Sized>(dims: &Dims, rng: &mut R) -> CArray {
    CArray::from_shape_simple_fn(dims.ix(), || {
        let re: f64 = rng.sample(StandardNormal);
        Complex64::new(re, 0.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let dims = Dims::from([8, 8]);
        let a = gaussian_rand(&dims, &mut StdRng::seed_from_u64(7));
        let b = gaussian_rand(&dims, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_power() {
        let dims = Dims::from([64, 64]);
        let a = gaussian_rand(&dims, &mut StdRng::seed_from_u64(1));
        let power = a.iter().map(|z| z.norm_sqr()).sum::<f64>() / dims.size() as f64;
        assert!((power - 1.0).abs() < 0.1, "mean power {power}");
    }

    #[test]
    fn test_real_variant_has_no_imaginary_part() {
        let a = real_gaussian_rand(&Dims::from([5, 3]), &mut StdRng::seed_from_u64(3));
        assert!(a.iter().all(|z| z.im == 0.0));
        assert!(a.iter().any(|z| z.re != 0.0));
    }
}
