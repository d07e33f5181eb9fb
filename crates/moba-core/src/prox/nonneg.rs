// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Non-Negativity Constraints
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use moba_types::dims::Dims;
use moba_types::error::{MobaError, MobaResult};

use super::{ProxZero, ProximalOperator, Stack, Zsmax};

/// Clamp `Re(x) ≥ floor` on the selected `positions` along `axis`; all
/// other positions pass through unchanged.
pub fn nonneg_stack(dims: Dims, axis: usize, positions: &[usize], floor: f64) -> MobaResult<Stack> {
    if axis >= dims.rank() {
        return Err(MobaError::ConfigError(format!(
            "nonneg axis {axis} out of range for rank {}",
            dims.rank()
        )));
    }
    let n = dims.get(axis);
    if let Some(&bad) = positions.iter().find(|&&p| p >= n) {
        return Err(MobaError::ConfigError(format!(
            "nonneg position {bad} out of range for extent {n}"
        )));
    }

    let slice = dims.with(axis, 1);
    let ops: Vec<Box<dyn ProximalOperator>> = (0..n)
        .map(|p| -> Box<dyn ProximalOperator> {
            if positions.contains(&p) {
                Box::new(Zsmax::new(slice.clone(), floor))
            } else {
                Box::new(ProxZero::new(slice.clone()))
            }
        })
        .collect();

    tracing::debug!(axis, ?positions, floor, "nonneg stack");
    Stack::new(dims, axis, ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moba_math::multind::{copy_block_in, znrmse, CArray};
    use num_complex::Complex64;

    #[test]
    fn test_selected_slice_is_cleared() {
        let dims = Dims::from([2, 4, 7, 5, 6]);
        let op = nonneg_stack(dims.clone(), 2, &[3], 0.0).unwrap();

        let x = CArray::from_elem(dims.ix(), Complex64::new(-1.0, 0.0));
        let mut y = CArray::zeros(dims.ix());
        op.apply(1.0, &mut y, &x);

        let mut expected = x.clone();
        let slice = CArray::zeros(dims.with(2, 1).ix());
        copy_block_in(&mut expected, &[0, 0, 3, 0, 0], &slice);
        assert_eq!(znrmse(&expected, &y), 0.0);
    }

    #[test]
    fn test_floor_respected_and_idempotent() {
        let dims = Dims::from([3, 4]);
        let op = nonneg_stack(dims.clone(), 1, &[0, 1, 2, 3], 0.25).unwrap();
        let x = CArray::from_shape_fn(dims.ix(), |i| {
            Complex64::new(i[0] as f64 - 1.0, i[1] as f64)
        });
        let mut y = CArray::zeros(dims.ix());
        op.apply(1.0, &mut y, &x);
        assert!(y.iter().all(|z| z.re >= 0.25));

        let mut z = CArray::zeros(dims.ix());
        op.apply(1.0, &mut z, &y);
        assert_eq!(z, y);
    }

    #[test]
    fn test_invalid_positions_rejected() {
        let dims = Dims::from([3, 4]);
        assert!(nonneg_stack(dims.clone(), 1, &[4], 0.0).is_err());
        assert!(nonneg_stack(dims, 2, &[0], 0.0).is_err());
    }
}
