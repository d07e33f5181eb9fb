// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Dimensions and Axis Sets
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Array shapes and strongly typed axis selections.
//!
//! Every operator in the workspace describes its arrays by a [`Dims`] of at
//! most [`DIMS`] axes. The conventional meaning of each axis follows the
//! usual MRI layout (three spatial axes, coils, maps, echoes, coefficients,
//! ...), see the `*_DIM` constants.

use ndarray::IxDyn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum rank of any array.
pub const DIMS: usize = 16;

pub const READ_DIM: usize = 0;
pub const PHS1_DIM: usize = 1;
pub const PHS2_DIM: usize = 2;
pub const COIL_DIM: usize = 3;
pub const MAPS_DIM: usize = 4;
pub const TE_DIM: usize = 5;
pub const COEFF_DIM: usize = 6;
pub const COEFF2_DIM: usize = 7;
pub const ITER_DIM: usize = 8;
pub const CSHIFT_DIM: usize = 9;
pub const TIME_DIM: usize = 10;
pub const TIME2_DIM: usize = 11;
pub const LEVEL_DIM: usize = 12;
pub const SLICE_DIM: usize = 13;
pub const AVG_DIM: usize = 14;
pub const BATCH_DIM: usize = 15;

/// The three spatial axes.
pub const FFT_AXES: AxisSet = AxisSet(0b111);

// ── AxisSet ──────────────────────────────────────────────────────────

/// A subset of the axes `0..DIMS`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AxisSet(u16);

impl AxisSet {
    pub const EMPTY: AxisSet = AxisSet(0);

    /// Set containing only `axis`.
    ///
    /// # Panics
    /// If `axis >= DIMS`.
    pub const fn single(axis: usize) -> Self {
        assert!(axis < DIMS, "axis out of range");
        AxisSet(1 << axis)
    }

    pub fn from_axes(axes: &[usize]) -> Self {
        axes.iter().fold(Self::EMPTY, |set, &a| set.insert(a))
    }

    /// All axes below `rank`.
    pub fn all(rank: usize) -> Self {
        assert!(rank <= DIMS, "rank {rank} exceeds {DIMS}");
        if rank == DIMS {
            AxisSet(u16::MAX)
        } else {
            AxisSet((1u16 << rank) - 1)
        }
    }

    pub const fn from_bits(bits: u16) -> Self {
        AxisSet(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, axis: usize) -> bool {
        axis < DIMS && (self.0 >> axis) & 1 == 1
    }

    #[must_use]
    pub fn insert(self, axis: usize) -> Self {
        self.union(Self::single(axis))
    }

    #[must_use]
    pub fn remove(self, axis: usize) -> Self {
        AxisSet(self.0 & !Self::single(axis).0)
    }

    /// Axes below `rank` that are not in the set.
    #[must_use]
    pub fn complement(self, rank: usize) -> Self {
        AxisSet(!self.0 & Self::all(rank).0)
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        AxisSet(self.0 | other.0)
    }

    #[must_use]
    pub fn intersection(self, other: Self) -> Self {
        AxisSet(self.0 & other.0)
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Axes in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..DIMS).filter(move |&a| self.contains(a))
    }
}

impl fmt::Debug for AxisSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ── Dims ─────────────────────────────────────────────────────────────

/// Extents of a dense array, rank ≤ [`DIMS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims(Vec<usize>);

impl Dims {
    /// # Panics
    /// If more than [`DIMS`] extents are given.
    pub fn new(extents: &[usize]) -> Self {
        assert!(
            extents.len() <= DIMS,
            "rank {} exceeds maximum {DIMS}",
            extents.len()
        );
        Dims(extents.to_vec())
    }

    /// All-ones shape of the given rank.
    pub fn ones(rank: usize) -> Self {
        Self::new(&vec![1; rank])
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn get(&self, axis: usize) -> usize {
        self.0[axis]
    }

    /// Keep the extents of the selected axes, set all others to one.
    pub fn select(&self, axes: AxisSet) -> Dims {
        Dims(
            self.0
                .iter()
                .enumerate()
                .map(|(a, &n)| if axes.contains(a) { n } else { 1 })
                .collect(),
        )
    }

    /// Copy with `axis` set to `extent`.
    pub fn with(&self, axis: usize, extent: usize) -> Dims {
        let mut out = self.0.clone();
        out[axis] = extent;
        Dims(out)
    }

    /// Axes with an extent larger than one.
    pub fn nontrivial(&self) -> AxisSet {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 1)
            .fold(AxisSet::EMPTY, |set, (a, _)| set.insert(a))
    }

    /// True if every axis of `self` is either one or equal to the same axis of `target`.
    pub fn broadcasts_to(&self, target: &Dims) -> bool {
        self.rank() == target.rank()
            && self
                .0
                .iter()
                .zip(target.0.iter())
                .all(|(&a, &b)| a == 1 || a == b)
    }

    pub fn ix(&self) -> IxDyn {
        IxDyn(&self.0)
    }
}

impl<const N: usize> From<[usize; N]> for Dims {
    fn from(extents: [usize; N]) -> Self {
        Dims::new(&extents)
    }
}

impl From<&[usize]> for Dims {
    fn from(extents: &[usize]) -> Self {
        Dims::new(extents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_set_basic_ops() {
        let s = AxisSet::from_axes(&[0, 2, 5]);
        assert!(s.contains(0));
        assert!(!s.contains(1));
        assert_eq!(s.len(), 3);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 2, 5]);
        assert_eq!(s.remove(2).iter().collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(s.complement(4).iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(s.bits(), 0b100101);
    }

    #[test]
    fn test_axis_set_all_sixteen() {
        assert_eq!(AxisSet::all(DIMS).len(), DIMS);
        assert!(AxisSet::all(DIMS).complement(DIMS).is_empty());
        assert_eq!(FFT_AXES, AxisSet::from_axes(&[READ_DIM, PHS1_DIM, PHS2_DIM]));
    }

    #[test]
    #[should_panic]
    fn test_axis_out_of_range_panics() {
        let _ = AxisSet::single(DIMS);
    }

    #[test]
    fn test_dims_select_and_with() {
        let d = Dims::from([16, 16, 1, 1, 1, 4, 3]);
        assert_eq!(d.size(), 16 * 16 * 4 * 3);
        let map = d.select(AxisSet::from_axes(&[0, 1]));
        assert_eq!(map.as_slice(), &[16, 16, 1, 1, 1, 1, 1]);
        assert_eq!(d.with(TE_DIM, 1).get(TE_DIM), 1);
        assert_eq!(d.nontrivial(), AxisSet::from_axes(&[0, 1, TE_DIM, COEFF_DIM]));
    }

    #[test]
    fn test_dims_broadcasts_to() {
        let out = Dims::from([4, 4, 1, 5]);
        assert!(Dims::from([1, 1, 1, 5]).broadcasts_to(&out));
        assert!(Dims::from([4, 4, 1, 1]).broadcasts_to(&out));
        assert!(!Dims::from([4, 2, 1, 1]).broadcasts_to(&out));
        assert!(!Dims::from([4, 4, 1]).broadcasts_to(&out));
    }
}
