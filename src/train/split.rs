//! Deterministic stratified splitting.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Row indices on each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub held_out: Vec<usize>,
}

/// Split `rows` so each class keeps its proportion on both sides.
///
/// `labels[r]` is the class of row `r`. A class with at least two rows keeps
/// at least one on each side; a singleton class stays in `train`. Both sides
/// are shuffled so batches are not grouped by class.
pub fn stratified_split(
    rows: &[usize],
    labels: &[usize],
    held_out_fraction: f64,
    rng: &mut ChaCha8Rng,
) -> Split {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &row in rows {
        by_class.entry(labels[row]).or_default().push(row);
    }

    let mut train = Vec::with_capacity(rows.len());
    let mut held_out = Vec::new();
    for (_, mut members) in by_class {
        members.shuffle(rng);
        let n = members.len();
        let n_held = if n < 2 || held_out_fraction <= 0.0 {
            0
        } else {
            ((n as f64 * held_out_fraction).round() as usize).clamp(1, n - 1)
        };
        held_out.extend_from_slice(&members[..n_held]);
        train.extend_from_slice(&members[n_held..]);
    }

    train.shuffle(rng);
    held_out.shuffle(rng);
    Split { train, held_out }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn labels() -> Vec<usize> {
        // 50 of class 0, 30 of class 1, 20 of class 2
        (0..100)
            .map(|i| match i {
                0..=49 => 0,
                50..=79 => 1,
                _ => 2,
            })
            .collect()
    }

    #[test]
    fn keeps_class_proportions() {
        let labels = labels();
        let rows: Vec<usize> = (0..labels.len()).collect();
        let split = stratified_split(&rows, &labels, 0.2, &mut ChaCha8Rng::seed_from_u64(42));

        assert_eq!(split.train.len(), 80);
        assert_eq!(split.held_out.len(), 20);
        let held_per_class = |c| split.held_out.iter().filter(|&&r| labels[r] == c).count();
        assert_eq!(held_per_class(0), 10);
        assert_eq!(held_per_class(1), 6);
        assert_eq!(held_per_class(2), 4);
    }

    #[test]
    fn same_seed_same_split() {
        let labels = labels();
        let rows: Vec<usize> = (0..labels.len()).collect();
        let a = stratified_split(&rows, &labels, 0.2, &mut ChaCha8Rng::seed_from_u64(7));
        let b = stratified_split(&rows, &labels, 0.2, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn no_row_lost_or_duplicated() {
        let labels = labels();
        let rows: Vec<usize> = (10..90).collect();
        let split = stratified_split(&rows, &labels, 0.1, &mut ChaCha8Rng::seed_from_u64(1));
        let mut all: Vec<usize> = split.train.iter().chain(&split.held_out).copied().collect();
        all.sort_unstable();
        assert_eq!(all, rows);
    }

    #[test]
    fn small_classes_stay_on_both_sides() {
        let labels = vec![0, 0, 1];
        let split = stratified_split(&[0, 1, 2], &labels, 0.2, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(split.held_out.len(), 1);
        assert_eq!(labels[split.held_out[0]], 0);
        assert!(split.train.contains(&2));
    }
}
