//! Trajectory pruning: stubs and static particles.
//!
//! Two passes, in a fixed order: trajectories observed in fewer than
//! `min_frames` detections are dropped first, then the survivors whose net
//! displacement (first detection to last, Euclidean) falls below
//! `min_displacement` are dropped as well.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::linker::PositionColumns;
use crate::table::TrajectoryTable;
use crate::{Error, Result};

fn default_commit() -> bool {
    true
}

/// Trajectory filter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFilter {
    /// Minimum number of detections a trajectory must have.
    pub min_frames: usize,

    /// Minimum net displacement between first and last detection.
    pub min_displacement: f64,

    /// Whether the session commits the filtered table as its retained
    /// state. On by default; opt out with [`TrajectoryFilter::without_commit`].
    #[serde(default = "default_commit")]
    commit: bool,
}

impl TrajectoryFilter {
    pub fn new(min_frames: usize, min_displacement: f64) -> Self {
        Self {
            min_frames,
            min_displacement,
            commit: true,
        }
    }

    /// Return the filtered table without replacing the retained state.
    pub fn without_commit(mut self) -> Self {
        self.commit = false;
        self
    }

    pub fn commits(&self) -> bool {
        self.commit
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.min_displacement.is_finite() || self.min_displacement < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "min_displacement must be finite and non-negative, got {}",
                self.min_displacement
            )));
        }
        Ok(())
    }
}

/// Net displacement of one trajectory, first detection to last.
fn net_displacement(table: &TrajectoryTable, particle: u32, xi: usize, yi: usize) -> f64 {
    let rows = table.trajectory(particle);
    let (first, last) = match (rows.first(), rows.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return 0.0,
    };
    let dx = last.values[xi] - first.values[xi];
    let dy = last.values[yi] - first.values[yi];
    (dx * dx + dy * dy).sqrt()
}

/// Apply the length filter, then the displacement filter.
///
/// Returns a new table; the input is untouched. Fails with
/// `InvalidParameter` if a position column is absent or the displacement
/// threshold is invalid.
pub fn filter_trajectories(
    table: &TrajectoryTable,
    positions: &PositionColumns,
    filter: &TrajectoryFilter,
) -> Result<TrajectoryTable> {
    filter.validate()?;
    let xi = table.column_index(&positions.x).ok_or_else(|| {
        Error::InvalidParameter(format!("position column '{}' not in table", positions.x))
    })?;
    let yi = table.column_index(&positions.y).ok_or_else(|| {
        Error::InvalidParameter(format!("position column '{}' not in table", positions.y))
    })?;

    // Pass 1: detection counts
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for row in table.rows() {
        *counts.entry(row.particle).or_default() += 1;
    }
    let long_enough: BTreeSet<u32> = counts
        .iter()
        .filter(|(_, &n)| n >= filter.min_frames)
        .map(|(&id, _)| id)
        .collect();

    let mut filtered = table.clone();
    filtered.retain(|row| long_enough.contains(&row.particle));
    tracing::info!(
        "length filter (min {} frames): {} of {} particles remain",
        filter.min_frames,
        filtered.particle_count(),
        counts.len()
    );

    // Pass 2: net displacement, computed on the length-filtered table
    let moving: BTreeSet<u32> = filtered
        .particle_ids()
        .into_iter()
        .filter(|&id| net_displacement(&filtered, id, xi, yi) >= filter.min_displacement)
        .collect();
    filtered.retain(|row| moving.contains(&row.particle));
    tracing::info!(
        "displacement filter (min {}): {} particles remain",
        filter.min_displacement,
        filtered.particle_count()
    );

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TrajectoryRow;

    /// Build a trajectory table from (frame, particle, x, y) rows.
    fn trajectories(rows: &[(u32, u32, f64, f64)]) -> TrajectoryTable {
        let mut table = TrajectoryTable::new(vec!["centroid_x".into(), "centroid_y".into()]);
        for &(frame, particle, x, y) in rows {
            table
                .push(TrajectoryRow {
                    frame,
                    particle,
                    values: vec![x, y],
                })
                .unwrap();
        }
        table
    }

    fn apply(table: &TrajectoryTable, filter: &TrajectoryFilter) -> TrajectoryTable {
        filter_trajectories(table, &PositionColumns::default(), filter).unwrap()
    }

    #[test]
    fn test_permissive_filter_is_identity() {
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 0.0, 0.0), // zero net displacement
            (1, 1, 5.0, 5.0),
        ]);
        let filtered = apply(&table, &TrajectoryFilter::new(1, 0.0));
        assert_eq!(filtered, table);
    }

    #[test]
    fn test_length_filter_drops_stubs() {
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 3.0, 4.0),
            (3, 0, 6.0, 8.0),
            (2, 1, 9.0, 9.0), // single-frame stub
        ]);
        let filtered = apply(&table, &TrajectoryFilter::new(2, 0.0));
        assert_eq!(filtered.particle_ids(), vec![0]);
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_displacement_is_net_not_path_length() {
        // Particle 1 wanders out and returns: long path, zero net motion.
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 3.0, 4.0),
            (1, 1, 10.0, 10.0),
            (2, 1, 20.0, 10.0),
            (3, 1, 10.0, 10.0),
        ]);
        let filtered = apply(&table, &TrajectoryFilter::new(1, 1.0));
        assert_eq!(filtered.particle_ids(), vec![0]);
    }

    #[test]
    fn test_displacement_boundary_is_inclusive() {
        // Net displacement exactly 5.0 survives a 5.0 threshold.
        let table = trajectories(&[(1, 0, 0.0, 0.0), (2, 0, 3.0, 4.0)]);
        let filtered = apply(&table, &TrajectoryFilter::new(1, 5.0));
        assert_eq!(filtered.particle_count(), 1);
    }

    #[test]
    fn test_displacement_filter_is_monotonic() {
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 1.0, 0.0),
            (1, 1, 0.0, 10.0),
            (2, 1, 4.0, 10.0),
            (1, 2, 0.0, 20.0),
            (2, 2, 9.0, 20.0),
        ]);
        let mut previous = usize::MAX;
        for threshold in [0.0, 2.0, 5.0, 100.0] {
            let kept = apply(&table, &TrajectoryFilter::new(1, threshold)).particle_count();
            assert!(kept <= previous, "raising the threshold must never keep more");
            previous = kept;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_length_applies_before_displacement() {
        // Particle 1 moves far but is a stub: the length pass removes it
        // before displacement is ever measured.
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 5.0, 0.0),
            (1, 1, 0.0, 0.0),
        ]);
        let filtered = apply(&table, &TrajectoryFilter::new(2, 1.0));
        assert_eq!(filtered.particle_ids(), vec![0]);
    }

    #[test]
    fn test_negative_displacement_rejected() {
        let table = trajectories(&[(1, 0, 0.0, 0.0)]);
        let err = filter_trajectories(
            &table,
            &PositionColumns::default(),
            &TrajectoryFilter::new(1, -1.0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_commit_flag_round_trip() {
        let filter = TrajectoryFilter::new(3, 2.0);
        assert!(filter.commits());
        assert!(!filter.clone().without_commit().commits());
    }
}
