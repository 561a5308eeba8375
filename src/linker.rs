//! Frame-to-frame trajectory linking.
//!
//! Walks the detection table in strictly increasing frame order, carrying
//! a buffer of active trajectories (most recent position + frame of last
//! detection). Each frame transition is resolved as a global minimum-cost
//! assignment between active trajectories and the frame's detections,
//! gated by the search distance. Trajectories undetected for more than the
//! memory window are terminated permanently; their identities are never
//! reused.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::assignment::min_cost_pairs;
use crate::table::{FeatureTable, TrajectoryRow, TrajectoryTable};
use crate::{Error, Result};

/// Names of the two feature columns holding the spatial position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionColumns {
    pub x: String,
    pub y: String,
}

impl PositionColumns {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }
}

impl Default for PositionColumns {
    fn default() -> Self {
        Self::new("centroid_x", "centroid_y")
    }
}

/// Linking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Maximum distance a particle may move between consecutive detections.
    pub search_distance: f64,

    /// Number of frames a particle may go undetected before its trajectory
    /// is terminated. 0 requires a detection in every consecutive frame.
    pub memory: u32,
}

impl LinkConfig {
    pub fn new(search_distance: f64, memory: u32) -> Self {
        Self {
            search_distance,
            memory,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.search_distance.is_finite() || self.search_distance < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "search_distance must be finite and non-negative, got {}",
                self.search_distance
            )));
        }
        Ok(())
    }
}

/// Counters reported by a link run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSummary {
    /// Number of distinct particle identities produced.
    pub particle_count: usize,

    /// Number of distinct frames processed.
    pub frame_count: usize,
}

/// An unterminated trajectory: its identity and last known detection.
struct ActiveTrack {
    id: u32,
    x: f64,
    y: f64,
    last_frame: u32,
}

/// Assign a particle identity to every detection.
///
/// # Arguments
/// * `features` - The full per-frame detection table
/// * `positions` - Pair of column names designating the position
/// * `config` - Search distance and memory window
///
/// # Returns
/// The linked table (same rows and order as the input, each carrying its
/// particle id) and a summary. Fails with `PrerequisiteMissing` if the
/// detection table is empty and `InvalidParameter` if a position column is
/// absent or the search distance is invalid.
pub fn link(
    features: &FeatureTable,
    positions: &PositionColumns,
    config: &LinkConfig,
) -> Result<(TrajectoryTable, LinkSummary)> {
    config.validate()?;
    if features.is_empty() {
        return Err(Error::PrerequisiteMissing(
            "detection table is empty; extract features before linking".to_string(),
        ));
    }

    let xi = features.column_index(&positions.x).ok_or_else(|| {
        Error::InvalidParameter(format!("position column '{}' not in table", positions.x))
    })?;
    let yi = features.column_index(&positions.y).ok_or_else(|| {
        Error::InvalidParameter(format!("position column '{}' not in table", positions.y))
    })?;

    // Row indices per frame; BTreeMap walks frames in increasing order.
    let mut by_frame: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, row) in features.rows().iter().enumerate() {
        by_frame.entry(row.frame).or_default().push(i);
    }

    let position_of =
        |row: usize| -> (f64, f64) { (features.rows()[row].values[xi], features.rows()[row].values[yi]) };

    let mut active: Vec<ActiveTrack> = Vec::new();
    let mut next_id: u32 = 0;
    let mut assigned = vec![0u32; features.len()];

    for (&frame, detections) in &by_frame {
        // A track last seen at frame t may still match at frame t' when
        // the number of undetected frames t' - t - 1 is within the memory
        // window. Anything older is terminated for good.
        active.retain(|t| frame - t.last_frame <= config.memory + 1);

        // Rows = active tracks in ascending id order, cols = detections in
        // table order; both orders are what makes tie-breaking reproducible.
        let costs = DMatrix::from_fn(active.len(), detections.len(), |i, j| {
            let (x, y) = position_of(detections[j]);
            ((active[i].x - x).powi(2) + (active[i].y - y).powi(2)).sqrt()
        });

        let mut matched = vec![None; detections.len()];
        for pair in min_cost_pairs(&costs, config.search_distance) {
            let track = &mut active[pair.row];
            let (x, y) = position_of(detections[pair.col]);
            track.x = x;
            track.y = y;
            track.last_frame = frame;
            matched[pair.col] = Some(track.id);
        }

        for (j, &row) in detections.iter().enumerate() {
            assigned[row] = match matched[j] {
                Some(id) => id,
                None => {
                    let id = next_id;
                    next_id += 1;
                    let (x, y) = position_of(row);
                    active.push(ActiveTrack {
                        id,
                        x,
                        y,
                        last_frame: frame,
                    });
                    id
                }
            };
        }
    }

    let mut linked = TrajectoryTable::new(features.columns().to_vec());
    for (i, row) in features.rows().iter().enumerate() {
        linked.push(TrajectoryRow {
            frame: row.frame,
            particle: assigned[i],
            values: row.values.clone(),
        })?;
    }

    let summary = LinkSummary {
        particle_count: next_id as usize,
        frame_count: by_frame.len(),
    };
    tracing::info!(
        "linked {} particles across {} frames",
        summary.particle_count,
        summary.frame_count
    );
    Ok((linked, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FeatureRow;

    /// Build a position-only table from (frame, x, y) triples.
    fn positions_table(points: &[(u32, f64, f64)]) -> FeatureTable {
        let mut table = FeatureTable::new(vec!["centroid_x".into(), "centroid_y".into()]);
        for &(frame, x, y) in points {
            table
                .push(FeatureRow {
                    frame,
                    values: vec![x, y],
                })
                .unwrap();
        }
        table
    }

    fn link_default(table: &FeatureTable, config: &LinkConfig) -> (TrajectoryTable, LinkSummary) {
        link(table, &PositionColumns::default(), config).unwrap()
    }

    #[test]
    fn test_two_parallel_particles() {
        // Two particles drifting diagonally, one step per frame.
        let table = positions_table(&[
            (1, 0.0, 0.0),
            (1, 10.0, 10.0),
            (2, 1.0, 1.0),
            (2, 11.0, 11.0),
            (3, 2.0, 2.0),
            (3, 12.0, 12.0),
        ]);
        let (linked, summary) = link_default(&table, &LinkConfig::new(3.0, 0));

        assert_eq!(summary.particle_count, 2);
        assert_eq!(summary.frame_count, 3);
        assert_eq!(linked.particle_ids(), vec![0, 1]);
        assert_eq!(linked.trajectory(0).len(), 3);
        assert_eq!(linked.trajectory(1).len(), 3);

        // Identity 0 is the particle first seen at (0,0)
        let traj: Vec<(u32, f64)> = linked
            .trajectory(0)
            .iter()
            .map(|r| (r.frame, r.values[0]))
            .collect();
        assert_eq!(traj, vec![(1, 0.0), (2, 1.0), (3, 2.0)]);
    }

    #[test]
    fn test_zero_search_distance_never_spans_frames() {
        let table = positions_table(&[(1, 0.0, 0.0), (2, 0.5, 0.0), (3, 1.0, 0.0)]);
        let (linked, summary) = link_default(&table, &LinkConfig::new(0.0, 0));

        assert_eq!(summary.particle_count, 3);
        for id in linked.particle_ids() {
            assert_eq!(linked.trajectory(id).len(), 1);
        }
    }

    #[test]
    fn test_zero_search_distance_links_identical_positions() {
        let table = positions_table(&[(1, 4.0, 2.0), (2, 4.0, 2.0)]);
        let (linked, summary) = link_default(&table, &LinkConfig::new(0.0, 0));

        assert_eq!(summary.particle_count, 1);
        assert_eq!(linked.trajectory(0).len(), 2);
    }

    #[test]
    fn test_memory_window_terminates_or_bridges() {
        // Detected at frames 1 and 4: undetected for 2 frames.
        let points = [(1, 0.0, 0.0), (4, 0.5, 0.0)];

        let (linked, summary) = link_default(&positions_table(&points), &LinkConfig::new(2.0, 1));
        assert_eq!(summary.particle_count, 2, "memory 1 must terminate at the gap");
        assert_eq!(linked.trajectory(0).len(), 1);

        let (linked, summary) = link_default(&positions_table(&points), &LinkConfig::new(2.0, 2));
        assert_eq!(summary.particle_count, 1, "memory 2 must bridge the gap");
        let frames: Vec<u32> = linked.trajectory(0).iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![1, 4]);
    }

    #[test]
    fn test_memory_zero_requires_consecutive_frames() {
        let table = positions_table(&[(1, 0.0, 0.0), (3, 0.0, 0.0)]);
        let (_, summary) = link_default(&table, &LinkConfig::new(1.0, 0));
        assert_eq!(summary.particle_count, 2);
    }

    #[test]
    fn test_terminated_trajectory_never_resumes() {
        // Same position reappears long after the memory window expired.
        let table = positions_table(&[(1, 5.0, 5.0), (2, 5.0, 5.0), (9, 5.0, 5.0)]);
        let (linked, summary) = link_default(&table, &LinkConfig::new(1.0, 1));

        assert_eq!(summary.particle_count, 2);
        // The fresh identity is new, not the retired 0
        assert_eq!(linked.rows()[2].particle, 1);
    }

    #[test]
    fn test_global_assignment_beats_greedy() {
        // Greedy nearest-neighbor would pair track 1 with the nearer
        // detection (distance 1) and push track 0 to distance 5; the
        // optimal pairing costs 2 + 2.
        let table = positions_table(&[
            (1, 0.0, 0.0),
            (1, 3.0, 0.0),
            (2, 2.0, 0.0),
            (2, 5.0, 0.0),
        ]);
        let (linked, _) = link_default(&table, &LinkConfig::new(10.0, 0));

        assert_eq!(linked.rows()[2].particle, 0, "detection at x=2 belongs to track 0");
        assert_eq!(linked.rows()[3].particle, 1, "detection at x=5 belongs to track 1");
    }

    #[test]
    fn test_unmatched_detection_starts_new_particle() {
        let table = positions_table(&[(1, 0.0, 0.0), (2, 0.5, 0.0), (2, 50.0, 50.0)]);
        let (linked, summary) = link_default(&table, &LinkConfig::new(2.0, 0));

        assert_eq!(summary.particle_count, 2);
        assert_eq!(linked.rows()[1].particle, 0);
        assert_eq!(linked.rows()[2].particle, 1);
    }

    #[test]
    fn test_empty_table_is_prerequisite_error() {
        let table = FeatureTable::new(vec!["centroid_x".into(), "centroid_y".into()]);
        let err = link(&table, &PositionColumns::default(), &LinkConfig::new(1.0, 0)).unwrap_err();
        assert!(matches!(err, Error::PrerequisiteMissing(_)));
    }

    #[test]
    fn test_missing_position_column_rejected() {
        let mut table = FeatureTable::new(vec!["area".into()]);
        table
            .push(FeatureRow {
                frame: 1,
                values: vec![1.0],
            })
            .unwrap();
        let err = link(&table, &PositionColumns::default(), &LinkConfig::new(1.0, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_negative_search_distance_rejected() {
        let table = positions_table(&[(1, 0.0, 0.0)]);
        let err = link(&table, &PositionColumns::default(), &LinkConfig::new(-1.0, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_custom_position_columns() {
        let mut table = FeatureTable::new(vec!["cx".into(), "cy".into()]);
        for (frame, x) in [(1u32, 0.0f64), (2, 1.0)] {
            table
                .push(FeatureRow {
                    frame,
                    values: vec![x, 0.0],
                })
                .unwrap();
        }
        let (linked, summary) = link(
            &table,
            &PositionColumns::new("cx", "cy"),
            &LinkConfig::new(2.0, 0),
        )
        .unwrap();
        assert_eq!(summary.particle_count, 1);
        assert_eq!(linked.trajectory(0).len(), 2);
    }
}
