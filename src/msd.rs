//! Mean-squared displacement analysis.
//!
//! For each trajectory, the squared displacement at lag `tau` is
//! time-averaged over every pair of detections exactly `tau` frames apart,
//! scaled into physical units by the pixel size, and indexed by the
//! physical lag time `tau / frame_rate`. The ensemble series averages the
//! per-particle values with equal weight per trajectory. Lags with no
//! contributing pair are omitted, never interpolated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::linker::PositionColumns;
use crate::table::TrajectoryTable;
use crate::{Error, Result};

/// Displacement analysis parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MsdConfig {
    /// Physical length per pixel.
    pub pixel_scale: f64,

    /// Frames per physical time unit.
    pub frame_rate: f64,

    /// Largest lag, in frames.
    pub max_lag: u32,
}

impl MsdConfig {
    pub fn new(pixel_scale: f64, frame_rate: f64, max_lag: u32) -> Self {
        Self {
            pixel_scale,
            frame_rate,
            max_lag,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.pixel_scale.is_finite() || self.pixel_scale <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "pixel_scale must be finite and positive, got {}",
                self.pixel_scale
            )));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "frame_rate must be finite and positive, got {}",
                self.frame_rate
            )));
        }
        if self.max_lag == 0 {
            return Err(Error::InvalidParameter(
                "max_lag must be at least 1 frame".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-particle MSD series: lag times by particle columns.
///
/// A cell is `None` where the trajectory has no detection pair at that
/// lag. Rows where every cell would be `None` are omitted entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct MsdTable {
    lag_times: Vec<f64>,
    particles: Vec<u32>,
    values: Vec<Vec<Option<f64>>>,
}

impl MsdTable {
    /// Lag times in physical units, ascending.
    pub fn lag_times(&self) -> &[f64] {
        &self.lag_times
    }

    /// Particle ids, ascending; one output column each.
    pub fn particles(&self) -> &[u32] {
        &self.particles
    }

    /// Cell values; `values()[row]` is aligned with `particles()`.
    pub fn values(&self) -> &[Vec<Option<f64>>] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.lag_times.is_empty()
    }
}

/// One ensemble-averaged point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmsdPoint {
    pub lag_time: f64,
    pub msd: f64,
}

/// Positions of one trajectory keyed by frame.
fn positions_by_frame(
    table: &TrajectoryTable,
    particle: u32,
    xi: usize,
    yi: usize,
) -> BTreeMap<u32, (f64, f64)> {
    table
        .trajectory(particle)
        .iter()
        .map(|row| (row.frame, (row.values[xi], row.values[yi])))
        .collect()
}

fn resolve_positions(table: &TrajectoryTable, positions: &PositionColumns) -> Result<(usize, usize)> {
    let xi = table.column_index(&positions.x).ok_or_else(|| {
        Error::InvalidParameter(format!("position column '{}' not in table", positions.x))
    })?;
    let yi = table.column_index(&positions.y).ok_or_else(|| {
        Error::InvalidParameter(format!("position column '{}' not in table", positions.y))
    })?;
    Ok((xi, yi))
}

/// Compute the per-particle MSD series.
///
/// # Arguments
/// * `table` - Linked (or filtered) trajectory table
/// * `positions` - Pair of column names designating the position
/// * `config` - Unit conversion and lag range
pub fn imsd(
    table: &TrajectoryTable,
    positions: &PositionColumns,
    config: &MsdConfig,
) -> Result<MsdTable> {
    config.validate()?;
    let (xi, yi) = resolve_positions(table, positions)?;

    let particles = table.particle_ids();
    let tracks: Vec<BTreeMap<u32, (f64, f64)>> = particles
        .iter()
        .map(|&id| positions_by_frame(table, id, xi, yi))
        .collect();

    let scale_sq = config.pixel_scale * config.pixel_scale;
    let mut lag_times = Vec::new();
    let mut values = Vec::new();

    for lag in 1..=config.max_lag {
        let row: Vec<Option<f64>> = tracks
            .iter()
            .map(|track| {
                let mut sum = 0.0;
                let mut pairs = 0usize;
                for (&frame, &(x0, y0)) in track {
                    if let Some(&(x1, y1)) = track.get(&(frame + lag)) {
                        let (dx, dy) = (x1 - x0, y1 - y0);
                        sum += dx * dx + dy * dy;
                        pairs += 1;
                    }
                }
                (pairs > 0).then(|| scale_sq * sum / pairs as f64)
            })
            .collect();

        // A lag nobody measured is omitted, not interpolated
        if row.iter().any(|v| v.is_some()) {
            lag_times.push(f64::from(lag) / config.frame_rate);
            values.push(row);
        }
    }

    Ok(MsdTable {
        lag_times,
        particles,
        values,
    })
}

/// Compute the ensemble MSD series, one equal vote per trajectory.
pub fn emsd(
    table: &TrajectoryTable,
    positions: &PositionColumns,
    config: &MsdConfig,
) -> Result<Vec<EmsdPoint>> {
    let per_particle = imsd(table, positions, config)?;

    Ok(per_particle
        .lag_times()
        .iter()
        .zip(per_particle.values())
        .map(|(&lag_time, row)| {
            let present: Vec<f64> = row.iter().filter_map(|v| *v).collect();
            EmsdPoint {
                lag_time,
                msd: present.iter().sum::<f64>() / present.len() as f64,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TrajectoryRow;
    use approx::assert_relative_eq;

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

    fn unit_config(max_lag: u32) -> MsdConfig {
        MsdConfig::new(1.0, 1.0, max_lag)
    }

    #[test]
    fn test_stationary_particle_has_zero_msd() {
        let table = trajectories(&[
            (1, 0, 5.0, 5.0),
            (2, 0, 5.0, 5.0),
            (3, 0, 5.0, 5.0),
            (4, 0, 5.0, 5.0),
        ]);
        let msd = imsd(&table, &PositionColumns::default(), &unit_config(3)).unwrap();

        assert_eq!(msd.lag_times().len(), 3);
        for row in msd.values() {
            assert_relative_eq!(row[0].unwrap(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ballistic_motion_is_quadratic_in_lag() {
        // One pixel per frame along x: msd(tau) = tau^2
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 1.0, 0.0),
            (3, 0, 2.0, 0.0),
            (4, 0, 3.0, 0.0),
            (5, 0, 4.0, 0.0),
        ]);
        let msd = imsd(&table, &PositionColumns::default(), &unit_config(3)).unwrap();

        for (i, row) in msd.values().iter().enumerate() {
            let tau = (i + 1) as f64;
            assert_relative_eq!(row[0].unwrap(), tau * tau, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_unit_conversion() {
        // 2 physical units per pixel, 10 frames per time unit
        let table = trajectories(&[(1, 0, 0.0, 0.0), (2, 0, 1.0, 0.0)]);
        let config = MsdConfig::new(2.0, 10.0, 1);
        let msd = imsd(&table, &PositionColumns::default(), &config).unwrap();

        assert_relative_eq!(msd.lag_times()[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(msd.values()[0][0].unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gaps_reduce_pair_counts() {
        // Frames 1, 2, 4: lag 1 has one pair, lag 2 and 3 one pair each.
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 1.0, 0.0),
            (4, 0, 3.0, 0.0),
        ]);
        let msd = imsd(&table, &PositionColumns::default(), &unit_config(3)).unwrap();

        assert_eq!(msd.lag_times().len(), 3);
        assert_relative_eq!(msd.values()[0][0].unwrap(), 1.0, epsilon = 1e-12); // (1->2)
        assert_relative_eq!(msd.values()[1][0].unwrap(), 4.0, epsilon = 1e-12); // (2->4)
        assert_relative_eq!(msd.values()[2][0].unwrap(), 9.0, epsilon = 1e-12); // (1->4)
    }

    #[test]
    fn test_unmeasured_lags_are_omitted() {
        // Two detections: only lag 1 exists, lags 2..5 are dropped.
        let table = trajectories(&[(1, 0, 0.0, 0.0), (2, 0, 1.0, 0.0)]);
        let msd = imsd(&table, &PositionColumns::default(), &unit_config(5)).unwrap();

        assert_eq!(msd.lag_times(), &[1.0]);
        assert_eq!(msd.values().len(), 1);
    }

    #[test]
    fn test_emsd_weights_particles_equally() {
        // Particle 0 has many lag-1 pairs at msd 4; particle 1 has a
        // single pair at msd 0. Equal weighting gives 2.0.
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 2.0, 0.0),
            (3, 0, 4.0, 0.0),
            (4, 0, 6.0, 0.0),
            (1, 1, 9.0, 9.0),
            (2, 1, 9.0, 9.0),
        ]);
        let series = emsd(&table, &PositionColumns::default(), &unit_config(1)).unwrap();

        assert_eq!(series.len(), 1);
        assert_relative_eq!(series[0].msd, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_emsd_skips_absent_particles_per_lag() {
        // At lag 2 only particle 0 contributes; the average is over one.
        let table = trajectories(&[
            (1, 0, 0.0, 0.0),
            (2, 0, 1.0, 0.0),
            (3, 0, 2.0, 0.0),
            (1, 1, 9.0, 9.0),
            (2, 1, 10.0, 9.0),
        ]);
        let series = emsd(&table, &PositionColumns::default(), &unit_config(2)).unwrap();

        assert_eq!(series.len(), 2);
        assert_relative_eq!(series[1].msd, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let table = trajectories(&[(1, 0, 0.0, 0.0)]);
        let pos = PositionColumns::default();

        assert!(imsd(&table, &pos, &MsdConfig::new(0.0, 1.0, 1)).is_err());
        assert!(imsd(&table, &pos, &MsdConfig::new(1.0, 0.0, 1)).is_err());
        assert!(imsd(&table, &pos, &MsdConfig::new(1.0, 1.0, 0)).is_err());
    }
}
