//! Retained pipeline state and run configuration.
//!
//! A [`TrackingSession`] is the engine's retained state: the current
//! detection table and the current linked/filtered trajectory table,
//! plus the directory persistence writes into. Sessions are immutable;
//! every stage returns a new session, so a failed stage can never leave
//! partially committed state behind, and "update" semantics are an
//! explicit choice (see [`TrajectoryFilter::without_commit`]) rather than
//! a hidden side effect.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::filtering::{filter_trajectories, TrajectoryFilter};
use crate::linker::{link, LinkConfig, LinkSummary, PositionColumns};
use crate::msd::{emsd, imsd, EmsdPoint, MsdConfig, MsdTable};
use crate::output;
use crate::table::{FeatureTable, TrajectoryTable};
use crate::{Error, Result};

/// Complete run configuration, one immutable value per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Maximum per-frame displacement for a valid link.
    pub search_distance: f64,

    /// Frames a particle may vanish before its trajectory terminates.
    pub memory: u32,

    /// Names of the two position columns.
    #[serde(default)]
    pub position_columns: PositionColumns,

    /// Minimum trajectory length, in detections.
    pub min_frames: usize,

    /// Minimum net displacement for a trajectory to be kept.
    pub min_displacement: f64,

    /// Physical length per pixel.
    pub pixel_scale_factor: f64,

    /// Frames per physical time unit.
    pub frame_rate: f64,

    /// Largest MSD lag, in frames.
    pub max_lag_time: u32,
}

impl TrackingConfig {
    /// Check every threshold, reporting the first violation.
    pub fn validate(&self) -> Result<()> {
        self.link_config().validate()?;
        self.trajectory_filter().validate()?;
        self.msd_config().validate()
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::new(self.search_distance, self.memory)
    }

    pub fn trajectory_filter(&self) -> TrajectoryFilter {
        TrajectoryFilter::new(self.min_frames, self.min_displacement)
    }

    pub fn msd_config(&self) -> MsdConfig {
        MsdConfig::new(self.pixel_scale_factor, self.frame_rate, self.max_lag_time)
    }
}

/// Immutable retained state threaded through the pipeline stages.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    directory: PathBuf,
    position_columns: PositionColumns,
    features: Option<FeatureTable>,
    trajectories: Option<TrajectoryTable>,
}

impl TrackingSession {
    /// Start an empty session persisting into `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            position_columns: PositionColumns::default(),
            features: None,
            trajectories: None,
        }
    }

    /// Replace the position column pair used by every later stage.
    pub fn with_position_columns(mut self, columns: PositionColumns) -> Self {
        self.position_columns = columns;
        self
    }

    /// Adopt a detection table as the session's feature state.
    pub fn with_features(mut self, features: FeatureTable) -> Self {
        self.features = Some(features);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn position_columns(&self) -> &PositionColumns {
        &self.position_columns
    }

    pub fn features(&self) -> Option<&FeatureTable> {
        self.features.as_ref()
    }

    /// The current linked (or filtered) trajectory table, if any.
    pub fn trajectories(&self) -> Option<&TrajectoryTable> {
        self.trajectories.as_ref()
    }

    fn require_features(&self) -> Result<&FeatureTable> {
        self.features.as_ref().ok_or_else(|| {
            Error::PrerequisiteMissing(
                "no detection table available; extract features first".to_string(),
            )
        })
    }

    fn require_trajectories(&self) -> Result<&TrajectoryTable> {
        self.trajectories.as_ref().ok_or_else(|| {
            Error::PrerequisiteMissing(
                "no linked trajectories available; link particles first".to_string(),
            )
        })
    }

    /// Link the detection table into trajectories.
    ///
    /// Returns the session with its trajectory state replaced, plus the
    /// link summary.
    pub fn link(&self, config: &LinkConfig) -> Result<(TrackingSession, LinkSummary)> {
        let features = self.require_features()?;
        let (linked, summary) = link(features, &self.position_columns, config)?;

        let mut next = self.clone();
        next.trajectories = Some(linked);
        Ok((next, summary))
    }

    /// Filter the linked trajectories by length and net displacement.
    ///
    /// The filtered table is always returned; the returned session
    /// retains it only when the filter commits (the default).
    pub fn filter(&self, filter: &TrajectoryFilter) -> Result<(TrackingSession, TrajectoryTable)> {
        let linked = self.require_trajectories()?;
        let filtered = filter_trajectories(linked, &self.position_columns, filter)?;

        let mut next = self.clone();
        if filter.commits() {
            next.trajectories = Some(filtered.clone());
        }
        Ok((next, filtered))
    }

    /// Per-particle MSD of the current trajectory table. Pure query.
    pub fn imsd(&self, config: &MsdConfig) -> Result<MsdTable> {
        imsd(self.require_trajectories()?, &self.position_columns, config)
    }

    /// Ensemble MSD of the current trajectory table. Pure query.
    pub fn emsd(&self, config: &MsdConfig) -> Result<Vec<EmsdPoint>> {
        emsd(self.require_trajectories()?, &self.position_columns, config)
    }

    /// Current trajectories in display order: the table's fixed column
    /// order, rows sorted by particle then frame.
    pub fn formatted_trajectories(&self) -> Result<TrajectoryTable> {
        let linked = self.require_trajectories()?;
        output::shape_and_sort(linked, linked.columns())
    }

    /// Persist the current detection table as `<directory>/<base>.csv`.
    pub fn save_features(&self, base_name: &str) -> Result<PathBuf> {
        let features = self.require_features()?;
        let path = self.csv_path(base_name);
        output::write_features(features, &path)?;
        Ok(path)
    }

    /// Persist the current trajectory table as `<directory>/<base>.csv`.
    pub fn save_trajectories(&self, base_name: &str) -> Result<PathBuf> {
        let linked = self.require_trajectories()?;
        let path = self.csv_path(base_name);
        output::write_trajectories(linked, &path)?;
        Ok(path)
    }

    /// Compute and persist the per-particle MSD as `<directory>/<base>.csv`.
    pub fn save_msd(&self, config: &MsdConfig, base_name: &str) -> Result<PathBuf> {
        let msd = self.imsd(config)?;
        let path = self.csv_path(base_name);
        output::write_msd(&msd, &path)?;
        tracing::info!("wrote MSD series to {}", path.display());
        Ok(path)
    }

    fn csv_path(&self, base_name: &str) -> PathBuf {
        self.directory.join(format!("{base_name}.csv"))
    }
}
