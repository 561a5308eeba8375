//! # Microtrack - Particle Trajectory Analysis
//!
//! Trajectory construction and displacement statistics for microscopy
//! mask sequences.
//!
//! Microtrack consumes a time-ordered sequence of binary (or pre-labeled)
//! object masks, measures one detection per labeled region per frame, links
//! detections across frames into particle trajectories under a distance and
//! memory model, prunes short-lived or static trajectories, and computes
//! per-particle and ensemble mean-squared displacement.
//!
//! ## Features
//!
//! - Connected-component labeling and region measurement (centroid, area,
//!   eccentricity, ...)
//! - Frame-to-frame linking via global minimum-cost assignment with a
//!   memory window for transient dropouts
//! - Stub and net-displacement trajectory filtering
//! - MSD/EMSD analysis with pixel-to-physical unit conversion
//! - CSV persistence of every stage's table
//!
//! ## Example
//!
//! ```rust,ignore
//! use microtrack::{LabeledMask, LinkConfig, RegionProperty, TrackingSession};
//!
//! let masks: Vec<LabeledMask> = load_masks();
//! let features = microtrack::extract::measure_sequence(
//!     &masks,
//!     &[RegionProperty::Centroid, RegionProperty::Area],
//! )?;
//!
//! let session = TrackingSession::new("run01").with_features(features);
//! let (session, summary) = session.link(&LinkConfig::new(5.0, 2))?;
//! let (session, filtered) = session.filter(&TrajectoryFilter::new(3, 1.0))?;
//! session.save_trajectories("linked_particles")?;
//! ```

pub mod assignment;
pub mod extract;
pub mod filtering;
pub mod linker;
pub mod mask;
pub mod msd;
pub mod output;
pub mod properties;
pub mod session;
pub mod table;

// Re-exports for convenience
pub use filtering::TrajectoryFilter;
pub use linker::{LinkConfig, LinkSummary, PositionColumns};
pub use mask::{Connectivity, LabeledMask};
pub use msd::{EmsdPoint, MsdConfig, MsdTable};
pub use properties::{FilterOp, PropertyFilter, RegionProperty};
pub use session::{TrackingConfig, TrackingSession};
pub use table::{FeatureRow, FeatureTable, TrajectoryRow, TrajectoryTable};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the microtrack library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("invalid parameter: {0}")]
        InvalidParameter(String),

        #[error("missing prerequisite: {0}")]
        PrerequisiteMissing(String),

        #[error("I/O failure: {0}")]
        Io(#[from] std::io::Error),

        #[error("I/O failure: {0}")]
        Csv(#[from] csv::Error),
    }

    /// Result type for microtrack operations
    pub type Result<T> = std::result::Result<T, Error>;
}
