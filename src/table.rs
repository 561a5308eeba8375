//! Column-named measurement tables passed between pipeline stages.
//!
//! A [`FeatureTable`] plays the role of the per-frame detection table:
//! every row is one measured region in one frame, with its scalar values
//! aligned to the table's column names. A [`TrajectoryTable`] is the same
//! data after linking, with a particle identity attached to every row.

use crate::{Error, Result};

/// One measured region in one frame. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// 1-based frame index.
    pub frame: u32,

    /// Measured values, aligned with the owning table's columns.
    pub values: Vec<f64>,
}

/// Frame-ordered collection of all detections before linking.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Create an empty table with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names, in output order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row.
    ///
    /// Fails with `InvalidParameter` if the row's value count does not
    /// match the table's column count.
    pub fn push(&mut self, row: FeatureRow) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(Error::InvalidParameter(format!(
                "row has {} values but table has {} columns",
                row.values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append all rows of another table with identical columns.
    pub fn append(&mut self, other: FeatureTable) -> Result<()> {
        if other.columns != self.columns {
            return Err(Error::InvalidParameter(format!(
                "cannot append table with columns {:?} to table with columns {:?}",
                other.columns, self.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct frame indices present, ascending.
    pub fn frames(&self) -> Vec<u32> {
        let mut frames: Vec<u32> = self.rows.iter().map(|r| r.frame).collect();
        frames.sort_unstable();
        frames.dedup();
        frames
    }

    /// Retain only the rows matching a predicate.
    pub(crate) fn retain<F: FnMut(&FeatureRow) -> bool>(&mut self, pred: F) {
        self.rows.retain(pred);
    }
}

/// One detection with its assigned particle identity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRow {
    /// 1-based frame index.
    pub frame: u32,

    /// Particle identity assigned by the linker. Never reused.
    pub particle: u32,

    /// Measured values, aligned with the owning table's columns.
    pub values: Vec<f64>,
}

/// Detection table augmented with particle identities.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryTable {
    columns: Vec<String>,
    rows: Vec<TrajectoryRow>,
}

impl TrajectoryTable {
    /// Create an empty table with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names, in output order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row.
    pub fn push(&mut self, row: TrajectoryRow) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(Error::InvalidParameter(format!(
                "row has {} values but table has {} columns",
                row.values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[TrajectoryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct particle identities present, ascending.
    pub fn particle_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.rows.iter().map(|r| r.particle).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Number of distinct particle identities.
    pub fn particle_count(&self) -> usize {
        self.particle_ids().len()
    }

    /// All rows of one trajectory, ordered by frame.
    pub fn trajectory(&self, particle: u32) -> Vec<&TrajectoryRow> {
        let mut rows: Vec<&TrajectoryRow> =
            self.rows.iter().filter(|r| r.particle == particle).collect();
        rows.sort_by_key(|r| r.frame);
        rows
    }

    pub(crate) fn sort_rows<F, K>(&mut self, key: F)
    where
        F: FnMut(&TrajectoryRow) -> K,
        K: Ord,
    {
        self.rows.sort_by_key(key);
    }

    pub(crate) fn retain<F: FnMut(&TrajectoryRow) -> bool>(&mut self, pred: F) {
        self.rows.retain(pred);
    }
}
