//! Output shaping and CSV persistence.
//!
//! The formatter rewrites a working table to an explicit column order and
//! a (particle, frame) ascending sort so downstream consumers can rely on
//! fixed column names and row order. Persistence writes delimited text
//! with a header row and no row-index column.

use std::path::Path;

use crate::msd::{EmsdPoint, MsdTable};
use crate::table::{FeatureTable, TrajectoryTable};
use crate::{Error, Result};

/// Reshape a trajectory table to the given value-column order and sort
/// rows by particle id then frame, ascending.
///
/// Re-running on its own output is a fixed point. Fails with
/// `InvalidParameter` if a requested column is absent.
pub fn shape_and_sort(table: &TrajectoryTable, columns: &[String]) -> Result<TrajectoryTable> {
    let mut indices = Vec::with_capacity(columns.len());
    for name in columns {
        let idx = table
            .column_index(name)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown column '{}'", name)))?;
        indices.push(idx);
    }

    let mut shaped = TrajectoryTable::new(columns.to_vec());
    for row in table.rows() {
        shaped.push(crate::table::TrajectoryRow {
            frame: row.frame,
            particle: row.particle,
            values: indices.iter().map(|&i| row.values[i]).collect(),
        })?;
    }
    shaped.sort_rows(|row| (row.particle, row.frame));
    Ok(shaped)
}

/// Persist a trajectory table as CSV.
///
/// Column order: the table's value columns, then `frame`, then `particle`.
pub fn write_trajectories<P: AsRef<Path>>(table: &TrajectoryTable, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(&path)?;

    let mut header: Vec<String> = table.columns().to_vec();
    header.push("frame".to_string());
    header.push("particle".to_string());
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut record: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
        record.push(row.frame.to_string());
        record.push(row.particle.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    tracing::info!("wrote {} trajectory rows to {}", table.len(), path.as_ref().display());
    Ok(())
}

/// Persist a detection table as CSV.
///
/// Column order: the table's value columns, then `frame`.
pub fn write_features<P: AsRef<Path>>(table: &FeatureTable, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(&path)?;

    let mut header: Vec<String> = table.columns().to_vec();
    header.push("frame".to_string());
    writer.write_record(&header)?;

    for row in table.rows() {
        let mut record: Vec<String> = row.values.iter().map(|v| v.to_string()).collect();
        record.push(row.frame.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Persist a per-particle MSD table as CSV, indexed by lag time.
///
/// Columns: `lag_time`, then one column per particle id. Cells without a
/// measurement at that lag are left empty.
pub fn write_msd<P: AsRef<Path>>(msd: &MsdTable, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(&path)?;

    let mut header = vec!["lag_time".to_string()];
    header.extend(msd.particles().iter().map(|id| id.to_string()));
    writer.write_record(&header)?;

    for (lag_time, row) in msd.lag_times().iter().zip(msd.values()) {
        let mut record = vec![lag_time.to_string()];
        record.extend(
            row.iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Persist an ensemble MSD series as CSV, indexed by lag time.
pub fn write_emsd<P: AsRef<Path>>(series: &[EmsdPoint], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["lag_time", "msd"])?;
    for point in series {
        writer.write_record([point.lag_time.to_string(), point.msd.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}
