//! Region property selection, column naming and threshold filtering.

use serde::{Deserialize, Serialize};

use crate::table::FeatureTable;
use crate::{Error, Result};

/// Measurable per-region properties.
///
/// `Centroid` is 2-D and expands into the two spatial columns
/// `centroid_x` (axis 0, rows) and `centroid_y` (axis 1, columns), in that
/// fixed order. Every other property maps 1:1 to its canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionProperty {
    Centroid,
    Area,
    EquivalentDiameter,
    Eccentricity,
    Orientation,
    Perimeter,
}

impl RegionProperty {
    /// Output column names for this property, in fixed order.
    pub fn column_names(self) -> &'static [&'static str] {
        match self {
            RegionProperty::Centroid => &["centroid_x", "centroid_y"],
            RegionProperty::Area => &["area"],
            RegionProperty::EquivalentDiameter => &["equivalent_diameter"],
            RegionProperty::Eccentricity => &["eccentricity"],
            RegionProperty::Orientation => &["orientation"],
            RegionProperty::Perimeter => &["perimeter"],
        }
    }
}

/// Expand a property list into the deterministic output column order.
///
/// Fails with `InvalidParameter` if the list is empty.
pub fn column_names(properties: &[RegionProperty]) -> Result<Vec<String>> {
    if properties.is_empty() {
        return Err(Error::InvalidParameter(
            "property list must not be empty".to_string(),
        ));
    }
    Ok(properties
        .iter()
        .flat_map(|p| p.column_names().iter().map(|n| n.to_string()))
        .collect())
}

/// Comparison applied by a [`PropertyFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    GreaterThan,
    LessThan,
    Equals,
}

impl FilterOp {
    fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            FilterOp::GreaterThan => value > threshold,
            FilterOp::LessThan => value < threshold,
            FilterOp::Equals => value == threshold,
        }
    }
}

/// A threshold condition on one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    /// Column the condition reads, e.g. `"area"`.
    pub column: String,
    pub op: FilterOp,
    pub value: f64,
}

impl PropertyFilter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: f64) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }
}

/// Drop feature rows failing any of the given threshold conditions.
///
/// Conditions are conjunctive and applied in order. Fails with
/// `InvalidParameter` if a condition names a column the table lacks.
pub fn apply_property_filters(
    table: &FeatureTable,
    filters: &[PropertyFilter],
) -> Result<FeatureTable> {
    let mut indices = Vec::with_capacity(filters.len());
    for filter in filters {
        let idx = table.column_index(&filter.column).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "filter references unknown column '{}'",
                filter.column
            ))
        })?;
        indices.push(idx);
    }

    let before = table.len();
    let mut filtered = table.clone();
    filtered.retain(|row| {
        filters
            .iter()
            .zip(&indices)
            .all(|(f, &i)| f.op.holds(row.values[i], f.value))
    });

    tracing::debug!(
        "property filters retained {} of {} rows",
        filtered.len(),
        before
    );
    Ok(filtered)
}
