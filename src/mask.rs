//! Labeled object masks and connected-component labeling.
//!
//! Segmentation is an external collaborator: it hands this crate binary
//! masks (non-zero = object). [`LabeledMask::from_binary`] partitions the
//! foreground into connected regions; masks that arrive pre-labeled go
//! through [`LabeledMask::from_labels`] unchanged.

use nalgebra::DMatrix;

/// Pixel neighborhood used when labeling binary masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge-adjacent neighbors only.
    Four,
    /// Edge- and corner-adjacent neighbors.
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        match self {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

/// A per-frame mask with each object region carrying a distinct label.
///
/// Labels are positive and dense: `1..=region_count()`. Background is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMask {
    labels: DMatrix<u32>,
    region_count: u32,
}

impl LabeledMask {
    /// Wrap an already-labeled mask.
    ///
    /// The caller guarantees labels are dense positive integers; the
    /// region count is taken as the maximum label present.
    pub fn from_labels(labels: DMatrix<u32>) -> Self {
        let region_count = labels.iter().copied().max().unwrap_or(0);
        Self {
            labels,
            region_count,
        }
    }

    /// Label the connected components of a binary mask.
    ///
    /// Non-zero pixels are foreground. Labels are assigned in raster-scan
    /// order (top-left region first), so the labeling is deterministic.
    pub fn from_binary(mask: &DMatrix<u8>, connectivity: Connectivity) -> Self {
        let (nrows, ncols) = mask.shape();
        let mut labels = DMatrix::<u32>::zeros(nrows, ncols);
        let mut next_label = 0u32;
        let offsets = connectivity.offsets();
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for r in 0..nrows {
            for c in 0..ncols {
                if mask[(r, c)] == 0 || labels[(r, c)] != 0 {
                    continue;
                }
                next_label += 1;
                labels[(r, c)] = next_label;
                stack.push((r, c));

                while let Some((pr, pc)) = stack.pop() {
                    for &(dr, dc) in offsets {
                        let nr = pr as i64 + dr;
                        let nc = pc as i64 + dc;
                        if nr < 0 || nc < 0 || nr >= nrows as i64 || nc >= ncols as i64 {
                            continue;
                        }
                        let (nr, nc) = (nr as usize, nc as usize);
                        if mask[(nr, nc)] != 0 && labels[(nr, nc)] == 0 {
                            labels[(nr, nc)] = next_label;
                            stack.push((nr, nc));
                        }
                    }
                }
            }
        }

        Self {
            labels,
            region_count: next_label,
        }
    }

    /// The label matrix (0 = background).
    pub fn labels(&self) -> &DMatrix<u32> {
        &self.labels
    }

    /// Number of labeled regions.
    pub fn region_count(&self) -> u32 {
        self.region_count
    }

    /// Mask shape as (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        self.labels.shape()
    }
}
