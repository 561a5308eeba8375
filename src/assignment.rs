//! Minimum-cost assignment between trajectories and detections.
//!
//! The linker resolves each frame transition as a global minimum-cost
//! bipartite matching (cost = distance) instead of greedy nearest-neighbor
//! matching, so one detection can never be claimed by two competing
//! trajectories and the total linking distance is optimal.

use nalgebra::DMatrix;

/// One (row, column) pairing produced by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub row: usize,
    pub col: usize,
}

/// Solve the assignment problem and keep only pairings within `limit`.
///
/// Entries greater than `limit` (or non-finite) are treated as forbidden:
/// they are replaced by a uniform penalty larger than any feasible total,
/// and any pairing still landing on one after optimization is discarded.
///
/// Determinism: the side with fewer elements is augmented in ascending
/// index order and slack ties resolve to the lowest opposite index, so
/// among equal-cost optima the matching with the lowest indices wins.
/// With at most as many trajectories as detections, that means the lowest
/// trajectory id. The result is ordered by row index.
pub fn min_cost_pairs(costs: &DMatrix<f64>, limit: f64) -> Vec<Assignment> {
    let (n, m) = costs.shape();
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let feasible_max = costs
        .iter()
        .copied()
        .filter(|c| c.is_finite() && *c <= limit)
        .fold(f64::NEG_INFINITY, f64::max);
    if !feasible_max.is_finite() {
        return Vec::new(); // every pairing is out of range
    }
    let penalty = (feasible_max.max(0.0) + 1.0) * (n.min(m) as f64 + 1.0);

    // The augmenting-path solver wants rows <= cols; transpose if needed.
    let transposed = n > m;
    let gated = {
        let (gn, gm) = if transposed { (m, n) } else { (n, m) };
        DMatrix::from_fn(gn, gm, |i, j| {
            let c = if transposed {
                costs[(j, i)]
            } else {
                costs[(i, j)]
            };
            if c.is_finite() && c <= limit {
                c
            } else {
                penalty
            }
        })
    };

    let row_to_col = solve(&gated);

    let mut pairs: Vec<Assignment> = row_to_col
        .into_iter()
        .enumerate()
        .filter_map(|(r, c)| {
            let (row, col) = if transposed { (c?, r) } else { (r, c?) };
            (costs[(row, col)] <= limit).then_some(Assignment { row, col })
        })
        .collect();
    pairs.sort_by_key(|a| a.row);
    pairs
}

/// Shortest augmenting path with dual potentials (Jonker-Volgenant style).
///
/// Requires `nrows <= ncols`; every row ends up assigned to some column.
fn solve(costs: &DMatrix<f64>) -> Vec<Option<usize>> {
    let (n, m) = costs.shape();
    debug_assert!(n <= m);

    // 1-based internally; index 0 is the virtual root column.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut col_match = vec![0usize; m + 1]; // row currently matched to each column
    let mut path = vec![0usize; m + 1];

    for row in 1..=n {
        col_match[0] = row;
        let mut j0 = 0usize;
        let mut min_slack = vec![f64::INFINITY; m + 1];
        let mut visited = vec![false; m + 1];

        // Grow the alternating tree until an unmatched column is reached.
        loop {
            visited[j0] = true;
            let i0 = col_match[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if visited[j] {
                    continue;
                }
                let slack = costs[(i0 - 1, j - 1)] - u[i0] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    path[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if visited[j] {
                    u[col_match[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }

            j0 = j1;
            if col_match[j0] == 0 {
                break;
            }
        }

        // Flip matched edges back along the augmenting path.
        loop {
            let j1 = path[j0];
            col_match[j0] = col_match[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![None; n];
    for j in 1..=m {
        if col_match[j] > 0 {
            row_to_col[col_match[j] - 1] = Some(j - 1);
        }
    }
    row_to_col
}
