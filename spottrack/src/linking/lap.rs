//! Sparse linear assignment solver.
//!
//! Shortest augmenting path with row and column potentials (Jonker-Volgenant
//! family), run once per row with a Dijkstra search over the sparse entries.
//! Only explicitly stored entries can be assigned; a missing entry is an
//! infinite cost.
//!
//! Among equally cheap alternatives the search prefers a free column, then
//! the column reached first, so rows assigned earlier keep their columns.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LapError {
    #[error("cost matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("row {row} references column {col} of a {n_cols}-column matrix")]
    ColumnOutOfRange { row: usize, col: usize, n_cols: usize },

    #[error("cost at ({row}, {col}) is not finite")]
    NonFiniteCost { row: usize, col: usize },

    #[error("no complete assignment exists (row {row} cannot be matched)")]
    Infeasible { row: usize },
}

/// Row-compressed sparse cost matrix.
#[derive(Debug, Clone)]
pub struct SparseCostMatrix {
    n_cols: usize,
    row_starts: Vec<usize>,
    cols: Vec<usize>,
    costs: Vec<f64>,
}

impl SparseCostMatrix {
    pub fn with_columns(n_cols: usize) -> Self {
        Self {
            n_cols,
            row_starts: vec![0],
            cols: Vec::new(),
            costs: Vec::new(),
        }
    }

    /// Append the next row from `(column, cost)` entries.
    pub fn push_row(
        &mut self,
        entries: impl IntoIterator<Item = (usize, f64)>,
    ) -> Result<(), LapError> {
        let row = self.n_rows();
        let start = self.cols.len();
        for (col, cost) in entries {
            let error = if col >= self.n_cols {
                Some(LapError::ColumnOutOfRange {
                    row,
                    col,
                    n_cols: self.n_cols,
                })
            } else if !cost.is_finite() {
                Some(LapError::NonFiniteCost { row, col })
            } else {
                None
            };
            if let Some(error) = error {
                self.cols.truncate(start);
                self.costs.truncate(start);
                return Err(error);
            }
            self.cols.push(col);
            self.costs.push(cost);
        }
        self.row_starts.push(self.cols.len());
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.row_starts.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.cols.len()
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_starts[row]..self.row_starts[row + 1];
        self.cols[range.clone()]
            .iter()
            .copied()
            .zip(self.costs[range].iter().copied())
    }
}

/// Relative width within which reduced costs count as equal.
const TIE_TOLERANCE: f64 = 1e-9;

/// Heap entry for the column search; ordered so the heap pops the minimum.
#[derive(Debug, Clone, Copy)]
struct Reached {
    cost: f64,
    assigned: bool,
    seq: usize,
    col: usize,
}

impl PartialEq for Reached {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Reached {}

impl PartialOrd for Reached {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Reached {
    /// Tie order among equal costs: free columns first, then reach order.
    #[inline]
    fn tie_rank(&self) -> (bool, usize) {
        (self.assigned, self.seq)
    }
}

impl Ord for Reached {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then(other.assigned.cmp(&self.assigned))
            .then(other.seq.cmp(&self.seq))
    }
}

/// Pop the cheapest entry whose column is unscanned and not superseded.
fn pop_live(
    heap: &mut BinaryHeap<Reached>,
    scanned_col: &[bool],
    shortest: &[f64],
) -> Option<Reached> {
    while let Some(r) = heap.pop() {
        if !scanned_col[r.col] && r.cost <= shortest[r.col] {
            return Some(r);
        }
    }
    None
}

/// Minimum-cost perfect assignment; returns the column of every row.
pub fn solve(matrix: &SparseCostMatrix) -> Result<Vec<usize>, LapError> {
    let n = matrix.n_rows();
    if n != matrix.n_cols() {
        return Err(LapError::NotSquare {
            rows: n,
            cols: matrix.n_cols(),
        });
    }

    const UNASSIGNED: usize = usize::MAX;

    let mut u = vec![0.0f64; n];
    let mut v = vec![0.0f64; n];
    let mut col4row = vec![UNASSIGNED; n];
    let mut row4col = vec![UNASSIGNED; n];

    let mut shortest = vec![f64::INFINITY; n];
    let mut path = vec![UNASSIGNED; n];
    let mut scanned_col = vec![false; n];
    let mut scanned_rows: Vec<usize> = Vec::new();
    let mut scanned_cols: Vec<usize> = Vec::new();
    let mut touched: Vec<usize> = Vec::new();
    let mut heap: BinaryHeap<Reached> = BinaryHeap::new();
    let mut deferred: Vec<Reached> = Vec::new();

    for cur_row in 0..n {
        let mut min_val = 0.0f64;
        let mut row = cur_row;
        let mut seq = 0usize;

        let sink = loop {
            scanned_rows.push(row);
            for (col, cost) in matrix.row(row) {
                if scanned_col[col] {
                    continue;
                }
                let reduced = min_val + cost - u[row] - v[col];
                if reduced < shortest[col] {
                    if shortest[col] == f64::INFINITY {
                        touched.push(col);
                    }
                    shortest[col] = reduced;
                    path[col] = row;
                    heap.push(Reached {
                        cost: reduced,
                        assigned: row4col[col] != UNASSIGNED,
                        seq,
                        col,
                    });
                    seq += 1;
                }
            }

            let Some(first) = pop_live(&mut heap, &scanned_col, &shortest) else {
                return Err(LapError::Infeasible { row: cur_row });
            };

            // Costs differing only by rounding noise are ties.
            let limit = first.cost + TIE_TOLERANCE * first.cost.abs().max(1.0);
            let mut next = first;
            while let Some(candidate) = pop_live(&mut heap, &scanned_col, &shortest) {
                if candidate.cost > limit {
                    deferred.push(candidate);
                    break;
                }
                if candidate.tie_rank() < next.tie_rank() {
                    deferred.push(next);
                    next = candidate;
                } else {
                    deferred.push(candidate);
                }
            }
            heap.extend(deferred.drain(..));

            min_val = min_val.max(next.cost);
            scanned_col[next.col] = true;
            scanned_cols.push(next.col);
            if row4col[next.col] == UNASSIGNED {
                break next.col;
            }
            row = row4col[next.col];
        };

        // Dual update keeps every reduced cost non-negative.
        u[cur_row] += min_val;
        for &i in &scanned_rows[1..] {
            u[i] += min_val - shortest[col4row[i]];
        }
        for &j in &scanned_cols {
            v[j] -= min_val - shortest[j];
        }

        let mut col = sink;
        loop {
            let row = path[col];
            row4col[col] = row;
            std::mem::swap(&mut col4row[row], &mut col);
            if row == cur_row {
                break;
            }
        }

        for &j in &touched {
            shortest[j] = f64::INFINITY;
            scanned_col[j] = false;
        }
        touched.clear();
        scanned_rows.clear();
        scanned_cols.clear();
        heap.clear();
    }

    Ok(col4row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(rows: &[&[f64]]) -> SparseCostMatrix {
        let mut m = SparseCostMatrix::with_columns(rows[0].len());
        for row in rows {
            m.push_row(
                row.iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_finite())
                    .map(|(j, &c)| (j, c)),
            )
            .unwrap();
        }
        m
    }

    fn total(m: &SparseCostMatrix, assignment: &[usize]) -> f64 {
        assignment
            .iter()
            .enumerate()
            .map(|(i, &j)| m.row(i).find(|&(c, _)| c == j).unwrap().1)
            .sum()
    }

    fn brute_force(m: &SparseCostMatrix) -> f64 {
        fn go(m: &SparseCostMatrix, row: usize, used: &mut Vec<bool>) -> f64 {
            if row == m.n_rows() {
                return 0.0;
            }
            let mut best = f64::INFINITY;
            for (col, cost) in m.row(row) {
                if !used[col] {
                    used[col] = true;
                    best = best.min(cost + go(m, row + 1, used));
                    used[col] = false;
                }
            }
            best
        }
        go(m, 0, &mut vec![false; m.n_cols()])
    }

    #[test]
    fn test_small_dense_problem() {
        let m = dense(&[&[4.0, 1.0, 3.0], &[2.0, 0.0, 5.0], &[3.0, 2.0, 2.0]]);
        let assignment = solve(&m).unwrap();
        assert_eq!(total(&m, &assignment), 5.0);
        assert_eq!(assignment, vec![1, 0, 2]);
    }

    #[test]
    fn test_sparse_problem_requires_reassignment() {
        let inf = f64::INFINITY;
        // Row 0 grabs column 0 first; row 1 can only use column 0.
        let m = dense(&[&[1.0, 5.0], &[2.0, inf]]);
        let assignment = solve(&m).unwrap();
        assert_eq!(assignment, vec![1, 0]);
        assert_eq!(m.nnz(), 3);
    }

    #[test]
    fn test_matches_brute_force_on_pseudo_random_matrices() {
        let mut state = 7u64;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 40) as f64 / (1u64 << 24) as f64
        };
        for size in 2..=6 {
            for _ in 0..20 {
                let mut m = SparseCostMatrix::with_columns(size);
                for i in 0..size {
                    // Keep the diagonal so a perfect assignment always exists.
                    let mut entries = Vec::new();
                    for j in 0..size {
                        if j == i || next() < 0.6 {
                            entries.push((j, (next() * 20.0).round()));
                        }
                    }
                    m.push_row(entries).unwrap();
                }
                let assignment = solve(&m).unwrap();
                let mut seen = vec![false; size];
                for &j in &assignment {
                    assert!(!seen[j]);
                    seen[j] = true;
                }
                assert!((total(&m, &assignment) - brute_force(&m)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_ties_keep_earlier_rows() {
        let m = dense(&[&[1.0, 1.0], &[1.0, 1.0]]);
        assert_eq!(solve(&m).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_infeasible() {
        let inf = f64::INFINITY;
        let m = dense(&[&[1.0, inf], &[2.0, inf]]);
        assert_eq!(solve(&m), Err(LapError::Infeasible { row: 1 }));
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut m = SparseCostMatrix::with_columns(2);
        assert_eq!(
            m.push_row([(2, 1.0)]),
            Err(LapError::ColumnOutOfRange {
                row: 0,
                col: 2,
                n_cols: 2
            })
        );
        assert_eq!(
            m.push_row([(0, f64::NAN)]),
            Err(LapError::NonFiniteCost { row: 0, col: 0 })
        );
        m.push_row([(0, 1.0)]).unwrap();
        assert_eq!(solve(&m), Err(LapError::NotSquare { rows: 1, cols: 2 }));
    }

    #[test]
    fn test_empty_matrix() {
        let m = SparseCostMatrix::with_columns(0);
        assert_eq!(solve(&m).unwrap(), Vec::<usize>::new());
    }
}
