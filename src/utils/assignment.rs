use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

const F32_I64_MULT: f32 = 1_000_000.0;

/// Outcome of a gated one-to-one assignment.
///
#[derive(Debug, Default)]
pub struct Assignment {
    /// Accepted (row, col) pairs, in row-major order.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Solves a minimum-cost one-to-one assignment over a `rows` x `cols` cost matrix and keeps
/// only the pairs whose cost is strictly below `gate`. A degenerate matrix (either dimension
/// zero) is not an error: everything stays unmatched.
///
/// Costs are scaled to fixed point for the Hungarian solver; ties resolve deterministically by
/// row then column index.
///
/// # Parameters
/// * `rows`, `cols` - matrix dimensions
/// * `cost` - cost of assigning row `i` to column `j`
/// * `gate` - strict acceptance bound on the cost of a pair
///
pub fn gated_assignment<F>(rows: usize, cols: usize, cost: F, gate: f32) -> Assignment
where
    F: Fn(usize, usize) -> f32,
{
    if rows == 0 || cols == 0 {
        return Assignment {
            matches: Vec::default(),
            unmatched_rows: (0..rows).collect(),
            unmatched_cols: (0..cols).collect(),
        };
    }

    let costs: Vec<Vec<f32>> = (0..rows)
        .map(|i| (0..cols).map(|j| cost(i, j)).collect())
        .collect();

    // kuhn_munkres requires rows <= columns; transpose when the matrix is tall.
    let transposed = rows > cols;
    let (r, c) = if transposed { (cols, rows) } else { (rows, cols) };

    let weights: Matrix<i64> = Matrix::from_rows((0..r).map(|i| {
        (0..c)
            .map(|j| {
                let cost = if transposed { costs[j][i] } else { costs[i][j] };
                (cost * F32_I64_MULT) as i64
            })
            .collect::<Vec<_>>()
    }))
    .unwrap();

    let (_, solution) = kuhn_munkres_min(&weights);

    let mut matches = Vec::with_capacity(r);
    let mut row_matched = vec![false; rows];
    let mut col_matched = vec![false; cols];

    for (i, j) in solution.into_iter().enumerate() {
        let (row, col) = if transposed { (j, i) } else { (i, j) };
        if costs[row][col] < gate {
            matches.push((row, col));
            row_matched[row] = true;
            col_matched[col] = true;
        }
    }

    matches.sort_unstable();

    Assignment {
        matches,
        unmatched_rows: (0..rows).filter(|i| !row_matched[*i]).collect(),
        unmatched_cols: (0..cols).filter(|j| !col_matched[*j]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::assignment::gated_assignment;

    #[test]
    fn empty_matrix_is_degenerate_not_an_error() {
        let a = gated_assignment(0, 0, |_, _| 0.0, 0.8);
        assert!(a.matches.is_empty());
        assert!(a.unmatched_rows.is_empty());
        assert!(a.unmatched_cols.is_empty());

        let a = gated_assignment(2, 0, |_, _| 0.0, 0.8);
        assert!(a.matches.is_empty());
        assert_eq!(a.unmatched_rows, vec![0, 1]);
        assert!(a.unmatched_cols.is_empty());

        let a = gated_assignment(0, 3, |_, _| 0.0, 0.8);
        assert!(a.matches.is_empty());
        assert_eq!(a.unmatched_cols, vec![0, 1, 2]);
    }

    #[test]
    fn picks_global_minimum() {
        let costs = [[0.9, 0.1, 0.8], [0.2, 0.15, 0.9]];
        let a = gated_assignment(2, 3, |i, j| costs[i][j], 0.8);
        // Row 0 prefers col 1 locally, but the global optimum pairs (0, 1) and (1, 0).
        assert_eq!(a.matches, vec![(0, 1), (1, 0)]);
        assert!(a.unmatched_rows.is_empty());
        assert_eq!(a.unmatched_cols, vec![2]);
    }

    #[test]
    fn gate_rejects_expensive_pairs() {
        let costs = [[0.95, 0.9], [0.85, 0.99]];
        let a = gated_assignment(2, 2, |i, j| costs[i][j], 0.8);
        assert!(a.matches.is_empty());
        assert_eq!(a.unmatched_rows, vec![0, 1]);
        assert_eq!(a.unmatched_cols, vec![0, 1]);
    }

    #[test]
    fn tall_matrix_transposes() {
        let costs = [[0.1], [0.5], [0.05]];
        let a = gated_assignment(3, 1, |i, j| costs[i][j], 0.8);
        assert_eq!(a.matches, vec![(2, 0)]);
        assert_eq!(a.unmatched_rows, vec![0, 1]);
        assert!(a.unmatched_cols.is_empty());
    }

    #[test]
    fn gate_is_strict() {
        let a = gated_assignment(1, 1, |_, _| 0.5, 0.5);
        assert!(a.matches.is_empty());
        assert_eq!(a.unmatched_rows, vec![0]);
        assert_eq!(a.unmatched_cols, vec![0]);
    }
}
