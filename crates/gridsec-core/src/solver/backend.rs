use crate::error::{GridSecError, GridSecResult};
use faer::{prelude::*, solvers::PartialPivLu, Mat};
use std::ops::{Index, IndexMut};

/// Square matrix stored row-major, the shape of a Newton-Raphson Jacobian.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; dim * dim],
        }
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> GridSecResult<Self> {
        let dim = rows.len();
        if rows.iter().any(|row| row.len() != dim) {
            return Err(GridSecError::Solver("matrix must be square".to_string()));
        }
        Ok(Self {
            dim,
            data: rows.concat(),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.dim {
            self.data.swap(a * self.dim + col, b * self.dim + col);
        }
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.dim + col]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.dim + col]
    }
}

/// Solves the linearized power flow equations `J dx = mismatch`.
pub trait LinearSystemBackend: Send + Sync {
    fn solve(&self, matrix: &DenseMatrix, rhs: &[f64]) -> GridSecResult<Vec<f64>>;
}

fn check_rhs(matrix: &DenseMatrix, rhs: &[f64]) -> GridSecResult<()> {
    if rhs.len() != matrix.dim() {
        return Err(GridSecError::Solver(format!(
            "rhs length {} does not match matrix dimension {}",
            rhs.len(),
            matrix.dim()
        )));
    }
    Ok(())
}

/// LU elimination with partial pivoting, then back substitution.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &DenseMatrix, rhs: &[f64]) -> GridSecResult<Vec<f64>> {
        check_rhs(matrix, rhs)?;
        let n = matrix.dim();
        let mut a = matrix.clone();
        let mut b = rhs.to_vec();

        for k in 0..n {
            let pivot = (k..n)
                .max_by(|&x, &y| a[(x, k)].abs().total_cmp(&a[(y, k)].abs()))
                .unwrap_or(k);
            if a[(pivot, k)].abs() < 1e-12 {
                return Err(GridSecError::Solver(format!("singular matrix at column {k}")));
            }
            a.swap_rows(k, pivot);
            b.swap(k, pivot);

            for row in k + 1..n {
                let factor = a[(row, k)] / a[(k, k)];
                if factor == 0.0 {
                    continue;
                }
                for col in k..n {
                    a[(row, col)] -= factor * a[(k, col)];
                }
                b[row] -= factor * b[k];
            }
        }

        let mut x = vec![0.0; n];
        for row in (0..n).rev() {
            let tail: f64 = (row + 1..n).map(|col| a[(row, col)] * x[col]).sum();
            x[row] = (b[row] - tail) / a[(row, row)];
        }
        Ok(x)
    }
}

/// faer's partial-pivoting LU.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &DenseMatrix, rhs: &[f64]) -> GridSecResult<Vec<f64>> {
        check_rhs(matrix, rhs)?;
        let n = matrix.dim();
        if n == 0 {
            return Ok(Vec::new());
        }

        let lhs = Mat::from_fn(n, n, |i, j| matrix[(i, j)]);
        let rhs = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let solution = PartialPivLu::new(lhs.as_ref()).solve(&rhs);

        let x: Vec<f64> = (0..n).map(|i| solution.read(i, 0)).collect();
        // singularity shows up as non-finite entries
        if x.iter().any(|v| !v.is_finite()) {
            return Err(GridSecError::Solver("singular matrix".to_string()));
        }
        Ok(x)
    }
}
