use faer::Mat;

pub type DenseMatrix = Mat<f64>;

/// Absolute pivot floor below which a matrix is treated as singular.
const SINGULAR_PIVOT: f64 = 1.0e-15;
/// Pivot floor relative to the input's infinity norm.
const RELATIVE_PIVOT: f64 = 1.0e-12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LuError {
    #[error("expected a non-empty square matrix, got {rows}x{cols}")]
    Shape { rows: usize, cols: usize },
    #[error("matrix is singular at pivot {pivot}")]
    Singular { pivot: usize },
    #[error("matrix is ill-conditioned at pivot {pivot}")]
    IllConditioned { pivot: usize },
    #[error("right-hand side has {actual} entries, system has {expected}")]
    RhsLength { expected: usize, actual: usize },
}

/// Row-pivoted `P A = L U` with unit-diagonal `L` stored below `U`.
#[derive(Debug, Clone, PartialEq)]
pub struct LuDecomposition {
    packed: DenseMatrix,
    permutation: Vec<usize>,
    odd_swaps: bool,
    scale: f64,
}

impl LuDecomposition {
    fn order(&self) -> usize {
        self.packed.nrows()
    }

    pub fn determinant(&self) -> f64 {
        let product: f64 = (0..self.order()).map(|k| self.packed[(k, k)]).product();
        if self.odd_swaps { -product } else { product }
    }

    /// Rejects pivots that are tiny against the input's infinity norm.
    pub fn check_conditioning(&self) -> Result<(), LuError> {
        match (0..self.order())
            .find(|&k| self.packed[(k, k)].abs() <= self.scale * RELATIVE_PIVOT)
        {
            Some(pivot) => Err(LuError::IllConditioned { pivot }),
            None => Ok(()),
        }
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, LuError> {
        let n = self.order();
        if rhs.len() != n {
            return Err(LuError::RhsLength {
                expected: n,
                actual: rhs.len(),
            });
        }

        let mut x: Vec<f64> = self.permutation.iter().map(|&row| rhs[row]).collect();
        for row in 1..n {
            let below: f64 = (0..row).map(|col| self.packed[(row, col)] * x[col]).sum();
            x[row] -= below;
        }
        for row in (0..n).rev() {
            let above: f64 = ((row + 1)..n)
                .map(|col| self.packed[(row, col)] * x[col])
                .sum();
            let pivot = self.packed[(row, row)];
            if pivot.abs() <= SINGULAR_PIVOT {
                return Err(LuError::Singular { pivot: row });
            }
            x[row] = (x[row] - above) / pivot;
        }
        Ok(x)
    }

    pub fn invert(&self) -> Result<DenseMatrix, LuError> {
        self.check_conditioning()?;
        let n = self.order();
        let mut inverse = DenseMatrix::zeros(n, n);
        let mut unit = vec![0.0; n];
        for col in 0..n {
            unit.fill(0.0);
            unit[col] = 1.0;
            for (row, value) in self.solve(&unit)?.into_iter().enumerate() {
                inverse[(row, col)] = value;
            }
        }
        Ok(inverse)
    }
}

pub fn lu_factorize(matrix: &DenseMatrix) -> Result<LuDecomposition, LuError> {
    let (rows, cols) = (matrix.nrows(), matrix.ncols());
    if rows == 0 || rows != cols {
        return Err(LuError::Shape { rows, cols });
    }
    let n = rows;
    let scale = (0..n)
        .map(|row| (0..n).map(|col| matrix[(row, col)].abs()).sum::<f64>())
        .fold(0.0, f64::max);

    let mut packed = matrix.clone();
    let mut permutation: Vec<usize> = (0..n).collect();
    let mut odd_swaps = false;

    for k in 0..n {
        let pivot_row = (k..n)
            .max_by(|&a, &b| packed[(a, k)].abs().total_cmp(&packed[(b, k)].abs()))
            .unwrap_or(k);
        if packed[(pivot_row, k)].abs() <= SINGULAR_PIVOT {
            return Err(LuError::Singular { pivot: k });
        }
        if pivot_row != k {
            for col in 0..n {
                let held = packed[(k, col)];
                packed[(k, col)] = packed[(pivot_row, col)];
                packed[(pivot_row, col)] = held;
            }
            permutation.swap(k, pivot_row);
            odd_swaps = !odd_swaps;
        }

        let pivot = packed[(k, k)];
        for row in (k + 1)..n {
            let factor = packed[(row, k)] / pivot;
            packed[(row, k)] = factor;
            for col in (k + 1)..n {
                packed[(row, col)] -= factor * packed[(k, col)];
            }
        }
    }

    Ok(LuDecomposition {
        packed,
        permutation,
        odd_swaps,
        scale,
    })
}

/// Factorizes, checks conditioning and solves `A x = rhs`.
pub fn lu_solve(matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LuError> {
    let decomposition = lu_factorize(matrix)?;
    decomposition.check_conditioning()?;
    decomposition.solve(rhs)
}

pub fn dense_from_rows<const N: usize>(rows: &[[f64; N]]) -> DenseMatrix {
    DenseMatrix::from_fn(rows.len(), N, |row, col| rows[row][col])
}
