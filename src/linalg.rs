//! Linear algebra
//!
//! Level 1 and level 2 routines over block matrices, following the
//! `y := alpha * op(A) * x + beta * y` convention.
use crate::data::{BlockMatrix, DenseMatrix, SparseMatrix};

/// Dot product of two vectors of equal length.
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len(), "Vectors must have equal length");
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

/// `y += a * x`
#[inline]
pub fn axpy(a: f64, x: &[f64], y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "Vectors must have equal length");
    if a == 0.0 {
        return;
    }
    y.iter_mut().zip(x.iter()).for_each(|(yi, xi)| *yi += a * xi);
}

// With beta == 0 the target is overwritten, so prior NaN values never propagate.
#[inline]
fn scale_target(beta: f64, y: &mut [f64]) {
    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        y.iter_mut().for_each(|v| *v *= beta);
    }
}

/// `y := alpha * A * x + beta * y`
///
/// * `alpha` - Scale of the product.
/// * `a` - Matrix with `x.len()` columns and `y.len()` rows.
/// * `x` - Multiplicand.
/// * `beta` - Scale of the existing target.
/// * `y` - Accumulation target.
pub fn gemv(alpha: f64, a: &BlockMatrix, x: &[f64], beta: f64, y: &mut [f64]) {
    assert_eq!(x.len(), a.cols(), "Vector length must match the number of columns");
    assert_eq!(y.len(), a.rows(), "Target length must match the number of rows");
    scale_target(beta, y);
    if alpha == 0.0 {
        return;
    }
    match a {
        BlockMatrix::Dense(m) => dense_gemv(alpha, m, x, y),
        BlockMatrix::Sparse(m) => sparse_gemv(alpha, m, x, y),
    }
}

/// `y := alpha * A^T * x + beta * y`
///
/// * `alpha` - Scale of the product.
/// * `a` - Matrix with `x.len()` rows and `y.len()` columns.
/// * `x` - Multiplicand.
/// * `beta` - Scale of the existing target.
/// * `y` - Accumulation target.
pub fn gemv_transposed(alpha: f64, a: &BlockMatrix, x: &[f64], beta: f64, y: &mut [f64]) {
    assert_eq!(x.len(), a.rows(), "Vector length must match the number of rows");
    assert_eq!(y.len(), a.cols(), "Target length must match the number of columns");
    scale_target(beta, y);
    if alpha == 0.0 {
        return;
    }
    match a {
        BlockMatrix::Dense(m) => dense_gemv_transposed(alpha, m, x, y),
        BlockMatrix::Sparse(m) => sparse_gemv_transposed(alpha, m, x, y),
    }
}

fn dense_gemv(alpha: f64, m: &DenseMatrix, x: &[f64], y: &mut [f64]) {
    if m.cols == 0 {
        return;
    }
    if m.is_transposed() {
        for (yi, row) in y.iter_mut().zip(m.values.chunks_exact(m.cols)) {
            *yi += alpha * dot(row, x);
        }
    } else if m.rows > 0 {
        for (xj, col) in x.iter().zip(m.values.chunks_exact(m.rows)) {
            axpy(alpha * xj, col, y);
        }
    }
}

fn dense_gemv_transposed(alpha: f64, m: &DenseMatrix, x: &[f64], y: &mut [f64]) {
    if m.cols == 0 {
        return;
    }
    if m.is_transposed() {
        for (xi, row) in x.iter().zip(m.values.chunks_exact(m.cols)) {
            axpy(alpha * xi, row, y);
        }
    } else if m.rows > 0 {
        for (yj, col) in y.iter_mut().zip(m.values.chunks_exact(m.rows)) {
            *yj += alpha * dot(col, x);
        }
    }
}

fn sparse_gemv(alpha: f64, m: &SparseMatrix, x: &[f64], y: &mut [f64]) {
    if m.is_transposed() {
        for (i, yi) in y.iter_mut().enumerate() {
            let sum: f64 = (m.ptrs[i]..m.ptrs[i + 1]).map(|k| m.values[k] * x[m.indices[k]]).sum();
            *yi += alpha * sum;
        }
    } else {
        for (j, xj) in x.iter().enumerate() {
            let scaled = alpha * xj;
            for k in m.ptrs[j]..m.ptrs[j + 1] {
                y[m.indices[k]] += scaled * m.values[k];
            }
        }
    }
}

fn sparse_gemv_transposed(alpha: f64, m: &SparseMatrix, x: &[f64], y: &mut [f64]) {
    if m.is_transposed() {
        for (i, xi) in x.iter().enumerate() {
            let scaled = alpha * xi;
            for k in m.ptrs[i]..m.ptrs[i + 1] {
                y[m.indices[k]] += scaled * m.values[k];
            }
        }
    } else {
        for (j, yj) in y.iter_mut().enumerate() {
            let sum: f64 = (m.ptrs[j]..m.ptrs[j + 1]).map(|k| m.values[k] * x[m.indices[k]]).sum();
            *yj += alpha * sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1 0 2
    // 0 3 0
    // 4 0 5
    // 0 0 6
    fn matrices() -> Vec<BlockMatrix> {
        let rows = vec![1., 0., 2., 0., 3., 0., 4., 0., 5., 0., 0., 6.];
        let cols = vec![1., 0., 4., 0., 0., 3., 0., 0., 2., 0., 5., 6.];
        vec![
            BlockMatrix::Dense(DenseMatrix::from_rows(rows.clone(), 4, 3)),
            BlockMatrix::Dense(DenseMatrix::new(cols, 4, 3)),
            BlockMatrix::Sparse(SparseMatrix::from_dense_rows(&rows, 4, 3)),
            BlockMatrix::Sparse(SparseMatrix::new_csc(
                4,
                3,
                vec![0, 2, 3, 6],
                vec![0, 2, 1, 0, 2, 3],
                vec![1., 4., 3., 2., 5., 6.],
            )),
        ]
    }

    #[test]
    fn test_dot_axpy() {
        assert_eq!(dot(&[1., 2., 3.], &[4., 5., 6.]), 32.);
        let mut y = vec![1., 1.];
        axpy(2., &[1., -1.], &mut y);
        assert_eq!(y, vec![3., -1.]);
    }

    #[test]
    fn test_gemv_all_storages() {
        let x = [1., -1., 2.];
        for m in matrices() {
            let mut y = vec![1., 1., 1., 1.];
            gemv(2., &m, &x, 1., &mut y);
            assert_eq!(y, vec![11., -5., 29., 25.], "{:?}", m);
        }
    }

    #[test]
    fn test_gemv_transposed_all_storages() {
        let x = [1., 2., -1., 0.5];
        for m in matrices() {
            let mut y = vec![10., 10., 10.];
            gemv_transposed(1., &m, &x, 0.5, &mut y);
            assert_eq!(y, vec![2., 11., 5.], "{:?}", m);
        }
    }

    #[test]
    fn test_gemv_beta_zero_overwrites() {
        let x = [0., 0., 0.];
        for m in matrices() {
            let mut y = vec![f64::NAN; 4];
            gemv(1., &m, &x, 0., &mut y);
            assert_eq!(y, vec![0.; 4]);
        }
    }

    #[test]
    #[should_panic]
    fn test_gemv_dimension_mismatch() {
        let m = &matrices()[0];
        let mut y = vec![0.; 4];
        gemv(1., m, &[1., 2.], 0., &mut y);
    }
}
