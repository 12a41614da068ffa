//! Data
//!
//! Instances, block matrices and the blocks of instances consumed by the aggregator.
use crate::constants::{DENSE_VALUE_BYTES, SPARSE_POINTER_BYTES, SPARSE_VALUE_BYTES};
use crate::errors::AggregatorError;
use serde::{Deserialize, Serialize};

/// A single training instance, with a dense feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Regression target.
    pub label: f64,
    /// Non-negative instance weight.
    pub weight: f64,
    /// Feature values.
    pub features: Vec<f64>,
}

impl Instance {
    /// Create a new instance.
    pub fn new(label: f64, weight: f64, features: Vec<f64>) -> Self {
        Instance {
            label,
            weight,
            features,
        }
    }
}

/// Contiguous dense matrix.
///
/// Column major by default. A transposed matrix stores its values row by row,
/// so that each instance occupies one contiguous stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    /// The raw values.
    pub values: Vec<f64>,
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
    is_transposed: bool,
}

impl DenseMatrix {
    /// Create a new column major matrix.
    pub fn new(values: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(values.len(), rows * cols, "Number of values must equal rows * cols");
        DenseMatrix {
            values,
            rows,
            cols,
            is_transposed: false,
        }
    }

    /// Create a new matrix from values laid out row by row.
    pub fn from_rows(values: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(values.len(), rows * cols, "Number of values must equal rows * cols");
        DenseMatrix {
            values,
            rows,
            cols,
            is_transposed: true,
        }
    }

    /// Whether values are stored row by row.
    pub fn is_transposed(&self) -> bool {
        self.is_transposed
    }

    /// Get a single item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        if self.is_transposed {
            i * self.cols + j
        } else {
            j * self.rows + i
        }
    }
}

/// Compressed sparse matrix.
///
/// Column compressed (CSC) by default: `ptrs` has `cols + 1` entries and
/// `indices` holds row indices. A transposed matrix is row compressed (CSR):
/// `ptrs` has `rows + 1` entries and `indices` holds column indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
    /// Start offset of every compressed major slice, plus the total count.
    pub ptrs: Vec<usize>,
    /// Minor index of every stored value.
    pub indices: Vec<usize>,
    /// Stored values.
    pub values: Vec<f64>,
    is_transposed: bool,
}

impl SparseMatrix {
    /// Create a column compressed matrix.
    pub fn new_csc(rows: usize, cols: usize, col_ptrs: Vec<usize>, row_indices: Vec<usize>, values: Vec<f64>) -> Self {
        Self::checked(rows, cols, col_ptrs, row_indices, values, false)
    }

    /// Create a row compressed matrix, this is the transposed layout.
    pub fn new_csr(rows: usize, cols: usize, row_ptrs: Vec<usize>, col_indices: Vec<usize>, values: Vec<f64>) -> Self {
        Self::checked(rows, cols, row_ptrs, col_indices, values, true)
    }

    fn checked(
        rows: usize,
        cols: usize,
        ptrs: Vec<usize>,
        indices: Vec<usize>,
        values: Vec<f64>,
        is_transposed: bool,
    ) -> Self {
        let (major, minor) = if is_transposed { (rows, cols) } else { (cols, rows) };
        assert_eq!(ptrs.len(), major + 1, "Pointer array must have one entry per slice plus one");
        assert_eq!(indices.len(), values.len(), "Indices and values must have equal length");
        assert_eq!(ptrs[major], values.len(), "Last pointer must equal the number of values");
        assert!(
            ptrs[0] == 0 && ptrs.windows(2).all(|w| w[0] <= w[1]),
            "Pointers must start at zero and be non-decreasing"
        );
        assert!(indices.iter().all(|&i| i < minor), "Index out of bounds");
        SparseMatrix {
            rows,
            cols,
            ptrs,
            indices,
            values,
            is_transposed,
        }
    }

    /// Build a row compressed matrix from values laid out row by row,
    /// dropping zeros.
    pub fn from_dense_rows(values: &[f64], rows: usize, cols: usize) -> Self {
        assert_eq!(values.len(), rows * cols, "Number of values must equal rows * cols");
        let mut ptrs = Vec::with_capacity(rows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        ptrs.push(0);
        for row in values.chunks(cols.max(1)).take(rows) {
            for (j, v) in row.iter().enumerate() {
                if *v != 0.0 {
                    indices.push(j);
                    data.push(*v);
                }
            }
            ptrs.push(data.len());
        }
        // A matrix without columns still needs one pointer per row.
        ptrs.resize(rows + 1, 0);
        SparseMatrix {
            rows,
            cols,
            ptrs,
            indices,
            values: data,
            is_transposed: true,
        }
    }

    /// Whether the matrix is row compressed.
    pub fn is_transposed(&self) -> bool {
        self.is_transposed
    }

    /// Number of stored values.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Get a single item in the matrix, zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (major, minor) = if self.is_transposed { (i, j) } else { (j, i) };
        let (start, end) = (self.ptrs[major], self.ptrs[major + 1]);
        self.indices[start..end]
            .iter()
            .position(|&idx| idx == minor)
            .map_or(0.0, |p| self.values[start + p])
    }
}

/// Feature storage of a block, either dense or sparse.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockMatrix {
    Dense(DenseMatrix),
    Sparse(SparseMatrix),
}

impl BlockMatrix {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        match self {
            BlockMatrix::Dense(m) => m.rows,
            BlockMatrix::Sparse(m) => m.rows,
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        match self {
            BlockMatrix::Dense(m) => m.cols,
            BlockMatrix::Sparse(m) => m.cols,
        }
    }

    /// Whether each stored row holds one instance.
    pub fn is_transposed(&self) -> bool {
        match self {
            BlockMatrix::Dense(m) => m.is_transposed(),
            BlockMatrix::Sparse(m) => m.is_transposed(),
        }
    }

    /// Get a single item in the matrix.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            BlockMatrix::Dense(m) => m.get(i, j),
            BlockMatrix::Sparse(m) => m.get(i, j),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, BlockMatrix::Sparse(_))
    }
}

/// A block of instances: features, labels and weights.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceBlock {
    /// Regression targets, one per row.
    pub labels: Vec<f64>,
    /// Instance weights, one per row.
    pub weights: Vec<f64>,
    /// Feature matrix, one instance per row.
    pub matrix: BlockMatrix,
}

impl InstanceBlock {
    /// Create a new block.
    pub fn new(matrix: BlockMatrix, labels: Vec<f64>, weights: Vec<f64>) -> Self {
        assert_eq!(labels.len(), matrix.rows(), "Number of labels must match number of rows");
        assert_eq!(weights.len(), matrix.rows(), "Number of weights must match number of rows");
        InstanceBlock {
            labels,
            weights,
            matrix,
        }
    }

    /// Number of instances in the block.
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    /// Number of features of every instance.
    pub fn num_features(&self) -> usize {
        self.matrix.cols()
    }

    /// Stack instances into a single block.
    ///
    /// Features are stored sparse when that takes fewer bytes than dense storage.
    pub fn from_instances(instances: &[Instance], num_features: usize) -> Result<Self, AggregatorError> {
        let rows = instances.len();
        let mut values = Vec::with_capacity(rows * num_features);
        let mut labels = Vec::with_capacity(rows);
        let mut weights = Vec::with_capacity(rows);
        for instance in instances {
            if instance.features.len() != num_features {
                return Err(AggregatorError::DimensionMismatch {
                    expected: num_features,
                    found: instance.features.len(),
                });
            }
            values.extend_from_slice(&instance.features);
            labels.push(instance.label);
            weights.push(instance.weight);
        }

        let nnz = values.iter().filter(|v| **v != 0.0).count();
        let matrix = if sparse_size(nnz, rows) < dense_size(rows, num_features) {
            BlockMatrix::Sparse(SparseMatrix::from_dense_rows(&values, rows, num_features))
        } else {
            BlockMatrix::Dense(DenseMatrix::from_rows(values, rows, num_features))
        };
        Ok(InstanceBlock::new(matrix, labels, weights))
    }
}

fn dense_size(rows: usize, cols: usize) -> usize {
    DENSE_VALUE_BYTES * rows * cols
}

fn sparse_size(nnz: usize, rows: usize) -> usize {
    SPARSE_VALUE_BYTES * nnz + SPARSE_POINTER_BYTES * (rows + 1)
}

/// Group instances into blocks of at most `max_rows` instances, preserving order.
///
/// * `instances` - Instances of one partition.
/// * `num_features` - Number of features of every instance.
/// * `max_rows` - Maximum number of instances per block.
pub fn blockify(
    instances: &[Instance],
    num_features: usize,
    max_rows: usize,
) -> Result<Vec<InstanceBlock>, AggregatorError> {
    if max_rows == 0 {
        return Err(AggregatorError::InvalidParameter(
            "max_rows".to_string(),
            "a positive number of rows".to_string(),
            max_rows.to_string(),
        ));
    }
    instances
        .chunks(max_rows)
        .map(|chunk| InstanceBlock::from_instances(chunk, num_features))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_matrix_get() {
        let m = DenseMatrix::new(vec![1., 2., 3., 5., 6., 7.], 3, 2);
        assert!(!m.is_transposed());
        assert_eq!(m.get(0, 0), 1.);
        assert_eq!(m.get(2, 1), 7.);

        let m = DenseMatrix::from_rows(vec![1., 2., 3., 5., 6., 7.], 2, 3);
        assert!(m.is_transposed());
        assert_eq!(m.get(1, 0), 5.);
        assert_eq!(m.get(0, 2), 3.);
    }

    #[test]
    fn test_sparse_matrix_get() {
        // 1 0 2
        // 0 3 0
        let csr = SparseMatrix::new_csr(2, 3, vec![0, 2, 3], vec![0, 2, 1], vec![1., 2., 3.]);
        let csc = SparseMatrix::new_csc(2, 3, vec![0, 1, 2, 3], vec![0, 1, 0], vec![1., 3., 2.]);
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(csr.get(i, j), csc.get(i, j));
            }
        }
        assert_eq!(csr.get(0, 2), 2.);
        assert_eq!(csr.get(1, 0), 0.);
        assert_eq!(csr.nnz(), 3);
    }

    #[test]
    fn test_sparse_from_dense_rows() {
        let values = vec![0., 0., 4., 0., 5., 0.];
        let m = SparseMatrix::from_dense_rows(&values, 2, 3);
        assert!(m.is_transposed());
        assert_eq!(m.ptrs, vec![0, 1, 2]);
        assert_eq!(m.indices, vec![2, 1]);
        assert_eq!(m.get(0, 2), 4.);
        assert_eq!(m.get(1, 1), 5.);
    }

    #[test]
    #[should_panic]
    fn test_sparse_bad_pointers() {
        SparseMatrix::new_csr(2, 2, vec![0, 1], vec![0], vec![1.]);
    }

    #[test]
    #[should_panic(expected = "Pointers must start at zero and be non-decreasing")]
    fn test_sparse_decreasing_pointers() {
        SparseMatrix::new_csr(2, 3, vec![0, 5, 3], vec![0, 1, 2], vec![1., 2., 3.]);
    }

    #[test]
    #[should_panic(expected = "Pointers must start at zero and be non-decreasing")]
    fn test_sparse_nonzero_first_pointer() {
        SparseMatrix::new_csc(2, 1, vec![1, 1], vec![0], vec![1.]);
    }

    #[test]
    fn test_block_from_instances_storage() {
        let dense = vec![
            Instance::new(1., 1., vec![1., 2., 3.]),
            Instance::new(2., 1., vec![4., 5., 6.]),
        ];
        let block = InstanceBlock::from_instances(&dense, 3).unwrap();
        assert!(!block.matrix.is_sparse());
        assert!(block.matrix.is_transposed());
        assert_eq!(block.size(), 2);
        assert_eq!(block.num_features(), 3);
        assert_eq!(block.matrix.get(1, 2), 6.);

        let mut features = vec![0.; 50];
        features[7] = 1.5;
        let sparse = vec![Instance::new(0., 1., features.clone()), Instance::new(0., 2., features)];
        let block = InstanceBlock::from_instances(&sparse, 50).unwrap();
        assert!(block.matrix.is_sparse());
        assert!(block.matrix.is_transposed());
        assert_eq!(block.matrix.get(1, 7), 1.5);
        assert_eq!(block.weights, vec![1., 2.]);
    }

    #[test]
    fn test_block_from_instances_mismatch() {
        let instances = vec![Instance::new(1., 1., vec![1., 2.]), Instance::new(1., 1., vec![1.])];
        let err = InstanceBlock::from_instances(&instances, 2).unwrap_err();
        assert_eq!(err, AggregatorError::DimensionMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn test_blockify() {
        let instances: Vec<Instance> = (0..10).map(|i| Instance::new(i as f64, 1., vec![i as f64, 1.])).collect();
        let blocks = blockify(&instances, 2, 4).unwrap();
        assert_eq!(blocks.iter().map(|b| b.size()).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(blocks[2].labels, vec![8., 9.]);
        assert!(blockify(&instances, 2, 0).is_err());
    }
}
