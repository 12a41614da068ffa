pub const DEFAULT_EPSILON: f64 = 1.35;
pub const MIN_CONFIG_EPSILON: f64 = 1.0;
pub const DEFAULT_MAX_BLOCK_ROWS: usize = 4096;
pub const DEFAULT_SIGMA: f64 = 1.0;
// Bytes per stored value: f64 value, u32 index.
pub const DENSE_VALUE_BYTES: usize = 8;
pub const SPARSE_VALUE_BYTES: usize = 12;
pub const SPARSE_POINTER_BYTES: usize = 4;
