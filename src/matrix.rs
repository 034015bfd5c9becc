//! Dense 2D float buffer used by every kernel.
//!
//! Rows index units (neurons, features), columns index minibatch examples.
//! Storage is row-major, so the values of one unit across the whole
//! minibatch are contiguous: element `(unit, p)` lives at `unit * columns + p`.

/// Dense row-major matrix of `f32` values.
///
/// The buffer length always equals `rows * columns`. A matrix is never
/// resized in place; when dimensions change a new matrix replaces it.
///
/// # Example
///
/// ```
/// use neural_kernels::matrix::Matrix;
///
/// // Two units, one minibatch column.
/// let visible = Matrix::from_elements(vec![0.35, 0.9], 1);
/// assert_eq!(visible.rows(), 2);
/// assert_eq!(visible.get(1, 0), 0.9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    elements: Vec<f32>,
    rows: usize,
    columns: usize,
}

impl Matrix {
    /// Create a zero-filled matrix.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            elements: vec![0.0f32; rows * columns],
            rows,
            columns,
        }
    }

    /// Wrap an existing buffer, deriving the row count from its length.
    ///
    /// # Panics
    ///
    /// Panics if `columns` is zero or the buffer length is not a multiple of `columns`.
    pub fn from_elements(elements: Vec<f32>, columns: usize) -> Self {
        assert!(columns > 0, "Matrix must have at least one column");
        assert_eq!(
            elements.len() % columns,
            0,
            "Buffer length must be a multiple of the column count"
        );
        let rows = elements.len() / columns;
        Self {
            elements,
            rows,
            columns,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Flat index of `(row, col)`.
    ///
    /// Panics when either coordinate is out of range, even if the flat index
    /// would still land inside the buffer.
    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.columns,
            "Index ({}, {}) out of range for {}x{} matrix",
            row,
            col,
            self.rows,
            self.columns
        );
        row * self.columns + col
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.elements[self.index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = self.index(row, col);
        self.elements[idx] = value;
    }

    /// Raw buffer access for kernels.
    pub fn elements(&self) -> &[f32] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [f32] {
        &mut self.elements
    }

    /// Values of one unit across all minibatch columns.
    pub fn row(&self, row: usize) -> &[f32] {
        let start = self.index(row, 0);
        &self.elements[start..start + self.columns]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        let start = self.index(row, 0);
        let columns = self.columns;
        &mut self.elements[start..start + columns]
    }

    /// Copy of one minibatch column (the values of one example).
    pub fn column(&self, col: usize) -> Vec<f32> {
        assert!(col < self.columns, "Column {} out of range", col);
        self.elements
            .iter()
            .skip(col)
            .step_by(self.columns)
            .copied()
            .collect()
    }

    pub fn fill(&mut self, value: f32) {
        self.elements.fill(value);
    }

    /// True when the matrix already has the requested shape.
    pub fn has_shape(&self, rows: usize, columns: usize) -> bool {
        self.rows == rows && self.columns == columns
    }
}
