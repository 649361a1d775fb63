use serde::{Deserialize, Serialize};

/// A `GridShape2D` describes the shape of a 2D grid by storing the size of each axis in `[y, x]` order.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Serialize, Deserialize)]
pub struct GridShape2D {
    pub shape_array: [usize; 2],
}

impl GridShape2D {
    /// create a new `GridShape2D` from `[rows, cols]`
    pub fn new(shape: [usize; 2]) -> Self {
        Self { shape_array: shape }
    }

    pub fn new_cols_rows(cols: usize, rows: usize) -> Self {
        Self::new([rows, cols])
    }

    /// The number of columns
    pub fn axis_size_x(&self) -> usize {
        self.shape_array[1]
    }

    /// The number of rows
    pub fn axis_size_y(&self) -> usize {
        self.shape_array[0]
    }

    pub fn number_of_elements(&self) -> usize {
        let [a, b] = self.shape_array;
        a * b
    }

    pub fn contains(&self, col: usize, row: usize) -> bool {
        col < self.axis_size_x() && row < self.axis_size_y()
    }

    /// The row-major position of a cell
    pub fn linear_space_index_unchecked(&self, col: usize, row: usize) -> usize {
        row * self.axis_size_x() + col
    }

    /// The `(col, row)` position of a row-major index
    pub fn grid_index_unchecked(&self, linear_index: usize) -> (usize, usize) {
        let cols = self.axis_size_x();
        (linear_index % cols, linear_index / cols)
    }
}

impl From<[usize; 2]> for GridShape2D {
    fn from(shape: [usize; 2]) -> Self {
        GridShape2D { shape_array: shape }
    }
}

impl std::fmt::Display for GridShape2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.axis_size_x(), self.axis_size_y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_sizes() {
        let shape = GridShape2D::new_cols_rows(3, 2);

        assert_eq!(shape.axis_size_x(), 3);
        assert_eq!(shape.axis_size_y(), 2);
        assert_eq!(shape.number_of_elements(), 6);
        assert_eq!(shape, [2, 3].into());
        assert_eq!(shape.to_string(), "3x2");
    }

    #[test]
    fn linear_index() {
        let shape = GridShape2D::new_cols_rows(3, 2);

        assert_eq!(shape.linear_space_index_unchecked(0, 0), 0);
        assert_eq!(shape.linear_space_index_unchecked(2, 0), 2);
        assert_eq!(shape.linear_space_index_unchecked(0, 1), 3);
        assert_eq!(shape.grid_index_unchecked(4), (1, 1));

        assert!(shape.contains(2, 1));
        assert!(!shape.contains(3, 0));
        assert!(!shape.contains(0, 2));
    }
}
