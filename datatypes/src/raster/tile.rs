use super::{CellType, GridShape2D};
use crate::error::{self, Error};
use crate::util::Result;
use snafu::ensure;

/// An immutable 2D grid of cells of a single `CellType`, stored row-major as little-endian bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    cell_type: CellType,
    shape: GridShape2D,
    cells: Vec<u8>,
}

impl Tile {
    /// Creates a tile from a raw cell buffer
    ///
    /// # Errors
    ///
    /// This constructor fails if `cols` or `rows` is zero or exceeds `u32::MAX` or if the buffer length does not equal
    /// `cols * rows * cell_type.byte_width()`.
    ///
    pub fn new(cell_type: CellType, cols: usize, rows: usize, cells: Vec<u8>) -> Result<Self> {
        let capacity = Self::byte_capacity(cell_type, cols, rows)?;

        ensure!(
            capacity == cells.len(),
            error::DimensionCapacityDoesNotMatchDataCapacity {
                dimension_cap: capacity,
                data_cap: cells.len()
            }
        );

        Ok(Self {
            cell_type,
            shape: GridShape2D::new_cols_rows(cols, rows),
            cells,
        })
    }

    /// Creates a tile where every cell holds `value`, `None` meaning absent
    ///
    /// # Errors
    ///
    /// This constructor fails with `InvalidDimensions` if `cols` or `rows` is not positive.
    ///
    pub fn filled(cell_type: CellType, cols: i64, rows: i64, value: Option<f64>) -> Result<Self> {
        let (cols, rows) = Self::checked_dimensions(cols, rows)?;
        Self::from_cells(
            cell_type,
            cols,
            rows,
            std::iter::repeat_n(value, cols * rows),
        )
    }

    /// Creates a tile from row-major cell values, `None` meaning absent
    ///
    /// # Errors
    ///
    /// This constructor fails if the number of values does not match `cols * rows`.
    ///
    pub fn from_cells<I>(cell_type: CellType, cols: usize, rows: usize, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        Self::new(cell_type, cols, rows, cell_type.encode_all(values))
    }

    /// Converts signed dimensions into a valid tile size.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidDimensions` if `cols` or `rows` is not positive.
    ///
    pub fn checked_dimensions(cols: i64, rows: i64) -> Result<(usize, usize)> {
        let invalid = || Error::InvalidDimensions { cols, rows };

        ensure!(cols > 0 && rows > 0, error::InvalidDimensions { cols, rows });

        let cols = usize::try_from(cols).map_err(|_| invalid())?;
        let rows = usize::try_from(rows).map_err(|_| invalid())?;

        Ok((cols, rows))
    }

    fn byte_capacity(cell_type: CellType, cols: usize, rows: usize) -> Result<usize> {
        let invalid = || Error::InvalidDimensions {
            cols: i64::try_from(cols).unwrap_or(i64::MAX),
            rows: i64::try_from(rows).unwrap_or(i64::MAX),
        };

        if cols == 0 || rows == 0 || cols > u32::MAX as usize || rows > u32::MAX as usize {
            return Err(invalid());
        }

        cols.checked_mul(rows)
            .and_then(|cells| cells.checked_mul(cell_type.byte_width()))
            .ok_or_else(invalid)
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn shape(&self) -> GridShape2D {
        self.shape
    }

    pub fn cols(&self) -> usize {
        self.shape.axis_size_x()
    }

    pub fn rows(&self) -> usize {
        self.shape.axis_size_y()
    }

    pub fn number_of_cells(&self) -> usize {
        self.shape.number_of_elements()
    }

    /// The raw little-endian cell buffer
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<u8> {
        self.cells
    }

    /// The value at `(col, row)`, `None` for absent cells
    ///
    /// # Errors
    ///
    /// Fails if the position lies outside the tile.
    ///
    pub fn get(&self, col: usize, row: usize) -> Result<Option<f64>> {
        ensure!(
            self.shape.contains(col, row),
            error::GridIndexOutOfBounds {
                index: [col, row],
                cols: self.cols(),
                rows: self.rows(),
            }
        );

        Ok(self.cell(self.shape.linear_space_index_unchecked(col, row)))
    }

    /// The value at a row-major position
    ///
    /// # Panics
    ///
    /// If `index >= self.number_of_cells()`.
    pub fn cell(&self, index: usize) -> Option<f64> {
        self.cell_type.decode(&self.cells, index)
    }

    /// All values in row-major order, `None` for absent cells
    pub fn values(&self) -> Vec<Option<f64>> {
        self.cell_type.decode_all(&self.cells)
    }

    pub fn data_cells(&self) -> usize {
        self.values().iter().filter(|value| value.is_some()).count()
    }

    pub fn no_data_cells(&self) -> usize {
        self.number_of_cells() - self.data_cells()
    }

    /// Re-encodes the tile with another cell type. Absent cells stay absent as long as
    /// the target cell type can represent them.
    #[must_use]
    pub fn convert(&self, cell_type: CellType) -> Tile {
        if cell_type == self.cell_type {
            return self.clone();
        }

        Tile {
            cell_type,
            shape: self.shape,
            cells: cell_type.encode_all(self.values()),
        }
    }

    /// Fails with `DimensionMismatch` unless both tiles have the same number of columns and rows.
    ///
    /// # Errors
    ///
    /// See above.
    ///
    pub fn ensure_same_shape(&self, other: &Tile) -> Result<()> {
        ensure!(
            self.shape == other.shape,
            error::DimensionMismatch {
                expected: self.shape,
                found: other.shape,
            }
        );
        Ok(())
    }
}

/// An ordered, non-empty sequence of equally sized tiles with independent cell types
#[derive(Debug, Clone, PartialEq)]
pub struct MultibandTile {
    bands: Vec<Tile>,
}

impl MultibandTile {
    /// Creates a multiband tile
    ///
    /// # Errors
    ///
    /// Fails if there are no bands, more than `u16::MAX` bands or if the bands differ in dimensions.
    ///
    pub fn new(bands: Vec<Tile>) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::EmptyMultibandTile);
        };

        ensure!(
            bands.len() <= u16::MAX as usize,
            error::TooManyBands { count: bands.len() }
        );

        for band in &bands[1..] {
            first.ensure_same_shape(band)?;
        }

        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[Tile] {
        &self.bands
    }

    pub fn band(&self, index: usize) -> Option<&Tile> {
        self.bands.get(index)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn shape(&self) -> GridShape2D {
        self.bands[0].shape()
    }

    pub fn into_bands(self) -> Vec<Tile> {
        self.bands
    }
}

/// A tile paired with metadata that is opaque to the tile codec
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature<M> {
    pub tile: Tile,
    pub metadata: M,
}

impl<M> TileFeature<M> {
    pub fn new(tile: Tile, metadata: M) -> Self {
        Self { tile, metadata }
    }
}

/// Binary codec of tile feature metadata, supplied by the metadata type itself
pub trait MetadataCodec: Sized {
    /// # Errors
    ///
    /// Fails if the metadata cannot be serialized.
    fn encode_metadata(&self) -> Result<Vec<u8>>;

    /// # Errors
    ///
    /// Fails if `bytes` is no valid encoding.
    fn decode_metadata(bytes: &[u8]) -> Result<Self>;
}

impl MetadataCodec for Vec<u8> {
    fn encode_metadata(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn decode_metadata(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl MetadataCodec for String {
    fn encode_metadata(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }

    fn decode_metadata(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|source| Error::CorruptTileEncoding {
            reason: format!("metadata is not valid utf-8: {source}"),
        })
    }
}
