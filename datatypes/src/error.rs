use snafu::Snafu;

use crate::raster::GridShape2D;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    #[snafu(display("Arrow internal error: {:?}", source))]
    ArrowInternal {
        source: arrow::error::ArrowError,
    },

    #[snafu(display("Unknown or malformed cell type `{}`", cell_type))]
    InvalidCellType {
        cell_type: String,
    },

    #[snafu(display("Corrupt tile encoding: {}", reason))]
    CorruptTileEncoding {
        reason: String,
    },

    #[snafu(display(
        "Tiles must have a positive number of columns and rows, got {}x{}",
        cols,
        rows
    ))]
    InvalidDimensions {
        cols: i64,
        rows: i64,
    },

    #[snafu(display(
        "Tile dimensions do not match: expected {}x{}, found {}x{}",
        expected.axis_size_x(),
        expected.axis_size_y(),
        found.axis_size_x(),
        found.axis_size_y()
    ))]
    DimensionMismatch {
        expected: GridShape2D,
        found: GridShape2D,
    },

    #[snafu(display(
        "Dimension capacity ≠ data capacity ({} ≠ {})",
        dimension_cap,
        data_cap
    ))]
    DimensionCapacityDoesNotMatchDataCapacity {
        dimension_cap: usize,
        data_cap: usize,
    },

    #[snafu(display("A multiband tile needs at least one band"))]
    EmptyMultibandTile,

    #[snafu(display("A multiband tile can have at most {} bands, got {}", u16::MAX, count))]
    TooManyBands {
        count: usize,
    },

    #[snafu(display("Column of type {} is not a tile column", data_type))]
    InvalidTileColumn {
        data_type: String,
    },

    #[snafu(display("A required tile argument is null"))]
    NullTile,

    #[snafu(display("Cannot flatten values of type {}", data_type))]
    UnsupportedFlatten {
        data_type: String,
    },

    #[snafu(display("Cannot compute {} of an empty aggregate", statistic))]
    EmptyAggregate {
        statistic: &'static str,
    },

    #[snafu(display(
        "{:?} is not a valid index for a tile with {} columns and {} rows",
        index,
        cols,
        rows
    ))]
    GridIndexOutOfBounds {
        index: [usize; 2],
        cols: usize,
        rows: usize,
    },

    #[snafu(display(
        "The conditions xmin <= xmax && ymin <= ymax are not met by ({}, {}, {}, {})",
        xmin,
        ymin,
        xmax,
        ymax
    ))]
    InvalidExtent {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },

    #[snafu(display(
        "Histograms with bucket widths {:?} and {:?} cannot be merged",
        a,
        b
    ))]
    IncompatibleHistograms {
        a: Option<f64>,
        b: Option<f64>,
    },

    #[snafu(display("Invalid cell value: {}", details))]
    InvalidCellValue {
        details: String,
    },

    #[snafu(display("Cannot (de)serialize metadata: {}", source))]
    MetadataSerialization {
        source: serde_json::Error,
    },

    #[snafu(display("Invalid timestamp: {} ms", millis))]
    InvalidTimeInstance {
        millis: i64,
    },
}

impl From<arrow::error::ArrowError> for Error {
    fn from(source: arrow::error::ArrowError) -> Self {
        Error::ArrowInternal { source }
    }
}
