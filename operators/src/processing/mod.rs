mod aggregate;
mod constant_tile;
mod explode;
mod flatten;
pub mod focal;
mod local_aggregate;
pub mod statistics;
mod tile_properties;

pub use self::aggregate::{AggregateState, TileAggregate, TileAggregateFunction};
pub use self::constant_tile::{MakeConstantTile, MakeTiles};
pub use self::explode::{
    COLUMN_INDEX_FIELD_NAME, ExplodeTiles, ExplodeTilesSample, ROW_INDEX_FIELD_NAME,
};
pub use self::flatten::Flatten;
pub use self::focal::{FocalOperation, FocalReduce, Neighborhood, NeighborhoodShape, focal_reduce};
pub use self::local_aggregate::{
    BinaryOperation, LocalAggregate, LocalMax, LocalMin, Max, Min, combine_tiles,
};
pub use self::statistics::{AggHistogram, AggMean, AggStats, TileHistogram, TileMean, TileStats};
pub use self::tile_properties::{
    CellTypes, ConvertCellType, DataCells, GridCols, GridRows, NoDataCells, TileCellType,
};
