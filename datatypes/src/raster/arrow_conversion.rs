use super::{CellType, MetadataCodec, MultibandTile, Tile, TileFeature};
use crate::error::Error;
use crate::util::Result;
use arrow::{
    array::{
        Array, ArrayRef, AsArray, BinaryArray, BinaryBuilder, ListArray, StringArray,
        StringBuilder, StructArray, UInt32Array, UInt32Builder,
    },
    buffer::{NullBuffer, OffsetBuffer},
    datatypes::{DataType, Field, Fields, UInt32Type},
};
use std::{collections::HashMap, sync::Arc};

pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";
pub const TILE_EXTENSION_NAME: &str = "rasterql.tile";
pub const MULTIBAND_TILE_EXTENSION_NAME: &str = "rasterql.multiband_tile";
pub const TILE_FEATURE_EXTENSION_NAME: &str = "rasterql.tile_feature";

const CELL_TYPE_FIELD_NAME: &str = "cell_type";
const COLS_FIELD_NAME: &str = "cols";
const ROWS_FIELD_NAME: &str = "rows";
const CELLS_FIELD_NAME: &str = "cells";
const BAND_FIELD_NAME: &str = "band";
const TILE_FIELD_NAME: &str = "tile";
const METADATA_FIELD_NAME: &str = "metadata";

fn extension_metadata(extension_name: &str) -> HashMap<String, String> {
    [(EXTENSION_NAME_KEY.to_string(), extension_name.to_string())].into()
}

/// The child fields of a tile struct column
pub fn tile_fields() -> Fields {
    Fields::from(vec![
        Field::new(CELL_TYPE_FIELD_NAME, DataType::Utf8, false),
        Field::new(COLS_FIELD_NAME, DataType::UInt32, false),
        Field::new(ROWS_FIELD_NAME, DataType::UInt32, false),
        Field::new(CELLS_FIELD_NAME, DataType::Binary, false),
    ])
}

pub fn tile_data_type() -> DataType {
    DataType::Struct(tile_fields())
}

/// A nullable tile column, tagged as tile extension type
pub fn tile_field(name: &str) -> Field {
    Field::new(name, tile_data_type(), true).with_metadata(extension_metadata(TILE_EXTENSION_NAME))
}

pub fn multiband_tile_data_type() -> DataType {
    DataType::List(Arc::new(tile_field(BAND_FIELD_NAME)))
}

pub fn multiband_tile_field(name: &str) -> Field {
    Field::new(name, multiband_tile_data_type(), true)
        .with_metadata(extension_metadata(MULTIBAND_TILE_EXTENSION_NAME))
}

fn tile_feature_fields() -> Fields {
    Fields::from(vec![
        tile_field(TILE_FIELD_NAME),
        Field::new(METADATA_FIELD_NAME, DataType::Binary, false),
    ])
}

pub fn tile_feature_data_type() -> DataType {
    DataType::Struct(tile_feature_fields())
}

pub fn tile_feature_field(name: &str) -> Field {
    Field::new(name, tile_feature_data_type(), true)
        .with_metadata(extension_metadata(TILE_FEATURE_EXTENSION_NAME))
}

/// Builds a tile column, `None` becoming a null entry
///
/// # Errors
///
/// Fails if arrow rejects the resulting struct array.
///
#[allow(clippy::cast_possible_truncation)]
pub fn tiles_to_arrow<'t, I>(tiles: I) -> Result<StructArray>
where
    I: IntoIterator<Item = Option<&'t Tile>>,
{
    let mut cell_types = StringBuilder::new();
    let mut cols = UInt32Builder::new();
    let mut rows = UInt32Builder::new();
    let mut cells = BinaryBuilder::new();
    let mut validity = Vec::new();

    for tile in tiles {
        if let Some(tile) = tile {
            cell_types.append_value(tile.cell_type().to_string());
            // `Tile` bounds its dimensions by `u32::MAX`
            cols.append_value(tile.cols() as u32);
            rows.append_value(tile.rows() as u32);
            cells.append_value(tile.cells());
        } else {
            // child fields are not nullable, so null tiles get placeholder values
            cell_types.append_value("");
            cols.append_value(0);
            rows.append_value(0);
            cells.append_value(b"");
        }
        validity.push(tile.is_some());
    }

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(cell_types.finish()),
        Arc::new(cols.finish()),
        Arc::new(rows.finish()),
        Arc::new(cells.finish()),
    ];

    Ok(StructArray::try_new(
        tile_fields(),
        arrays,
        Some(NullBuffer::from(validity)).filter(|nulls| nulls.null_count() > 0),
    )?)
}

/// Builds a multiband tile column, `None` becoming a null entry
///
/// # Errors
///
/// Fails if arrow rejects the resulting list array.
///
pub fn multiband_tiles_to_arrow<'t, I>(tiles: I) -> Result<ListArray>
where
    I: IntoIterator<Item = Option<&'t MultibandTile>>,
{
    let mut bands = Vec::new();
    let mut lengths = Vec::new();
    let mut validity = Vec::new();

    for tile in tiles {
        let band_count = tile.map_or(0, MultibandTile::band_count);
        bands.extend(tile.into_iter().flat_map(|tile| tile.bands().iter().map(Some)));
        lengths.push(band_count);
        validity.push(tile.is_some());
    }

    let values = tiles_to_arrow(bands)?;

    Ok(ListArray::try_new(
        Arc::new(tile_field(BAND_FIELD_NAME)),
        OffsetBuffer::from_lengths(lengths),
        Arc::new(values),
        Some(NullBuffer::from(validity)).filter(|nulls| nulls.null_count() > 0),
    )?)
}

/// Builds a tile feature column, `None` becoming a null entry
///
/// # Errors
///
/// Fails if some metadata cannot be encoded or if arrow rejects the resulting struct array.
///
pub fn tile_features_to_arrow<'t, M, I>(features: I) -> Result<StructArray>
where
    M: MetadataCodec + 't,
    I: IntoIterator<Item = Option<&'t TileFeature<M>>>,
{
    let mut tiles = Vec::new();
    let mut metadata = BinaryBuilder::new();
    let mut validity = Vec::new();

    for feature in features {
        if let Some(feature) = feature {
            tiles.push(Some(&feature.tile));
            metadata.append_value(feature.metadata.encode_metadata()?);
        } else {
            tiles.push(None);
            metadata.append_value(b"");
        }
        validity.push(feature.is_some());
    }

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(tiles_to_arrow(tiles)?),
        Arc::new(metadata.finish()),
    ];

    Ok(StructArray::try_new(
        tile_feature_fields(),
        arrays,
        Some(NullBuffer::from(validity)).filter(|nulls| nulls.null_count() > 0),
    )?)
}

fn invalid_column(array: &dyn Array) -> Error {
    Error::InvalidTileColumn {
        data_type: array.data_type().to_string(),
    }
}

/// Typed read access to a tile column
#[derive(Debug, Clone, Copy)]
pub struct TileArray<'a> {
    array: &'a StructArray,
    cell_types: &'a StringArray,
    cols: &'a UInt32Array,
    rows: &'a UInt32Array,
    cells: &'a BinaryArray,
}

impl<'a> TileArray<'a> {
    /// Wraps a tile column
    ///
    /// # Errors
    ///
    /// Fails with `InvalidTileColumn` if `array` does not have the tile struct layout.
    ///
    pub fn try_new(array: &'a dyn Array) -> Result<Self> {
        let invalid = || invalid_column(array);

        let array = array.as_struct_opt().ok_or_else(invalid)?;
        let column = |name: &str| array.column_by_name(name).ok_or_else(invalid);

        Ok(Self {
            array,
            cell_types: column(CELL_TYPE_FIELD_NAME)?
                .as_string_opt::<i32>()
                .ok_or_else(invalid)?,
            cols: column(COLS_FIELD_NAME)?
                .as_primitive_opt::<UInt32Type>()
                .ok_or_else(invalid)?,
            rows: column(ROWS_FIELD_NAME)?
                .as_primitive_opt::<UInt32Type>()
                .ok_or_else(invalid)?,
            cells: column(CELLS_FIELD_NAME)?
                .as_binary_opt::<i32>()
                .ok_or_else(invalid)?,
        })
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.array.is_null(index)
    }

    /// The tile at `index`, `None` if the entry is null
    ///
    /// # Errors
    ///
    /// Fails with `CorruptTileEncoding` if the entry does not describe a valid tile.
    ///
    pub fn tile(&self, index: usize) -> Result<Option<Tile>> {
        if self.array.is_null(index) {
            return Ok(None);
        }

        let tag = self.cell_types.value(index);
        let cell_type: CellType = tag.parse().map_err(|_| Error::CorruptTileEncoding {
            reason: format!("unknown cell type tag `{tag}`"),
        })?;

        Tile::new(
            cell_type,
            self.cols.value(index) as usize,
            self.rows.value(index) as usize,
            self.cells.value(index).to_vec(),
        )
        .map(Some)
        .map_err(|source| Error::CorruptTileEncoding {
            reason: source.to_string(),
        })
    }

    /// The tile at `index`
    ///
    /// # Errors
    ///
    /// Fails with `NullTile` if the entry is null or with `CorruptTileEncoding` if it is invalid.
    ///
    pub fn required_tile(&self, index: usize) -> Result<Tile> {
        self.tile(index)?.ok_or(Error::NullTile)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Option<Tile>>> + '_ {
        (0..self.len()).map(|index| self.tile(index))
    }
}

/// Typed read access to a multiband tile column
#[derive(Debug, Clone, Copy)]
pub struct MultibandTileArray<'a> {
    array: &'a ListArray,
    bands: TileArray<'a>,
}

impl<'a> MultibandTileArray<'a> {
    /// Wraps a multiband tile column
    ///
    /// # Errors
    ///
    /// Fails with `InvalidTileColumn` if `array` is no list of tiles.
    ///
    pub fn try_new(array: &'a dyn Array) -> Result<Self> {
        let list = array
            .as_list_opt::<i32>()
            .ok_or_else(|| invalid_column(array))?;

        Ok(Self {
            array: list,
            bands: TileArray::try_new(list.values().as_ref())?,
        })
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// The multiband tile at `index`, `None` if the entry is null
    ///
    /// # Errors
    ///
    /// Fails if a band is null or invalid or if the bands do not form a valid multiband tile.
    ///
    pub fn multiband_tile(&self, index: usize) -> Result<Option<MultibandTile>> {
        if self.array.is_null(index) {
            return Ok(None);
        }

        let offsets = self.array.value_offsets();
        let start = offsets[index] as usize;
        let end = offsets[index + 1] as usize;

        let bands = (start..end)
            .map(|band| self.bands.required_tile(band))
            .collect::<Result<Vec<_>>>()?;

        MultibandTile::new(bands).map(Some)
    }
}

/// Typed read access to a tile feature column
#[derive(Debug, Clone, Copy)]
pub struct TileFeatureArray<'a> {
    array: &'a StructArray,
    tiles: TileArray<'a>,
    metadata: &'a BinaryArray,
}

impl<'a> TileFeatureArray<'a> {
    /// Wraps a tile feature column
    ///
    /// # Errors
    ///
    /// Fails with `InvalidTileColumn` if `array` does not have the tile feature struct layout.
    ///
    pub fn try_new(array: &'a dyn Array) -> Result<Self> {
        let invalid = || invalid_column(array);

        let array = array.as_struct_opt().ok_or_else(invalid)?;
        let tiles = array.column_by_name(TILE_FIELD_NAME).ok_or_else(invalid)?;
        let metadata = array
            .column_by_name(METADATA_FIELD_NAME)
            .and_then(|metadata| metadata.as_binary_opt::<i32>())
            .ok_or_else(invalid)?;

        Ok(Self {
            array,
            tiles: TileArray::try_new(tiles.as_ref())?,
            metadata,
        })
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// The tile feature at `index`, `None` if the entry is null
    ///
    /// # Errors
    ///
    /// Fails if the tile is null or invalid or if the metadata codec rejects the metadata.
    ///
    pub fn feature<M: MetadataCodec>(&self, index: usize) -> Result<Option<TileFeature<M>>> {
        if self.array.is_null(index) {
            return Ok(None);
        }

        let tile = self.tiles.required_tile(index)?;
        let metadata = M::decode_metadata(self.metadata.value(index))?;

        Ok(Some(TileFeature::new(tile, metadata)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterDataType;
    use crate::util::test::checkerboard_tile;
    use arrow::array::Int32Array;

    #[test]
    fn tile_column_layout() {
        let field = tile_field("t");

        assert!(field.is_nullable());
        assert_eq!(
            field.metadata().get(EXTENSION_NAME_KEY).map(String::as_str),
            Some(TILE_EXTENSION_NAME)
        );
        let DataType::Struct(fields) = field.data_type() else {
            panic!("tile column must be a struct");
        };
        let names: Vec<&str> = fields.iter().map(|field| field.name().as_str()).collect();
        assert_eq!(names, ["cell_type", "cols", "rows", "cells"]);
    }

    #[test]
    fn tiles_with_nulls() {
        let a = checkerboard_tile(CellType::raw(RasterDataType::U8), 3, 2);
        let b = checkerboard_tile(CellType::with_default_no_data(RasterDataType::F64), 1, 4);

        let array = tiles_to_arrow([Some(&a), None, Some(&b)]).unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array.null_count(), 1);
        assert_eq!(array.data_type(), &tile_data_type());

        let tiles = TileArray::try_new(&array).unwrap();
        assert_eq!(tiles.tile(0).unwrap(), Some(a));
        assert_eq!(tiles.tile(1).unwrap(), None);
        assert_eq!(tiles.tile(2).unwrap(), Some(b));
        assert!(matches!(tiles.required_tile(1), Err(Error::NullTile)));
        assert_eq!(tiles.iter().filter(|tile| matches!(tile, Ok(Some(_)))).count(), 2);
    }

    #[test]
    fn rejects_other_columns() {
        let array = Int32Array::from(vec![1, 2, 3]);

        assert!(matches!(
            TileArray::try_new(&array),
            Err(Error::InvalidTileColumn { .. })
        ));
        assert!(matches!(
            MultibandTileArray::try_new(&array),
            Err(Error::InvalidTileColumn { .. })
        ));
        assert!(matches!(
            TileFeatureArray::try_new(&array),
            Err(Error::InvalidTileColumn { .. })
        ));
    }

    #[test]
    fn multiband_tiles() {
        let tile = MultibandTile::new(vec![
            checkerboard_tile(CellType::raw(RasterDataType::U16), 2, 2),
            checkerboard_tile(CellType::with_default_no_data(RasterDataType::F32), 2, 2),
        ])
        .unwrap();
        let single = MultibandTile::new(vec![checkerboard_tile(
            CellType::raw(RasterDataType::I8),
            5,
            1,
        )])
        .unwrap();

        let array = multiband_tiles_to_arrow([Some(&tile), None, Some(&single)]).unwrap();
        assert_eq!(array.data_type(), &multiband_tile_data_type());

        let tiles = MultibandTileArray::try_new(&array).unwrap();
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles.multiband_tile(0).unwrap(), Some(tile));
        assert_eq!(tiles.multiband_tile(1).unwrap(), None);
        assert_eq!(tiles.multiband_tile(2).unwrap(), Some(single));
    }

    #[test]
    fn tile_features() {
        let feature = TileFeature::new(
            checkerboard_tile(CellType::raw(RasterDataType::I32), 2, 3),
            "EPSG:4326".to_string(),
        );

        let array = tile_features_to_arrow([None, Some(&feature)]).unwrap();
        assert_eq!(array.data_type(), &tile_feature_data_type());

        let features = TileFeatureArray::try_new(&array).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features.feature::<String>(0).unwrap(), None);
        assert_eq!(features.feature::<String>(1).unwrap(), Some(feature));
    }
}
