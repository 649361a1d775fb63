mod arrow_conversion;
mod cell_type;
mod data_type;
mod grid_shape;
mod tile;
mod tile_codec;

pub use self::arrow_conversion::{
    EXTENSION_NAME_KEY, MULTIBAND_TILE_EXTENSION_NAME, MultibandTileArray, TILE_EXTENSION_NAME,
    TILE_FEATURE_EXTENSION_NAME, TileArray, TileFeatureArray, multiband_tile_data_type,
    multiband_tile_field, multiband_tiles_to_arrow, tile_data_type, tile_feature_data_type,
    tile_feature_field, tile_features_to_arrow, tile_field, tile_fields, tiles_to_arrow,
};
pub use self::cell_type::{CellType, NoData};
pub use self::data_type::{DefaultNoDataValue, Pixel, RasterDataType, StaticRasterDataType};
pub use self::grid_shape::GridShape2D;
pub use self::tile::{MetadataCodec, MultibandTile, Tile, TileFeature};
pub use self::tile_codec::{
    decode_multiband_tile, decode_tile, decode_tile_feature, decode_tile_prefix,
    encode_multiband_tile, encode_tile, encode_tile_feature, encode_tile_into, encoded_tile_len,
};
