use crate::engine::{ArgType, Arguments, ReturnType, ScalarFunction, Signature, value_at};
use crate::util::Result;
use arrow::array::{ArrayRef, Int32Array, Int64Array, ListBuilder, StringArray, StringBuilder};
use arrow::datatypes::{DataType, Field};
use rasterql_datatypes::raster::{CellType, Tile, tile_data_type, tiles_to_arrow};
use std::str::FromStr;
use std::sync::Arc;

/// Applies `f` to the tile of every row, failing with `NullTile` on null tiles
fn map_required_tiles<T>(
    args: &Arguments<'_>,
    num_rows: usize,
    f: impl Fn(usize, &Tile) -> Result<T>,
) -> Result<Vec<T>> {
    let tiles = args.tiles(0)?;
    (0..num_rows)
        .map(|row| f(row, &tiles.required_tile(row)?))
        .collect()
}

macro_rules! tile_property_function {
    (
        $(#[$attr:meta])*
        $function:ident, $name:literal, $return_type:expr, $array:ty, |$tile:ident| $body:expr
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy)]
        pub struct $function;

        impl $function {
            pub const NAME: &'static str = $name;
        }

        impl ScalarFunction for $function {
            fn name(&self) -> &'static str {
                Self::NAME
            }

            fn signature(&self) -> Signature {
                Signature::new(vec![ArgType::Tile], ReturnType::Value($return_type))
            }

            fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
                self.signature().check(Self::NAME, args)?;
                let args = Arguments::new(Self::NAME, args);

                let values = map_required_tiles(&args, num_rows, |_, $tile| Ok($body))?;
                Ok(Arc::new(<$array>::from(values)))
            }
        }
    };
}

tile_property_function!(
    /// `grid_rows(tile)`
    GridRows, "grid_rows", DataType::Int32, Int32Array,
    |tile| i32::try_from(tile.rows()).unwrap_or(i32::MAX)
);

tile_property_function!(
    /// `grid_cols(tile)`
    GridCols, "grid_cols", DataType::Int32, Int32Array,
    |tile| i32::try_from(tile.cols()).unwrap_or(i32::MAX)
);

tile_property_function!(
    /// `cell_type(tile)` returns the cell type tag
    TileCellType, "cell_type", DataType::Utf8, StringArray,
    |tile| tile.cell_type().to_string()
);

tile_property_function!(
    /// `data_cells(tile)` counts the present cells
    DataCells, "data_cells", DataType::Int64, Int64Array,
    |tile| i64::try_from(tile.data_cells()).unwrap_or(i64::MAX)
);

tile_property_function!(
    /// `no_data_cells(tile)` counts the absent cells
    NoDataCells, "no_data_cells", DataType::Int64, Int64Array,
    |tile| i64::try_from(tile.no_data_cells()).unwrap_or(i64::MAX)
);

/// `convert_cell_type(tile, cell_type)`
#[derive(Debug, Clone, Copy)]
pub struct ConvertCellType;

impl ConvertCellType {
    pub const NAME: &'static str = "convert_cell_type";
}

impl ScalarFunction for ConvertCellType {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(
            vec![ArgType::Tile, ArgType::Utf8],
            ReturnType::Value(tile_data_type()),
        )
    }

    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);
        let cell_types = args.utf8(1)?;

        let converted = map_required_tiles(&args, num_rows, |row, tile| {
            let cell_type = args.non_null("cell_type", value_at(cell_types, row))?;
            Ok(tile.convert(CellType::from_str(cell_type)?))
        })?;

        Ok(Arc::new(tiles_to_arrow(converted.iter().map(Some))?))
    }
}

/// `cell_types()` lists the tags of all raw and default cell types
#[derive(Debug, Clone, Copy)]
pub struct CellTypes;

impl CellTypes {
    pub const NAME: &'static str = "cell_types";

    fn item_field() -> Field {
        Field::new("item", DataType::Utf8, false)
    }
}

impl ScalarFunction for CellTypes {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(
            vec![],
            ReturnType::Value(DataType::List(Arc::new(Self::item_field()))),
        )
    }

    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;

        let tags: Vec<String> = CellType::all().iter().map(ToString::to_string).collect();

        let mut builder = ListBuilder::new(StringBuilder::new()).with_field(Self::item_field());
        for _ in 0..num_rows {
            for tag in &tags {
                builder.values().append_value(tag);
            }
            builder.append(true);
        }

        Ok(Arc::new(builder.finish()))
    }
}
