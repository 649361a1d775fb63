use crate::engine::{
    ArgType, Arguments, GeneratedRows, GeneratorFunction, ReturnType, ScalarFunction, Signature,
    value_at,
};
use crate::util::Result;
use arrow::array::{ArrayRef, UInt32Array};
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use rasterql_datatypes::raster::{
    CellType, RasterDataType, Tile, tile_data_type, tile_field, tiles_to_arrow,
};
use std::str::FromStr;
use std::sync::Arc;

/// `make_constant_tile(value, cols, rows, cell_type)`
///
/// A null value fills the tile with absent cells, any other null argument yields a null tile.
#[derive(Debug, Clone, Copy)]
pub struct MakeConstantTile;

impl MakeConstantTile {
    pub const NAME: &'static str = "make_constant_tile";
}

impl ScalarFunction for MakeConstantTile {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(
            vec![ArgType::Float64, ArgType::Int32, ArgType::Int32, ArgType::Utf8],
            ReturnType::Value(tile_data_type()),
        )
    }

    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);

        let values = args.float64(0)?;
        let cols = args.int32(1)?;
        let rows = args.int32(2)?;
        let cell_types = args.utf8(3)?;

        let mut tiles = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let (Some(cols), Some(rows), Some(cell_type)) = (
                value_at(cols, row),
                value_at(rows, row),
                value_at(cell_types, row),
            ) else {
                tiles.push(None);
                continue;
            };

            let cell_type = CellType::from_str(cell_type)?;
            tiles.push(Some(Tile::filled(
                cell_type,
                i64::from(cols),
                i64::from(rows),
                value_at(values, row),
            )?));
        }

        Ok(Arc::new(tiles_to_arrow(tiles.iter().map(Option::as_ref))?))
    }
}

/// `make_tiles(n)` emits `n` small tiles per input row
#[derive(Debug, Clone, Copy)]
pub struct MakeTiles;

impl MakeTiles {
    pub const NAME: &'static str = "make_tiles";
    const SIZE: usize = 4;

    /// A 4x4 `uint8raw` tile whose cells hold `row * 4 + col`
    pub fn sample_tile() -> Result<Tile> {
        Ok(Tile::from_cells(
            CellType::raw(RasterDataType::U8),
            Self::SIZE,
            Self::SIZE,
            (0..Self::SIZE * Self::SIZE).map(|index| Some(index as f64)),
        )?)
    }
}

impl GeneratorFunction for MakeTiles {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![ArgType::Int32], ReturnType::Rows)
    }

    fn output_schema(&self, _num_args: usize) -> SchemaRef {
        Arc::new(Schema::new(vec![tile_field("tile")]))
    }

    fn generate(&self, args: &[ArrayRef], num_rows: usize) -> Result<GeneratedRows> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);
        let counts = args.int32(0)?;

        let tile = Self::sample_tile()?;
        let mut parent_rows = Vec::new();
        for row in 0..num_rows {
            let count = args.non_null("n", value_at(counts, row))?;
            let count = usize::try_from(count)
                .map_err(|_| args.invalid(format!("`n` must not be negative, got {count}")))?;

            parent_rows.extend(std::iter::repeat_n(row as u32, count));
        }

        let tiles = tiles_to_arrow(parent_rows.iter().map(|_| Some(&tile)))?;
        let batch =
            RecordBatch::try_new(self.output_schema(1), vec![Arc::new(tiles) as ArrayRef])?;

        Ok(GeneratedRows {
            parent_rows: UInt32Array::from(parent_rows),
            batch,
        })
    }
}
