use crate::engine::{
    ArgType, Arguments, GeneratedRows, GeneratorFunction, ReturnType, Signature, value_at,
};
use crate::util::Result;
use arrow::array::{ArrayRef, Float64Builder, UInt32Builder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rasterql_datatypes::raster::{Tile, TileArray};
use snafu::ensure;
use std::sync::Arc;

pub const COLUMN_INDEX_FIELD_NAME: &str = "column_index";
pub const ROW_INDEX_FIELD_NAME: &str = "row_index";

fn explode_schema(num_tiles: usize) -> SchemaRef {
    let mut fields = vec![
        Field::new(COLUMN_INDEX_FIELD_NAME, DataType::UInt32, false),
        Field::new(ROW_INDEX_FIELD_NAME, DataType::UInt32, false),
    ];
    fields.extend(
        (1..=num_tiles).map(|i| Field::new(format!("tile_{i}"), DataType::Float64, true)),
    );

    Arc::new(Schema::new(fields))
}

/// Accumulates the exploded cells of many input rows
struct ExplodedRows {
    parent_rows: UInt32Builder,
    column_indices: UInt32Builder,
    row_indices: UInt32Builder,
    cells: Vec<Float64Builder>,
}

impl ExplodedRows {
    fn new(num_tiles: usize) -> Self {
        Self {
            parent_rows: UInt32Builder::new(),
            column_indices: UInt32Builder::new(),
            row_indices: UInt32Builder::new(),
            cells: (0..num_tiles).map(|_| Float64Builder::new()).collect(),
        }
    }

    /// Appends the cells of co-located tiles in row-major order, skipping a cell if `keep` is false
    fn append(&mut self, parent_row: usize, tiles: &[Tile], mut keep: impl FnMut() -> bool) {
        let Some(first) = tiles.first() else {
            return;
        };
        let values: Vec<Vec<Option<f64>>> = tiles.iter().map(Tile::values).collect();

        for row in 0..first.rows() {
            for col in 0..first.cols() {
                if !keep() {
                    continue;
                }

                let index = first.shape().linear_space_index_unchecked(col, row);
                self.parent_rows.append_value(parent_row as u32);
                self.column_indices.append_value(col as u32);
                self.row_indices.append_value(row as u32);
                for (builder, tile_values) in self.cells.iter_mut().zip(&values) {
                    builder.append_option(tile_values[index]);
                }
            }
        }
    }

    fn finish(mut self, schema: SchemaRef) -> Result<GeneratedRows> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(self.column_indices.finish()),
            Arc::new(self.row_indices.finish()),
        ];
        columns.extend(
            self.cells
                .iter_mut()
                .map(|builder| Arc::new(builder.finish()) as ArrayRef),
        );

        Ok(GeneratedRows {
            parent_rows: self.parent_rows.finish(),
            batch: RecordBatch::try_new(schema, columns)?,
        })
    }
}

/// Reads the co-located tiles of one row
///
/// Fails with `NullTile` or `DimensionMismatch`.
fn co_located_tiles(columns: &[TileArray<'_>], row: usize) -> Result<Vec<Tile>> {
    let tiles = columns
        .iter()
        .map(|column| column.required_tile(row))
        .collect::<rasterql_datatypes::util::Result<Vec<Tile>>>()?;

    if let Some((first, rest)) = tiles.split_first() {
        for tile in rest {
            first.ensure_same_shape(tile)?;
        }
    }

    Ok(tiles)
}

/// `explode_tiles(tile, ...)` emits one row per cell position of the co-located tiles
#[derive(Debug, Clone, Copy)]
pub struct ExplodeTiles;

impl ExplodeTiles {
    pub const NAME: &'static str = "explode_tiles";
}

impl GeneratorFunction for ExplodeTiles {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![], ReturnType::Rows).with_variadic(ArgType::Tile)
    }

    fn output_schema(&self, num_args: usize) -> SchemaRef {
        explode_schema(num_args)
    }

    fn generate(&self, args: &[ArrayRef], num_rows: usize) -> Result<GeneratedRows> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);

        let columns = (0..args.len())
            .map(|index| args.tiles(index))
            .collect::<Result<Vec<_>>>()?;

        let mut exploded = ExplodedRows::new(columns.len());
        for row in 0..num_rows {
            let tiles = co_located_tiles(&columns, row)?;
            exploded.append(row, &tiles, || true);
        }

        exploded.finish(self.output_schema(columns.len()))
    }
}

/// `explode_tiles_sample(fraction, seed, tile, ...)` emits a seeded Bernoulli sample of the
/// rows of `explode_tiles`, keeping their order
#[derive(Debug, Clone, Copy)]
pub struct ExplodeTilesSample;

impl ExplodeTilesSample {
    pub const NAME: &'static str = "explode_tiles_sample";
    const TILE_ARGUMENT_OFFSET: usize = 2;
}

impl GeneratorFunction for ExplodeTilesSample {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![ArgType::Float64, ArgType::Int64], ReturnType::Rows)
            .with_variadic(ArgType::Tile)
    }

    fn output_schema(&self, num_args: usize) -> SchemaRef {
        explode_schema(num_args.saturating_sub(Self::TILE_ARGUMENT_OFFSET))
    }

    fn generate(&self, args: &[ArrayRef], num_rows: usize) -> Result<GeneratedRows> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);

        let fractions = args.float64(0)?;
        let seeds = args.int64(1)?;
        let columns = (Self::TILE_ARGUMENT_OFFSET..args.len())
            .map(|index| args.tiles(index))
            .collect::<Result<Vec<_>>>()?;

        let mut exploded = ExplodedRows::new(columns.len());
        for row in 0..num_rows {
            let fraction = args.non_null("fraction", value_at(fractions, row))?;
            ensure!(
                (0.0..=1.0).contains(&fraction),
                crate::error::InvalidArgument {
                    function: Self::NAME,
                    reason: format!("the sample fraction must be in [0, 1], got {fraction}"),
                }
            );
            let seed = args.non_null("seed", value_at(seeds, row))?;

            let tiles = co_located_tiles(&columns, row)?;
            let mut rng = StdRng::seed_from_u64(seed as u64);
            exploded.append(row, &tiles, || rng.random_bool(fraction));
        }

        exploded.finish(self.output_schema(args.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use arrow::array::{Array, AsArray, Float64Array, Int64Array};
    use arrow::datatypes::{Float64Type, UInt32Type};
    use rasterql_datatypes::raster::{CellType, RasterDataType, tiles_to_arrow};
    use rasterql_datatypes::util::test::tile_from_values;

    fn constant(value: f64, cols: i64, rows: i64) -> Tile {
        Tile::filled(CellType::raw(RasterDataType::I8), cols, rows, Some(value)).unwrap()
    }

    fn tile_column(tiles: &[&Tile]) -> ArrayRef {
        Arc::new(tiles_to_arrow(tiles.iter().map(|tile| Some(*tile))).unwrap())
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn explode_two_constant_tiles() {
        let (a, b) = (constant(1., 10, 10), constant(2., 10, 10));

        let generated = ExplodeTiles
            .generate(&[tile_column(&[&a]), tile_column(&[&b])], 1)
            .unwrap();
        let batch = &generated.batch;

        assert_eq!(batch.num_rows(), 100);
        assert_eq!(batch.num_columns(), 4);
        assert_eq!(batch.schema().field(3).name(), "tile_2");
        assert!(generated.parent_rows.values().iter().all(|row| *row == 0));

        let first = batch.column(2).as_primitive::<Float64Type>();
        let second = batch.column(3).as_primitive::<Float64Type>();
        assert!(first.values().iter().all(|value| *value == 1.));
        assert!(second.values().iter().all(|value| *value == 2.));
    }

    #[test]
    fn rows_are_row_major_and_cover_the_grid() {
        let tile = tile_from_values(
            CellType::with_default_no_data(RasterDataType::F32),
            3,
            2,
            &[Some(0.), Some(1.), Some(2.), Some(3.), None, Some(5.)],
        );

        let generated = ExplodeTiles.generate(&[tile_column(&[&tile])], 1).unwrap();
        let batch = &generated.batch;

        let cols = batch.column(0).as_primitive::<UInt32Type>();
        let rows = batch.column(1).as_primitive::<UInt32Type>();
        let cells = batch.column(2).as_primitive::<Float64Type>();

        assert_eq!(cols.values().to_vec(), vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(rows.values().to_vec(), vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(
            cells.iter().collect::<Vec<_>>(),
            vec![Some(0.), Some(1.), Some(2.), Some(3.), None, Some(5.)]
        );
    }

    #[test]
    fn parent_rows_of_many_input_rows() {
        let (a, b) = (constant(1., 2, 1), constant(3., 1, 1));

        let generated = ExplodeTiles.generate(&[tile_column(&[&a, &b])], 2).unwrap();

        assert_eq!(generated.parent_rows.values().to_vec(), vec![0, 0, 1]);
    }

    #[test]
    fn dimension_mismatch() {
        let (a, b) = (constant(1., 2, 2), constant(2., 2, 3));

        let error = ExplodeTiles
            .generate(&[tile_column(&[&a]), tile_column(&[&b])], 1)
            .unwrap_err();

        assert!(matches!(
            error.data_type_error(),
            Some(rasterql_datatypes::error::Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn requires_a_tile() {
        assert!(matches!(
            ExplodeTiles.generate(&[], 0),
            Err(Error::InvalidNumberOfArguments { found: 0, .. })
        ));
    }

    fn sample(fraction: f64, seed: i64, tile: &Tile) -> Result<GeneratedRows> {
        ExplodeTilesSample.generate(
            &[
                Arc::new(Float64Array::from(vec![fraction])),
                Arc::new(Int64Array::from(vec![seed])),
                tile_column(&[tile]),
            ],
            1,
        )
    }

    #[test]
    fn sample_is_deterministic_and_ordered() {
        let tile = constant(4., 20, 20);

        let first = sample(0.3, 42, &tile).unwrap();
        let second = sample(0.3, 42, &tile).unwrap();

        assert_eq!(first.batch, second.batch);
        assert!(first.batch.num_rows() > 0 && first.batch.num_rows() < 400);

        let cols = first.batch.column(0).as_primitive::<UInt32Type>();
        let rows = first.batch.column(1).as_primitive::<UInt32Type>();
        let linear: Vec<u32> = rows
            .values()
            .iter()
            .zip(cols.values().iter())
            .map(|(row, col)| row * 20 + col)
            .collect();
        assert!(linear.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn sample_bounds() {
        let tile = constant(4., 5, 5);

        assert_eq!(sample(1., 1, &tile).unwrap().batch.num_rows(), 25);
        assert_eq!(sample(0., 1, &tile).unwrap().batch.num_rows(), 0);
        assert!(sample(1.5, 1, &tile).is_err());
        assert_eq!(
            ExplodeTilesSample.output_schema(3).fields().len(),
            3,
            "column_index, row_index, tile_1"
        );
    }

    #[test]
    fn empty_batch() {
        let tile = constant(1., 1, 1);
        let generated = ExplodeTiles.generate(&[tile_column(&[&tile])], 0).unwrap();

        assert_eq!(generated.batch.num_rows(), 0);
        assert!(generated.parent_rows.is_empty());
    }
}
