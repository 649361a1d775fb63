mod aggregate;
mod neighborhood;

pub use self::aggregate::{FocalAggregate, FocalOperation};
pub use self::neighborhood::{Neighborhood, NeighborhoodShape};

use crate::engine::{ArgType, Arguments, ReturnType, ScalarFunction, Signature, value_at};
use crate::error::{self, Error};
use crate::util::Result;
use arrow::array::ArrayRef;
use rasterql_datatypes::raster::{Tile, tile_data_type, tiles_to_arrow};
use rayon::prelude::*;
use snafu::ensure;
use std::str::FromStr;
use std::sync::Arc;
use tracing::trace_span;

/// Reduces the neighborhood of every cell of a tile with a [`FocalOperation`].
///
/// Absent cells stay absent and absent neighbors are excluded. A window without
/// present cells yields an absent cell. Results are cast to the input cell type.
///
/// # Errors
///
/// Fails if the reduced cells cannot be encoded as a tile.
///
pub fn focal_reduce(
    tile: &Tile,
    neighborhood: &Neighborhood,
    operation: &impl FocalAggregate,
) -> Result<Tile> {
    let grid = tile.shape();
    let _span = trace_span!(
        "focal_reduce",
        radius = neighborhood.radius(),
        shape = %neighborhood.shape(),
        cols = grid.axis_size_x(),
        rows = grid.axis_size_y()
    )
    .entered();

    let values = tile.values();
    let mut reduced = vec![None; values.len()];

    reduced
        .par_chunks_mut(grid.axis_size_x())
        .enumerate()
        .for_each(|(row, reduced_row)| {
            let mut window = Vec::with_capacity(neighborhood.len());

            for (col, reduced_cell) in reduced_row.iter_mut().enumerate() {
                if values[grid.linear_space_index_unchecked(col, row)].is_none() {
                    continue;
                }

                neighborhood.collect_window(&values, grid, col, row, &mut window);
                *reduced_cell = operation.apply(&window);
            }
        });

    Ok(Tile::from_cells(
        tile.cell_type(),
        grid.axis_size_x(),
        grid.axis_size_y(),
        reduced,
    )?)
}

/// `focal_reduce(tile, radius, operation [, neighborhood])`
#[derive(Debug, Clone, Copy)]
pub struct FocalReduce {
    max_radius: usize,
}

impl FocalReduce {
    pub const NAME: &'static str = "focal_reduce";

    pub fn new(max_radius: usize) -> Self {
        Self { max_radius }
    }

    fn checked_radius(&self, radius: i32) -> Result<usize> {
        let radius_too_large = || Error::FocalRadiusTooLarge {
            limit: self.max_radius,
            actual: i64::from(radius),
        };

        let radius = usize::try_from(radius).map_err(|_| radius_too_large())?;
        ensure!(
            radius <= self.max_radius,
            error::FocalRadiusTooLarge {
                limit: self.max_radius,
                actual: i64::try_from(radius).unwrap_or(i64::MAX),
            }
        );

        Ok(radius)
    }
}

impl ScalarFunction for FocalReduce {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(
            vec![ArgType::Tile, ArgType::Int32, ArgType::Utf8],
            ReturnType::Value(tile_data_type()),
        )
        .with_optional(vec![ArgType::Utf8])
    }

    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);

        let tiles = args.tiles(0)?;
        let radii = args.int32(1)?;
        let operations = args.utf8(2)?;
        let shapes = if args.len() > 3 {
            Some(args.utf8(3)?)
        } else {
            None
        };

        let mut reduced = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let tile = tiles.required_tile(row)?;
            let radius = self.checked_radius(args.non_null("radius", value_at(radii, row))?)?;

            let operation = args.non_null("operation", value_at(operations, row))?;
            let operation =
                FocalOperation::from_str(operation).map_err(|_| Error::UnknownFocalOperation {
                    operation: operation.to_string(),
                })?;

            let shape = match shapes.and_then(|shapes| value_at(shapes, row)) {
                Some(shape) => NeighborhoodShape::from_str(shape).map_err(|_| {
                    Error::UnknownNeighborhood {
                        neighborhood: shape.to_string(),
                    }
                })?,
                None => NeighborhoodShape::default(),
            };

            reduced.push(focal_reduce(
                &tile,
                &Neighborhood::new(radius, shape),
                &operation,
            )?);
        }

        Ok(Arc::new(tiles_to_arrow(reduced.iter().map(Some))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use rasterql_datatypes::raster::{CellType, RasterDataType, TileArray};
    use rasterql_datatypes::util::test::tile_from_values;

    fn tile_3x3() -> Tile {
        tile_from_values(
            CellType::with_default_no_data(RasterDataType::I32),
            3,
            3,
            &[
                Some(1.),
                Some(2.),
                Some(3.),
                Some(4.),
                Some(5.),
                Some(6.),
                Some(7.),
                None,
                Some(9.),
            ],
        )
    }

    #[test]
    fn sum_with_shrinking_window() {
        let reduced = focal_reduce(
            &tile_3x3(),
            &Neighborhood::new(1, NeighborhoodShape::Square),
            &FocalOperation::Sum,
        )
        .unwrap();

        assert_eq!(
            reduced.values(),
            vec![
                Some(12.),
                Some(21.),
                Some(16.),
                Some(19.),
                Some(37.),
                Some(25.),
                Some(16.),
                None,
                Some(20.),
            ]
        );
        assert_eq!(reduced.cell_type(), tile_3x3().cell_type());
    }

    #[test]
    fn circle_max_and_mean() {
        let circle = Neighborhood::new(1, NeighborhoodShape::Circle);

        let max = focal_reduce(&tile_3x3(), &circle, &FocalOperation::Max).unwrap();
        assert_eq!(max.get(1, 1).unwrap(), Some(6.));
        assert_eq!(max.get(0, 0).unwrap(), Some(4.));

        // integer cells truncate the mean
        let mean = focal_reduce(&tile_3x3(), &circle, &FocalOperation::Mean).unwrap();
        assert_eq!(mean.get(1, 1).unwrap(), Some(4.));
    }

    #[test]
    fn radius_zero_is_identity() {
        let tile = tile_3x3();
        let reduced = focal_reduce(
            &tile,
            &Neighborhood::new(0, NeighborhoodShape::Square),
            &FocalOperation::Median,
        )
        .unwrap();

        assert_eq!(reduced, tile);
    }

    #[test]
    fn scalar_function() {
        let tile = tile_3x3();
        let args: Vec<ArrayRef> = vec![
            Arc::new(tiles_to_arrow([Some(&tile), Some(&tile)]).unwrap()),
            Arc::new(Int32Array::from(vec![1, 1])),
            Arc::new(StringArray::from(vec!["min", "max"])),
            Arc::new(StringArray::from(vec![None, Some("circle")])),
        ];

        let result = FocalReduce::new(4).invoke(&args, 2).unwrap();
        let result = TileArray::try_new(result.as_ref()).unwrap();

        assert_eq!(result.required_tile(0).unwrap().get(1, 1).unwrap(), Some(1.));
        assert_eq!(result.required_tile(1).unwrap().get(0, 0).unwrap(), Some(4.));
    }

    #[test]
    fn invalid_arguments() {
        let tile = tile_3x3();
        let call = |radius: i32, operation: &str| {
            let args: Vec<ArrayRef> = vec![
                Arc::new(tiles_to_arrow([Some(&tile)]).unwrap()),
                Arc::new(Int32Array::from(vec![radius])),
                Arc::new(StringArray::from(vec![operation])),
            ];
            FocalReduce::new(4).invoke(&args, 1)
        };

        assert!(matches!(
            call(5, "sum"),
            Err(Error::FocalRadiusTooLarge {
                limit: 4,
                actual: 5
            })
        ));
        assert!(matches!(
            call(-1, "sum"),
            Err(Error::FocalRadiusTooLarge { actual: -1, .. })
        ));
        assert!(matches!(
            call(1, "variance"),
            Err(Error::UnknownFocalOperation { .. })
        ));
    }

    #[test]
    fn null_tile() {
        let args: Vec<ArrayRef> = vec![
            Arc::new(tiles_to_arrow([None]).unwrap()),
            Arc::new(Int32Array::from(vec![1])),
            Arc::new(StringArray::from(vec!["sum"])),
        ];

        let error = FocalReduce::new(4).invoke(&args, 1).unwrap_err();

        assert!(matches!(
            error.data_type_error(),
            Some(rasterql_datatypes::error::Error::NullTile)
        ));
    }
}
