mod arrow_conversion;

pub use self::arrow_conversion::{
    histogram_data_type, histogram_fields, histogram_state_data_type, histograms_to_arrow,
    statistics_data_type, statistics_fields, statistics_state_data_type, statistics_to_arrow,
};

use self::arrow_conversion::{
    histogram_states_from_arrow, histogram_states_to_arrow, statistics_states_from_arrow,
    statistics_states_to_arrow,
};
use super::aggregate::{AggregateState, TileAggregate};
use crate::engine::{ArgType, Arguments, ReturnType, ScalarFunction, Signature, value_at};
use crate::util::Result;
use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::datatypes::DataType;
use rasterql_datatypes::primitives::{CellHistogram, CellStatistics};
use rasterql_datatypes::raster::Tile;
use std::sync::Arc;

impl AggregateState for CellStatistics {
    fn state_type() -> DataType {
        statistics_state_data_type()
    }

    fn to_arrow(states: &[Self]) -> Result<ArrayRef> {
        Ok(Arc::new(statistics_states_to_arrow(states)?))
    }

    fn from_arrow(array: &dyn Array) -> Result<Vec<Self>> {
        statistics_states_from_arrow(array)
    }
}

impl AggregateState for Option<CellHistogram> {
    fn state_type() -> DataType {
        histogram_state_data_type()
    }

    fn to_arrow(states: &[Self]) -> Result<ArrayRef> {
        Ok(Arc::new(histogram_states_to_arrow(states)?))
    }

    fn from_arrow(array: &dyn Array) -> Result<Vec<Self>> {
        histogram_states_from_arrow(array)
    }
}

/// The optional bucket width argument at `index`, `None` for exact histograms
fn bucket_width(args: &Arguments<'_>, index: usize, row: usize) -> Result<Option<f64>> {
    if args.len() <= index {
        return Ok(None);
    }
    Ok(value_at(args.float64(index)?, row))
}

/// `tile_stats(tile)` computes the statistics of the present cells
#[derive(Debug, Clone, Copy)]
pub struct TileStats;

impl TileStats {
    pub const NAME: &'static str = "tile_stats";
}

impl ScalarFunction for TileStats {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(
            vec![ArgType::Tile],
            ReturnType::Value(statistics_data_type()),
        )
    }

    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;
        let tiles = Arguments::new(Self::NAME, args).tiles(0)?;

        let statistics = (0..num_rows)
            .map(|row| Ok(CellStatistics::from_tile(&tiles.required_tile(row)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(statistics_to_arrow(&statistics)?))
    }
}

/// `tile_mean(tile)` is the mean of the present cells, null if there are none
#[derive(Debug, Clone, Copy)]
pub struct TileMean;

impl TileMean {
    pub const NAME: &'static str = "tile_mean";
}

impl ScalarFunction for TileMean {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![ArgType::Tile], ReturnType::Value(DataType::Float64))
    }

    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;
        let tiles = Arguments::new(Self::NAME, args).tiles(0)?;

        let means = (0..num_rows)
            .map(|row| Ok(CellStatistics::from_tile(&tiles.required_tile(row)?).mean().ok()))
            .collect::<Result<Float64Array>>()?;

        Ok(Arc::new(means))
    }
}

/// `tile_histogram(tile [, bucket_width])` counts the present cells by value or by bucket
#[derive(Debug, Clone, Copy)]
pub struct TileHistogram;

impl TileHistogram {
    pub const NAME: &'static str = "tile_histogram";
}

impl ScalarFunction for TileHistogram {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![ArgType::Tile], ReturnType::Value(histogram_data_type()))
            .with_optional(vec![ArgType::Float64])
    }

    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);
        let tiles = args.tiles(0)?;

        let histograms = (0..num_rows)
            .map(|row| {
                let tile = tiles.required_tile(row)?;
                Ok(CellHistogram::from_tile(&tile, bucket_width(&args, 1, row)?)?)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(histograms_to_arrow(&histograms)?))
    }
}

fn tile_column_signature(returns: DataType) -> Signature {
    Signature::new(vec![ArgType::Tile], ReturnType::Value(returns))
}

/// `agg_mean(tile)` is the mean of all present cells of a group
#[derive(Debug, Clone, Copy, Default)]
pub struct AggMean;

impl TileAggregate for AggMean {
    type State = CellStatistics;

    const NAME: &'static str = "agg_mean";

    fn signature(&self) -> Signature {
        tile_column_signature(DataType::Float64)
    }

    fn update(
        &self,
        mut state: CellStatistics,
        tile: &Tile,
        _args: &Arguments<'_>,
        _row: usize,
    ) -> Result<CellStatistics> {
        state.add_tile(tile);
        Ok(state)
    }

    fn merge(&self, a: CellStatistics, b: CellStatistics) -> Result<CellStatistics> {
        Ok(a.merge(&b))
    }

    fn finalize(&self, state: &CellStatistics) -> Result<ArrayRef> {
        Ok(Arc::new(Float64Array::from(vec![state.mean().ok()])))
    }
}

/// `agg_stats(tile)` is the statistics record of all cells of a group
#[derive(Debug, Clone, Copy, Default)]
pub struct AggStats;

impl TileAggregate for AggStats {
    type State = CellStatistics;

    const NAME: &'static str = "agg_stats";

    fn signature(&self) -> Signature {
        tile_column_signature(statistics_data_type())
    }

    fn update(
        &self,
        mut state: CellStatistics,
        tile: &Tile,
        _args: &Arguments<'_>,
        _row: usize,
    ) -> Result<CellStatistics> {
        state.add_tile(tile);
        Ok(state)
    }

    fn merge(&self, a: CellStatistics, b: CellStatistics) -> Result<CellStatistics> {
        Ok(a.merge(&b))
    }

    fn finalize(&self, state: &CellStatistics) -> Result<ArrayRef> {
        Ok(Arc::new(statistics_to_arrow(std::slice::from_ref(state))?))
    }
}

/// `agg_histogram(tile [, bucket_width])` is the histogram of all present cells of a group.
///
/// All rows of a group must use the same bucket width.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggHistogram;

impl TileAggregate for AggHistogram {
    type State = Option<CellHistogram>;

    const NAME: &'static str = "agg_histogram";

    fn signature(&self) -> Signature {
        tile_column_signature(histogram_data_type()).with_optional(vec![ArgType::Float64])
    }

    fn update(
        &self,
        state: Option<CellHistogram>,
        tile: &Tile,
        args: &Arguments<'_>,
        row: usize,
    ) -> Result<Option<CellHistogram>> {
        let partial = CellHistogram::from_tile(tile, bucket_width(args, 1, row)?)?;
        match state {
            Some(histogram) => Ok(Some(histogram.merge(&partial)?)),
            None => Ok(Some(partial)),
        }
    }

    fn merge(
        &self,
        a: Option<CellHistogram>,
        b: Option<CellHistogram>,
    ) -> Result<Option<CellHistogram>> {
        match (a, b) {
            (Some(a), Some(b)) => Ok(Some(a.merge(&b)?)),
            (a, None) => Ok(a),
            (None, b) => Ok(b),
        }
    }

    fn finalize(&self, state: &Option<CellHistogram>) -> Result<ArrayRef> {
        let histogram = state.clone().unwrap_or_default();
        Ok(Arc::new(histograms_to_arrow(std::slice::from_ref(&histogram))?))
    }
}
