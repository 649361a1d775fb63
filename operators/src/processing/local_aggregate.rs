use super::aggregate::{AggregateState, TileAggregate};
use crate::engine::{ArgType, Arguments, ReturnType, Signature};
use crate::util::Result;
use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use rasterql_datatypes::raster::{Tile, TileArray, tile_data_type, tiles_to_arrow};
use std::marker::PhantomData;
use std::sync::Arc;

/// The running pixel-wise aggregate, `None` before the first tile
impl AggregateState for Option<Tile> {
    fn state_type() -> DataType {
        tile_data_type()
    }

    fn to_arrow(states: &[Self]) -> Result<ArrayRef> {
        Ok(Arc::new(tiles_to_arrow(states.iter().map(Option::as_ref))?))
    }

    fn from_arrow(array: &dyn Array) -> Result<Vec<Self>> {
        Ok(TileArray::try_new(array)?
            .iter()
            .collect::<rasterql_datatypes::util::Result<_>>()?)
    }
}

/// A method to combine two present cell values.
pub trait BinaryOperation: Send + Sync + 'static {
    const NAME: &'static str;

    fn op(state: f64, value: f64) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct Min;

impl BinaryOperation for Min {
    const NAME: &'static str = "agg_local_min";

    fn op(state: f64, value: f64) -> f64 {
        state.min(value)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Max;

impl BinaryOperation for Max {
    const NAME: &'static str = "agg_local_max";

    fn op(state: f64, value: f64) -> f64 {
        state.max(value)
    }
}

/// Combines two co-located cells, ignoring absent ones
fn aggregate_cell<Op: BinaryOperation>(state: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (state, value) {
        (Some(state), Some(value)) => Some(Op::op(state, value)),
        (Some(state), None) => Some(state),
        (None, Some(value)) => Some(value),
        (None, None) => None,
    }
}

/// Combines two tiles pixel-wise into a tile of the union of their cell types
///
/// # Errors
///
/// Fails with `DimensionMismatch` if the tiles are not of the same shape.
///
pub fn combine_tiles<Op: BinaryOperation>(a: &Tile, b: &Tile) -> Result<Tile> {
    a.ensure_same_shape(b)?;

    let cell_type = a.cell_type().union(&b.cell_type());
    let cells = a
        .values()
        .into_iter()
        .zip(b.values())
        .map(|(a, b)| aggregate_cell::<Op>(a, b));

    Ok(Tile::from_cells(cell_type, a.cols(), a.rows(), cells)?)
}

/// Pixel-wise reduction of all tiles of a group, ignoring absent cells
pub struct LocalAggregate<Op> {
    op: PhantomData<Op>,
}

impl<Op> LocalAggregate<Op> {
    pub fn new() -> Self {
        Self { op: PhantomData }
    }
}

impl<Op> Default for LocalAggregate<Op> {
    fn default() -> Self {
        Self::new()
    }
}

pub type LocalMin = LocalAggregate<Min>;
pub type LocalMax = LocalAggregate<Max>;

impl<Op: BinaryOperation> TileAggregate for LocalAggregate<Op> {
    type State = Option<Tile>;

    const NAME: &'static str = Op::NAME;

    fn signature(&self) -> Signature {
        Signature::new(vec![ArgType::Tile], ReturnType::Value(tile_data_type()))
    }

    fn update(
        &self,
        state: Self::State,
        tile: &Tile,
        _args: &Arguments<'_>,
        _row: usize,
    ) -> Result<Self::State> {
        match state {
            Some(state) => combine_tiles::<Op>(&state, tile).map(Some),
            None => Ok(Some(tile.clone())),
        }
    }

    fn merge(&self, a: Self::State, b: Self::State) -> Result<Self::State> {
        match (a, b) {
            (Some(a), Some(b)) => combine_tiles::<Op>(&a, &b).map(Some),
            (a, None) => Ok(a),
            (None, b) => Ok(b),
        }
    }

    fn finalize(&self, state: &Self::State) -> Result<ArrayRef> {
        Ok(Arc::new(tiles_to_arrow([state.as_ref()])?))
    }
}
