use crate::engine::{Accumulator, AggregateFunction, Arguments, Signature};
use crate::util::Result;
use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use rasterql_datatypes::raster::Tile;
use std::sync::Arc;
use tracing::debug;

/// A partial aggregate state that can be exchanged between partitions as an Arrow column
pub trait AggregateState: Default + Clone + Send + 'static {
    fn state_type() -> DataType;

    fn to_arrow(states: &[Self]) -> Result<ArrayRef>;

    fn from_arrow(array: &dyn Array) -> Result<Vec<Self>>;
}

/// An aggregate over a tile column, defined by four pure operations.
///
/// `merge` must be associative and commutative and `initialize` must be its neutral element,
/// so that partial states of any partitioning can be merged in any order.
pub trait TileAggregate: Send + Sync + 'static {
    type State: AggregateState;

    const NAME: &'static str;

    /// The first argument is the tile column, the others are passed to `update`
    fn signature(&self) -> Signature;

    fn initialize(&self) -> Self::State {
        Self::State::default()
    }

    /// Folds the non-null tile of input row `row` into `state`
    fn update(
        &self,
        state: Self::State,
        tile: &Tile,
        args: &Arguments<'_>,
        row: usize,
    ) -> Result<Self::State>;

    fn merge(&self, a: Self::State, b: Self::State) -> Result<Self::State>;

    /// The final value as a single-row array
    fn finalize(&self, state: &Self::State) -> Result<ArrayRef>;
}

/// Exposes a [`TileAggregate`] through the host's [`AggregateFunction`] API
pub struct TileAggregateFunction<A> {
    aggregate: Arc<A>,
}

impl<A: TileAggregate> TileAggregateFunction<A> {
    pub fn new(aggregate: A) -> Self {
        Self {
            aggregate: Arc::new(aggregate),
        }
    }

    pub fn boxed(self) -> Arc<dyn AggregateFunction> {
        Arc::new(self)
    }
}

impl<A: TileAggregate> AggregateFunction for TileAggregateFunction<A> {
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn signature(&self) -> Signature {
        self.aggregate.signature()
    }

    fn state_type(&self) -> DataType {
        A::State::state_type()
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(TileAccumulator {
            state: self.aggregate.initialize(),
            aggregate: self.aggregate.clone(),
        })
    }
}

struct TileAccumulator<A: TileAggregate> {
    aggregate: Arc<A>,
    state: A::State,
}

impl<A: TileAggregate> Accumulator for TileAccumulator<A> {
    fn update_batch(&mut self, args: &[ArrayRef]) -> Result<()> {
        self.aggregate.signature().check(A::NAME, args)?;
        let args = Arguments::new(A::NAME, args);
        let tiles = args.tiles(0)?;

        for row in 0..tiles.len() {
            let Some(tile) = tiles.tile(row)? else {
                continue;
            };
            let state = std::mem::take(&mut self.state);
            self.state = self.aggregate.update(state, &tile, &args, row)?;
        }

        Ok(())
    }

    fn state(&self) -> Result<ArrayRef> {
        A::State::to_arrow(std::slice::from_ref(&self.state))
    }

    fn merge_batch(&mut self, states: &ArrayRef) -> Result<()> {
        let states = A::State::from_arrow(states.as_ref())?;
        debug!(aggregate = A::NAME, states = states.len(), "merging partial aggregates");

        for other in states {
            let state = std::mem::take(&mut self.state);
            self.state = self.aggregate.merge(state, other)?;
        }

        Ok(())
    }

    fn evaluate(&self) -> Result<ArrayRef> {
        self.aggregate.finalize(&self.state)
    }
}
