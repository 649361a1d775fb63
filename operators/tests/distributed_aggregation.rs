use arrow::array::{Array, ArrayRef, AsArray, StructArray};
use arrow::datatypes::{Float64Type, UInt64Type};
use float_cmp::approx_eq;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rasterql_datatypes::raster::{CellType, RasterDataType, Tile, TileArray, tiles_to_arrow};
use rasterql_operators::engine::{AggregateFunction, FunctionKind};
use rasterql_operators::processing::{
    AggHistogram, AggMean, AggStats, LocalMax, LocalMin, TileAggregate, TileAggregateFunction,
};
use rasterql_operators::registry::{FunctionRegistry, RegistryOptions};
use std::sync::Arc;

const COLS: usize = 8;
const ROWS: usize = 6;

/// The raw and default cell types of every data type and some user-defined sentinels
fn cell_types() -> Vec<CellType> {
    let mut cell_types = CellType::all();
    for tag in ["int16ud-999", "uint8ud7", "uint8ud0", "float32ud-1"] {
        cell_types.push(tag.parse().unwrap());
    }
    cell_types
}

fn value_range(data_type: RasterDataType) -> (f64, f64) {
    match data_type {
        RasterDataType::U8 => (0., f64::from(u8::MAX)),
        RasterDataType::I8 => (f64::from(i8::MIN), f64::from(i8::MAX)),
        RasterDataType::U16 => (0., f64::from(u16::MAX)),
        RasterDataType::I16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
        RasterDataType::U32 => (0., f64::from(u32::MAX)),
        RasterDataType::I32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
        RasterDataType::F32 | RasterDataType::F64 => (-1e6, 1e6),
    }
}

/// Random tiles of random cell types whose cells favor the sentinel boundaries
fn random_tiles(rng: &mut StdRng, count: usize) -> Vec<Option<Tile>> {
    let cell_types = cell_types();

    (0..count)
        .map(|_| {
            if rng.random_bool(0.1) {
                return None;
            }
            let cell_type = *cell_types.choose(rng).unwrap();
            let (min, max) = value_range(cell_type.data_type());
            let fraction = if cell_type.is_floating_point() { 0.25 } else { 0. };

            let values: Vec<Option<f64>> = (0..COLS * ROWS)
                .map(|_| {
                    if !rng.random_bool(0.85) {
                        return None;
                    }
                    let value = match rng.random_range(0..6) {
                        0 => 0.,
                        1 => min,
                        2 => max,
                        3 => -1.,
                        _ => f64::from(rng.random_range(-500..500_i16)) + fraction,
                    };
                    Some(value.clamp(min, max))
                })
                .collect();
            Some(Tile::from_cells(cell_type, COLS, ROWS, values).unwrap())
        })
        .collect()
}

/// The largest magnitude of a present cell, at least one
fn magnitude(tiles: &[Option<Tile>]) -> f64 {
    tiles
        .iter()
        .flatten()
        .flat_map(Tile::values)
        .flatten()
        .fold(1., |magnitude, value| value.abs().max(magnitude))
}

/// Reduces the present values of every cell position across all tiles
fn cellwise(tiles: &[Option<Tile>], op: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let mut reduced = vec![None; COLS * ROWS];
    for tile in tiles.iter().flatten() {
        for (cell, value) in reduced.iter_mut().zip(tile.values()) {
            *cell = match (*cell, value) {
                (Some(cell), Some(value)) => Some(op(cell, value)),
                (cell, value) => cell.or(value),
            };
        }
    }
    reduced
}

fn column(tiles: &[Option<Tile>]) -> ArrayRef {
    Arc::new(tiles_to_arrow(tiles.iter().map(Option::as_ref)).unwrap())
}

/// Evaluates over all tiles in one accumulator
fn single(function: &dyn AggregateFunction, tiles: &[Option<Tile>]) -> ArrayRef {
    let mut accumulator = function.create_accumulator();
    accumulator.update_batch(&[column(tiles)]).unwrap();
    accumulator.evaluate().unwrap()
}

/// Evaluates over random partitions whose partial states are merged in random order
fn partitioned(
    function: &dyn AggregateFunction,
    tiles: &[Option<Tile>],
    partitions: usize,
    rng: &mut StdRng,
) -> ArrayRef {
    let mut assigned = vec![Vec::new(); partitions];
    for tile in tiles {
        assigned[rng.random_range(0..partitions)].push(tile.clone());
    }

    let mut states: Vec<ArrayRef> = assigned
        .iter()
        .map(|partition| {
            let mut accumulator = function.create_accumulator();
            for batch in partition.chunks(3) {
                accumulator.update_batch(&[column(batch)]).unwrap();
            }
            accumulator.state().unwrap()
        })
        .collect();
    states.shuffle(rng);

    let mut merged = function.create_accumulator();
    for state in &states {
        assert_eq!(state.data_type(), &function.state_type());
        merged.merge_batch(state).unwrap();
    }
    merged.evaluate().unwrap()
}

fn float(array: &StructArray, name: &str) -> Option<f64> {
    let column = array.column_by_name(name).unwrap().as_primitive::<Float64Type>();
    column.is_valid(0).then(|| column.value(0))
}

fn count(array: &StructArray, name: &str) -> u64 {
    array
        .column_by_name(name)
        .unwrap()
        .as_primitive::<UInt64Type>()
        .value(0)
}

fn function<A: TileAggregate>(aggregate: A) -> Arc<dyn AggregateFunction> {
    TileAggregateFunction::new(aggregate).boxed()
}

#[test]
fn local_aggregates_are_partition_independent() {
    let mut rng = StdRng::seed_from_u64(42);
    let tiles = random_tiles(&mut rng, 40);

    for (function, op) in [
        (function(LocalMax::new()), f64::max as fn(f64, f64) -> f64),
        (function(LocalMin::new()), f64::min),
    ] {
        let expected = single(function.as_ref(), &tiles);
        let expected = TileArray::try_new(expected.as_ref()).unwrap().tile(0).unwrap();

        assert_eq!(
            expected.as_ref().map(Tile::values),
            Some(cellwise(&tiles, op)),
            "{} lost present cells",
            function.name()
        );

        for partitions in [1, 2, 5, 17] {
            let actual = partitioned(function.as_ref(), &tiles, partitions, &mut rng);
            let actual = TileArray::try_new(actual.as_ref()).unwrap().tile(0).unwrap();

            assert_eq!(actual, expected, "{} with {partitions} partitions", function.name());
        }
    }
}

#[test]
fn statistics_are_partition_independent() {
    let mut rng = StdRng::seed_from_u64(7);
    let tiles = random_tiles(&mut rng, 50);
    let magnitude = magnitude(&tiles);
    let function = function(AggStats);

    let expected = single(function.as_ref(), &tiles);
    let expected = expected.as_struct();

    for partitions in [2, 3, 11] {
        let actual = partitioned(function.as_ref(), &tiles, partitions, &mut rng);
        let actual = actual.as_struct();

        assert_eq!(count(actual, "data_cells"), count(expected, "data_cells"));
        assert_eq!(count(actual, "no_data_cells"), count(expected, "no_data_cells"));
        assert_eq!(float(actual, "min"), float(expected, "min"));
        assert_eq!(float(actual, "max"), float(expected, "max"));
        for (statistic, scale) in [
            ("mean", magnitude),
            ("variance", magnitude * magnitude),
            ("stddev", magnitude),
        ] {
            let expected = float(expected, statistic).unwrap();
            assert!(approx_eq!(
                f64,
                float(actual, statistic).unwrap(),
                expected,
                epsilon = 1e-9 * scale
            ));
        }
    }
}

#[test]
fn mean_equals_mean_over_all_cells() {
    let mut rng = StdRng::seed_from_u64(1234);
    let tiles = random_tiles(&mut rng, 30);

    let values: Vec<f64> = tiles
        .iter()
        .flatten()
        .flat_map(Tile::values)
        .flatten()
        .collect();
    let expected = values.iter().sum::<f64>() / values.len() as f64;

    let actual = partitioned(function(AggMean).as_ref(), &tiles, 4, &mut rng);

    assert!(approx_eq!(
        f64,
        actual.as_primitive::<Float64Type>().value(0),
        expected,
        epsilon = 1e-9 * magnitude(&tiles)
    ));
}

#[test]
fn histograms_are_partition_independent() {
    let mut rng = StdRng::seed_from_u64(99);
    let tiles = random_tiles(&mut rng, 25);
    let function = function(AggHistogram);

    let expected = single(function.as_ref(), &tiles);

    for partitions in [2, 6] {
        let actual = partitioned(function.as_ref(), &tiles, partitions, &mut rng);

        assert_eq!(&actual, &expected);
    }
}

#[test]
fn registered_aggregates_merge_empty_partitions() {
    let registry = FunctionRegistry::new(&RegistryOptions::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let tiles = random_tiles(&mut rng, 2);

    for descriptor in registry.functions_of_kind(FunctionKind::Aggregate) {
        let function = registry.aggregate(&descriptor.name).unwrap();

        let expected = single(function.as_ref(), &tiles);
        // more partitions than tiles leaves some of them empty
        let actual = partitioned(function.as_ref(), &tiles, 8, &mut rng);

        assert_eq!(actual.len(), 1);
        assert_eq!(actual.data_type(), expected.data_type(), "{}", descriptor.name);
    }
}
