//! Arrow layouts of statistics and histograms, as function results and as partial aggregate states.

use crate::error::Error;
use crate::util::Result;
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, ListArray, StructArray, UInt64Array};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType, Field, FieldRef, Fields, Float64Type, UInt64Type};
use rasterql_datatypes::primitives::{CellHistogram, CellStatistics};
use std::sync::Arc;

const DATA_CELLS: &str = "data_cells";
const NO_DATA_CELLS: &str = "no_data_cells";
const MEAN: &str = "mean";
const M2: &str = "m2";
const VARIANCE: &str = "variance";
const STD_DEV: &str = "stddev";
const MIN: &str = "min";
const MAX: &str = "max";
const MEDIAN: &str = "median";
const MODE: &str = "mode";
const BUCKET_WIDTH: &str = "bucket_width";
const BINS: &str = "bins";
const VALUE: &str = "value";
const COUNT: &str = "count";
const TOTAL_COUNT: &str = "total_count";

fn invalid_state(reason: impl Into<String>) -> Error {
    Error::InvalidAggregateState {
        reason: reason.into(),
    }
}

fn u64_column<'a>(array: &'a StructArray, name: &str) -> Result<&'a UInt64Array> {
    array
        .column_by_name(name)
        .and_then(|column| column.as_primitive_opt::<UInt64Type>())
        .ok_or_else(|| invalid_state(format!("missing UInt64 field `{name}`")))
}

fn f64_column<'a>(array: &'a StructArray, name: &str) -> Result<&'a Float64Array> {
    array
        .column_by_name(name)
        .and_then(|column| column.as_primitive_opt::<Float64Type>())
        .ok_or_else(|| invalid_state(format!("missing Float64 field `{name}`")))
}

fn float_field(name: &str, nullable: bool) -> Field {
    Field::new(name, DataType::Float64, nullable)
}

fn count_field(name: &str) -> Field {
    Field::new(name, DataType::UInt64, false)
}

fn optional_f64<I: IntoIterator<Item = Option<f64>>>(values: I) -> ArrayRef {
    Arc::new(values.into_iter().collect::<Float64Array>())
}

/// The fields of a statistics result
pub fn statistics_fields() -> Fields {
    Fields::from(vec![
        count_field(DATA_CELLS),
        count_field(NO_DATA_CELLS),
        float_field(MEAN, true),
        float_field(VARIANCE, true),
        float_field(STD_DEV, true),
        float_field(MIN, true),
        float_field(MAX, true),
    ])
}

pub fn statistics_data_type() -> DataType {
    DataType::Struct(statistics_fields())
}

/// Statistics results, with null statistics for empty inputs
pub fn statistics_to_arrow(statistics: &[CellStatistics]) -> Result<StructArray> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            statistics.iter().map(CellStatistics::data_cells),
        )),
        Arc::new(UInt64Array::from_iter_values(
            statistics.iter().map(CellStatistics::no_data_cells),
        )),
        optional_f64(statistics.iter().map(|s| s.mean().ok())),
        optional_f64(statistics.iter().map(|s| s.variance().ok())),
        optional_f64(statistics.iter().map(|s| s.std_dev().ok())),
        optional_f64(statistics.iter().map(|s| s.min().ok())),
        optional_f64(statistics.iter().map(|s| s.max().ok())),
    ];

    Ok(StructArray::try_new(statistics_fields(), columns, None)?)
}

fn statistics_state_fields() -> Fields {
    Fields::from(vec![
        count_field(DATA_CELLS),
        count_field(NO_DATA_CELLS),
        float_field(MEAN, false),
        float_field(M2, false),
        float_field(MIN, false),
        float_field(MAX, false),
    ])
}

pub fn statistics_state_data_type() -> DataType {
    DataType::Struct(statistics_state_fields())
}

/// The raw running statistics, without derived values
pub fn statistics_states_to_arrow(states: &[CellStatistics]) -> Result<StructArray> {
    // empty statistics store their neutral min/max
    let min = |s: &CellStatistics| s.min().unwrap_or(f64::INFINITY);
    let max = |s: &CellStatistics| s.max().unwrap_or(f64::NEG_INFINITY);

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            states.iter().map(CellStatistics::data_cells),
        )),
        Arc::new(UInt64Array::from_iter_values(
            states.iter().map(CellStatistics::no_data_cells),
        )),
        Arc::new(Float64Array::from_iter_values(
            states.iter().map(|s| s.mean().unwrap_or(0.)),
        )),
        Arc::new(Float64Array::from_iter_values(
            states.iter().map(CellStatistics::m2),
        )),
        Arc::new(Float64Array::from_iter_values(states.iter().map(min))),
        Arc::new(Float64Array::from_iter_values(states.iter().map(max))),
    ];

    Ok(StructArray::try_new(statistics_state_fields(), columns, None)?)
}

pub fn statistics_states_from_arrow(array: &dyn Array) -> Result<Vec<CellStatistics>> {
    let array = array
        .as_struct_opt()
        .ok_or_else(|| invalid_state(format!("expected a struct, found {}", array.data_type())))?;

    let data_cells = u64_column(array, DATA_CELLS)?;
    let no_data_cells = u64_column(array, NO_DATA_CELLS)?;
    let mean = f64_column(array, MEAN)?;
    let m2 = f64_column(array, M2)?;
    let min = f64_column(array, MIN)?;
    let max = f64_column(array, MAX)?;

    Ok((0..array.len())
        .filter(|row| array.is_valid(*row))
        .map(|row| {
            CellStatistics::from_parts(
                data_cells.value(row),
                no_data_cells.value(row),
                mean.value(row),
                m2.value(row),
                min.value(row),
                max.value(row),
            )
        })
        .collect())
}

fn bin_fields() -> Fields {
    Fields::from(vec![float_field(VALUE, false), count_field(COUNT)])
}

fn bin_item_field() -> FieldRef {
    Arc::new(Field::new("item", DataType::Struct(bin_fields()), false))
}

fn bins_field() -> Field {
    Field::new(BINS, DataType::List(bin_item_field()), false)
}

fn bins_to_arrow<'h, I>(histograms: I) -> Result<ListArray>
where
    I: IntoIterator<Item = Option<&'h CellHistogram>>,
{
    let mut lengths = Vec::new();
    let mut values = Vec::new();
    let mut counts = Vec::new();

    for histogram in histograms {
        let bins = histogram.map(CellHistogram::bins).unwrap_or_default();
        lengths.push(bins.len());
        for (value, count) in bins {
            values.push(value);
            counts.push(count);
        }
    }

    let bins = StructArray::try_new(
        bin_fields(),
        vec![
            Arc::new(Float64Array::from(values)) as ArrayRef,
            Arc::new(UInt64Array::from(counts)),
        ],
        None,
    )?;

    Ok(ListArray::try_new(
        bin_item_field(),
        OffsetBuffer::from_lengths(lengths),
        Arc::new(bins),
        None,
    )?)
}

fn bins_from_arrow(bins: &ListArray, row: usize) -> Result<Vec<(f64, u64)>> {
    let entries = bins.value(row);
    let entries = entries
        .as_struct_opt()
        .ok_or_else(|| invalid_state("histogram bins must be structs"))?;
    let values = f64_column(entries, VALUE)?;
    let counts = u64_column(entries, COUNT)?;

    Ok(values
        .values()
        .iter()
        .copied()
        .zip(counts.values().iter().copied())
        .collect())
}

/// The fields of a histogram result
pub fn histogram_fields() -> Fields {
    Fields::from(vec![
        float_field(BUCKET_WIDTH, true),
        bins_field(),
        count_field(TOTAL_COUNT),
        float_field(MEAN, true),
        float_field(MEDIAN, true),
        float_field(MODE, true),
        float_field(MIN, true),
        float_field(MAX, true),
    ])
}

pub fn histogram_data_type() -> DataType {
    DataType::Struct(histogram_fields())
}

/// Histogram results with their bins and derived statistics, null for empty histograms
pub fn histograms_to_arrow(histograms: &[CellHistogram]) -> Result<StructArray> {
    let columns: Vec<ArrayRef> = vec![
        optional_f64(histograms.iter().map(CellHistogram::bucket_width)),
        Arc::new(bins_to_arrow(histograms.iter().map(Some))?),
        Arc::new(UInt64Array::from_iter_values(
            histograms.iter().map(CellHistogram::total_count),
        )),
        optional_f64(histograms.iter().map(|h| h.mean().ok())),
        optional_f64(histograms.iter().map(|h| h.median().ok())),
        optional_f64(histograms.iter().map(|h| h.mode().ok())),
        optional_f64(histograms.iter().map(|h| h.min().ok())),
        optional_f64(histograms.iter().map(|h| h.max().ok())),
    ];

    Ok(StructArray::try_new(histogram_fields(), columns, None)?)
}

fn histogram_state_fields() -> Fields {
    Fields::from(vec![float_field(BUCKET_WIDTH, true), bins_field()])
}

pub fn histogram_state_data_type() -> DataType {
    DataType::Struct(histogram_state_fields())
}

/// Partial histograms, `None` being a histogram that has not seen any tile yet
pub fn histogram_states_to_arrow(states: &[Option<CellHistogram>]) -> Result<StructArray> {
    let validity: Vec<bool> = states.iter().map(Option::is_some).collect();

    let columns: Vec<ArrayRef> = vec![
        optional_f64(
            states
                .iter()
                .map(|state| state.as_ref().and_then(CellHistogram::bucket_width)),
        ),
        Arc::new(bins_to_arrow(states.iter().map(Option::as_ref))?),
    ];

    Ok(StructArray::try_new(
        histogram_state_fields(),
        columns,
        Some(NullBuffer::from(validity)).filter(|nulls| nulls.null_count() > 0),
    )?)
}

pub fn histogram_states_from_arrow(array: &dyn Array) -> Result<Vec<Option<CellHistogram>>> {
    let array = array
        .as_struct_opt()
        .ok_or_else(|| invalid_state(format!("expected a struct, found {}", array.data_type())))?;

    let bucket_widths = f64_column(array, BUCKET_WIDTH)?;
    let bins = array
        .column_by_name(BINS)
        .and_then(|column| column.as_list_opt::<i32>())
        .ok_or_else(|| invalid_state("missing list field `bins`"))?;

    (0..array.len())
        .map(|row| {
            if array.is_null(row) {
                return Ok(None);
            }
            let bucket_width = bucket_widths.is_valid(row).then(|| bucket_widths.value(row));
            Ok(Some(CellHistogram::from_bins(
                bucket_width,
                bins_from_arrow(bins, row)?,
            )?))
        })
        .collect()
}
