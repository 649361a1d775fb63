//! Flat row representations of the geometry and metadata value objects.
//!
//! Every value object maps to a fixed sequence of primitive fields. Nested objects are
//! flattened in a fixed order: the extent coordinates come first, then the `crs`, then the `time`.

use super::{Extent, ProjectedExtent, TemporalProjectedExtent, TimeInstance};
use crate::error::{self, Error};
use crate::spatial_reference::SpatialReference;
use crate::util::Result;
use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, Float64Builder, StringArray, StringBuilder,
    StructArray, TimestampMillisecondArray, TimestampMillisecondBuilder,
};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{
    DataType, Field, Fields, Float64Type, TimeUnit, TimestampMillisecondType,
};
use snafu::ensure;
use std::sync::Arc;
use tracing::debug;

/// A single primitive field of a flattened value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float64(f64),
    Utf8(String),
    TimestampMillis(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatFieldType {
    Float64,
    Utf8,
    TimestampMillis,
}

impl FlatFieldType {
    pub fn arrow_data_type(self) -> DataType {
        match self {
            FlatFieldType::Float64 => DataType::Float64,
            FlatFieldType::Utf8 => DataType::Utf8,
            FlatFieldType::TimestampMillis => DataType::Timestamp(TimeUnit::Millisecond, None),
        }
    }

    fn matches(self, data_type: &DataType) -> bool {
        match self {
            FlatFieldType::Float64 => data_type == &DataType::Float64,
            FlatFieldType::Utf8 => data_type == &DataType::Utf8,
            FlatFieldType::TimestampMillis => {
                matches!(data_type, DataType::Timestamp(TimeUnit::Millisecond, _))
            }
        }
    }
}

/// A value object with a fixed flat row representation
pub trait FlatCodec: Sized {
    /// The name of the value's shape, e.g. `extent`
    const NAME: &'static str;

    /// The names and types of the flat fields in their canonical order
    const FIELDS: &'static [(&'static str, FlatFieldType)];

    /// The field values in the order of `FIELDS`
    fn flatten(&self) -> Vec<FieldValue>;

    /// Rebuilds a value from the field values in the order of `FIELDS`
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedFlatten` if the values do not match `FIELDS` or
    /// if they do not describe a valid value.
    ///
    fn unflatten(values: &[FieldValue]) -> Result<Self>;

    fn arrow_fields() -> Fields {
        Self::FIELDS
            .iter()
            .map(|(name, field_type)| Field::new(*name, field_type.arrow_data_type(), false))
            .collect()
    }

    fn arrow_data_type() -> DataType {
        DataType::Struct(Self::arrow_fields())
    }

    /// Builds a flat struct column, `None` becoming a null entry
    ///
    /// # Errors
    ///
    /// Fails if a flattened value does not match `FIELDS` or if arrow rejects the array.
    ///
    fn to_arrow<'v, I>(values: I) -> Result<StructArray>
    where
        Self: 'v,
        I: IntoIterator<Item = Option<&'v Self>>,
    {
        let mut columns: Vec<ColumnBuilder> = Self::FIELDS
            .iter()
            .map(|(_, field_type)| ColumnBuilder::new(*field_type))
            .collect();
        let mut validity = Vec::new();

        for value in values {
            if let Some(value) = value {
                let flat = value.flatten();
                ensure!(
                    flat.len() == columns.len(),
                    error::UnsupportedFlatten {
                        data_type: Self::NAME
                    }
                );
                for (column, field_value) in columns.iter_mut().zip(flat) {
                    column.append(field_value, Self::NAME)?;
                }
            } else {
                columns.iter_mut().for_each(ColumnBuilder::append_placeholder);
            }
            validity.push(value.is_some());
        }

        Ok(StructArray::try_new(
            Self::arrow_fields(),
            columns.into_iter().map(ColumnBuilder::finish).collect(),
            Some(NullBuffer::from(validity)).filter(|nulls| nulls.null_count() > 0),
        )?)
    }

    /// Reads a flat struct column, null entries becoming `None`
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedFlatten` if the column does not have the flat layout of this value.
    ///
    fn from_arrow(array: &dyn Array) -> Result<Vec<Option<Self>>> {
        let unsupported = || Error::UnsupportedFlatten {
            data_type: array.data_type().to_string(),
        };

        let array = array
            .as_struct_opt()
            .filter(|array| array.num_columns() == Self::FIELDS.len())
            .ok_or_else(unsupported)?;
        let columns = Self::FIELDS
            .iter()
            .map(|(name, field_type)| {
                let column = array.column_by_name(name).ok_or_else(unsupported)?;
                ColumnReader::try_new(column.as_ref(), *field_type).ok_or_else(unsupported)
            })
            .collect::<Result<Vec<_>>>()?;

        (0..array.len())
            .map(|row| {
                if array.is_null(row) {
                    return Ok(None);
                }

                let values: Vec<FieldValue> =
                    columns.iter().map(|column| column.value(row)).collect();
                Self::unflatten(&values).map(Some)
            })
            .collect()
    }
}

enum ColumnBuilder {
    Float64(Float64Builder),
    Utf8(StringBuilder),
    TimestampMillis(TimestampMillisecondBuilder),
}

impl ColumnBuilder {
    fn new(field_type: FlatFieldType) -> Self {
        match field_type {
            FlatFieldType::Float64 => ColumnBuilder::Float64(Float64Builder::new()),
            FlatFieldType::Utf8 => ColumnBuilder::Utf8(StringBuilder::new()),
            FlatFieldType::TimestampMillis => {
                ColumnBuilder::TimestampMillis(TimestampMillisecondBuilder::new())
            }
        }
    }

    fn append(&mut self, value: FieldValue, shape: &'static str) -> Result<()> {
        match (self, value) {
            (ColumnBuilder::Float64(builder), FieldValue::Float64(value)) => {
                builder.append_value(value);
            }
            (ColumnBuilder::Utf8(builder), FieldValue::Utf8(value)) => {
                builder.append_value(value);
            }
            (ColumnBuilder::TimestampMillis(builder), FieldValue::TimestampMillis(value)) => {
                builder.append_value(value);
            }
            _ => return error::UnsupportedFlatten { data_type: shape }.fail(),
        }
        Ok(())
    }

    fn append_placeholder(&mut self) {
        match self {
            ColumnBuilder::Float64(builder) => builder.append_value(0.),
            ColumnBuilder::Utf8(builder) => builder.append_value(""),
            ColumnBuilder::TimestampMillis(builder) => builder.append_value(0),
        }
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Float64(mut builder) => Arc::new(builder.finish()),
            ColumnBuilder::Utf8(mut builder) => Arc::new(builder.finish()),
            ColumnBuilder::TimestampMillis(mut builder) => Arc::new(builder.finish()),
        }
    }
}

enum ColumnReader<'a> {
    Float64(&'a Float64Array),
    Utf8(&'a StringArray),
    TimestampMillis(&'a TimestampMillisecondArray),
}

impl<'a> ColumnReader<'a> {
    fn try_new(array: &'a dyn Array, field_type: FlatFieldType) -> Option<Self> {
        Some(match field_type {
            FlatFieldType::Float64 => ColumnReader::Float64(array.as_primitive_opt::<Float64Type>()?),
            FlatFieldType::Utf8 => ColumnReader::Utf8(array.as_string_opt::<i32>()?),
            FlatFieldType::TimestampMillis => ColumnReader::TimestampMillis(
                array.as_primitive_opt::<TimestampMillisecondType>()?,
            ),
        })
    }

    fn value(&self, row: usize) -> FieldValue {
        match self {
            ColumnReader::Float64(array) => FieldValue::Float64(array.value(row)),
            ColumnReader::Utf8(array) => FieldValue::Utf8(array.value(row).to_string()),
            ColumnReader::TimestampMillis(array) => FieldValue::TimestampMillis(array.value(row)),
        }
    }
}

fn unflatten_error<T>(shape: &'static str, values: &[FieldValue]) -> Result<T> {
    Err(Error::UnsupportedFlatten {
        data_type: format!("{values:?} as {shape}"),
    })
}

impl FlatCodec for Extent {
    const NAME: &'static str = "extent";
    const FIELDS: &'static [(&'static str, FlatFieldType)] = &[
        ("xmin", FlatFieldType::Float64),
        ("ymin", FlatFieldType::Float64),
        ("xmax", FlatFieldType::Float64),
        ("ymax", FlatFieldType::Float64),
    ];

    fn flatten(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Float64(self.xmin()),
            FieldValue::Float64(self.ymin()),
            FieldValue::Float64(self.xmax()),
            FieldValue::Float64(self.ymax()),
        ]
    }

    fn unflatten(values: &[FieldValue]) -> Result<Self> {
        match values {
            [
                FieldValue::Float64(xmin),
                FieldValue::Float64(ymin),
                FieldValue::Float64(xmax),
                FieldValue::Float64(ymax),
            ] => Extent::new(*xmin, *ymin, *xmax, *ymax),
            _ => unflatten_error(Self::NAME, values),
        }
    }
}

impl FlatCodec for SpatialReference {
    const NAME: &'static str = "crs";
    const FIELDS: &'static [(&'static str, FlatFieldType)] = &[("crs", FlatFieldType::Utf8)];

    fn flatten(&self) -> Vec<FieldValue> {
        vec![FieldValue::Utf8(self.definition().to_string())]
    }

    fn unflatten(values: &[FieldValue]) -> Result<Self> {
        match values {
            [FieldValue::Utf8(definition)] => Ok(SpatialReference::new(definition.as_str())),
            _ => unflatten_error(Self::NAME, values),
        }
    }
}

impl FlatCodec for ProjectedExtent {
    const NAME: &'static str = "projected_extent";
    const FIELDS: &'static [(&'static str, FlatFieldType)] = &[
        ("xmin", FlatFieldType::Float64),
        ("ymin", FlatFieldType::Float64),
        ("xmax", FlatFieldType::Float64),
        ("ymax", FlatFieldType::Float64),
        ("crs", FlatFieldType::Utf8),
    ];

    fn flatten(&self) -> Vec<FieldValue> {
        let mut values = self.extent.flatten();
        values.extend(self.crs.flatten());
        values
    }

    fn unflatten(values: &[FieldValue]) -> Result<Self> {
        if values.len() != Self::FIELDS.len() {
            return unflatten_error(Self::NAME, values);
        }

        Ok(ProjectedExtent::new(
            Extent::unflatten(&values[..4])?,
            SpatialReference::unflatten(&values[4..])?,
        ))
    }
}

impl FlatCodec for TemporalProjectedExtent {
    const NAME: &'static str = "temporal_projected_extent";
    const FIELDS: &'static [(&'static str, FlatFieldType)] = &[
        ("xmin", FlatFieldType::Float64),
        ("ymin", FlatFieldType::Float64),
        ("xmax", FlatFieldType::Float64),
        ("ymax", FlatFieldType::Float64),
        ("crs", FlatFieldType::Utf8),
        ("time", FlatFieldType::TimestampMillis),
    ];

    fn flatten(&self) -> Vec<FieldValue> {
        let mut values = self.projected_extent().flatten();
        values.push(FieldValue::TimestampMillis(self.time.inner()));
        values
    }

    fn unflatten(values: &[FieldValue]) -> Result<Self> {
        match values {
            [projected_extent @ .., FieldValue::TimestampMillis(time)]
                if values.len() == Self::FIELDS.len() =>
            {
                Ok(TemporalProjectedExtent::from_projected_extent(
                    ProjectedExtent::unflatten(projected_extent)?,
                    TimeInstance::from_millis(*time),
                ))
            }
            _ => unflatten_error(Self::NAME, values),
        }
    }
}

/// Flattens a (possibly nested) struct column into the flat layout of the value object it describes.
///
/// Nested structs are flattened recursively, an entry is null if it or any of its enclosing structs is null.
/// The leaf fields are matched by name and type against the known value objects and
/// reordered into their canonical order. All resulting fields are nullable.
///
/// # Errors
///
/// Fails with `UnsupportedFlatten` if the leaf fields match no known value object.
///
pub fn flatten_struct_array(array: &StructArray) -> Result<StructArray> {
    let mut leaves = Vec::new();
    let mut nulls = array.nulls().cloned();
    collect_leaves(array, &mut leaves, &mut nulls);

    let shapes = [
        (Extent::NAME, Extent::FIELDS),
        (SpatialReference::NAME, SpatialReference::FIELDS),
        (ProjectedExtent::NAME, ProjectedExtent::FIELDS),
        (TemporalProjectedExtent::NAME, TemporalProjectedExtent::FIELDS),
    ];

    for (shape, fields) in shapes {
        let Some(columns) = match_shape(fields, &leaves) else {
            continue;
        };

        debug!(shape, rows = array.len(), "flattening struct column");

        let fields: Fields = fields
            .iter()
            .zip(&columns)
            .map(|((name, _), column)| Field::new(*name, column.data_type().clone(), true))
            .collect();

        return Ok(StructArray::try_new(fields, columns, nulls)?);
    }

    Err(Error::UnsupportedFlatten {
        data_type: array.data_type().to_string(),
    })
}

fn collect_leaves(
    array: &StructArray,
    leaves: &mut Vec<(String, ArrayRef)>,
    nulls: &mut Option<NullBuffer>,
) {
    for (field, column) in array.fields().iter().zip(array.columns()) {
        if let Some(nested) = column.as_struct_opt() {
            *nulls = NullBuffer::union(nulls.as_ref(), nested.nulls());
            collect_leaves(nested, leaves, nulls);
        } else {
            leaves.push((field.name().clone(), column.clone()));
        }
    }
}

fn match_shape(
    fields: &[(&'static str, FlatFieldType)],
    leaves: &[(String, ArrayRef)],
) -> Option<Vec<ArrayRef>> {
    if fields.len() != leaves.len() {
        return None;
    }

    fields
        .iter()
        .map(|(name, field_type)| {
            leaves
                .iter()
                .find(|(leaf_name, column)| {
                    leaf_name == name && field_type.matches(column.data_type())
                })
                .map(|(_, column)| column.clone())
        })
        .collect()
}
