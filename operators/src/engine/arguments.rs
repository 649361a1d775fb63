use crate::error::{self, Error};
use crate::util::Result;
use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, Int32Array, Int64Array, StringArray, StructArray,
};
use arrow::datatypes::{Float64Type, Int32Type, Int64Type};
use rasterql_datatypes::raster::TileArray;

/// Typed access to the argument columns of a call
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    function: &'static str,
    args: &'a [ArrayRef],
}

impl<'a> Arguments<'a> {
    pub fn new(function: &'static str, args: &'a [ArrayRef]) -> Self {
        Self { function, args }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn get(&self, index: usize) -> Option<&'a ArrayRef> {
        self.args.get(index)
    }

    fn required(&self, index: usize) -> Result<&'a ArrayRef> {
        self.args.get(index).ok_or_else(|| Error::InvalidArgument {
            function: self.function.to_string(),
            reason: format!("missing argument {index}"),
        })
    }

    fn type_error(&self, index: usize, expected: &str, array: &dyn Array) -> Error {
        Error::ArgumentType {
            function: self.function.to_string(),
            index,
            expected: expected.to_string(),
            found: array.data_type().to_string(),
        }
    }

    pub fn tiles(&self, index: usize) -> Result<TileArray<'a>> {
        let array = self.required(index)?;
        TileArray::try_new(array.as_ref()).map_err(|_| self.type_error(index, "tile", array.as_ref()))
    }

    pub fn float64(&self, index: usize) -> Result<&'a Float64Array> {
        let array = self.required(index)?;
        array
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(|| self.type_error(index, "Float64", array.as_ref()))
    }

    pub fn int32(&self, index: usize) -> Result<&'a Int32Array> {
        let array = self.required(index)?;
        array
            .as_primitive_opt::<Int32Type>()
            .ok_or_else(|| self.type_error(index, "Int32", array.as_ref()))
    }

    pub fn int64(&self, index: usize) -> Result<&'a Int64Array> {
        let array = self.required(index)?;
        array
            .as_primitive_opt::<Int64Type>()
            .ok_or_else(|| self.type_error(index, "Int64", array.as_ref()))
    }

    pub fn utf8(&self, index: usize) -> Result<&'a StringArray> {
        let array = self.required(index)?;
        array
            .as_string_opt::<i32>()
            .ok_or_else(|| self.type_error(index, "Utf8", array.as_ref()))
    }

    pub fn structs(&self, index: usize) -> Result<&'a StructArray> {
        let array = self.required(index)?;
        array
            .as_struct_opt()
            .ok_or_else(|| self.type_error(index, "struct", array.as_ref()))
    }

    /// Fails with `InvalidArgument` for a null value of a required parameter
    pub fn non_null<T>(&self, name: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| Error::InvalidArgument {
            function: self.function.to_string(),
            reason: format!("`{name}` must not be null"),
        })
    }

    pub fn invalid(&self, reason: impl Into<String>) -> Error {
        error::InvalidArgument {
            function: self.function,
            reason,
        }
        .build()
    }
}

/// The value at `row`, `None` if it is null
pub fn value_at<A>(array: A, row: usize) -> Option<A::Item>
where
    A: arrow::array::ArrayAccessor,
{
    array.is_valid(row).then(|| array.value(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;
    use std::sync::Arc;

    #[test]
    fn typed_access() {
        let args: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(vec![Some(1.5), None])),
            Arc::new(StringArray::from(vec!["sum", "max"])),
        ];
        let arguments = Arguments::new("test", &args);

        let floats = arguments.float64(0).unwrap();
        assert_eq!(value_at(floats, 0), Some(1.5));
        assert_eq!(value_at(floats, 1), None);
        assert_eq!(value_at(arguments.utf8(1).unwrap(), 1), Some("max"));

        assert!(matches!(
            arguments.int32(0),
            Err(Error::ArgumentType { index: 0, .. })
        ));
        assert!(matches!(
            arguments.tiles(1),
            Err(Error::ArgumentType { index: 1, .. })
        ));
        assert!(matches!(
            arguments.float64(2),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(arguments.non_null("value", None::<f64>).is_err());
    }
}
