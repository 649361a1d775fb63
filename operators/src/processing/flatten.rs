use crate::engine::{ArgType, Arguments, ReturnType, ScalarFunction, Signature};
use crate::util::Result;
use arrow::array::ArrayRef;
use rasterql_datatypes::primitives::flatten_struct_array;
use std::sync::Arc;

/// `flatten(value)` turns a nested extent/CRS/time struct into its flat row representation
#[derive(Debug, Clone, Copy)]
pub struct Flatten;

impl Flatten {
    pub const NAME: &'static str = "flatten";
}

impl ScalarFunction for Flatten {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![ArgType::Struct], ReturnType::FlattenedStruct)
    }

    fn invoke(&self, args: &[ArrayRef], _num_rows: usize) -> Result<ArrayRef> {
        self.signature().check(Self::NAME, args)?;
        let args = Arguments::new(Self::NAME, args);

        Ok(Arc::new(flatten_struct_array(args.structs(0)?)?))
    }
}
