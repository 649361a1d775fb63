use crate::engine::Arity;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    #[snafu(display("DataTypeError: {}", source))]
    DataType {
        source: rasterql_datatypes::error::Error,
    },

    #[snafu(display("Arrow internal error: {:?}", source))]
    ArrowInternal {
        source: arrow::error::ArrowError,
    },

    #[snafu(display("Invalid argument for `{}`: {}", function, reason))]
    InvalidArgument {
        function: String,
        reason: String,
    },

    #[snafu(display(
        "Argument {} of `{}` must be of type {}, found {}",
        index,
        function,
        expected,
        found
    ))]
    ArgumentType {
        function: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[snafu(display(
        "`{}` expects {} arguments, found {}",
        function,
        expected,
        found
    ))]
    InvalidNumberOfArguments {
        function: String,
        expected: Arity,
        found: usize,
    },

    #[snafu(display(
        "The focal radius must be between 0 and {}, found {}",
        limit,
        actual
    ))]
    FocalRadiusTooLarge {
        limit: usize,
        actual: i64,
    },

    #[snafu(display("Unknown focal operation `{}`", operation))]
    UnknownFocalOperation {
        operation: String,
    },

    #[snafu(display("Unknown neighborhood `{}`, expected `square` or `circle`", neighborhood))]
    UnknownNeighborhood {
        neighborhood: String,
    },

    #[snafu(display("Invalid partial aggregate state: {}", reason))]
    InvalidAggregateState {
        reason: String,
    },

    #[snafu(display("A function named `{}` is already registered", name))]
    DuplicateFunction {
        name: String,
    },
}

impl Error {
    /// The raster data error that caused this error, if any
    pub fn data_type_error(&self) -> Option<&rasterql_datatypes::error::Error> {
        match self {
            Error::DataType { source } => Some(source),
            _ => None,
        }
    }
}

impl From<rasterql_datatypes::error::Error> for Error {
    fn from(datatype_error: rasterql_datatypes::error::Error) -> Self {
        Self::DataType {
            source: datatype_error,
        }
    }
}

impl From<arrow::error::ArrowError> for Error {
    fn from(source: arrow::error::ArrowError) -> Self {
        Error::ArrowInternal { source }
    }
}
