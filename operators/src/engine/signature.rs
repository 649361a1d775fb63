use crate::error;
use crate::util::Result;
use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use rasterql_datatypes::raster::tile_data_type;
use snafu::ensure;
use std::fmt;

/// The SQL-visible type of a function argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Tile,
    /// Any struct value, e.g. a geometry/metadata value
    Struct,
    Float64,
    Int32,
    Int64,
    Utf8,
}

impl ArgType {
    pub fn accepts(self, data_type: &DataType) -> bool {
        match self {
            ArgType::Tile => *data_type == tile_data_type(),
            ArgType::Struct => matches!(data_type, DataType::Struct(_)),
            ArgType::Float64 => *data_type == DataType::Float64,
            ArgType::Int32 => *data_type == DataType::Int32,
            ArgType::Int64 => *data_type == DataType::Int64,
            ArgType::Utf8 => *data_type == DataType::Utf8,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgType::Tile => "tile",
            ArgType::Struct => "struct",
            ArgType::Float64 => "Float64",
            ArgType::Int32 => "Int32",
            ArgType::Int64 => "Int64",
            ArgType::Utf8 => "Utf8",
        };
        f.write_str(name)
    }
}

/// The number of arguments a function accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range { min: usize, max: usize },
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range { min, max } => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
        }
    }

    pub fn min(self) -> usize {
        match self {
            Arity::Exact(n) | Arity::Range { min: n, .. } | Arity::AtLeast(n) => n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::Range { min, max } => write!(f, "{min} to {max}"),
            Arity::AtLeast(min) => write!(f, "at least {min}"),
        }
    }
}

/// What a function produces
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnType {
    /// One value of this type per input row
    Value(DataType),
    /// One struct value per input row whose flat fields depend on the input shape
    FlattenedStruct,
    /// Any number of rows per input row, see [`crate::engine::GeneratorFunction::output_schema`]
    Rows,
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Value(data_type) if *data_type == tile_data_type() => f.write_str("tile"),
            ReturnType::Value(data_type) => write!(f, "{data_type}"),
            ReturnType::FlattenedStruct => f.write_str("flat struct"),
            ReturnType::Rows => f.write_str("rows"),
        }
    }
}

/// Argument types and return type of a function.
///
/// The arguments are the required ones, followed by the optional ones, followed by
/// one or more repetitions of the variadic one.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub arguments: Vec<ArgType>,
    pub optional: Vec<ArgType>,
    pub variadic: Option<ArgType>,
    pub returns: ReturnType,
}

impl Signature {
    pub fn new(arguments: Vec<ArgType>, returns: ReturnType) -> Self {
        Self {
            arguments,
            optional: Vec::new(),
            variadic: None,
            returns,
        }
    }

    #[must_use]
    pub fn with_optional(mut self, optional: Vec<ArgType>) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn with_variadic(mut self, variadic: ArgType) -> Self {
        self.variadic = Some(variadic);
        self
    }

    pub fn arity(&self) -> Arity {
        let required = self.arguments.len();
        if self.variadic.is_some() {
            Arity::AtLeast(required + 1)
        } else if self.optional.is_empty() {
            Arity::Exact(required)
        } else {
            Arity::Range {
                min: required,
                max: required + self.optional.len(),
            }
        }
    }

    /// The expected type of the argument at `index`
    pub fn argument_type(&self, index: usize) -> Option<ArgType> {
        self.arguments
            .iter()
            .chain(&self.optional)
            .nth(index)
            .copied()
            .or(self.variadic)
    }

    /// Validates the number and types of the arguments of a call
    ///
    /// # Errors
    ///
    /// Fails with `InvalidNumberOfArguments` or `ArgumentType`.
    ///
    pub fn check(&self, function: &str, args: &[ArrayRef]) -> Result<()> {
        let arity = self.arity();
        ensure!(
            arity.accepts(args.len()),
            error::InvalidNumberOfArguments {
                function,
                expected: arity,
                found: args.len(),
            }
        );

        for (index, arg) in args.iter().enumerate() {
            let Some(expected) = self.argument_type(index) else {
                continue;
            };
            ensure!(
                expected.accepts(arg.data_type()),
                error::ArgumentType {
                    function,
                    index,
                    expected: expected.to_string(),
                    found: arg.data_type().to_string(),
                }
            );
        }

        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
        parts.extend(self.optional.iter().map(|arg| format!("[{arg}]")));
        if let Some(variadic) = self.variadic {
            parts.push(format!("{variadic}, ..."));
        }
        write!(f, "({}) -> {}", parts.join(", "), self.returns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int32Array, StringArray};
    use std::sync::Arc;

    fn focal_like() -> Signature {
        Signature::new(
            vec![ArgType::Float64, ArgType::Int32],
            ReturnType::Value(DataType::Float64),
        )
        .with_optional(vec![ArgType::Utf8])
    }

    #[test]
    fn arity() {
        assert_eq!(focal_like().arity(), Arity::Range { min: 2, max: 3 });
        assert_eq!(
            Signature::new(vec![], ReturnType::Rows)
                .with_variadic(ArgType::Tile)
                .arity(),
            Arity::AtLeast(1)
        );
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::AtLeast(3).accepts(2));
    }

    #[test]
    fn check_arguments() {
        let signature = focal_like();
        let float: ArrayRef = Arc::new(Float64Array::from(vec![1.]));
        let int: ArrayRef = Arc::new(Int32Array::from(vec![1]));
        let text: ArrayRef = Arc::new(StringArray::from(vec!["a"]));

        assert!(signature.check("f", &[float.clone(), int.clone()]).is_ok());
        assert!(
            signature
                .check("f", &[float.clone(), int.clone(), text.clone()])
                .is_ok()
        );

        assert!(matches!(
            signature.check("f", &[float.clone()]),
            Err(crate::error::Error::InvalidNumberOfArguments { found: 1, .. })
        ));
        assert!(matches!(
            signature.check("f", &[float, text]),
            Err(crate::error::Error::ArgumentType { index: 1, .. })
        ));
    }

    #[test]
    fn display() {
        assert_eq!(focal_like().to_string(), "(Float64, Int32, [Utf8]) -> Float64");
    }
}
