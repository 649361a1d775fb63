use super::signature::Signature;
use crate::util::Result;
use arrow::array::{ArrayRef, UInt32Array};
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::fmt;
use std::sync::Arc;

/// A function evaluated row by row, producing one value per input row.
///
/// Implementations are pure and may be invoked concurrently on independent batches.
pub trait ScalarFunction: Send + Sync {
    /// The unprefixed name, e.g. `grid_rows`
    fn name(&self) -> &'static str;

    fn signature(&self) -> Signature;

    /// Evaluates the function on a batch of `num_rows` rows
    fn invoke(&self, args: &[ArrayRef], num_rows: usize) -> Result<ArrayRef>;

    fn boxed(self) -> Arc<dyn ScalarFunction>
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }
}

/// The rows produced by a [`GeneratorFunction`] for one batch
#[derive(Debug, Clone)]
pub struct GeneratedRows {
    /// For every generated row, the index of the input row it was generated from
    pub parent_rows: UInt32Array,
    pub batch: RecordBatch,
}

/// A function that expands every input row into any number of output rows
pub trait GeneratorFunction: Send + Sync {
    fn name(&self) -> &'static str;

    fn signature(&self) -> Signature;

    /// The schema of the generated rows for a call with `num_args` arguments
    fn output_schema(&self, num_args: usize) -> SchemaRef;

    fn generate(&self, args: &[ArrayRef], num_rows: usize) -> Result<GeneratedRows>;

    fn boxed(self) -> Arc<dyn GeneratorFunction>
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }
}

/// A function reducing a group of rows to one value.
///
/// The host creates one accumulator per group and partition, and merges the
/// serialized states of partial accumulators in any order.
pub trait AggregateFunction: Send + Sync {
    fn name(&self) -> &'static str;

    fn signature(&self) -> Signature;

    /// The type of the partial aggregate state exchanged between partitions
    fn state_type(&self) -> DataType;

    fn create_accumulator(&self) -> Box<dyn Accumulator>;
}

/// The per-group state of an [`AggregateFunction`]
pub trait Accumulator: Send {
    /// Folds a batch of input rows into the state
    fn update_batch(&mut self, args: &[ArrayRef]) -> Result<()>;

    /// The current state as a single-row array of [`AggregateFunction::state_type`]
    fn state(&self) -> Result<ArrayRef>;

    /// Folds serialized states of other accumulators into this one
    fn merge_batch(&mut self, states: &ArrayRef) -> Result<()>;

    /// The final value as a single-row array
    fn evaluate(&self) -> Result<ArrayRef>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar,
    Generator,
    Aggregate,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionKind::Scalar => "scalar",
            FunctionKind::Generator => "generator",
            FunctionKind::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub enum FunctionImplementation {
    Scalar(Arc<dyn ScalarFunction>),
    Generator(Arc<dyn GeneratorFunction>),
    Aggregate(Arc<dyn AggregateFunction>),
}

impl FunctionImplementation {
    pub fn kind(&self) -> FunctionKind {
        match self {
            FunctionImplementation::Scalar(_) => FunctionKind::Scalar,
            FunctionImplementation::Generator(_) => FunctionKind::Generator,
            FunctionImplementation::Aggregate(_) => FunctionKind::Aggregate,
        }
    }

    fn base_name(&self) -> &'static str {
        match self {
            FunctionImplementation::Scalar(function) => function.name(),
            FunctionImplementation::Generator(function) => function.name(),
            FunctionImplementation::Aggregate(function) => function.name(),
        }
    }

    fn signature(&self) -> Signature {
        match self {
            FunctionImplementation::Scalar(function) => function.signature(),
            FunctionImplementation::Generator(function) => function.signature(),
            FunctionImplementation::Aggregate(function) => function.signature(),
        }
    }
}

impl From<Arc<dyn ScalarFunction>> for FunctionImplementation {
    fn from(function: Arc<dyn ScalarFunction>) -> Self {
        FunctionImplementation::Scalar(function)
    }
}

impl From<Arc<dyn GeneratorFunction>> for FunctionImplementation {
    fn from(function: Arc<dyn GeneratorFunction>) -> Self {
        FunctionImplementation::Generator(function)
    }
}

impl From<Arc<dyn AggregateFunction>> for FunctionImplementation {
    fn from(function: Arc<dyn AggregateFunction>) -> Self {
        FunctionImplementation::Aggregate(function)
    }
}

/// An entry of the function table handed to the host
#[derive(Clone)]
pub struct FunctionDescriptor {
    /// The SQL-visible name, including the prefix
    pub name: String,
    pub signature: Signature,
    pub documentation: &'static str,
    pub implementation: FunctionImplementation,
}

impl FunctionDescriptor {
    pub fn new(
        prefix: &str,
        implementation: impl Into<FunctionImplementation>,
        documentation: &'static str,
    ) -> Self {
        let implementation = implementation.into();
        Self {
            name: format!("{prefix}{}", implementation.base_name()),
            signature: implementation.signature(),
            documentation,
            implementation,
        }
    }

    pub fn kind(&self) -> FunctionKind {
        self.implementation.kind()
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} [{}]", self.name, self.signature, self.kind())
    }
}

/// A column type the host registers under a stable name
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub data_type: DataType,
    /// The Arrow extension name the column field is tagged with, if any
    pub extension_name: Option<&'static str>,
}
