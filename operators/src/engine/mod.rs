mod arguments;
mod function;
mod host;
mod signature;

pub use arguments::{Arguments, value_at};
pub use function::{
    Accumulator, AggregateFunction, FunctionDescriptor, FunctionImplementation, FunctionKind,
    GeneratedRows, GeneratorFunction, ScalarFunction, TypeDescriptor,
};
pub use host::ExtensionHost;
pub use signature::{ArgType, Arity, ReturnType, Signature};
