use super::function::{FunctionDescriptor, TypeDescriptor};
use crate::util::Result;

/// The extension API of a SQL engine hosting the raster functions
pub trait ExtensionHost {
    /// Registers the column types, called once before [`ExtensionHost::register_functions`]
    fn register_types(&mut self, types: Vec<TypeDescriptor>) -> Result<()>;

    /// Registers the whole function table as one batch
    fn register_functions(&mut self, functions: Vec<FunctionDescriptor>) -> Result<()>;
}
