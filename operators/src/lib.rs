//! Raster functions for SQL engines: tile constructors and properties, focal operations,
//! statistics and the aggregates over tile columns, plus the registry that exposes them.

pub mod engine;
pub mod error;
pub mod processing;
pub mod registry;
pub mod util;
