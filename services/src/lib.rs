//! Configuration, logging and the installation of the raster functions into a host engine.

pub mod config;
pub mod error;
pub mod extension;
pub mod logging;
