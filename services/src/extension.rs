use crate::config;
use crate::error::Result;
use rasterql_operators::engine::ExtensionHost;
use rasterql_operators::registry::{
    FunctionRegistry, RegistryOptions, SQL_CONTRACT_VERSION, type_descriptors,
};
use tracing::info;

/// Registers all raster types and then all raster functions with the host, each as one batch.
///
/// The function table is built before the host is called, so an invalid table leaves the host untouched.
///
/// # Errors
///
/// Fails if the function table is invalid or if the host rejects a registration.
///
pub fn install(host: &mut dyn ExtensionHost, options: &RegistryOptions) -> Result<()> {
    let registry = FunctionRegistry::new(options)?;
    let types = type_descriptors();
    let (num_types, num_functions) = (types.len(), registry.len());

    host.register_types(types)?;
    host.register_functions(registry.into_descriptors())?;

    info!(
        types = num_types,
        functions = num_functions,
        prefix = %options.prefix,
        contract_version = SQL_CONTRACT_VERSION,
        "installed raster extension"
    );

    Ok(())
}

/// [`install`] with the options from the settings
pub fn install_from_settings(host: &mut dyn ExtensionHost) -> Result<()> {
    install(host, &config::registry_options()?)
}
