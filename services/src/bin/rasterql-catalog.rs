use clap::{Parser, Subcommand};
use rasterql_operators::engine::{FunctionDescriptor, TypeDescriptor};
use rasterql_operators::registry::{FunctionRegistry, type_descriptors};
use rasterql_services::config::{self, Logging, get_config_element};
use rasterql_services::error::{Error, Result};
use rasterql_services::logging::init_logging;
use serde::Serialize;

/// Lists the raster types and functions a host engine receives on installation
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Overrides the configured function name prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Prints JSON instead of one line per entry
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Lists the functions with their signatures
    Functions,

    /// Lists the column types
    Types,
}

#[derive(Debug, Serialize)]
struct FunctionEntry<'f> {
    name: &'f str,
    kind: String,
    signature: String,
    documentation: &'f str,
}

impl<'f> From<&'f FunctionDescriptor> for FunctionEntry<'f> {
    fn from(function: &'f FunctionDescriptor) -> Self {
        Self {
            name: &function.name,
            kind: function.kind().to_string(),
            signature: function.signature.to_string(),
            documentation: function.documentation,
        }
    }
}

#[derive(Debug, Serialize)]
struct TypeEntry {
    name: &'static str,
    data_type: String,
    extension_name: Option<&'static str>,
}

impl From<&TypeDescriptor> for TypeEntry {
    fn from(descriptor: &TypeDescriptor) -> Self {
        Self {
            name: descriptor.name,
            data_type: descriptor.data_type.to_string(),
            extension_name: descriptor.extension_name,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<String>> {
    let json = serde_json::to_string_pretty(value).map_err(|source| Error::SerdeJson { source })?;
    Ok(vec![json])
}

impl Cli {
    fn lines(&self) -> Result<Vec<String>> {
        let mut options = config::registry_options()?;
        if let Some(prefix) = &self.prefix {
            options.prefix.clone_from(prefix);
        }

        match self.command {
            Commands::Functions => {
                let registry = FunctionRegistry::new(&options)?;
                if self.json {
                    let entries: Vec<FunctionEntry> =
                        registry.functions().map(FunctionEntry::from).collect();
                    return to_json(&entries);
                }
                Ok(registry
                    .functions()
                    .map(|function| format!("{function}\n    {}", function.documentation))
                    .collect())
            }
            Commands::Types => {
                let types = type_descriptors();
                if self.json {
                    let entries: Vec<TypeEntry> = types.iter().map(TypeEntry::from).collect();
                    return to_json(&entries);
                }
                Ok(types
                    .iter()
                    .map(|t| format!("{}: {}", t.name, t.data_type))
                    .collect())
            }
        }
    }
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn main() {
    let cli = Cli::parse();

    let logging: Logging = get_config_element().unwrap_or_default();
    if let Err(err) = init_logging(&logging) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }

    match cli.lines() {
        Ok(lines) => lines.iter().for_each(|line| println!("{line}")),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
