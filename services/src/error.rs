use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    #[snafu(display("Raster function error: {}", source))]
    Operator {
        source: rasterql_operators::error::Error,
    },

    #[snafu(display("Invalid configuration: {}", source))]
    Config {
        source: config::ConfigError,
    },

    #[snafu(display("Could not load the settings: {}", reason))]
    LoadSettings {
        reason: String,
    },

    ConfigLockFailed,

    #[snafu(display("Could not determine the working directory: {}", source))]
    MissingWorkingDirectory {
        source: std::io::Error,
    },

    MissingSettingsDirectory,

    #[snafu(display("Invalid log spec: {}", source))]
    InvalidLogSpec {
        source: tracing_subscriber::filter::ParseError,
    },

    #[snafu(display("Could not install the global log subscriber: {}", source))]
    SetGlobalSubscriber {
        source: tracing_subscriber::util::TryInitError,
    },

    #[snafu(display("Could not serialize the catalog: {}", source))]
    SerdeJson {
        source: serde_json::Error,
    },
}

impl From<rasterql_operators::error::Error> for Error {
    fn from(source: rasterql_operators::error::Error) -> Self {
        Self::Operator { source }
    }
}
