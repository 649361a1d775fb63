use crate::config::Logging;
use crate::error::{self, Result};
use snafu::ResultExt;
use tracing::Subscriber;
use tracing_subscriber::layer::Filter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// The console log filter from a `log_spec` in `EnvFilter` syntax
pub fn log_filter(logging: &Logging) -> Result<EnvFilter> {
    EnvFilter::try_new(&logging.log_spec).context(error::InvalidLogSpec)
}

/// Installs the global log subscriber writing to `STDERR`
///
/// # Errors
///
/// Fails if the log spec is invalid or if a global subscriber is already installed.
///
pub fn init_logging(logging: &Logging) -> Result<()> {
    let console_filter = log_filter(logging)?;

    tracing_subscriber::registry()
        .with(console_layer_with_filter(console_filter))
        .try_init()
        .context(error::SetGlobalSubscriber)
}

fn console_layer_with_filter<S, F: Filter<S> + 'static>(filter: F) -> impl Layer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn accepts_directives() {
        let logging = Logging {
            log_spec: "warn,rasterql_operators=debug".to_string(),
        };

        assert!(log_filter(&logging).is_ok());
    }

    #[test]
    fn rejects_invalid_specs() {
        let logging = Logging {
            log_spec: "rasterql_operators=loud".to_string(),
        };

        assert!(matches!(
            init_logging(&logging),
            Err(Error::InvalidLogSpec { .. })
        ));
    }
}
