use crate::error::{self, Error, Result};
use config::{Config, ConfigError, Environment, File};
use rasterql_operators::registry::RegistryOptions;
use serde::Deserialize;
use snafu::ResultExt;
use std::path::PathBuf;
use std::sync::{LazyLock, RwLock};

static SETTINGS: LazyLock<Result<RwLock<Config>, ConfigError>> = LazyLock::new(init_settings);

fn init_settings() -> Result<RwLock<Config>, ConfigError> {
    let mut settings = Config::builder();

    // without a settings directory, the defaults of the config elements and the environment apply
    let dir = retrieve_settings_dir().ok();

    #[cfg(test)]
    let files = ["Settings-default.toml", "Settings-test.toml"];

    #[cfg(not(test))]
    let files = ["Settings-default.toml", "Settings.toml"];

    let files: Vec<File<_, _>> = dir
        .iter()
        .flat_map(|dir| files.iter().map(move |f| dir.join(f)))
        .filter(|p| p.exists())
        .map(File::from)
        .collect();

    settings = settings.add_source(files);

    // Override config with environment variables that start with `RASTERQL__`,
    // e.g. `RASTERQL__FUNCTIONS__PREFIX=st_`
    // Note: Since variables contain underscores, groups are separated by double underscores `__`
    settings = settings.add_source(Environment::with_prefix("rasterql").separator("__"));

    Ok(RwLock::new(settings.build()?))
}

fn settings() -> Result<&'static RwLock<Config>> {
    SETTINGS.as_ref().map_err(|error| Error::LoadSettings {
        reason: error.to_string(),
    })
}

/// Finds the settings in the working directory or, e.g. when running a crate's tests, in its parent
fn retrieve_settings_dir() -> Result<PathBuf> {
    const MAX_PARENT_DIRS: usize = 1;

    let mut settings_dir = std::env::current_dir().context(error::MissingWorkingDirectory)?;

    for _ in 0..=MAX_PARENT_DIRS {
        if settings_dir.join("Settings-default.toml").exists() {
            return Ok(settings_dir);
        }

        if !settings_dir.pop() {
            break;
        }
    }

    Err(Error::MissingSettingsDirectory)
}

#[cfg(test)]
pub fn set_config<T>(key: &str, value: T) -> Result<()>
where
    T: Into<config::Value>,
{
    let mut settings = settings()?
        .write()
        .map_err(|_error| Error::ConfigLockFailed)?;

    let builder = Config::builder()
        .add_source(settings.clone())
        .set_override(key, value)
        .context(error::Config)?;

    *settings = builder.build().context(error::Config)?;
    Ok(())
}

pub fn get_config<'a, T>(key: &str) -> Result<T>
where
    T: Deserialize<'a>,
{
    settings()?
        .read()
        .map_err(|_error| Error::ConfigLockFailed)?
        .get::<T>(key)
        .context(error::Config)
}

/// Reads a config element, falling back to its defaults if the whole element is missing
pub fn get_config_element<'a, T>() -> Result<T>
where
    T: ConfigElement + Default + Deserialize<'a>,
{
    match get_config(T::KEY) {
        Err(Error::Config {
            source: ConfigError::NotFound(_),
        }) => Ok(T::default()),
        result => result,
    }
}

pub trait ConfigElement {
    const KEY: &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Functions {
    /// The SQL name prefix of every raster function
    pub prefix: String,
}

impl Default for Functions {
    fn default() -> Self {
        Self {
            prefix: RegistryOptions::default().prefix,
        }
    }
}

impl ConfigElement for Functions {
    const KEY: &'static str = "functions";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Focal {
    /// The largest radius `focal_reduce` accepts
    pub max_radius: usize,
}

impl Default for Focal {
    fn default() -> Self {
        Self {
            max_radius: RegistryOptions::default().focal_max_radius,
        }
    }
}

impl ConfigElement for Focal {
    const KEY: &'static str = "focal";
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub log_spec: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            log_spec: "info".to_string(),
        }
    }
}

impl ConfigElement for Logging {
    const KEY: &'static str = "logging";
}

/// The registry options from the `functions` and `focal` elements
pub fn registry_options() -> Result<RegistryOptions> {
    let functions: Functions = get_config_element()?;
    let focal: Focal = get_config_element()?;

    Ok(RegistryOptions {
        prefix: functions.prefix,
        focal_max_radius: focal.max_radius,
    })
}
