use std::path::{Path, PathBuf};
use std::{fmt, io};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory, relative to the working directory, holding the configuration files.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for every configuration layer.
const FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix of environment variables overriding file values, e.g. `APP_SYNC__MODE`.
const ENV_PREFIX: &str = "APP";

/// Separator between nested keys in override variable names.
const ENV_KEY_SEPARATOR: &str = "__";

/// A configuration file layer. Later layers override earlier ones.
#[derive(Debug, Clone, Copy)]
enum Layer {
    Base,
    Environment(Environment),
}

impl Layer {
    fn stem(self) -> &'static str {
        match self {
            Layer::Base => "base",
            Layer::Environment(environment) => environment.as_str(),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Base => f.write_str("base configuration"),
            Layer::Environment(environment) => write!(f, "{environment} configuration"),
        }
    }
}

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingDirectory(PathBuf),

    /// No file with a supported extension exists for a layer.
    #[error("no {layer} found in `{directory}`, tried {attempted}")]
    MissingFile {
        layer: String,
        directory: PathBuf,
        attempted: String,
    },

    /// A layer's file exists but cannot be parsed.
    #[error("failed to read {layer} from `{path}`: {source}")]
    InvalidFile {
        layer: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    #[error("failed to apply environment variable overrides: {0}")]
    Overrides(#[source] rust_cli_config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    #[error("failed to determine the runtime environment: {0}")]
    Environment(#[from] io::Error),
}

/// Loads `T` from `./configuration` for the environment named by `APP_ENVIRONMENT`.
///
/// Values come from `base.(yaml|yml|json)`, then `{environment}.(yaml|yml|json)`, then
/// `APP_`-prefixed environment variables using `__` between nested keys
/// (`APP_SYNC__MAX_CONCURRENT_FETCHES=4`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let working_directory = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&working_directory.join(CONFIGURATION_DIR), environment)
}

/// Loads `T` from the files in `directory` for an explicit environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingDirectory(directory.to_path_buf()));
    }

    let mut builder = rust_cli_config::Config::builder();
    for layer in [Layer::Base, Layer::Environment(environment)] {
        let path = locate(directory, layer)?;
        builder = builder.add_source(rust_cli_config::File::from(path.clone()));

        // Building after each file attributes a parse error to the file that caused it.
        builder
            .build_cloned()
            .map_err(|source| LoadConfigError::InvalidFile {
                layer: layer.to_string(),
                path,
                source,
            })?;
    }

    let overrides = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_KEY_SEPARATOR)
        .try_parsing(true);

    builder
        .add_source(overrides)
        .build()
        .map_err(LoadConfigError::Overrides)?
        .try_deserialize()
        .map_err(LoadConfigError::Deserialization)
}

fn locate(directory: &Path, layer: Layer) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", layer.stem())))
        .collect();

    if let Some(path) = candidates.iter().find(|path| path.is_file()) {
        return Ok(path.clone());
    }

    Err(LoadConfigError::MissingFile {
        layer: layer.to_string(),
        directory: directory.to_path_buf(),
        attempted: candidates
            .iter()
            .map(|path| format!("`{}`", path.display()))
            .collect::<Vec<_>>()
            .join(", "),
    })
}
