//! Config file commands implementation.

use std::path::{Path, PathBuf};

use pm100_core::config::{default_config_path, CoreConfig};

use crate::cli::{ConfigArgs, ConfigCommands};
use crate::error::{CliError, ConfigError};
use crate::output::get_formatter;

/// Run the config command
pub async fn run_config(
    args: ConfigArgs,
    path: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let path = resolve_path(path)?;

    match args.command {
        ConfigCommands::Path => {
            println!("{}", formatter.format_message(&path.display().to_string()));
        }
        ConfigCommands::Show => {
            let config = CoreConfig::load_or_default(&path).await?;
            let content = serde_json::to_string_pretty(&config).map_err(ConfigError::ParseError)?;
            println!("{}", content);
        }
        ConfigCommands::Init(init) => {
            init_config(&path, init.force).await?;
            println!(
                "{}",
                formatter.format_message(&format!("Wrote default config to {}", path.display()))
            );
        }
    }

    Ok(())
}

/// Explicit path, else the platform default.
pub fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    path.or_else(default_config_path)
        .ok_or_else(|| CliError::Other("Could not determine a config directory".to_string()))
}

/// Load the config for the device commands.
///
/// An explicit path must exist; the default location may be missing.
pub async fn load_config(path: Option<&Path>) -> Result<CoreConfig, CliError> {
    let config = match path {
        Some(path) => CoreConfig::load(path).await?,
        None => match default_config_path() {
            Some(path) => CoreConfig::load_or_default(&path).await?,
            None => CoreConfig::default(),
        },
    };
    tracing::debug!("Effective config: {:?}", config);
    Ok(config)
}

async fn init_config(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    CoreConfig::default().save(path).await?;
    Ok(())
}
