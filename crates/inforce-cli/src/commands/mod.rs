pub mod analyze;
pub mod batch;
pub mod config;
pub mod output;
pub mod redact;

use std::path::{Path, PathBuf};

use tracing::debug;

use inforce_core::InforceConfig;

/// Default configuration file in the user config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inforce")
        .join("config.json")
}

/// Configuration from `--config`, else the default file when present,
/// else defaults; environment overrides applied last.
pub fn load_config(path: Option<&str>) -> anyhow::Result<InforceConfig> {
    let mut config = match path {
        Some(path) => InforceConfig::from_file(Path::new(path))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config at {}", default_path.display());
                InforceConfig::from_file(&default_path)?
            } else {
                InforceConfig::default()
            }
        }
    };
    config.apply_env()?;
    Ok(config)
}
