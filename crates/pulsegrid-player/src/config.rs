use std::path::{Path, PathBuf};

use anyhow::Context;
use pulsegrid_core::EngineConfig;
use tracing::{info, warn};

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulsegrid")
        .join("config.toml")
}

/// Read the engine config, falling back to defaults when the file is missing
/// or does not parse
pub fn load_config(path: &Path) -> EngineConfig {
    let Ok(text) = std::fs::read_to_string(path) else {
        return EngineConfig::default();
    };
    match toml::from_str(&text) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded config");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), "Ignoring malformed config: {}", e);
            EngineConfig::default()
        }
    }
}

pub fn write_default_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(&EngineConfig::default())?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "Wrote default config");
    Ok(())
}
