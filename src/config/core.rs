use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use std::path::Path;

use super::FitsweepConfig;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Layered configuration: embedded defaults, optional config file, then
/// `FITSWEEP_` environment variables (`__` separates nested keys).
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    pub fn load() -> Result<Self> {
        Self::load_with_custom_config(None)
    }

    pub fn load_with_custom_config(custom_config: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(FitsweepConfig::default()))
            .merge(Toml::string(DEFAULT_CONFIG));

        if let Some(path) = custom_config {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            figment = Self::merge_file(figment, path)?;
        }

        // Environment variables always have highest priority
        figment = figment.merge(Env::prefixed("FITSWEEP_").split("__"));

        Ok(Self { figment })
    }

    /// Pick the provider from the file extension
    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        Ok(match extension.as_str() {
            "toml" => figment.merge(Toml::file(path)),
            "json" => figment.merge(Json::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            other => bail!(
                "Unsupported config format '.{other}' for {} (expected toml, json or yaml)",
                path.display()
            ),
        })
    }

    /// Extract the merged configuration into typed settings
    pub fn extract(&self) -> Result<FitsweepConfig> {
        self.figment
            .extract()
            .context("Invalid fitsweep configuration")
    }
}
