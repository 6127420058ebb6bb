use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub logs_dir: Option<String>,
    pub source_log: Option<String>,

    // Feature configs
    pub exports: Option<ExportsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExportsConfig {
    pub artifact_prefix: Option<String>,
    pub artifact_extension: Option<String>,
    pub max_concurrent_exports: Option<usize>,
    pub export_delay_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
