use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub uploads_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    pub max_upload_size: usize,
    pub max_files: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3001".to_string(),
            uploads_dir: default_uploads_dir(),
            allowed_origins: Vec::new(),
            max_upload_size: 10 * 1024 * 1024,
            max_files: 5,
            allowed_mime_types: vec!["application/pdf".to_string()],
        }
    }
}

/// `<home>/Downloads/uploads_hackerramp`, or a relative fallback when no
/// home directory is known.
pub fn default_uploads_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("Downloads").join("uploads_hackerramp")
}

impl Config {
    /// Reads `path`, writing the defaults there first if it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
        } else {
            let default_config = Config::default();
            let toml_string = toml::to_string_pretty(&default_config)
                .context("failed to serialize default config")?;
            std::fs::write(path, toml_string)
                .with_context(|| format!("failed to create {}", path.display()))?;
            log::info!("Wrote default configuration to {}", path.display());
            Ok(default_config)
        }
    }

    /// Config path from the first CLI argument, else `config.toml`.
    pub fn from_args() -> anyhow::Result<Self> {
        let path = std::env::args()
            .nth(1)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)
    }

    pub fn is_allowed_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m.eq_ignore_ascii_case(mime))
    }

    pub fn max_upload_size_mib(&self) -> usize {
        self.max_upload_size / (1024 * 1024)
    }
}
