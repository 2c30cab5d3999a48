use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pdf::QueueConfig;
use crate::totals::DEFAULT_TAX_RATE;

pub const ENV_BASE_URL: &str = "INVOICE_DESK_BASE_URL";
pub const ENV_DATA_ROOT: &str = "INVOICE_DESK_DATA_ROOT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub data_root: String,
    pub tax_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_service_url: Option<String>,
    pub pdf_min_delay_ms: u64,
    pub pdf_retry_backoff_ms: u64,
    pub pdf_max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_cache_max_entries: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            data_root: "~/Documents/Invoices".to_string(),
            tax_rate: DEFAULT_TAX_RATE,
            pdf_service_url: None,
            pdf_min_delay_ms: 3000,
            pdf_retry_backoff_ms: 6000,
            pdf_max_retries: 3,
            pdf_cache_max_entries: None,
        }
    }
}

impl Settings {
    /// `settings.toml` in the platform config directory.
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-desk", "app") {
            return proj_dirs.config_dir().join("settings.toml");
        }
        PathBuf::from("settings.toml")
    }

    /// Settings from the default location with environment overrides applied.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::config_path())?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(root) = lookup(ENV_DATA_ROOT).filter(|v| !v.trim().is_empty()) {
            self.data_root = root;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if !self.tax_rate.is_finite() || self.tax_rate < 0.0 {
            return Err(Error::Config(format!("tax_rate must be a non-negative number, got {}", self.tax_rate)));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            min_delay: Duration::from_millis(self.pdf_min_delay_ms),
            retry_backoff: Duration::from_millis(self.pdf_retry_backoff_ms),
            max_retries: self.pdf_max_retries,
        }
    }
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
