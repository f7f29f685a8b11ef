use crate::api::BUILTIN_PROVIDERS;
use crate::error::{FactoryError, FactoryResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub leonardo_api_key: String,
    #[serde(default)]
    pub runway_api_key: String,
    #[serde(default)]
    pub fal_api_key: String,
    #[serde(default)]
    pub stability_api_key: String,
    #[serde(default = "default_output_base")]
    pub output_base: PathBuf,
    #[serde(default = "default_duration_per_clip")]
    pub duration_per_clip: f64,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Provider name -> endpoint URL override.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    /// Provider name -> failover provider override.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, String>,
}

fn default_output_base() -> PathBuf {
    PathBuf::from("data/opal_output")
}

fn default_duration_per_clip() -> f64 {
    8.0
}

fn default_resolution() -> String {
    "1080x1920".to_string()
}

fn default_fps() -> u32 {
    30
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            leonardo_api_key: String::new(),
            runway_api_key: String::new(),
            fal_api_key: String::new(),
            stability_api_key: String::new(),
            output_base: default_output_base(),
            duration_per_clip: default_duration_per_clip(),
            resolution: default_resolution(),
            fps: default_fps(),
            request_timeout_secs: default_request_timeout_secs(),
            endpoints: BTreeMap::new(),
            fallbacks: BTreeMap::new(),
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Load the file when present, defaults otherwise, then fill missing
    /// API keys from the environment.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if fs::metadata(&path).await.is_ok() {
            Self::load(&path).await?
        } else {
            Self::default()
        };
        config.fill_keys_from(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn fill_keys_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for spec in BUILTIN_PROVIDERS {
            let Some(slot) = self.api_key_slot(spec.name) else {
                continue;
            };
            if slot.is_empty() {
                if let Some(value) = lookup(spec.api_key_env) {
                    *slot = value.trim().to_string();
                }
            }
        }
    }

    fn api_key_slot(&mut self, provider: &str) -> Option<&mut String> {
        match provider {
            "leonardo" => Some(&mut self.leonardo_api_key),
            "runway" => Some(&mut self.runway_api_key),
            "fal" => Some(&mut self.fal_api_key),
            "stability" => Some(&mut self.stability_api_key),
            _ => None,
        }
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        let key = match provider {
            "leonardo" => &self.leonardo_api_key,
            "runway" => &self.runway_api_key,
            "fal" => &self.fal_api_key,
            "stability" => &self.stability_api_key,
            _ => return None,
        };
        if key.is_empty() { None } else { Some(key) }
    }

    pub fn validate(&self) -> FactoryResult<()> {
        if !(self.duration_per_clip > 0.0) {
            return Err(FactoryError::config("duration_per_clip must be positive"));
        }
        if self.fps == 0 {
            return Err(FactoryError::config("fps must be positive"));
        }
        if crate::ffmpeg::parse_resolution(&self.resolution).is_none() {
            return Err(FactoryError::config(format!(
                "resolution must look like 1080x1920, got {:?}",
                self.resolution
            )));
        }
        Ok(())
    }
}
