// Copyright (c) 2026 Scangate Contributors
// SPDX-License-Identifier: AGPL-3.0

// Scangate Configuration
//
// Defines the configuration schema shared by the API server and the
// reconciliation worker:
// - HTTP server binding and the public URL used in status links
// - PostgreSQL connection
// - Deployment platform and scan provider endpoints
// - S3-compatible report archive
// - Reconciler timing and severity threshold
//
// Values come from an optional YAML file and are then overridden by the
// environment variables deployments already set (DATABASE_URL, DETECTIFY_API, ...).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::scan_profile::DEFAULT_SUCCESS_THRESHOLD;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScangateConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Externally reachable base URL, used for report and error links
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform API base URL (e.g., "https://apps.example.com")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Platform UI base URL, linked from error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Scan provider API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom S3 endpoint for S3-compatible stores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    /// Secret key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

/// What the scheduler does when a tick fires while a sweep is still running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Start another sweep; per-profile writes are idempotent
    #[default]
    Allow,
    /// Skip the tick
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Time between sweeps
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Age after which a profile is timed out
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Severity score at or above which a scan fails
    #[serde(default = "default_success_threshold")]
    pub success_threshold: f64,

    /// Profiles processed concurrently within one sweep
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub overlap: OverlapPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Host whose `/user` endpoint validates ad-hoc scan tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_host: Option<String>,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    9000
}

fn default_public_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_timeout() -> Duration {
    Duration::from_secs(50 * 60)
}

fn default_success_threshold() -> f64 {
    DEFAULT_SUCCESS_THRESHOLD
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_address(),
            port: default_api_port(),
            public_url: default_public_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            timeout: default_timeout(),
            success_threshold: default_success_threshold(),
            max_concurrency: default_max_concurrency(),
            overlap: OverlapPolicy::default(),
        }
    }
}

/// Resolve "env:VAR_NAME" references, returning other values unchanged
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var)
            .map_err(|_| anyhow::anyhow!("Environment variable '{}' referenced by configuration is not set", var)),
        None => Ok(value.to_string()),
    }
}

/// Prefix a scheme-less URL with `https://` and drop trailing slashes
pub fn normalize_public_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

impl ScangateConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply environment overrides
    ///
    /// An explicit path that cannot be read is an error; without a path the
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                Self::from_yaml_file(path).map_err(|e| {
                    anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
                })?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Discover a configuration file: SCANGATE_CONFIG, then ./scangate.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SCANGATE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./scangate.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        None
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(val) = get("PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Invalid value for PORT: '{}'. Ignoring.", val),
            }
        }
        if let Some(val) = get("CALLBACK_URL") {
            self.server.public_url = val;
        }
        if let Some(val) = get("DATABASE_URL") {
            self.database.url = Some(val);
        }
        if let Some(val) = get("AKKERIS_API") {
            self.platform.api_url = Some(val);
        }
        if let Some(val) = get("AKKERIS_UI") {
            self.platform.ui_url = Some(val);
        }
        if let Some(val) = get("DETECTIFY_API") {
            self.provider.api_url = Some(val);
        }
        if let Some(val) = get("DETECTIFY_API_KEY") {
            self.provider.api_key = Some(val);
        }
        if let Some(val) = get("S3_BUCKET") {
            self.storage.bucket = Some(val);
        }
        if let Some(val) = get("S3_REGION") {
            self.storage.region = Some(val);
        }
        if let Some(val) = get("S3_ENDPOINT") {
            self.storage.endpoint = Some(val);
        }
        if let Some(val) = get("S3_ACCESS_KEY") {
            self.storage.access_key_id = Some(val);
        }
        if let Some(val) = get("S3_SECRET_KEY") {
            self.storage.secret_access_key = Some(val);
        }
        if let Some(val) = get("AUTH_HOST") {
            self.auth.auth_host = Some(val);
        }
        if let Some(val) = get("TIMEOUT_MINUTES") {
            match val.parse::<u64>() {
                Ok(minutes) if minutes > 0 => {
                    self.reconciler.timeout = Duration::from_secs(minutes * 60)
                }
                _ => tracing::warn!("Invalid value for TIMEOUT_MINUTES: '{}'. Using {:?}.", val, self.reconciler.timeout),
            }
        }
        if let Some(val) = get("WORKER_INTERVAL") {
            match val.parse::<f64>() {
                Ok(minutes) if minutes.is_finite() && minutes > 0.0 => {
                    self.reconciler.interval = Duration::from_secs_f64(minutes * 60.0)
                }
                _ => tracing::warn!("Invalid value for WORKER_INTERVAL: '{}'. Using {:?}.", val, self.reconciler.interval),
            }
        }

        self.server.public_url = normalize_public_url(&self.server.public_url);
    }

    /// Names of required settings that are missing
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.database.url.is_none() {
            missing.push("database.url (DATABASE_URL)");
        }
        if self.platform.api_url.is_none() {
            missing.push("platform.api_url (AKKERIS_API)");
        }
        if self.provider.api_url.is_none() {
            missing.push("provider.api_url (DETECTIFY_API)");
        }
        if self.provider.api_key.is_none() {
            missing.push("provider.api_key (DETECTIFY_API_KEY)");
        }
        if self.storage.bucket.is_none() {
            missing.push("storage.bucket (S3_BUCKET)");
        }
        missing
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let missing = self.missing_settings();
        if !missing.is_empty() {
            anyhow::bail!("Missing configuration setting(s): {}", missing.join(", "));
        }

        if !(0.0..=10.0).contains(&self.reconciler.success_threshold) {
            anyhow::bail!(
                "reconciler.success_threshold must be between 0 and 10, got {}",
                self.reconciler.success_threshold
            );
        }

        if self.reconciler.max_concurrency == 0 {
            anyhow::bail!("reconciler.max_concurrency must be at least 1");
        }

        if self.reconciler.interval.is_zero() || self.reconciler.timeout.is_zero() {
            anyhow::bail!("reconciler.interval and reconciler.timeout must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = ScangateConfig::default();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.reconciler.interval, Duration::from_secs(300));
        assert_eq!(config.reconciler.timeout, Duration::from_secs(3000));
        assert_eq!(config.reconciler.success_threshold, 6.0);
        assert_eq!(config.reconciler.overlap, OverlapPolicy::Allow);
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
server:
  public_url: https://scan.example.com
reconciler:
  interval: 2m
  timeout: 1h
  success_threshold: 4.5
  overlap: skip
"#;
        let config = ScangateConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.server.public_url, "https://scan.example.com");
        assert_eq!(config.reconciler.interval, Duration::from_secs(120));
        assert_eq!(config.reconciler.timeout, Duration::from_secs(3600));
        assert_eq!(config.reconciler.success_threshold, 4.5);
        assert_eq!(config.reconciler.overlap, OverlapPolicy::Skip);
        assert_eq!(config.reconciler.max_concurrency, 8);
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("DATABASE_URL", "postgres://localhost/scangate"),
            ("DETECTIFY_API", "https://api.detectify.test"),
            ("DETECTIFY_API_KEY", "key"),
            ("AKKERIS_API", "https://apps.test"),
            ("S3_BUCKET", "reports"),
            ("CALLBACK_URL", "scan.example.com/"),
            ("TIMEOUT_MINUTES", "20"),
            ("WORKER_INTERVAL", "0.5"),
            ("PORT", "not-a-port"),
        ]);
        let mut config = ScangateConfig::default();
        config.apply_overrides_from(|k| vars.get(k).cloned());

        assert_eq!(config.server.public_url, "https://scan.example.com");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.reconciler.timeout, Duration::from_secs(1200));
        assert_eq!(config.reconciler.interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_interval_keeps_default() {
        let vars = env(&[("WORKER_INTERVAL", "soon"), ("TIMEOUT_MINUTES", "0")]);
        let mut config = ScangateConfig::default();
        config.apply_overrides_from(|k| vars.get(k).cloned());
        assert_eq!(config.reconciler.interval, Duration::from_secs(300));
        assert_eq!(config.reconciler.timeout, Duration::from_secs(3000));
    }

    #[test]
    fn test_validation_lists_all_missing() {
        let config = ScangateConfig::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("DATABASE_URL"));
        assert!(err.contains("DETECTIFY_API_KEY"));
        assert!(err.contains("S3_BUCKET"));
    }

    #[test]
    fn test_normalize_public_url() {
        assert_eq!(normalize_public_url("http://localhost:9000"), "http://localhost:9000");
        assert_eq!(normalize_public_url("scan.example.com"), "https://scan.example.com");
    }

    #[test]
    fn test_resolve_secret_passthrough() {
        assert_eq!(resolve_secret("plain-key").unwrap(), "plain-key");
        assert!(resolve_secret("env:SCANGATE_TEST_VAR_THAT_IS_NOT_SET").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scangate.yaml");
        std::fs::write(&path, "server:\n  port: 9100\n").unwrap();
        let config = ScangateConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.server.port, 9100);

        assert!(ScangateConfig::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }
}
