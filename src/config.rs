//! Configuration management
//!
//! Manages service configuration including anomaly detection tuning,
//! alert severity bands, data retention, and the background sweep.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Anomaly detection tuning
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    /// Alert severity bands
    #[serde(default)]
    pub alerts: AlertBands,
    /// Data retention settings
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Background budget sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Seed demo budgets on startup
    #[serde(default)]
    pub seed_demo_data: bool,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Anomaly detection tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Minimum prior samples before detection runs
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    /// Standard deviations above the mean that flag a spike
    #[serde(default = "default_sigma_threshold")]
    pub sigma_threshold: f64,
    /// Standard deviations above the mean that escalate to critical
    #[serde(default = "default_critical_sigma")]
    pub critical_sigma: f64,
}

fn default_min_history() -> usize {
    7
}

fn default_sigma_threshold() -> f64 {
    2.0
}

fn default_critical_sigma() -> f64 {
    3.0
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_history: default_min_history(),
            sigma_threshold: default_sigma_threshold(),
            critical_sigma: default_critical_sigma(),
        }
    }
}

/// Percentage bands for threshold-alert severity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertBands {
    /// At or above this percentage a threshold alert is medium
    #[serde(default = "default_medium_band")]
    pub medium_band: f64,
    /// At or above this percentage a threshold alert is high
    #[serde(default = "default_high_band")]
    pub high_band: f64,
}

fn default_medium_band() -> f64 {
    85.0
}

fn default_high_band() -> f64 {
    95.0
}

impl Default for AlertBands {
    fn default() -> Self {
        Self {
            medium_band: default_medium_band(),
            high_band: default_high_band(),
        }
    }
}

/// Data retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Days of cost history, alerts, and anomalies to keep
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

fn default_retention_days() -> u32 {
    90
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

/// Background budget sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between full budget sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// Deadline for evaluating one organization during a sweep
    #[serde(default = "default_org_timeout")]
    pub org_timeout_secs: u64,
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_org_timeout() -> u64 {
    30
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            org_timeout_secs: default_org_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            anomaly: AnomalyConfig::default(),
            alerts: AlertBands::default(),
            retention: RetentionConfig::default(),
            sweep: SweepConfig::default(),
            seed_demo_data: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "finops", "finops")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("FinOps service configuration");
    println!("  server:    {}:{}", config.server.host, config.server.port);
    println!(
        "  anomaly:   min_history={} sigma={} critical_sigma={}",
        config.anomaly.min_history, config.anomaly.sigma_threshold, config.anomaly.critical_sigma
    );
    println!(
        "  alerts:    medium>={}% high>={}%",
        config.alerts.medium_band, config.alerts.high_band
    );
    println!("  retention: {} days", config.retention.days);
    println!(
        "  sweep:     every {}s, {}s per-org deadline",
        config.sweep.interval_secs, config.sweep.org_timeout_secs
    );
    println!("  seed demo data: {}", config.seed_demo_data);

    Ok(())
}
