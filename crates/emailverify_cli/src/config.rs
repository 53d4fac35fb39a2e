//! Configuration loading: defaults, optional `Config.toml`, environment.
//!
//! Explicit command-line flags always win; the layers here only provide the
//! defaults they fall back to.

use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub verify: VerifySettings,
    pub bulk: BulkSettings,
}

/// Defaults for the verification pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySettings {
    /// Envelope sender used in MAIL FROM.
    pub from_address: String,
    /// Argument to EHLO/HELO.
    pub helo_domain: String,
    /// Per-operation timeout in seconds.
    pub timeout_secs: u64,
    /// SMTP port.
    pub port: u16,
    /// Skip certificate validation on STARTTLS upgrade.
    pub skip_tls_verify: bool,
    /// Enable the disposable-domain classifier.
    pub check_disposable: bool,
    /// Enable the role-account classifier.
    pub check_role: bool,
    /// Enable the free-provider classifier.
    pub check_free_provider: bool,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            from_address: "test@gmail.com".to_string(),
            helo_domain: "mail.verification-check.com".to_string(),
            timeout_secs: 15,
            port: 25,
            skip_tls_verify: true,
            check_disposable: true,
            check_role: true,
            check_free_provider: true,
        }
    }
}

/// Defaults for the bulk worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSettings {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Delay between checks in seconds.
    pub delay_secs: f64,
    /// Random jitter added to the delay in seconds.
    pub jitter_secs: f64,
    /// Depth of the job and result queues.
    pub buffer_size: usize,
    /// Health check every N emails per worker.
    pub health_interval: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            workers: 3,
            delay_secs: 2.0,
            jitter_secs: 1.0,
            buffer_size: 100,
            health_interval: 10,
        }
    }
}

/// Loads configuration: defaults, then an optional TOML file, then
/// `EMAILVERIFY_*` environment variables (e.g.
/// `EMAILVERIFY_VERIFY__FROM_ADDRESS`).
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    match path {
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            if Path::new("Config.toml").exists() {
                figment = figment.merge(Toml::file("Config.toml"));
            }
        }
    }

    figment = figment.merge(Env::prefixed("EMAILVERIFY_").split("__"));

    figment
        .extract()
        .context("failed to load configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_engine() {
        let config = AppConfig::default();
        assert_eq!(config.verify.port, 25);
        assert_eq!(config.verify.timeout_secs, 15);
        assert_eq!(config.verify.from_address, "test@gmail.com");
        assert!(config.verify.skip_tls_verify);
        assert_eq!(config.bulk.workers, 3);
        assert_eq!(config.bulk.delay_secs, 2.0);
        assert_eq!(config.bulk.health_interval, 10);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        std::fs::write(
            &path,
            "[verify]\nfrom_address = \"probe@corp.example\"\n\n[bulk]\nworkers = 7\n",
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.verify.from_address, "probe@corp.example");
        assert_eq!(config.bulk.workers, 7);
        // Untouched keys keep their defaults.
        assert_eq!(config.verify.port, 25);
    }

    #[test]
    fn missing_explicit_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.bulk.workers, 3);
    }
}
