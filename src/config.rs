//! Configuration management for the Solarman exporter.
//!
//! Supports loading configuration from:
//! - An optional configuration file (TOML, YAML, JSON, ...)
//! - Environment variables (`APP_ID`, `APP_SECRET`, `EMAIL`, `PASSWORD`, `SN`)
//!
//! Environment variables take precedence over the file. The listen address
//! and log level are command-line concerns and live in `main`.

use crate::error::{Result, SolarmanError};
use serde::Deserialize;
use std::path::Path;

/// Solarman account and inverter settings.
///
/// Loaded once at startup and passed by value into [`crate::client::SolarmanClient`].
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Solarman application id (`APP_ID`)
    #[serde(default)]
    pub app_id: String,

    /// Solarman application secret (`APP_SECRET`)
    #[serde(default)]
    pub app_secret: String,

    /// Solarman account email (`EMAIL`)
    #[serde(default)]
    pub email: String,

    /// Solarman account password (`PASSWORD`)
    #[serde(default)]
    pub password: String,

    /// Serial number of the inverter to poll (`SN`)
    #[serde(default, rename = "sn")]
    pub inverter_sn: String,

    /// Base URL of the Solarman OpenAPI (`SOLARMAN_API_URL`)
    #[serde(default = "default_api_url", rename = "solarman_api_url")]
    pub api_url: String,

    /// Request timeout in seconds (`SOLARMAN_TIMEOUT_SECONDS`)
    #[serde(default = "default_timeout", rename = "solarman_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("app_id", &self.app_id)
            .field("app_secret", &"***REDACTED***")
            .field("email", &self.email)
            .field("password", &"***REDACTED***")
            .field("inverter_sn", &self.inverter_sn)
            .field("api_url", &self.api_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

fn default_api_url() -> String {
    "https://globalapi.solarmanpv.com".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Settings {
    /// Load configuration from an optional file and the process environment.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use solarman_exporter::config::Settings;
    ///
    /// let settings = Settings::load(None).unwrap();
    /// println!("polling inverter {}", settings.inverter_sn);
    /// ```
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, config::Environment::default())
    }

    /// Load configuration using the given environment source.
    ///
    /// Tests feed a fixed map through [`config::Environment::source`] instead
    /// of mutating the process environment.
    pub fn load_with_env(config_path: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            } else {
                tracing::warn!("Config file {} not found, using environment only", path);
            }
        }

        // Unprefixed on purpose: APP_ID, APP_SECRET, EMAIL, PASSWORD, SN.
        // No try_parsing, so secrets like "1e5" stay strings.
        builder = builder.add_source(env);

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration settings.
    fn validate(&self) -> Result<()> {
        let required = [
            ("APP_ID", &self.app_id),
            ("APP_SECRET", &self.app_secret),
            ("EMAIL", &self.email),
            ("PASSWORD", &self.password),
            ("SN", &self.inverter_sn),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(SolarmanError::Config(config::ConfigError::Message(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            ))));
        }

        if self.api_url.trim().is_empty() {
            return Err(SolarmanError::Config(config::ConfigError::Message(
                "Solarman API URL cannot be empty".to_string(),
            )));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            email: String::new(),
            password: String::new(),
            inverter_sn: String::new(),
            api_url: default_api_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("APP_ID", "202212345"),
            ("APP_SECRET", "s3cr3t"),
            ("EMAIL", "owner@example.com"),
            ("PASSWORD", "hashed-password"),
            ("SN", "2104281234"),
        ]
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api_url, "https://globalapi.solarmanpv.com");
        assert_eq!(settings.timeout_seconds, 10);
    }

    #[test]
    fn test_validation_fails_without_credentials() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_environment() {
        let settings = Settings::load_with_env(None, env_from(&full_env())).unwrap();

        assert_eq!(settings.app_id, "202212345");
        assert_eq!(settings.app_secret, "s3cr3t");
        assert_eq!(settings.email, "owner@example.com");
        assert_eq!(settings.password, "hashed-password");
        assert_eq!(settings.inverter_sn, "2104281234");
        assert_eq!(settings.api_url, "https://globalapi.solarmanpv.com");
    }

    #[test]
    fn test_optional_overrides() {
        let mut vars = full_env();
        vars.push(("SOLARMAN_API_URL", "http://127.0.0.1:8080"));
        vars.push(("SOLARMAN_TIMEOUT_SECONDS", "3"));

        let settings = Settings::load_with_env(None, env_from(&vars)).unwrap();
        assert_eq!(settings.api_url, "http://127.0.0.1:8080");
        assert_eq!(settings.timeout_seconds, 3);
    }

    #[test]
    fn test_missing_variables_are_named() {
        let vars: Vec<_> = full_env()
            .into_iter()
            .filter(|(k, _)| *k != "SN" && *k != "PASSWORD")
            .collect();

        let err = Settings::load_with_env(None, env_from(&vars)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("PASSWORD"), "{message}");
        assert!(message.contains("SN"), "{message}");
        assert!(!message.contains("APP_ID"), "{message}");
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = full_env();
        vars.retain(|(k, _)| *k != "EMAIL");
        vars.push(("EMAIL", "   "));

        let err = Settings::load_with_env(None, env_from(&vars)).unwrap_err();
        assert!(err.to_string().contains("EMAIL"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = Settings::load_with_env(None, env_from(&full_env())).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("hashed-password"));
        assert!(rendered.contains("2104281234"));
    }
}
