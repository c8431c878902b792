// SPDX-License-Identifier: MIT
//! Read-only configuration snapshot.
//!
//! Values are layered, later sources winning:
//! * built-in defaults ([`Settings::default`]),
//! * an optional `crazy-api.{toml,yaml,json}` file in the working directory,
//! * environment variables prefixed `CRAZY_API`, with `__` between sections
//!   (e.g. `CRAZY_API__TELEMETRY__LOG_LEVEL=info`).
//!
//! The standard `OTEL_EXPORTER_OTLP_ENDPOINT` and `OTEL_SERVICE_NAME` variables
//! are honored as defaults for the matching telemetry keys.
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::telemetry::initializer::{DEFAULT_CUSTOM_PROPERTY_KEY, DEFAULT_CUSTOM_PROPERTY_VALUE};

/// Base name of the optional configuration file.
pub const CONFIG_FILE_NAME: &str = "crazy-api";
pub const ENV_PREFIX: &str = "CRAZY_API";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Console logging; `RUST_LOG` still overrides `level` when set.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Minimum level of log events turned into trace records.
    pub log_level: String,
    pub service_name: String,
    /// Base OTLP/HTTP endpoint for span export; spans stay local when unset.
    pub otlp_endpoint: Option<String>,
    /// Telemetry records go to stdout unless a file is given.
    pub export_path: Option<PathBuf>,
    pub filters: FilterSettings,
    pub initializers: InitializerSettings,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string()),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            export_path: None,
            filters: FilterSettings::default(),
            initializers: InitializerSettings::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub successful_dependencies: bool,
    pub synthetic_requests: bool,
    pub fast_dependencies: bool,
    pub fast_dependency_threshold_ms: u64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            successful_dependencies: true,
            synthetic_requests: true,
            fast_dependencies: true,
            fast_dependency_threshold_ms: 100,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InitializerSettings {
    pub convert_4xx_to_success: bool,
    pub custom_property: bool,
    pub custom_property_key: String,
    pub custom_property_value: String,
}

impl Default for InitializerSettings {
    fn default() -> Self {
        Self {
            convert_4xx_to_success: true,
            custom_property: true,
            custom_property_key: DEFAULT_CUSTOM_PROPERTY_KEY.to_string(),
            custom_property_value: DEFAULT_CUSTOM_PROPERTY_VALUE.to_string(),
        }
    }
}

impl Settings {
    /// Load from the optional config file and the environment.
    pub fn load() -> Result<Self> {
        Self::from_sources(
            config::File::with_name(CONFIG_FILE_NAME).required(false),
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_sources<F, E>(file: F, env: E) -> Result<Self>
    where
        F: config::Source + Send + Sync + 'static,
        E: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn defaults_apply_without_sources() {
        let settings = Settings::from_sources(config::File::from_str("", config::FileFormat::Toml), env(&[])).unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.telemetry.log_level, "warn");
        assert!(settings.telemetry.filters.fast_dependencies);
        assert_eq!(settings.telemetry.filters.fast_dependency_threshold_ms, 100);
        assert_eq!(settings.telemetry.initializers.custom_property_key, "customProp");
    }

    #[test]
    fn file_and_environment_layer_over_defaults() {
        let file = config::File::from_str(
            r#"
            [server]
            port = 9000

            [telemetry]
            log_level = "info"

            [telemetry.filters]
            fast_dependency_threshold_ms = 250
            "#,
            config::FileFormat::Toml,
        );
        let settings = Settings::from_sources(
            file,
            env(&[
                ("CRAZY_API__TELEMETRY__LOG_LEVEL", "debug"),
                ("CRAZY_API__TELEMETRY__FILTERS__SYNTHETIC_REQUESTS", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.telemetry.log_level, "debug");
        assert_eq!(settings.telemetry.filters.fast_dependency_threshold_ms, 250);
        assert!(!settings.telemetry.filters.synthetic_requests);
        assert!(settings.telemetry.filters.successful_dependencies);
    }
}
