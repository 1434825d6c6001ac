// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::address::LOCAL_CONNECTOR_ADDRESS;
use crate::errors::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/datadog-agent/bootapp.yaml";

fn default_poll_interval() -> u64 {
    5
}

fn default_attach_timeout() -> u64 {
    10_000
}

fn default_address_property() -> String {
    LOCAL_CONNECTOR_ADDRESS.to_string()
}

fn default_self_marker() -> String {
    "sts4.languageserver.name".to_string()
}

fn default_classpath_marker() -> String {
    "spring-boot".to_string()
}

fn default_loader_marker() -> String {
    "org.springframework.boot.loader".to_string()
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub log_level: Option<String>,
    /// Seconds between two refreshes in `watch` mode.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Milliseconds to wait for a process to open its attach socket.
    #[serde(default = "default_attach_timeout")]
    pub attach_timeout: u64,
    /// Milliseconds. Unset means queries are not bounded.
    #[serde(default)]
    pub request_timeout: Option<u64>,
    /// Agent or system property holding the management address. The
    /// Jolokia agent URL is always looked up after it.
    #[serde(default = "default_address_property")]
    pub address_property: String,
    #[serde(default)]
    pub identification: IdentificationConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct IdentificationConfig {
    /// System property set by tooling processes that must never be reported.
    #[serde(default = "default_self_marker")]
    pub self_marker_property: String,
    #[serde(default = "default_classpath_marker")]
    pub classpath_marker: String,
    #[serde(default = "default_loader_marker")]
    pub loader_marker: String,
    /// Milliseconds during which a negative identification is reused.
    /// `0` re-checks on every call.
    #[serde(default)]
    pub retry_interval: u64,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            self_marker_property: default_self_marker(),
            classpath_marker: default_classpath_marker(),
            loader_marker: default_loader_marker(),
            retry_interval: 0,
        }
    }
}

impl IdentificationConfig {
    pub fn retry_interval(&self) -> Option<Duration> {
        (self.retry_interval > 0).then(|| Duration::from_millis(self.retry_interval))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            poll_interval: default_poll_interval(),
            attach_timeout: default_attach_timeout(),
            request_timeout: None,
            address_property: default_address_property(),
            identification: IdentificationConfig::default(),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_millis)
    }
}

/// Loads the YAML config file. A missing or empty file gives the defaults.
pub fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if !path.exists() {
        warn!("Config file not found at {}. Using defaults.", path.display());
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }

    serde_yaml::from_str(&contents).map_err(|source| Error::Config {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a Go log level string into a log::Level
/// Unknown levels silently default to Info
pub fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" | "off" => log::Level::Error,
        _ => log::Level::Info,
    }
}

/// Priority: DD_LOG_LEVEL > LOG_LEVEL > YAML config > default Info
pub fn get_log_level(config: &Config) -> log::Level {
    if let Ok(level) = env::var("DD_LOG_LEVEL") {
        return parse_log_level(&level);
    }

    if let Ok(level) = env::var("LOG_LEVEL") {
        return parse_log_level(&level);
    }

    config
        .log_level
        .as_deref()
        .map(parse_log_level)
        .unwrap_or(log::Level::Info)
}
