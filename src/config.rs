//! Driver configuration with builder pattern

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{LabelScheme, DEFAULT_LABEL_PREFIX};

/// Default name of the workload profile secret
pub const DEFAULT_PROFILE_SECRET: &str = "soajsprofile";

/// How the profile payload is written into the secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretEncoding {
    /// `"use strict";\nmodule.exports =<json>;`, loadable by Node.js services
    #[default]
    CommonJsModule,
    /// Plain JSON document
    Json,
}

impl SecretEncoding {
    pub fn encode(self, profile: &serde_json::Value) -> crate::Result<String> {
        let json = serde_json::to_string(profile)?;
        Ok(match self {
            SecretEncoding::CommonJsModule => format!("\"use strict\";\nmodule.exports ={};", json),
            SecretEncoding::Json => json,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Prefix of the ownership and workload label keys
    pub label_prefix: String,
    /// Whether workloads may own a same-named horizontal pod autoscaler
    pub autoscaling: bool,
    pub profile_secret_name: String,
    pub profile_secret_encoding: SecretEncoding,
    /// Delay between scale-to-zero and delete during workload teardown
    pub grace_period_ms: u64,
    pub poll_interval_ms: u64,
    /// Maximum observations per poll loop; `None` polls until convergence
    pub max_poll_attempts: Option<u32>,
    /// Wall-clock bound per poll loop
    pub poll_timeout_ms: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            autoscaling: false,
            profile_secret_name: DEFAULT_PROFILE_SECRET.to_string(),
            profile_secret_encoding: SecretEncoding::default(),
            grace_period_ms: 5000,
            poll_interval_ms: 1000,
            max_poll_attempts: Some(600),
            poll_timeout_ms: None,
        }
    }
}

impl DriverConfig {
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !self
            .label_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        {
            return Err(crate::Error::Config(format!(
                "label_prefix {:?} contains characters not allowed in label keys",
                self.label_prefix
            )));
        }
        if !is_dns_subdomain(&self.profile_secret_name) {
            return Err(crate::Error::Config(format!(
                "profile_secret_name {:?} is not a valid object name",
                self.profile_secret_name
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::Config("poll_interval_ms must be at least 1".into()));
        }
        if self.max_poll_attempts == Some(0) {
            return Err(crate::Error::Config("max_poll_attempts must be at least 1".into()));
        }
        if self.poll_timeout_ms == Some(0) {
            return Err(crate::Error::Config("poll_timeout_ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn labels(&self) -> LabelScheme {
        LabelScheme::new(&self.label_prefix)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_ms.map(Duration::from_millis)
    }
}

fn is_dns_subdomain(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 253
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}

#[derive(Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    pub fn label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.label_prefix = prefix.into();
        self
    }

    pub fn autoscaling(mut self, enabled: bool) -> Self {
        self.config.autoscaling = enabled;
        self
    }

    pub fn profile_secret_name(mut self, name: impl Into<String>) -> Self {
        self.config.profile_secret_name = name.into();
        self
    }

    pub fn profile_secret_encoding(mut self, encoding: SecretEncoding) -> Self {
        self.config.profile_secret_encoding = encoding;
        self
    }

    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.config.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn max_poll_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    pub fn poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.poll_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn build(self) -> DriverConfig {
        self.config
    }

    pub fn build_validated(self) -> crate::Result<DriverConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
