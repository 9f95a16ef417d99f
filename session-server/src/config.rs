//! Service configuration

use std::net::SocketAddr;

use serde::{Deserialize, Deserializer};
use tracing_subscriber::filter::Directive;

/// Logging output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Logging {
    /// Additional filtering directives
    #[serde(default, deserialize_with = "Logging::deserialize_filters")]
    pub filters: Vec<Directive>,

    /// Logging format
    #[serde(default)]
    pub format: LogFormat,
}

impl Logging {
    fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<Directive>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dirs: Vec<String> = Deserialize::deserialize(deserializer)?;
        dirs.into_iter()
            .map(|dir| dir.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Liveness cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Cookie {
    /// Cookie name
    #[serde(default = "Cookie::default_name")]
    pub name: String,

    /// Cookie path
    #[serde(default = "Cookie::default_path")]
    pub path: String,

    /// Forces the `Secure` attribute on or off. When not set it follows the environment.
    #[serde(default)]
    pub secure: Option<bool>,
}

impl Cookie {
    fn default_name() -> String {
        "session".to_owned()
    }

    fn default_path() -> String {
        "/".to_owned()
    }

    /// Whether the cookie should carry the `Secure` attribute in given environment
    pub fn is_secure(&self, environment: Environment) -> bool {
        self.secure
            .unwrap_or(environment == Environment::Production)
    }
}

impl Default for Cookie {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            path: Self::default_path(),
            secure: None,
        }
    }
}

/// Top level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address where to host the service
    #[serde(default = "Config::default_host")]
    pub host: SocketAddr,

    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// Liveness cookie configuration
    #[serde(default)]
    pub cookie: Cookie,

    /// Logging configuration
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    fn default_host() -> SocketAddr {
        ([127, 0, 0, 1], 3030).into()
    }
}
