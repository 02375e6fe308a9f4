// src/config.rs
use serde::Deserialize;
use std::path::PathBuf;
use tracing::Level;

use crate::loader::InputPaths;

pub const ENV_PREFIX: &str = "UTILIZATION_";

fn default_hours_report_path() -> PathBuf {
    PathBuf::from("data/hours.csv")
}

fn default_activities_path() -> PathBuf {
    PathBuf::from("data/activities.csv")
}

fn default_dates_path() -> PathBuf {
    PathBuf::from("data/dates.csv")
}

fn default_names_path() -> PathBuf {
    PathBuf::from("data/names.csv")
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Input exports
    #[serde(default = "default_hours_report_path")]
    pub hours_report_path: PathBuf,
    #[serde(default = "default_activities_path")]
    pub activities_path: PathBuf,
    #[serde(default = "default_dates_path")]
    pub dates_path: PathBuf,
    #[serde(default = "default_names_path")]
    pub names_path: PathBuf,

    // Server
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,

    // Report defaults
    #[serde(default)]
    pub default_target: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        envy::prefixed(ENV_PREFIX).from_env::<Config>()
    }

    #[cfg(test)]
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }

    pub fn input_paths(&self) -> InputPaths {
        InputPaths {
            hours: self.hours_report_path.clone(),
            activities: self.activities_path.clone(),
            dates: self.dates_path.clone(),
            names: self.names_path.clone(),
        }
    }

    /// Certificate and key paths, only when both are configured.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }

    /// Unknown level names fall back to INFO.
    pub fn tracing_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert_eq!(config.hours_report_path, PathBuf::from("data/hours.csv"));
        assert_eq!(config.names_path, PathBuf::from("data/names.csv"));
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.default_target, 0);
        assert_eq!(config.tracing_level(), Level::INFO);
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let config = Config::from_vars(vars(&[
            ("UTILIZATION_HOURS_REPORT_PATH", "/srv/exports/hours.csv"),
            ("UTILIZATION_SERVER_PORT", "8443"),
            ("UTILIZATION_DEFAULT_TARGET", "75"),
            ("UTILIZATION_LOG_LEVEL", "debug"),
            ("UTILIZATION_CERT_PATH", "cert.pem"),
            ("UTILIZATION_KEY_PATH", "key.pem"),
            ("SERVER_PORT", "1"),
        ]))
        .unwrap();
        assert_eq!(
            config.input_paths().hours,
            PathBuf::from("/srv/exports/hours.csv")
        );
        assert_eq!(config.server_port, 8443);
        assert_eq!(config.default_target, 75);
        assert_eq!(config.tracing_level(), Level::DEBUG);
        assert_eq!(config.tls_paths(), Some(("cert.pem", "key.pem")));
    }

    #[test]
    fn tls_needs_both_paths() {
        let config =
            Config::from_vars(vars(&[("UTILIZATION_CERT_PATH", "cert.pem")])).unwrap();
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn invalid_port_is_an_error() {
        assert!(Config::from_vars(vars(&[("UTILIZATION_SERVER_PORT", "not-a-port")])).is_err());
    }
}
