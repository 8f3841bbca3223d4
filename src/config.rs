//! Process configuration from `INNKEEP_*` environment variables.

use std::path::PathBuf;

use crate::admission::WindowPolicy;
use crate::admission::window::{DEFAULT_LEAD_TIME_DAYS, DEFAULT_MAX_ADVANCE_DAYS, DEFAULT_MAX_STAY_DAYS};

pub const ENV_PREFIX: &str = "INNKEEP_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub metrics_port: Option<u16>,
    pub policy: WindowPolicy,
    /// When set, a room with this name is created on an empty store.
    pub default_room: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "innkeep".into(),
            max_connections: 256,
            compact_threshold: 1000,
            tls_cert: None,
            tls_key: None,
            metrics_port: None,
            policy: WindowPolicy::default(),
            default_room: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Keys are passed with the
    /// `INNKEEP_` prefix. Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|s| !s.is_empty());
        let defaults = Self::default();

        Self {
            port: var("PORT").and_then(|s| s.parse().ok()).unwrap_or(defaults.port),
            bind: var("BIND").unwrap_or(defaults.bind),
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            password: var("PASSWORD").unwrap_or(defaults.password),
            max_connections: var("MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            compact_threshold: var("COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            tls_cert: var("TLS_CERT"),
            tls_key: var("TLS_KEY"),
            metrics_port: var("METRICS_PORT").and_then(|s| s.parse().ok()),
            policy: WindowPolicy {
                lead_time_days: var("LEAD_TIME_DAYS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_LEAD_TIME_DAYS),
                max_advance_days: var("MAX_ADVANCE_DAYS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_ADVANCE_DAYS),
                max_stay_days: var("MAX_STAY_DAYS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_STAY_DAYS),
            },
            default_room: var("DEFAULT_ROOM"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }
}
