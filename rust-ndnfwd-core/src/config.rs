//! Forwarder configuration.
//!
//! Loaded with the `config` crate: an optional file (TOML, JSON or YAML,
//! picked by extension) overlaid by `NDNFWD_*` environment variables.
//! Nested keys use a double underscore, e.g. `NDNFWD_FACE__BUCKET_MAX=50`.

use crate::error::Error;
use crate::strategy::Strategy;
use rust_ndnfwd_common::{FaceId, Name};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "NDNFWD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Strategy for names without a more specific choice.
    pub strategy: Strategy,

    /// Answer unforwardable Interests with Nacks instead of dropping them.
    pub nacks_enabled: bool,

    /// Re-forward an Interest repeated by a face already waiting for it.
    pub detect_retransmissions: bool,

    /// PIT capacity, 0 for unlimited.
    pub pit_max_entries: usize,

    /// Content Store capacity, 0 disables caching.
    pub cs_max_entries: usize,

    /// Also cache Data that no pending Interest asked for.
    pub cache_unsolicited_data: bool,

    /// Defaults applied to every new face.
    pub face: FaceConfig,

    /// Per-prefix strategy overrides.
    pub strategy_choices: Vec<StrategyChoiceConfig>,

    /// Static routes installed at startup.
    pub routes: Vec<RouteConfig>,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::BestRoute,
            nacks_enabled: true,
            detect_retransmissions: true,
            pit_max_entries: 0,
            cs_max_entries: 100,
            cache_unsolicited_data: false,
            face: FaceConfig::default(),
            strategy_choices: Vec::new(),
            routes: Vec::new(),
        }
    }
}

impl ForwarderConfig {
    /// Loads the configuration from `path` (if any) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Bucket capacity. Absent means unlimited.
    pub bucket_max: Option<f64>,

    /// Bucket drain rate, units per second.
    pub bucket_leak: f64,

    pub interest_cost: f64,
    pub data_cost: f64,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            bucket_max: None,
            bucket_leak: 0.0,
            interest_cost: 1.0,
            data_cost: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: Name,
    pub face: FaceId,
    #[serde(default)]
    pub cost: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyChoiceConfig {
    pub prefix: Name,
    pub strategy: Strategy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ForwarderConfig::default();
        assert_eq!(config.strategy, Strategy::BestRoute);
        assert!(config.nacks_enabled);
        assert_eq!(config.cs_max_entries, 100);
        assert!(!config.cache_unsolicited_data);
        assert_eq!(config.face.bucket_max, None);
        assert_eq!(config.face.interest_cost, 1.0);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
strategy = "broadcast"
pit_max_entries = 64
cs_max_entries = 0

[face]
bucket_max = 20.0
bucket_leak = 5.0

[[routes]]
prefix = "/video"
face = 1
cost = 3

[[strategy_choices]]
prefix = "/video/live"
strategy = "smart-flooding"
"#
        )
        .unwrap();

        let config = ForwarderConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.strategy, Strategy::Flooding);
        assert_eq!(config.pit_max_entries, 64);
        assert_eq!(config.cs_max_entries, 0);
        assert!(config.nacks_enabled);
        assert_eq!(config.face.bucket_max, Some(20.0));
        assert_eq!(config.face.data_cost, 1.0);
        assert_eq!(
            config.routes,
            vec![RouteConfig {
                prefix: "/video".parse().unwrap(),
                face: FaceId(1),
                cost: 3,
            }]
        );
        assert_eq!(config.strategy_choices[0].strategy, Strategy::SmartFlooding);
    }

    #[test]
    fn test_bad_route_prefix_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"routes": [{{"prefix": "no-slash", "face": 0}}]}}"#).unwrap();
        assert!(matches!(
            ForwarderConfig::load(Some(file.path())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_routes_from_json() {
        let routes: Vec<RouteConfig> =
            serde_json::from_str(r#"[{"prefix": "/a/b", "face": 2}]"#).unwrap();
        assert_eq!(routes[0].prefix.len(), 2);
        assert_eq!(routes[0].cost, 0);
    }
}
