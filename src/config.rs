// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime configuration passed to every test case.

use camino::Utf8Path;
pub use config::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The unprivileged user a root runner can drop privileges to, for test
/// cases declaring `require.user = unprivileged`.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct UnprivilegedUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

/// Per-suite configuration properties, e.g. `test_suites.foo.some_prop =
/// "value"` in a TOML config file, consumed by test cases whose metadata
/// names `some_prop` in `required_configs`.
pub type SuiteProperties = IndexMap<String, String>;

/// Immutable runtime configuration shared by every test case in an action.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Config {
    pub architecture: String,
    pub platform: String,
    #[serde(default)]
    pub unprivileged_user: Option<UnprivilegedUser>,
    #[serde(default)]
    pub test_suites: IndexMap<String, SuiteProperties>,
}

impl Config {
    /// Returns the configuration properties for `suite_name`, or an empty
    /// map if the suite has no overrides.
    pub fn suite_properties(&self, suite_name: &str) -> SuiteProperties {
        self.test_suites.get(suite_name).cloned().unwrap_or_default()
    }

    /// Loads a `Config` from a TOML file on disk, using the `config` crate
    /// the way nextest layers its own `.config/nextest.toml`.
    pub fn load_toml(path: &Utf8Path) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::from(path.as_std_path()))
            .build()?;
        raw.try_deserialize()
    }

    /// Returns a minimal configuration with no per-suite overrides and no
    /// unprivileged user, useful for tests and the `debug` subcommand.
    pub fn minimal(architecture: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            platform: platform.into(),
            unprivileged_user: None,
            test_suites: IndexMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_properties_defaults_to_empty() {
        let config = Config::minimal("amd64", "freebsd");
        assert!(config.suite_properties("nonexistent").is_empty());
    }

    #[test]
    fn suite_properties_looks_up_by_name() {
        let mut config = Config::minimal("amd64", "freebsd");
        let mut props = SuiteProperties::new();
        props.insert("iterations".to_string(), "10".to_string());
        config.test_suites.insert("mysuite".to_string(), props);

        let found = config.suite_properties("mysuite");
        assert_eq!(found.get("iterations").map(String::as_str), Some("10"));
    }
}
