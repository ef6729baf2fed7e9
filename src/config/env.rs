//! Environment validation.
//!
//! # Responsibilities
//! - Check that every required variable is present and non-empty
//! - Parse boolean feature flags with an explicit truthy table
//! - Resolve the deployment mode
//!
//! # Design Decisions
//! - Lookups go through a closure so tests never mutate the process environment
//! - Every missing name is collected before failing

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while reading the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// One or more required variables are unset or empty.
    #[error("missing configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    /// A flag variable holds something other than a recognised boolean.
    #[error("invalid flag {name}={value:?} (expected 1/0, true/false, yes/no, on/off)")]
    InvalidFlag { name: String, value: String },

    /// A variable holds a value outside its accepted set.
    #[error("invalid value {name}={value:?}")]
    InvalidValue { name: String, value: String },
}

/// Deployment mode used to gate configuration-time registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Development,
    #[default]
    Production,
    Test,
}

impl DeploymentMode {
    /// Parse a mode name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

/// Parse a feature flag value.
///
/// `None` and the empty string are treated as disabled. Unknown spellings are
/// rejected instead of silently enabling the feature.
pub fn parse_flag(name: &str, value: Option<&str>) -> Result<bool, EnvError> {
    let Some(raw) = value else {
        return Ok(false);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(EnvError::InvalidFlag {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Validated snapshot of the environment variables the application reads.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    required: BTreeMap<String, String>,
    optional: BTreeMap<String, String>,
}

/// Optional variables the application understands.
const OPTIONAL_VARS: &[&str] = &[
    "ENABLE_SOCKETS",
    "APP_ENV",
    "NODE_ENV",
    "BIND_ADDRESS",
    "LOG_DIR",
    "MONGO_URL",
];

impl EnvConfig {
    /// Validate `required` against the process environment.
    pub fn from_process(required: &[&str]) -> Result<Self, EnvError> {
        Self::from_lookup(required, |name| std::env::var(name).ok())
    }

    /// Validate `required` against an arbitrary lookup.
    pub fn from_lookup<F>(required: &[&str], lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = BTreeMap::new();
        let mut missing = Vec::new();

        for name in required {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => {
                    values.insert((*name).to_string(), value);
                }
                _ => missing.push((*name).to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(EnvError::MissingConfiguration(missing));
        }

        let optional = OPTIONAL_VARS
            .iter()
            .filter(|name| !values.contains_key(**name))
            .filter_map(|name| lookup(name).map(|value| ((*name).to_string(), value)))
            .collect();

        Ok(Self {
            required: values,
            optional,
        })
    }

    /// Get a variable captured during validation.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.required
            .get(name)
            .or_else(|| self.optional.get(name))
            .map(String::as_str)
    }

    /// Whether WebSocket support was requested via `ENABLE_SOCKETS`.
    pub fn sockets_enabled(&self) -> Result<bool, EnvError> {
        parse_flag("ENABLE_SOCKETS", self.get("ENABLE_SOCKETS"))
    }

    /// Name of the variable carrying the deployment mode, if any is set.
    ///
    /// `APP_ENV` wins; `NODE_ENV` is accepted for existing deployments.
    pub fn mode_var(&self) -> Option<&'static str> {
        ["APP_ENV", "NODE_ENV"]
            .into_iter()
            .find(|name| self.get(name).is_some_and(|v| !v.trim().is_empty()))
    }

    /// Deployment mode from `APP_ENV` or `NODE_ENV`; unset means production.
    pub fn mode(&self) -> Result<DeploymentMode, EnvError> {
        let Some(name) = self.mode_var() else {
            return Ok(DeploymentMode::default());
        };
        let raw = self.get(name).unwrap_or_default();
        DeploymentMode::parse(raw).ok_or_else(|| EnvError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_single_variable() {
        let err = EnvConfig::from_lookup(
            &["WEB_URL", "REDIS_URL"],
            lookup(&[("WEB_URL", "http://localhost:8080")]),
        )
        .unwrap_err();

        assert_eq!(err, EnvError::MissingConfiguration(vec!["REDIS_URL".into()]));
        assert_eq!(err.to_string(), "missing configuration: REDIS_URL");
    }

    #[test]
    fn test_reports_every_missing_variable() {
        let err = EnvConfig::from_lookup(
            &["WEB_URL", "REDIS_URL", "SECRET"],
            lookup(&[("REDIS_URL", "redis://localhost"), ("WEB_URL", "  ")]),
        )
        .unwrap_err();

        assert_eq!(
            err,
            EnvError::MissingConfiguration(vec!["WEB_URL".into(), "SECRET".into()])
        );
    }

    #[test]
    fn test_all_present() {
        let env = EnvConfig::from_lookup(
            &["WEB_URL"],
            lookup(&[("WEB_URL", "http://web"), ("APP_ENV", "development")]),
        )
        .unwrap();

        assert_eq!(env.get("WEB_URL"), Some("http://web"));
        assert_eq!(env.mode().unwrap(), DeploymentMode::Development);
        assert!(!env.sockets_enabled().unwrap());
    }

    #[test]
    fn test_flag_table() {
        for value in ["1", "true", "YES", "on"] {
            assert!(parse_flag("F", Some(value)).unwrap(), "{value}");
        }
        for value in ["", "0", "False", "no", "off"] {
            assert!(!parse_flag("F", Some(value)).unwrap(), "{value}");
        }
        assert!(!parse_flag("F", None).unwrap());
        assert!(matches!(
            parse_flag("F", Some("maybe")),
            Err(EnvError::InvalidFlag { .. })
        ));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let env = EnvConfig::from_lookup(&[], lookup(&[("APP_ENV", "staging")])).unwrap();
        assert!(matches!(env.mode(), Err(EnvError::InvalidValue { .. })));
    }

    #[test]
    fn test_node_env_fallback() {
        let env = EnvConfig::from_lookup(&[], lookup(&[("NODE_ENV", "test")])).unwrap();
        assert_eq!(env.mode_var(), Some("NODE_ENV"));
        assert_eq!(env.mode().unwrap(), DeploymentMode::Test);

        let env = EnvConfig::from_lookup(
            &[],
            lookup(&[("APP_ENV", "development"), ("NODE_ENV", "production")]),
        )
        .unwrap();
        assert_eq!(env.mode().unwrap(), DeploymentMode::Development);

        let env = EnvConfig::from_lookup(&[], lookup(&[("APP_ENV", ""), ("NODE_ENV", "dev")])).unwrap();
        assert_eq!(env.mode().unwrap(), DeploymentMode::Development);

        let env = EnvConfig::from_lookup(&[], lookup(&[("NODE_ENV", "staging")])).unwrap();
        assert_eq!(
            env.mode(),
            Err(EnvError::InvalidValue {
                name: "NODE_ENV".into(),
                value: "staging".into()
            })
        );
    }
}
