use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::outcome::UserError;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

const PROXY_KEYS: [&str; 8] = [
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
    "NO_PROXY",
    "no_proxy",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
    /// Explicit project directory; discovered from the working directory when unset.
    pub project: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self::from_os_vars(env::vars_os())
    }

    /// Non-UTF-8 keys or values are skipped.
    fn from_os_vars(vars: impl Iterator<Item = (OsString, OsString)>) -> Self {
        let vars = vars
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Non-empty value of `key`, trimmed.
    pub(crate) fn value(&self, key: &str) -> Option<&str> {
        self.var(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug)]
pub struct Config {
    pub(crate) dist: DistConfig,
    pub(crate) network: NetworkConfig,
    pub(crate) publish: PublishConfig,
    pub(crate) test: TestConfig,
}

impl Config {
    /// Builds the configuration from a captured environment.
    ///
    /// # Errors
    /// Returns an error if a `PYSHIP_*` variable holds an unusable value.
    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> anyhow::Result<Self> {
        let timeout = match snapshot.value("PYSHIP_HTTP_TIMEOUT") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(UserError::new(
                        format!("PYSHIP_HTTP_TIMEOUT must be a positive number of seconds, got `{raw}`"),
                        json!({
                            "reason": "invalid_env",
                            "variable": "PYSHIP_HTTP_TIMEOUT",
                            "hint": "Unset PYSHIP_HTTP_TIMEOUT or set it to e.g. 60.",
                        }),
                    )
                    .into())
                }
            },
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        let source_date_epoch = snapshot.value("SOURCE_DATE_EPOCH").and_then(|raw| {
            let parsed = raw.parse::<u64>().ok();
            if parsed.is_none() {
                warn!(value = raw, "ignoring unparsable SOURCE_DATE_EPOCH");
            }
            parsed
        });
        Ok(Self {
            dist: DistConfig {
                dir_override: snapshot.value("PYSHIP_DIST_DIR").map(PathBuf::from),
                source_date_epoch,
            },
            network: NetworkConfig {
                keep_proxies: keep_proxies(snapshot),
                timeout: Duration::from_secs(timeout),
            },
            publish: PublishConfig {
                repository: snapshot.value("PYSHIP_REPOSITORY").map(ToOwned::to_owned),
                default_token_env: "PYSHIP_TOKEN",
            },
            test: TestConfig {
                python: snapshot.value("PYSHIP_PYTHON").map(ToOwned::to_owned),
            },
        })
    }

    #[must_use]
    pub fn dist(&self) -> &DistConfig {
        &self.dist
    }

    #[must_use]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    #[must_use]
    pub fn publish(&self) -> &PublishConfig {
        &self.publish
    }

    #[must_use]
    pub fn test(&self) -> &TestConfig {
        &self.test
    }
}

#[derive(Debug, Clone)]
pub struct DistConfig {
    pub dir_override: Option<PathBuf>,
    pub source_date_epoch: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub keep_proxies: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub repository: Option<String>,
    pub default_token_env: &'static str,
}

#[derive(Debug, Clone)]
pub struct TestConfig {
    pub python: Option<String>,
}

/// Decide whether outbound HTTP should honor standard proxy variables.
///
/// `PYSHIP_KEEP_PROXIES` forces the choice either way; when unset, proxies are
/// kept only if at least one proxy variable is set.
fn keep_proxies(snapshot: &EnvSnapshot) -> bool {
    match snapshot.var("PYSHIP_KEEP_PROXIES") {
        Some(raw) => {
            let value = raw.trim().to_ascii_lowercase();
            !matches!(value.as_str(), "" | "0" | "false" | "no" | "off")
        }
        None => PROXY_KEYS
            .iter()
            .any(|key| snapshot.value(key).is_some()),
    }
}
