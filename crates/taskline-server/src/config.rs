/*
 *  Copyright 2025 Taskline Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Server configuration: TOML with environment variable substitution.
//!
//! Supports `${VAR}`, `${VAR:-default}` and `${VAR:?error message}` inside
//! values, so secrets stay in the environment while the file stays in the
//! repo.

use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found in any search location")]
    ConfigNotFound,

    #[error("Failed to read configuration file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Environment variable substitution failed: {0}")]
    EnvSubstitutionError(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// postgres:// connection URL including the database name
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// When set, logs additionally go to a daily-rolling file in this
    /// directory
    pub dir: Option<PathBuf>,
    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineConfig {
    /// Channel secret for webhook signature verification
    #[serde(default)]
    pub channel_secret: String,
    /// Channel access token for the Messaging API
    #[serde(default)]
    pub channel_access_token: String,
    /// Rich menu linked to users once they agree to the terms
    pub member_rich_menu_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    /// Webhook endpoint secret (whsec_...)
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            tolerance_secs: default_tolerance_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_pool_size() -> u32 {
    5
}

fn default_tolerance_secs() -> i64 {
    taskline::stripe::DEFAULT_TOLERANCE_SECS
}

impl ServerConfig {
    /// Loads configuration from the given file, the `TASKLINE_CONFIG`
    /// environment variable, or the default search locations.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = if let Some(path) = config_file {
            path.to_path_buf()
        } else if let Ok(env_config) = env::var("TASKLINE_CONFIG") {
            PathBuf::from(env_config)
        } else {
            Self::find_config_file().ok_or(ConfigError::ConfigNotFound)?
        };

        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env_vars(content)?;
        Ok(toml::from_str(&substituted)?)
    }

    fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("./taskline.toml"),
            PathBuf::from("/etc/taskline/config.toml"),
        ];
        candidates.into_iter().find(|p| p.is_file())
    }
}

/// Substitutes `${VAR}` expressions in configuration content.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let replacement = process_var_expression(&cap[1])?;
        result = result.replace(full_match, &replacement);
    }

    Ok(result)
}

fn process_var_expression(expr: &str) -> Result<String, ConfigError> {
    if let Some((var, default)) = expr.split_once(":-") {
        Ok(env::var(var).unwrap_or_else(|_| default.to_string()))
    } else if let Some((var, message)) = expr.split_once(":?") {
        env::var(var)
            .map_err(|_| ConfigError::EnvSubstitutionError(format!("{}: {}", var, message)))
    } else {
        env::var(expr).map_err(|_| {
            ConfigError::EnvSubstitutionError(format!("environment variable {} is not set", expr))
        })
    }
}
