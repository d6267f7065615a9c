use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

pub const APP_ID_VAR: &str = "RATEBOOK_APP_ID";
pub const STORE_CONFIG_VAR: &str = "RATEBOOK_STORE_CONFIG";
pub const AUTH_TOKEN_VAR: &str = "RATEBOOK_AUTH_TOKEN";

pub const DEFAULT_APP_ID: &str = "default-app-id";

/// Settings handed to the document store when it is brought up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub project_id: Option<String>,
    pub offline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Namespaces every path the session touches.
    pub app_id: String,
    pub store: StoreConfig,
    /// Sign in with this identity instead of anonymously.
    pub auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            store: StoreConfig::default(),
            auth_token: None,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which plays the part of the environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = lookup(APP_ID_VAR).unwrap_or_else(|| {
            info!("{APP_ID_VAR} not set, using default: {DEFAULT_APP_ID}");
            DEFAULT_APP_ID.to_string()
        });

        let store = match lookup(STORE_CONFIG_VAR) {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("{STORE_CONFIG_VAR} is not a valid store config"))?,
            None => {
                info!("{STORE_CONFIG_VAR} not set, using an empty store config");
                StoreConfig::default()
            }
        };

        let auth_token = lookup(AUTH_TOKEN_VAR).and_then(|token| {
            let token = token.trim().to_string();
            if token.is_empty() {
                warn!("{AUTH_TOKEN_VAR} is blank, signing in anonymously");
                None
            } else {
                Some(token)
            }
        });

        Ok(Self {
            app_id,
            store,
            auth_token,
        })
    }
}
