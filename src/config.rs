//! Gateway configuration
//!
//! Loaded once at startup from environment-style key/value pairs. Loading is
//! fail-fast: a missing required key aborts startup instead of degrading
//! individual requests later.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Schema used when none is configured
pub const DEFAULT_SCHEMA: &str = "PUBLIC";

pub const ENV_ACCOUNT: &str = "SNOWFLAKE_ACCOUNT";
pub const ENV_USERNAME: &str = "SNOWFLAKE_USERNAME";
pub const ENV_PASSWORD: &str = "SNOWFLAKE_PASSWORD";
pub const ENV_DATABASE: &str = "SNOWFLAKE_DATABASE";
pub const ENV_SCHEMA: &str = "SNOWFLAKE_SCHEMA";
pub const ENV_WAREHOUSE: &str = "SNOWFLAKE_WAREHOUSE";
pub const ENV_ROLE: &str = "SNOWFLAKE_ROLE";
pub const ENV_REQUEST_TIMEOUT: &str = "TABLEGATE_REQUEST_TIMEOUT_SECS";

/// Keys that must be present, in the order they are reported when missing
const REQUIRED_KEYS: [&str; 5] = [ENV_ACCOUNT, ENV_USERNAME, ENV_PASSWORD, ENV_DATABASE, ENV_WAREHOUSE];

/// Warehouse session context applied to every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub database: String,

    /// `None` falls back to [`DEFAULT_SCHEMA`]
    pub schema: Option<String>,

    pub warehouse: String,
}

impl SessionContext {
    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Account identifier (`abc12345.us-east-1`) or a full endpoint URL
    pub account: String,

    pub username: String,

    /// Credential secret. Never serialized and never logged.
    #[serde(skip)]
    pub password: String,

    pub context: SessionContext,

    /// Role requested at login; the user's default role when unset
    pub role: Option<String>,

    /// Deadline around the whole per-request flow
    ///
    /// - None = no deadline (default); a hung round-trip blocks that request
    /// - Some(d) = the request fails with `Timeout` after `d` and its
    ///   session is released in the background
    pub request_timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| get(**key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(GatewayError::MissingConfig(missing));
        }

        let request_timeout = match get(ENV_REQUEST_TIMEOUT) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    GatewayError::InvalidConfig(format!("{} must be a whole number of seconds, got '{}'", ENV_REQUEST_TIMEOUT, raw))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let config = Self {
            account: get(ENV_ACCOUNT).unwrap_or_default(),
            username: get(ENV_USERNAME).unwrap_or_default(),
            password: get(ENV_PASSWORD).unwrap_or_default(),
            context: SessionContext {
                database: get(ENV_DATABASE).unwrap_or_default(),
                schema: get(ENV_SCHEMA),
                warehouse: get(ENV_WAREHOUSE).unwrap_or_default(),
            },
            role: get(ENV_ROLE),
            request_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for the embedded warehouse: no credentials are checked.
    pub fn for_local() -> Self {
        Self {
            account: "local".to_string(),
            username: "local".to_string(),
            password: String::new(),
            context: SessionContext {
                database: "LOCAL".to_string(),
                schema: None,
                warehouse: "LOCAL_WH".to_string(),
            },
            role: None,
            request_timeout: None,
        }
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.request_timeout {
            if timeout.is_zero() {
                return Err(GatewayError::InvalidConfig(format!("{} cannot be 0", ENV_REQUEST_TIMEOUT)));
            }
        }
        if self.context.database.contains(char::is_whitespace) || self.context.warehouse.contains(char::is_whitespace) {
            return Err(GatewayError::InvalidConfig(
                "database and warehouse names cannot contain whitespace".to_string(),
            ));
        }
        Ok(())
    }
}
