//! Process configuration read from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::external::flutterwave::FlutterwaveEnvironment;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is required: {reason}")]
    Missing { var: &'static str, reason: &'static str },

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    /// Externally reachable origin, used to build gateway redirect URLs.
    pub public_base_url: String,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub rave_public_key: String,
    pub rave_secret_key: String,
    pub gateway_environment: FlutterwaveEnvironment,
    pub gateway_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            var: "BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.parse::<bool>().map_err(|e| ConfigError::Invalid {
                var: "USE_PERSISTENT_STORES",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
        };

        let database_url = get("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing {
                var: "DATABASE_URL",
                reason: "USE_PERSISTENT_STORES is true",
            });
        }

        let rave_public_key = get("RAVE_PUBLIC_KEY").unwrap_or_else(|| {
            tracing::warn!("RAVE_PUBLIC_KEY not set; checkout pages will reject payments");
            String::new()
        });
        let rave_secret_key = get("RAVE_SECRET_KEY").unwrap_or_else(|| {
            tracing::warn!("RAVE_SECRET_KEY not set; gateway verification will fail");
            String::new()
        });

        let gateway_environment = FlutterwaveEnvironment::from_app_env(get("APP_ENV").as_deref());

        let gateway_timeout = match get("GATEWAY_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        var: "GATEWAY_TIMEOUT_SECS",
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "GATEWAY_TIMEOUT_SECS",
                        value: raw,
                        reason: e.to_string(),
                    });
                }
            },
        };

        Ok(Self {
            jwt_secret,
            bind_addr,
            public_base_url,
            use_persistent_stores,
            database_url,
            rave_public_key,
            rave_secret_key,
            gateway_environment,
            gateway_timeout,
        })
    }
}
