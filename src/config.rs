//! Client configuration: credentials, environment routing, TLS flags, and
//! connection pool bounds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ClientError, Result};

/// Deployment environment a query is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
  Dev,
  Staging,
  Qa,
  Prod,
}

impl Env {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Dev => "dev",
      Self::Staging => "staging",
      Self::Qa => "qa",
      Self::Prod => "prod",
    }
  }
}

impl fmt::Display for Env {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Payload codec for server responses. JSON is currently the only codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseDataType {
  #[default]
  Json,
}

/// Connection pool bounds.
///
/// `max == 0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOptions {
  #[serde(default = "default_pool_bound")]
  pub min: u32,
  #[serde(default = "default_pool_bound")]
  pub max: u32,
}

fn default_pool_bound() -> u32 {
  1
}

impl Default for PoolOptions {
  fn default() -> Self {
    Self { min: 1, max: 1 }
  }
}

/// Optional client tuning knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionOptions {
  #[serde(default)]
  pub connection_pool: PoolOptions,
}

/// Immutable client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
  pub client_key: String,
  pub access_key: String,
  pub secret_key: String,
  pub database_id: String,
  pub env: Env,
  pub response_data_type: ResponseDataType,
  #[serde(default)]
  pub use_tls: bool,
  #[serde(default)]
  pub verify_tls_host: bool,
  #[serde(default)]
  pub options: ConnectionOptions,
}

impl ClientConfig {
  /// Parse and validate a configuration from its JSON form.
  pub fn from_json(json: &str) -> Result<Self> {
    let config: Self = serde_json::from_str(json)
      .map_err(|e| ClientError::InvalidValue(format!("malformed configuration: {}", e)))?;
    config.validate()?;
    Ok(config)
  }

  /// Check the construction-time invariants.
  pub fn validate(&self) -> Result<()> {
    for (name, value) in [
      ("client_key", &self.client_key),
      ("access_key", &self.access_key),
      ("secret_key", &self.secret_key),
      ("database_id", &self.database_id),
    ] {
      if value.is_empty() {
        return Err(ClientError::InvalidValue(format!(
          "configuration key '{}' must not be empty",
          name
        )));
      }
    }

    let pool = &self.options.connection_pool;
    if pool.max != 0 && pool.min > pool.max {
      return Err(ClientError::InvalidValue(format!(
        "connection_pool.min ({}) must not exceed connection_pool.max ({})",
        pool.min, pool.max
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base_config() -> ClientConfig {
    ClientConfig {
      client_key: "ck".into(),
      access_key: "ak".into(),
      secret_key: "sk".into(),
      database_id: "db1".into(),
      env: Env::Dev,
      response_data_type: ResponseDataType::Json,
      use_tls: false,
      verify_tls_host: false,
      options: ConnectionOptions::default(),
    }
  }

  #[test]
  fn test_defaults() {
    let config = base_config();
    assert!(!config.use_tls);
    assert_eq!(config.options.connection_pool.min, 1);
    assert_eq!(config.options.connection_pool.max, 1);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_empty_key_rejected() {
    let mut config = base_config();
    config.secret_key.clear();
    assert!(matches!(
      config.validate(),
      Err(ClientError::InvalidValue(_))
    ));
  }

  #[test]
  fn test_min_above_max_rejected() {
    let mut config = base_config();
    config.options.connection_pool = PoolOptions { min: 5, max: 2 };
    assert!(config.validate().is_err());

    // max == 0 means unbounded, so any min is fine
    config.options.connection_pool = PoolOptions { min: 5, max: 0 };
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_env_wire_form() {
    assert_eq!(serde_json::from_str::<Env>("\"prod\"").unwrap(), Env::Prod);
    assert!(serde_json::from_str::<Env>("\"production\"").is_err());
    assert_eq!(Env::Staging.as_str(), "staging");
    assert_eq!(Env::Qa.to_string(), "qa");
  }
}
