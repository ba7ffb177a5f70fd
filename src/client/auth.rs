//! Handshake construction and the server-issued token record.
//!
//! The handshake is a single round-trip on a fresh transport:
//!
//! Client → Server:
//! - `access_key`, `client_key`
//! - `nonce`: SHA-256 of 16 fresh random bytes (hex) + access_key + client_key
//! - `request_token`: SHA-256 of secret_key + nonce
//! - `request_type`: CONNECT (0x001)
//!
//! Server → Client: one frame `{"error": bool, "data": {...}}` carrying the
//! access token and its expiry on success.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rand::RngCore;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::RequestType;

/// Tokens are refreshed this many minutes before their stated expiry.
const EXPIRY_MARGIN_MINUTES: i64 = 15;

/// Builds handshake payloads and interprets handshake responses.
#[derive(Debug, Clone)]
pub struct Authenticator {
  client_key: String,
  access_key: String,
  secret_key: String,
}

impl Authenticator {
  pub fn new(config: &ClientConfig) -> Self {
    Self {
      client_key: config.client_key.clone(),
      access_key: config.access_key.clone(),
      secret_key: config.secret_key.clone(),
    }
  }

  /// The handshake document, with a nonce regenerated on every call.
  pub fn handshake_payload(&self) -> Value {
    self.payload_with_nonce(&self.fresh_nonce())
  }

  pub(crate) fn payload_with_nonce(&self, nonce: &str) -> Value {
    let request_token = sha256_hex(&format!("{}{}", self.secret_key, nonce));
    json!({
      "access_key": self.access_key,
      "client_key": self.client_key,
      "nonce": nonce,
      "request_token": request_token,
      "request_type": RequestType::Connect.as_u16(),
    })
  }

  fn fresh_nonce(&self) -> String {
    let mut seed = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut seed);
    sha256_hex(&format!(
      "{}{}{}",
      hex::encode(seed),
      self.access_key,
      self.client_key
    ))
  }

  /// Interpret the single handshake response frame.
  pub fn parse_handshake_response(&self, body: &Value) -> Result<ServerToken> {
    if is_truthy(body.get("error").unwrap_or(&Value::Null)) {
      return Err(ClientError::Auth(stringify(
        body.get("data").unwrap_or(&Value::Null),
      )));
    }

    let data = body
      .get("data")
      .and_then(Value::as_object)
      .ok_or_else(|| ClientError::InvalidValue("handshake response has no data object".into()))?;

    let field = |name: &str| -> Result<String> {
      data
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
          ClientError::InvalidValue(format!("handshake response is missing '{}'", name))
        })
    };

    let client_key = field("client_key")?;
    let _access_key = field("access_key")?;
    let access_token = field("access_token")?;
    let expires_at = parse_expiry(&field("access_token_expire")?)?;

    Ok(ServerToken {
      client_key,
      access_token,
      expires_at,
    })
  }
}

/// The token record a successful handshake yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerToken {
  pub client_key: String,
  pub access_token: String,
  pub expires_at: DateTime<Utc>,
}

impl ServerToken {
  /// A token counts as expired inside the 15-minute horizon before its
  /// stated expiry.
  pub fn is_expired(&self) -> bool {
    self.is_expired_at(Utc::now())
  }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at - Duration::minutes(EXPIRY_MARGIN_MINUTES)
  }
}

fn sha256_hex(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  format!("{:x}", hasher.finalize())
}

/// Accepted expiry forms: RFC 3339, or a naive timestamp taken as UTC.
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>> {
  if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
    return Ok(instant.with_timezone(&Utc));
  }
  for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
      return Ok(naive.and_utc());
    }
  }
  Err(ClientError::InvalidValue(format!(
    "unparseable access_token_expire '{}'",
    raw
  )))
}

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(_) => true,
  }
}

fn stringify(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ConnectionOptions, Env, ResponseDataType};

  fn authenticator() -> Authenticator {
    Authenticator::new(&ClientConfig {
      client_key: "K".into(),
      access_key: "A".into(),
      secret_key: "S".into(),
      database_id: "db".into(),
      env: Env::Dev,
      response_data_type: ResponseDataType::Json,
      use_tls: false,
      verify_tls_host: false,
      options: ConnectionOptions::default(),
    })
  }

  #[test]
  fn test_handshake_payload_with_known_nonce() {
    let payload = authenticator().payload_with_nonce("N");
    assert_eq!(payload["access_key"], "A");
    assert_eq!(payload["client_key"], "K");
    assert_eq!(payload["nonce"], "N");
    // SHA256("SN")
    assert_eq!(payload["request_token"], sha256_hex("SN"));
    assert_eq!(payload["request_type"], 1);
  }

  #[test]
  fn test_nonce_is_regenerated() {
    let auth = authenticator();
    let a = auth.handshake_payload();
    let b = auth.handshake_payload();
    assert_ne!(a["nonce"], b["nonce"]);
    assert_eq!(a["nonce"].as_str().unwrap().len(), 64);
    assert!(a["nonce"]
      .as_str()
      .unwrap()
      .chars()
      .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
  }

  #[test]
  fn test_parse_success_response() {
    let token = authenticator()
      .parse_handshake_response(&json!({
        "error": false,
        "data": {
          "client_key": "K",
          "access_key": "A",
          "access_token": "T",
          "access_token_expire": "2099-01-01T00:00:00Z",
        }
      }))
      .unwrap();
    assert_eq!(token.access_token, "T");
    assert!(!token.is_expired());
  }

  #[test]
  fn test_parse_error_response() {
    let err = authenticator()
      .parse_handshake_response(&json!({"error": true, "data": "bad credentials"}))
      .unwrap_err();
    assert!(matches!(err, ClientError::Auth(ref m) if m == "bad credentials"));
    assert_eq!(err.code(), 30);
  }

  #[test]
  fn test_missing_token_field() {
    let err = authenticator()
      .parse_handshake_response(&json!({
        "error": false,
        "data": {"client_key": "K", "access_key": "A"}
      }))
      .unwrap_err();
    assert_eq!(err.code(), 40);
  }

  #[test]
  fn test_expiry_horizon() {
    let token = ServerToken {
      client_key: "K".into(),
      access_token: "T".into(),
      expires_at: Utc::now() + Duration::minutes(60),
    };
    assert!(!token.is_expired());

    // one minute out is well inside the 15-minute horizon
    let nearly = ServerToken {
      expires_at: Utc::now() + Duration::minutes(1),
      ..token.clone()
    };
    assert!(nearly.is_expired());

    let past = ServerToken {
      expires_at: Utc::now() - Duration::minutes(1),
      ..token
    };
    assert!(past.is_expired());
  }

  #[test]
  fn test_expiry_formats() {
    assert!(parse_expiry("2099-01-01T00:00:00Z").is_ok());
    assert!(parse_expiry("2099-01-01T00:00:00").is_ok());
    assert!(parse_expiry("2099-01-01 00:00:00").is_ok());
    assert!(parse_expiry("whenever").is_err());
  }
}
