use thiserror::Error;

/// Errors surfaced by the ZTeraDB client.
///
/// Every variant carries a stable integer code (see [`ClientError::code`])
/// matching the server SDK error table, so callers can branch on the code
/// without string matching.
#[derive(Debug, Error)]
pub enum ClientError {
  /// Socket creation, connect, or TLS setup failed, or a read deadline
  /// expired.
  #[error("connection error: {0}")]
  Connection(String),

  /// A framed read was interrupted or the framing itself was invalid.
  #[error("protocol error: {0}")]
  Protocol(String),

  /// The server rejected the handshake, or the token record it returned
  /// was unusable.
  #[error("authentication failed: {0}")]
  Auth(String),

  /// Invalid caller input: bad type, empty field, reserved key, invalid
  /// limit bounds, and similar build-time violations.
  #[error("invalid value: {0}")]
  InvalidValue(String),

  /// The server answered a query with a non-data, non-terminator response.
  #[error("query failed: {0}")]
  Query(String),

  /// A received frame did not contain valid JSON.
  #[error("invalid JSON payload: {0}")]
  JsonParse(String),

  /// The response stream terminated without a single data frame, for
  /// operations that require at least one.
  #[error("server returned no data frames")]
  NoResponseData,
}

impl ClientError {
  /// Stable integer code for this error kind.
  pub fn code(&self) -> u16 {
    match self {
      Self::Connection(_) => 10,
      Self::Protocol(_) => 20,
      Self::Auth(_) => 30,
      Self::InvalidValue(_) => 40,
      Self::Query(_) => 90,
      Self::JsonParse(_) => 100,
      Self::NoResponseData => 101,
    }
  }

  /// The error every reader surfaces when its connection dies mid-frame.
  pub(crate) fn interrupted() -> Self {
    Self::Protocol("connection closed or interrupted".into())
  }
}

pub type Result<T> = std::result::Result<T, ClientError>;
