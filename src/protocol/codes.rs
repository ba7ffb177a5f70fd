//! Request and response codes of the ZTeraDB wire protocol.

/// Request types sent in the `request_type` field of a client frame.
///
/// The schema administration block (0x008..=0x025) is not exercised by the
/// client core but stays representable for compatibility with the server's
/// code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
  Connect,
  Disconnect,
  Query,
  Ping,
  /// Reserved schema/admin codes 0x008 through 0x025.
  SchemaAdmin(u16),
}

impl RequestType {
  pub fn as_u16(self) -> u16 {
    match self {
      Self::Connect => 0x001,
      Self::Disconnect => 0x003,
      Self::Query => 0x005,
      Self::Ping => 0x007,
      Self::SchemaAdmin(code) => code,
    }
  }

  pub fn from_u16(code: u16) -> Option<Self> {
    match code {
      0x001 => Some(Self::Connect),
      0x003 => Some(Self::Disconnect),
      0x005 => Some(Self::Query),
      0x007 => Some(Self::Ping),
      0x008..=0x025 => Some(Self::SchemaAdmin(code)),
      _ => None,
    }
  }
}

/// Response codes carried in the `response_code` field of a server frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
  Connected,
  Disconnected,
  DisconnectError,
  ClientAuthError,
  QueryData,
  QueryError,
  Pong,
  NoAccess,
  ParseQueryError,
  CreateSchemaSuccess,
  PublishSchemaSuccess,
  TokenExpired,
  InvalidSchema,
  FieldError,
  ConnectError,
  CreateSchemaError,
  PublishSchemaError,
  /// Sentinel that terminates a query's response stream.
  QueryComplete,
  /// Any code the client does not know by name.
  Other(u16),
}

impl ResponseCode {
  pub fn as_u16(self) -> u16 {
    match self {
      Self::Connected => 0x002,
      Self::Disconnected => 0x004,
      Self::DisconnectError => 0x005,
      Self::ClientAuthError => 0x006,
      Self::QueryData => 0x007,
      Self::QueryError => 0x009,
      Self::Pong => 0x010,
      Self::NoAccess => 0x011,
      Self::ParseQueryError => 0x100,
      Self::CreateSchemaSuccess => 0x201,
      Self::PublishSchemaSuccess => 0x202,
      Self::TokenExpired => 0x400,
      Self::InvalidSchema => 0x401,
      Self::FieldError => 0x402,
      Self::ConnectError => 0x500,
      Self::CreateSchemaError => 0x501,
      Self::PublishSchemaError => 0x502,
      Self::QueryComplete => 0x608,
      Self::Other(code) => code,
    }
  }

  pub fn from_u16(code: u16) -> Self {
    match code {
      0x002 => Self::Connected,
      0x004 => Self::Disconnected,
      0x005 => Self::DisconnectError,
      0x006 => Self::ClientAuthError,
      0x007 => Self::QueryData,
      0x009 => Self::QueryError,
      0x010 => Self::Pong,
      0x011 => Self::NoAccess,
      0x100 => Self::ParseQueryError,
      0x201 => Self::CreateSchemaSuccess,
      0x202 => Self::PublishSchemaSuccess,
      0x400 => Self::TokenExpired,
      0x401 => Self::InvalidSchema,
      0x402 => Self::FieldError,
      0x500 => Self::ConnectError,
      0x501 => Self::CreateSchemaError,
      0x502 => Self::PublishSchemaError,
      0x608 => Self::QueryComplete,
      other => Self::Other(other),
    }
  }
}
