//! One framed connection to the server, over plain TCP or TLS.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::auth::{Authenticator, ServerToken};
use crate::error::{ClientError, Result};
use crate::protocol::{
  decode_json, decode_length, encode_frame, encode_json, RequestType, ResponseCode,
  LEN_PREFIX_BYTES, MAX_FRAME_SIZE,
};

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// TLS settings derived from the client configuration.
#[derive(Debug, Clone)]
pub(crate) struct TlsOptions {
  pub domain: String,
  pub verify_host: bool,
}

enum Stream {
  Plain(TcpStream),
  Tls(Box<tokio_native_tls::TlsStream<TcpStream>>),
}

impl Stream {
  async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
    match self {
      Self::Plain(s) => s.read_exact(buf).await.map(|_| ()),
      Self::Tls(s) => s.read_exact(buf).await.map(|_| ()),
    }
  }

  async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
    match self {
      Self::Plain(s) => {
        s.write_all(buf).await?;
        s.flush().await
      }
      Self::Tls(s) => {
        s.write_all(buf).await?;
        s.flush().await
      }
    }
  }

  async fn shutdown(&mut self) -> std::io::Result<()> {
    match self {
      Self::Plain(s) => s.shutdown().await,
      Self::Tls(s) => s.shutdown().await,
    }
  }
}

/// One connection plus the server token it authenticated with.
///
/// A transport is exclusively owned: by the pool's idle set, or by the
/// caller streaming one query's response. Dropping it closes the socket.
pub struct Transport {
  id: u64,
  stream: Option<Stream>,
  pub(crate) token: Option<ServerToken>,
  read_timeout: Option<Duration>,
}

impl std::fmt::Debug for Transport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Transport").field("id", &self.id).finish()
  }
}

impl Transport {
  /// Connect, optionally wrapping the socket in TLS.
  ///
  /// `read_timeout`, when set, bounds every framed read step; expiry
  /// surfaces as a connection error.
  pub(crate) async fn open(
    host: &str,
    port: u16,
    tls: Option<TlsOptions>,
    read_timeout: Option<Duration>,
  ) -> Result<Self> {
    let tcp = TcpStream::connect((host, port)).await.map_err(|e| {
      ClientError::Connection(format!("failed to connect to {}:{}: {}", host, port, e))
    })?;

    let stream = match tls {
      None => Stream::Plain(tcp),
      Some(options) => {
        let mut builder = native_tls::TlsConnector::builder();
        if !options.verify_host {
          builder.danger_accept_invalid_certs(true);
          builder.danger_accept_invalid_hostnames(true);
        }
        let connector = builder
          .build()
          .map_err(|e| ClientError::Connection(format!("failed to build TLS connector: {}", e)))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls_stream = connector.connect(&options.domain, tcp).await.map_err(|e| {
          ClientError::Connection(format!("TLS handshake with {} failed: {}", options.domain, e))
        })?;
        Stream::Tls(Box::new(tls_stream))
      }
    };

    let id = NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!("transport {} connected to {}:{}", id, host, port);

    Ok(Self {
      id,
      stream: Some(stream),
      token: None,
      read_timeout,
    })
  }

  pub(crate) fn id(&self) -> u64 {
    self.id
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.stream.is_none()
  }

  /// Write one framed payload. Partial writes are absorbed by `write_all`.
  pub(crate) async fn send(&mut self, payload: &[u8]) -> Result<()> {
    let mut stream = self.stream.take().ok_or_else(ClientError::interrupted)?;
    let frame = encode_frame(payload);
    match stream.write_all(&frame).await {
      Ok(()) => {
        self.stream = Some(stream);
        Ok(())
      }
      // the socket is unusable after a failed write
      Err(e) => Err(ClientError::Connection(format!(
        "failed to send frame: {}",
        e
      ))),
    }
  }

  /// JSON-encode a body and send it as one frame.
  pub(crate) async fn send_request(&mut self, body: &Value) -> Result<()> {
    let payload = encode_json(body)?;
    self.send(&payload).await
  }

  /// Read one complete frame and decode its JSON body.
  pub(crate) async fn read_frame(&mut self) -> Result<Value> {
    let mut prefix = [0u8; LEN_PREFIX_BYTES];
    self.read_exact_buf(&mut prefix).await?;
    let length = decode_length(prefix);
    if length > MAX_FRAME_SIZE {
      self.stream = None;
      return Err(ClientError::Protocol(format!(
        "frame of {} bytes exceeds the {} byte cap",
        length, MAX_FRAME_SIZE
      )));
    }
    let mut payload = vec![0u8; length as usize];
    self.read_exact_buf(&mut payload).await?;
    decode_json(&payload)
  }

  /// Read until `buf` is full. A short read, EOF, or deadline expiry marks
  /// the transport closed.
  async fn read_exact_buf(&mut self, buf: &mut [u8]) -> Result<()> {
    let mut stream = self.stream.take().ok_or_else(ClientError::interrupted)?;
    let outcome = match self.read_timeout {
      Some(limit) => match tokio::time::timeout(limit, stream.read_exact(buf)).await {
        Ok(io) => io,
        Err(_) => {
          return Err(ClientError::Connection(format!(
            "read deadline of {:?} exceeded",
            limit
          )));
        }
      },
      None => stream.read_exact(buf).await,
    };
    match outcome {
      Ok(()) => {
        self.stream = Some(stream);
        Ok(())
      }
      Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(ClientError::interrupted()),
      Err(e) => Err(ClientError::Protocol(format!(
        "connection closed or interrupted: {}",
        e
      ))),
    }
  }

  /// Perform the handshake and record the issued token.
  pub(crate) async fn authenticate(&mut self, auth: &Authenticator) -> Result<()> {
    self.send_request(&auth.handshake_payload()).await?;
    let body = self.read_frame().await?;
    let token = auth.parse_handshake_response(&body)?;
    tracing::debug!(
      "transport {} authenticated, token expires {}",
      self.id,
      token.expires_at
    );
    self.token = Some(token);
    Ok(())
  }

  /// One PING/PONG round-trip.
  pub(crate) async fn ping(&mut self) -> Result<()> {
    self
      .send_request(&json!({"request_type": RequestType::Ping.as_u16()}))
      .await?;
    let body = self.read_frame().await?;
    match response_code(&body)? {
      ResponseCode::Pong => Ok(()),
      other => Err(ClientError::Protocol(format!(
        "unexpected response to ping: {:?}",
        other
      ))),
    }
  }

  /// Close the connection. Idempotent; the first call sends a best-effort
  /// DISCONNECT notice.
  pub(crate) async fn close(&mut self) {
    if let Some(mut stream) = self.stream.take() {
      if let Ok(payload) = encode_json(&json!({
        "request_type": RequestType::Disconnect.as_u16()
      })) {
        let _ = stream.write_all(&encode_frame(&payload)).await;
      }
      let _ = stream.shutdown().await;
      tracing::debug!("transport {} closed", self.id);
    }
  }
}

/// Extract and classify a frame's `response_code`.
pub(crate) fn response_code(body: &Value) -> Result<ResponseCode> {
  body
    .get("response_code")
    .and_then(Value::as_u64)
    .map(|code| ResponseCode::from_u16(code as u16))
    .ok_or_else(|| ClientError::Protocol("frame is missing response_code".into()))
}
