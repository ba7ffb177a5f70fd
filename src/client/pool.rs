//! Connection pool and query dispatch.
//!
//! The pool owns every transport, partitioned into an idle stack and an
//! in-use ledger. A `run()` call borrows one transport for the lifetime of
//! its response stream; release is guaranteed on every exit path, including
//! an abandoned stream.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};

use super::auth::{Authenticator, ServerToken};
use super::transport::{response_code, TlsOptions, Transport};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{RequestType, ResponseCode};
use crate::query::Query;

struct PoolState {
  idle: Vec<Transport>,
  in_use: HashSet<u64>,
  closed: bool,
}

struct PoolShared {
  host: String,
  port: u16,
  config: ClientConfig,
  auth: Authenticator,
  state: Mutex<PoolState>,
  limiter: Option<Arc<Semaphore>>,
  close_tx: broadcast::Sender<()>,
  read_timeout: Option<Duration>,
}

impl PoolShared {
  /// Return a cleanly finished transport to the idle stack.
  fn release(&self, transport: Transport) {
    let mut state = self.state.lock();
    state.in_use.remove(&transport.id());
    if !state.closed && !transport.is_closed() {
      state.idle.push(transport);
    }
    // a closed pool or dead transport drops here, releasing the socket
  }

  /// Forget a transport that died while loaned out.
  fn discard(&self, id: u64) {
    self.state.lock().in_use.remove(&id);
  }
}

/// Snapshot of the pool partition, mostly useful in tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
  pub idle: usize,
  pub in_use: usize,
}

/// Pool of authenticated connections to one ZTeraDB server.
pub struct ConnectionPool {
  shared: Arc<PoolShared>,
}

impl std::fmt::Debug for ConnectionPool {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ConnectionPool")
      .field("host", &self.shared.host)
      .field("port", &self.shared.port)
      .finish()
  }
}

impl ConnectionPool {
  /// Validate the configuration and eagerly open `connection_pool.min`
  /// authenticated transports.
  ///
  /// A transport that fails to connect during warmup is skipped (the pool
  /// may start below min); a failed handshake aborts construction.
  pub async fn connect(host: impl Into<String>, port: u16, config: ClientConfig) -> Result<Self> {
    Self::connect_with_timeout(host, port, config, None).await
  }

  /// Like [`ConnectionPool::connect`], with a per-read deadline applied to
  /// every framed read on every transport.
  pub async fn connect_with_timeout(
    host: impl Into<String>,
    port: u16,
    config: ClientConfig,
    read_timeout: Option<Duration>,
  ) -> Result<Self> {
    config.validate()?;
    let pool_options = config.options.connection_pool;
    let limiter =
      (pool_options.max > 0).then(|| Arc::new(Semaphore::new(pool_options.max as usize)));
    let (close_tx, _) = broadcast::channel(1);
    let shared = Arc::new(PoolShared {
      host: host.into(),
      port,
      auth: Authenticator::new(&config),
      config,
      state: Mutex::new(PoolState {
        idle: Vec::new(),
        in_use: HashSet::new(),
        closed: false,
      }),
      limiter,
      close_tx,
      read_timeout,
    });

    for _ in 0..pool_options.min {
      match open_authenticated(&shared).await {
        Ok(transport) => shared.state.lock().idle.push(transport),
        Err(e @ (ClientError::Auth(_) | ClientError::InvalidValue(_))) => return Err(e),
        Err(e) => tracing::warn!("pool warmup connection skipped: {}", e),
      }
    }

    Ok(Self { shared })
  }

  /// Execute a query, returning its streamed rows.
  ///
  /// The query is validated before any transport is touched. `database_id`
  /// and `env` default to the configured values when the query does not
  /// set them.
  pub async fn run(&self, mut query: Query) -> Result<Rows> {
    if query.database_id.is_none() {
      query.database_id = Some(self.shared.config.database_id.clone());
    }
    if query.env.is_none() {
      query.env = Some(self.shared.config.env);
    }
    let document = query.generate()?;

    let (mut transport, permit) = self.acquire().await?;
    let request = json!({
      "query": document,
      "request_type": RequestType::Query.as_u16(),
      "database_id": self.shared.config.database_id,
      "env": self.shared.config.env.as_str(),
    });
    if let Err(e) = transport.send_request(&request).await {
      self.shared.discard(transport.id());
      return Err(e);
    }

    Ok(Rows {
      close_rx: self.shared.close_tx.subscribe(),
      shared: self.shared.clone(),
      transport: Some(transport),
      _permit: permit,
      done: false,
    })
  }

  /// Run a query that must produce at least one data frame; an empty
  /// result stream is an error.
  pub async fn run_expecting_data(&self, query: Query) -> Result<Vec<Value>> {
    let mut rows = self.run(query).await?;
    let collected = rows.collect_rows().await?;
    if collected.is_empty() {
      return Err(ClientError::NoResponseData);
    }
    Ok(collected)
  }

  /// One PING/PONG round-trip on a pooled transport.
  pub async fn ping(&self) -> Result<()> {
    let (mut transport, _permit) = self.acquire().await?;
    match transport.ping().await {
      Ok(()) => {
        self.shared.release(transport);
        Ok(())
      }
      Err(e) => {
        self.shared.discard(transport.id());
        Err(e)
      }
    }
  }

  /// Close every transport and refuse further work. Idempotent; in-flight
  /// streams observe a protocol error on their next step.
  pub async fn close(&self) {
    let idle = {
      let mut state = self.shared.state.lock();
      if state.closed {
        return;
      }
      state.closed = true;
      state.in_use.clear();
      std::mem::take(&mut state.idle)
    };
    let _ = self.shared.close_tx.send(());
    if let Some(semaphore) = &self.shared.limiter {
      semaphore.close();
    }
    for mut transport in idle {
      transport.close().await;
    }
    tracing::debug!("connection pool closed");
  }

  pub fn stats(&self) -> PoolStats {
    let state = self.shared.state.lock();
    PoolStats {
      idle: state.idle.len(),
      in_use: state.in_use.len(),
    }
  }

  /// Take an idle transport (recycling it when its token is inside the
  /// expiry horizon) or open a fresh one, bounded by `connection_pool.max`.
  async fn acquire(&self) -> Result<(Transport, Option<OwnedSemaphorePermit>)> {
    if self.shared.state.lock().closed {
      return Err(ClientError::Connection("pool is closed".into()));
    }
    let permit = match &self.shared.limiter {
      Some(semaphore) => Some(
        semaphore
          .clone()
          .acquire_owned()
          .await
          .map_err(|_| ClientError::Connection("pool is closed".into()))?,
      ),
      None => None,
    };

    let reused = self.shared.state.lock().idle.pop();
    let transport = match reused {
      Some(mut transport) => {
        let expired = transport.token.as_ref().is_none_or(ServerToken::is_expired);
        if expired {
          tracing::debug!("transport {} token expired, recycling", transport.id());
          transport.close().await;
          open_authenticated(&self.shared).await?
        } else {
          transport
        }
      }
      None => open_authenticated(&self.shared).await?,
    };

    let mut state = self.shared.state.lock();
    if state.closed {
      return Err(ClientError::Connection("pool is closed".into()));
    }
    state.in_use.insert(transport.id());
    drop(state);
    Ok((transport, permit))
  }
}

async fn open_authenticated(shared: &PoolShared) -> Result<Transport> {
  let tls = shared.config.use_tls.then(|| TlsOptions {
    domain: shared.host.clone(),
    verify_host: shared.config.verify_tls_host,
  });
  let mut transport = Transport::open(&shared.host, shared.port, tls, shared.read_timeout).await?;
  match transport.authenticate(&shared.auth).await {
    Ok(()) => Ok(transport),
    Err(e) => {
      transport.close().await;
      Err(e)
    }
  }
}

/// Lazy, finite, forward-only sequence of a query's result rows.
///
/// Each element is the `data` of one QUERY_DATA frame. The sequence ends
/// when the server sends QUERY_COMPLETE; any other code ends it with an
/// error. A drained `Rows` keeps yielding `None`.
///
/// Dropping an unfinished `Rows` closes its transport instead of returning
/// it to the pool, because the protocol has no in-band abort.
pub struct Rows {
  shared: Arc<PoolShared>,
  transport: Option<Transport>,
  _permit: Option<OwnedSemaphorePermit>,
  close_rx: broadcast::Receiver<()>,
  done: bool,
}

impl std::fmt::Debug for Rows {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Rows").field("done", &self.done).finish()
  }
}

impl Rows {
  /// The next data row, or `None` once the stream has terminated.
  pub async fn next(&mut self) -> Option<Result<Value>> {
    if self.done {
      return None;
    }
    if self.shared.state.lock().closed {
      self.abort();
      return Some(Err(ClientError::interrupted()));
    }
    let transport = self.transport.as_mut()?;

    let frame = tokio::select! {
      frame = transport.read_frame() => frame,
      _ = self.close_rx.recv() => Err(ClientError::interrupted()),
    };
    let body = match frame {
      Ok(body) => body,
      Err(e) => {
        self.abort();
        return Some(Err(e));
      }
    };
    let code = match response_code(&body) {
      Ok(code) => code,
      Err(e) => {
        self.abort();
        return Some(Err(e));
      }
    };

    match code {
      ResponseCode::QueryData => Some(Ok(body.get("data").cloned().unwrap_or(Value::Null))),
      ResponseCode::QueryComplete => {
        self.finish();
        None
      }
      other => {
        let message = body
          .get("data")
          .map(|data| match data {
            Value::String(s) => s.clone(),
            value => value.to_string(),
          })
          .unwrap_or_else(|| format!("server responded with {:?}", other));
        self.abort();
        Some(Err(ClientError::Query(message)))
      }
    }
  }

  /// Drain the remaining rows into a vector.
  pub async fn collect_rows(&mut self) -> Result<Vec<Value>> {
    let mut rows = Vec::new();
    while let Some(row) = self.next().await {
      rows.push(row?);
    }
    Ok(rows)
  }

  fn finish(&mut self) {
    self.done = true;
    if let Some(transport) = self.transport.take() {
      self.shared.release(transport);
    }
  }

  fn abort(&mut self) {
    self.done = true;
    if let Some(transport) = self.transport.take() {
      self.shared.discard(transport.id());
      // transport drops here, closing the socket
    }
  }
}

impl Drop for Rows {
  fn drop(&mut self) {
    if !self.done {
      if let Some(transport) = self.transport.take() {
        self.shared.discard(transport.id());
      }
    }
  }
}
