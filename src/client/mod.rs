//! Connection handling: transports, the handshake, and the pool that owns
//! them.

mod auth;
mod pool;
mod transport;

pub use auth::{Authenticator, ServerToken};
pub use pool::{ConnectionPool, PoolStats, Rows};
