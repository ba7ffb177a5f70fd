//! Client library for the ZTeraDB database server.
//!
//! Queries are built fluently, executed over a pool of authenticated
//! framed-JSON TCP connections, and streamed back row by row:
//!
//! ```no_run
//! use zteradb::{ClientConfig, ConnectionPool, FilterBuilder, Query};
//!
//! # async fn example() -> Result<(), zteradb::ClientError> {
//! let config = ClientConfig::from_json(r#"{
//!   "client_key": "ck", "access_key": "ak", "secret_key": "sk",
//!   "database_id": "orders", "env": "dev", "response_data_type": "json"
//! }"#)?;
//! let pool = ConnectionPool::connect("db.example.com", 9710, config).await?;
//!
//! let query = Query::new("user")
//!   .select()
//!   .filter_condition(FilterBuilder::new().eq("status", "A")?)
//!   .limit(0, 100)?;
//!
//! let mut rows = pool.run(query).await?;
//! while let Some(row) = rows.next().await {
//!   println!("{}", row?);
//! }
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod query;

pub use client::{Authenticator, ConnectionPool, PoolStats, Rows, ServerToken};
pub use config::{ClientConfig, ConnectionOptions, Env, PoolOptions, ResponseDataType};
pub use error::ClientError;
pub use protocol::{RequestType, ResponseCode};
pub use query::{FilterBuilder, FilterNode, FilterOp, FilterOperand, Query, QueryType};
