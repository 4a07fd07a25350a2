//! Regrow Server - the remote progress store
//!
//! Keeps one progress record per user and serves it over HTTP.
//!
//! # Architecture
//!
//! - **Storage**: RocksDB, one JSON document per user
//! - **API**: `GET`, `PATCH` and `DELETE` on `/api/v1/progress/:user_key`
//!
//! `PATCH` merges a partial record onto the stored one (or onto the account
//! defaults for a new user), so clients may send only the fields they know.
//!
//! # Example
//!
//! ```no_run
//! use regrow_server::{ProgressServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ProgressServer::new(ServerConfig::from_env()?)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod node;
pub mod storage;

pub use api::{build_router, ProgressResponse};
pub use error::{Error, Result};
pub use node::{ProgressServer, ServerConfig, ServerState};
pub use storage::Storage;
