//! Streaming client for a frames-style table store.
//!
//! Tables travel as columnar frames over gRPC: a write is an ordered
//! stream of frames behind a single header, a read is a lazy stream of
//! frames decoded back into [`Table`]s. The [`codec`] module handles the
//! columnar encoding (type inference, null tracking, composite indices),
//! [`chunk`] splits large tables to respect message limits, and
//! [`transport`] carries the frames with bounded retry.
//!
//! ```no_run
//! use tablewire::{Client, ReadArgs, Session};
//! use futures::StreamExt;
//!
//! # async fn run() -> tablewire::Result<()> {
//! let session = Session::new("bigdata");
//! let client = Client::connect("grpc://localhost:8081", session).await?;
//!
//! let mut stream = client
//!     .read(ReadArgs {
//!         backend: "kv".to_string(),
//!         table: "weather".to_string(),
//!         ..ReadArgs::default()
//!     })
//!     .await?;
//!
//! while let Some(table) = stream.next().await {
//!     println!("{} rows", table?.height());
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod table;
pub mod transport;

pub use client::{Client, ReadArgs, SaveMode, WriteArgs};
pub use config::Session;
pub use error::{Error, Result};
pub use table::{Scalar, Table};
pub use transport::retry::RetryPolicy;
pub use transport::WriteAck;
