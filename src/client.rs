//! The gRPC client for the frames table store.
//!
//! `Client` owns a multiplexed channel and a [`Session`]; every call clones
//! the channel, attaches the session, and runs through the configured
//! [`RetryPolicy`]. Reads yield decoded [`Table`]s lazily; writes encode
//! the tables up front so a retried call replays the exact same frames.

use std::collections::HashMap;

use futures::{Stream, StreamExt};
use tonic::transport::Channel;

use crate::chunk;
use crate::codec;
use crate::config::Session;
use crate::error::{Error, Result};
use crate::table::Table;
use crate::transport::retry::{retry, RetryPolicy};
use crate::transport::{connect_channel, GrpcTransport, Transport, WriteAck};

// Include the generated protobuf code
#[allow(
    dead_code,
    unused_imports,
    clippy::large_enum_variant,
    clippy::enum_variant_names
)]
pub mod proto {
    tonic::include_proto!("frames");
}

pub use proto::SaveMode;

/// Parameters of a read call. Exactly one of `table` or `query` must be
/// set; everything else narrows or pages the result.
#[derive(Debug, Clone, Default)]
pub struct ReadArgs {
    pub backend: String,
    /// Table path, relative to the session path.
    pub table: String,
    /// SQL query, mutually exclusive with `table`.
    pub query: String,
    /// Columns to project; empty means all, and the order here is the
    /// column order of the decoded tables.
    pub columns: Vec<String>,
    pub filter: String,
    pub group_by: String,
    /// Maximal number of rows to return; 0 means no limit.
    pub limit: i64,
    /// Maximal rows per streamed message; 0 lets the server decide.
    pub message_limit: i64,
    /// Opaque resume marker from a previous read.
    pub marker: String,
    /// Backend specific parameters, passed through untouched.
    pub extra: HashMap<String, String>,
}

impl ReadArgs {
    /// Reject requests with no backend or without exactly one data source.
    pub fn validate(&self) -> Result<()> {
        if self.backend.is_empty() {
            return Err(Error::Read("no backend specified".to_string()));
        }
        match (self.table.is_empty(), self.query.is_empty()) {
            (true, true) => Err(Error::Read(
                "missing data: neither table nor query specified".to_string(),
            )),
            (false, false) => Err(Error::Read(
                "both table and query specified".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Parameters of a write call.
#[derive(Debug, Clone)]
pub struct WriteArgs {
    pub backend: String,
    pub table: String,
    /// Opaque per-row write expression, passed through untouched.
    pub expression: String,
    pub save_mode: SaveMode,
    /// Row cap per streamed frame; 0 disables row-based chunking and
    /// leaves only the byte ceiling.
    pub max_in_message: usize,
}

impl WriteArgs {
    pub fn validate(&self) -> Result<()> {
        if self.backend.is_empty() {
            return Err(Error::Write("no backend specified".to_string()));
        }
        if self.table.is_empty() {
            return Err(Error::Write("no table specified".to_string()));
        }
        Ok(())
    }
}

impl Default for WriteArgs {
    fn default() -> Self {
        WriteArgs {
            backend: String::new(),
            table: String::new(),
            expression: String::new(),
            save_mode: SaveMode::FailIfExists,
            max_in_message: 0,
        }
    }
}

pub struct Client {
    channel: Channel,
    session: Session,
    retry_policy: RetryPolicy,
}

impl Client {
    /// Connect to a gRPC endpoint such as `grpc://localhost:8081`.
    /// TLS is enabled exactly when the scheme is `https`.
    pub async fn connect(address: &str, session: Session) -> Result<Self> {
        session.validate()?;

        // tonic only understands http/https schemes.
        let endpoint = if let Some(rest) = address.strip_prefix("grpc://") {
            format!("http://{rest}")
        } else {
            address.to_string()
        };

        let channel = connect_channel(&endpoint).await?;
        Ok(Client {
            channel,
            session,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Connect using `TABLEWIRE_ADDR` and the `TABLEWIRE_*` session
    /// variables (see [`Session::from_env`]).
    pub async fn from_env() -> Result<Self> {
        let address = std::env::var("TABLEWIRE_ADDR")
            .map_err(|_| Error::Config("TABLEWIRE_ADDR is not set".to_string()))?;
        let session = Session::from_env()?;
        Client::connect(&address, session).await
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn transport(&self) -> GrpcTransport {
        GrpcTransport::new(self.channel.clone())
    }

    /// Fetch the server version and warn when its major version differs
    /// from this crate's. Returns the server's version string.
    pub async fn check_version(&self) -> Result<String> {
        let mut transport = self.transport();
        let server = transport.server_version().await?;

        let ours = env!("CARGO_PKG_VERSION");
        let major = |v: &str| v.trim_start_matches('v').split('.').next().map(str::to_string);
        if major(&server) != major(ours) {
            tracing::warn!(server = %server, client = %ours, "major version mismatch");
        }
        Ok(server)
    }

    /// Stream tables from the store. Frames are decoded as they arrive;
    /// an error item ends the stream.
    pub async fn read(
        &self,
        args: ReadArgs,
    ) -> Result<impl Stream<Item = Result<Table>> + Send + Unpin> {
        args.validate()?;

        let request = proto::ReadRequest {
            session: Some(self.session.to_proto()),
            backend: args.backend.clone(),
            query: args.query.clone(),
            table: args.table.clone(),
            columns: args.columns.clone(),
            filter: args.filter.clone(),
            group_by: args.group_by.clone(),
            limit: args.limit,
            message_limit: args.message_limit,
            marker: args.marker.clone(),
            extra: args.extra.clone(),
        };

        tracing::debug!(backend = %args.backend, table = %args.table, "opening read stream");

        let channel = self.channel.clone();
        let frames = retry(&self.retry_policy, || {
            let request = request.clone();
            let mut transport = GrpcTransport::new(channel.clone());
            async move { transport.read(request).await }
        })
        .await
        .map_err(|e| match e {
            Error::Read(_) => e,
            other => Error::Read(format!("failed to open read stream: {other}")),
        })?;

        let desired = args.columns;
        let tables = frames.map(move |item| {
            item.and_then(|frame| {
                if desired.is_empty() {
                    codec::from_frame(&frame)
                } else {
                    let names: Vec<&str> = desired.iter().map(String::as_str).collect();
                    codec::from_frame_with_columns(&frame, Some(&names))
                }
            })
        });

        Ok(tables.boxed())
    }

    /// Read the whole result into memory and concatenate it into one table.
    pub async fn read_all(&self, args: ReadArgs) -> Result<Table> {
        let mut stream = self.read(args).await?;
        let mut tables = Vec::new();
        while let Some(table) = stream.next().await {
            tables.push(table?);
        }
        Table::concat(tables)
    }

    /// Write tables as one ordered stream of frames. All-or-nothing: on
    /// failure the whole call is retried (when transient) or surfaced, and
    /// the caller must assume nothing was persisted.
    pub async fn write(&self, args: WriteArgs, tables: &[Table]) -> Result<WriteAck> {
        args.validate()?;

        // Labels of the first table ride on the write header and apply to
        // the whole sequence.
        let labels = tables
            .first()
            .map(|t| crate::table::labels_to_proto(t.labels()))
            .unwrap_or_default();

        let mut frames = Vec::new();
        for table in tables {
            for rows in chunk::chunk_rows(table.df(), args.max_in_message) {
                for part in chunk::chunk_bytes(&rows, chunk::MAX_MESSAGE_SIZE) {
                    let part = Table::new(part)
                        .with_index(table.index_names().iter().cloned())?
                        .with_labels(table.labels().clone());
                    frames.push(codec::to_frame(&part)?);
                }
            }
        }

        let header = proto::InitialWriteRequest {
            session: Some(self.session.to_proto()),
            backend: args.backend.clone(),
            table: args.table.clone(),
            expression: args.expression.clone(),
            labels,
            save_mode: args.save_mode as i32,
        };

        tracing::debug!(
            backend = %args.backend,
            table = %args.table,
            frames = frames.len(),
            "writing frame stream"
        );

        let channel = self.channel.clone();
        retry(&self.retry_policy, || {
            let header = header.clone();
            let frames = frames.clone();
            let mut transport = GrpcTransport::new(channel.clone());
            async move { transport.write(header, frames).await }
        })
        .await
        .map_err(|e| match e {
            Error::Write(_) => e,
            other => Error::Write(format!("write to table '{}' failed: {other}", args.table)),
        })
    }

    /// Create a table or stream on the given backend.
    pub async fn create(
        &self,
        backend: &str,
        table: &str,
        attributes: HashMap<String, crate::table::Scalar>,
    ) -> Result<()> {
        let request = proto::CreateRequest {
            session: Some(self.session.to_proto()),
            backend: backend.to_string(),
            table: table.to_string(),
            attribute_map: attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        };

        let channel = self.channel.clone();
        retry(&self.retry_policy, || {
            let request = request.clone();
            let mut transport = GrpcTransport::new(channel.clone());
            async move { transport.create(request).await }
        })
        .await
    }

    /// Run a backend-specific command, e.g. `infer` on the kv backend.
    /// Commands that produce output answer with a result table.
    pub async fn execute(
        &self,
        backend: &str,
        table: &str,
        command: &str,
        args: HashMap<String, crate::table::Scalar>,
        expression: &str,
    ) -> Result<Option<Table>> {
        if backend.is_empty() {
            return Err(Error::Message("no backend specified".to_string()));
        }
        if table.is_empty() {
            return Err(Error::Message("no table specified".to_string()));
        }

        let request = proto::ExecRequest {
            session: Some(self.session.to_proto()),
            backend: backend.to_string(),
            table: table.to_string(),
            command: command.to_string(),
            args: args.iter().map(|(k, v)| (k.clone(), v.to_value())).collect(),
            expression: expression.to_string(),
        };

        let channel = self.channel.clone();
        let frame = retry(&self.retry_policy, || {
            let request = request.clone();
            let mut transport = GrpcTransport::new(channel.clone());
            async move { transport.exec(request).await }
        })
        .await?;

        frame.as_ref().map(codec::from_frame).transpose()
    }

    /// Delete a table, a stream, or a filtered row range.
    pub async fn delete(
        &self,
        backend: &str,
        table: &str,
        filter: &str,
        start: &str,
        end: &str,
    ) -> Result<()> {
        let request = proto::DeleteRequest {
            session: Some(self.session.to_proto()),
            backend: backend.to_string(),
            table: table.to_string(),
            filter: filter.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        };

        let channel = self.channel.clone();
        retry(&self.retry_policy, || {
            let request = request.clone();
            let mut transport = GrpcTransport::new(channel.clone());
            async move { transport.delete(request).await }
        })
        .await
    }
}
