//! Streaming transport for frame sequences.
//!
//! [`Transport`] is a capability interface: one implementation per transport
//! kind, composed into the client rather than inherited from a shared base.
//! A write call is one ordered message sequence — the request header first,
//! then zero or more frames; a read call yields frames lazily, one per
//! network message, until end of stream or a server error.

pub mod framing;
pub mod retry;

use futures::stream::BoxStream;
use futures::StreamExt;
use tonic::transport::{Channel, ClientTlsConfig};

use crate::client::proto::{
    frames_client::FramesClient, write_request, CreateRequest, DeleteRequest, ExecRequest, Frame,
    InitialWriteRequest, ReadRequest, VersionRequest, WriteRequest,
};
use crate::error::{Error, Result};

/// Acknowledgement of a completed write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    pub frames: i64,
    pub rows: i64,
}

/// One transport kind's read/write capability.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type FrameStream: futures::Stream<Item = Result<Frame>> + Send + Unpin;

    /// Open a read call; frames arrive lazily as the stream is consumed.
    async fn read(&mut self, request: ReadRequest) -> Result<Self::FrameStream>;

    /// Send a header followed by the frame sequence, in order, and wait for
    /// the final acknowledgement. All-or-nothing: a failed call must be
    /// treated as if nothing was written.
    async fn write(&mut self, request: InitialWriteRequest, frames: Vec<Frame>)
        -> Result<WriteAck>;
}

/// Build a tonic channel for an endpoint, with TLS only for `https://`.
pub async fn connect_channel(endpoint: &str) -> Result<Channel> {
    let use_tls = endpoint.starts_with("https://");

    let mut builder = Channel::from_shared(endpoint.to_string())
        .map_err(|e| Error::Config(format!("invalid endpoint '{endpoint}': {e}")))?;

    if use_tls {
        let tls = ClientTlsConfig::new();
        builder = builder
            .tls_config(tls)
            .map_err(|e| Error::Config(format!("failed to configure TLS for '{endpoint}': {e}")))?;
    }

    builder
        .connect()
        .await
        .map_err(|e| Error::Connection(format!("failed to connect to '{endpoint}': {e}")))
}

/// The gRPC transport. The channel is multiplexed and cheap to clone, so one
/// instance per call is the norm; message framing is native to the protocol
/// here (see [`framing`] for transports that need explicit length prefixes).
pub struct GrpcTransport {
    client: FramesClient<Channel>,
}

impl GrpcTransport {
    pub fn new(channel: Channel) -> Self {
        GrpcTransport {
            client: FramesClient::new(channel),
        }
    }

    pub async fn create(&mut self, request: CreateRequest) -> Result<()> {
        self.client.create(tonic::Request::new(request)).await?;
        Ok(())
    }

    pub async fn delete(&mut self, request: DeleteRequest) -> Result<()> {
        self.client.delete(tonic::Request::new(request)).await?;
        Ok(())
    }

    /// Run a backend command; some commands answer with a result frame.
    pub async fn exec(&mut self, request: ExecRequest) -> Result<Option<Frame>> {
        let response = self.client.exec(tonic::Request::new(request)).await?;
        Ok(response.into_inner().frame)
    }

    pub async fn server_version(&mut self) -> Result<String> {
        let response = self
            .client
            .version(tonic::Request::new(VersionRequest {}))
            .await?;
        Ok(response.into_inner().version)
    }
}

impl Transport for GrpcTransport {
    type FrameStream = BoxStream<'static, Result<Frame>>;

    async fn read(&mut self, request: ReadRequest) -> Result<Self::FrameStream> {
        let response = self.client.read(tonic::Request::new(request)).await?;
        let stream = response
            .into_inner()
            .map(|item| item.map_err(Error::from));
        Ok(stream.boxed())
    }

    async fn write(
        &mut self,
        request: InitialWriteRequest,
        frames: Vec<Frame>,
    ) -> Result<WriteAck> {
        let messages = std::iter::once(WriteRequest {
            r#type: Some(write_request::Type::Request(request)),
        })
        .chain(frames.into_iter().map(|frame| WriteRequest {
            r#type: Some(write_request::Type::Frame(frame)),
        }));

        let response = self
            .client
            .write(tokio_stream::iter(messages))
            .await?
            .into_inner();

        Ok(WriteAck {
            frames: response.frames,
            rows: response.rows,
        })
    }
}
