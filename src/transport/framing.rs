//! Length-delimited frame stream codec.
//!
//! The logical read contract for transports without native message framing:
//! each message is a 4-byte big-endian length prefix followed by a
//! prost-encoded [`ReadMessage`] envelope, which carries either a frame or
//! an in-band error signal. A receiver can demultiplex a continuous byte
//! stream with no out-of-band framing; a prefix announcing more bytes than
//! the stream delivers is always a fatal read error, never a silent
//! truncation.

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::chunk::MAX_MESSAGE_SIZE;
use crate::client::proto::{Frame, ReadMessage};
use crate::error::{Error, Result};

const PREFIX_SIZE: usize = 4;

/// Pull-based reader of length-prefixed frame messages.
pub struct FrameReader<R> {
    inner: R,
    failed: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        FrameReader {
            inner,
            failed: false,
        }
    }

    /// The next frame, or `None` on a clean end of stream. After a
    /// server-signaled error or a malformed message the stream stays
    /// terminated.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.failed {
            return Ok(None);
        }
        match self.read_message().await {
            Ok(frame) => Ok(frame),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    async fn read_message(&mut self) -> Result<Option<Frame>> {
        let len = match self.read_prefix().await? {
            Some(len) => len,
            None => return Ok(None),
        };
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::Read(format!(
                "frame of {len} bytes exceeds the {MAX_MESSAGE_SIZE} byte message bound"
            )));
        }

        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Read(format!("short frame: prefix declared {len} bytes"))
            } else {
                Error::Read(format!("reading frame body: {err}"))
            }
        })?;

        let message =
            ReadMessage::decode(body.as_slice()).map_err(|err| Error::Message(err.to_string()))?;
        if !message.error.is_empty() {
            return Err(Error::Read(message.error));
        }
        let frame = message
            .frame
            .ok_or_else(|| Error::Message("read message carries no frame".into()))?;

        Ok(Some(frame))
    }

    /// Reads the length prefix. `None` only on end-of-stream at a message
    /// boundary; EOF inside the prefix is a fatal read error.
    async fn read_prefix(&mut self) -> Result<Option<usize>> {
        let mut prefix = [0u8; PREFIX_SIZE];
        let mut filled = 0usize;
        while filled < PREFIX_SIZE {
            let n = self
                .inner
                .read(&mut prefix[filled..])
                .await
                .map_err(|err| Error::Read(format!("reading length prefix: {err}")))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(Error::Read("truncated length prefix".into()));
            }
            filled += n;
        }
        Ok(Some(u32::from_be_bytes(prefix) as usize))
    }
}

/// Append one length-prefixed frame message to a byte stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<()> {
    let message = ReadMessage {
        error: String::new(),
        frame: Some(frame.clone()),
    };
    write_message(writer, &message).await
}

/// Append an in-band error signal.
pub async fn write_error<W: AsyncWrite + Unpin>(writer: &mut W, error: &str) -> Result<()> {
    let message = ReadMessage {
        error: error.to_string(),
        frame: None,
    };
    write_message(writer, &message).await
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &ReadMessage) -> Result<()> {
    let body = message.encode_to_vec();
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(Error::Write(format!(
            "frame of {} bytes exceeds the {MAX_MESSAGE_SIZE} byte message bound",
            body.len()
        )));
    }

    writer
        .write_all(&(body.len() as u32).to_be_bytes())
        .await
        .map_err(|err| Error::Write(format!("writing length prefix: {err}")))?;
    writer
        .write_all(&body)
        .await
        .map_err(|err| Error::Write(format!("writing frame body: {err}")))?;
    Ok(())
}
