//! Native messaging host.
//!
//! Browsers talk to native hosts over stdin/stdout: every message is a 4-byte
//! length in native byte order followed by that many bytes of UTF-8 JSON.
//! Each request gets exactly one response, written in request order.

use crate::db::SnapshotStorage;
use crate::domain::{CaptureSettings, NewSnapshot, PageCapture, SnapshotId};
use crate::relay::CaptureRelay;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

/// Largest message accepted in either direction.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Message of {0} bytes exceeds the 1 MiB limit")]
    MessageTooLarge(usize),
}

/// Requests understood by the host, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    Ping,
    /// Page data already reduced to a snapshot by the capturing script.
    ClipPage { data: NewSnapshot },
    /// Raw page text; the host computes the excerpt and metrics.
    CapturePage { data: PageCapture },
    GetAll,
    Delete { id: SnapshotId },
    ClearAll,
}

/// Read one framed message. Returns `None` on a clean end of stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>, HostError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let first = reader.read(&mut len_buf[..1]).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[1..]).await?;

    let len = u32::from_ne_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_BYTES {
        return Err(HostError::MessageTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write one framed JSON message and flush.
pub async fn write_message<W>(writer: &mut W, message: &Value) -> Result<(), HostError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_MESSAGE_BYTES {
        return Err(HostError::MessageTooLarge(body.len()));
    }

    let len = u32::try_from(body.len()).map_err(|_| HostError::MessageTooLarge(body.len()))?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

fn failure(err: impl std::fmt::Display) -> Value {
    json!({ "success": false, "error": err.to_string() })
}

pub struct Host {
    storage: Arc<dyn SnapshotStorage>,
    relay: CaptureRelay,
    settings: CaptureSettings,
}

impl Host {
    pub fn new(
        storage: Arc<dyn SnapshotStorage>,
        relay: CaptureRelay,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            storage,
            relay,
            settings,
        }
    }

    /// Handle one request. Failures become `{"success": false, "error": ..}`.
    pub async fn handle(&self, request: Request) -> Value {
        match request {
            Request::Ping => json!({ "success": true }),
            Request::ClipPage { data } => self.forward(data).await,
            Request::CapturePage { data } => self.forward(data.into_snapshot(&self.settings)).await,
            Request::GetAll => match self.storage.get_all_snapshots().await {
                Ok(pages) => json!({ "success": true, "pages": pages }),
                Err(err) => failure(err),
            },
            Request::Delete { id } => match self.storage.delete_snapshot(id).await {
                Ok(()) => json!({ "success": true }),
                Err(err) => failure(err),
            },
            Request::ClearAll => match self.storage.clear_all_snapshots().await {
                Ok(()) => json!({ "success": true }),
                Err(err) => failure(err),
            },
        }
    }

    async fn forward(&self, page: NewSnapshot) -> Value {
        match self.relay.forward(page).await {
            Ok(ack) => json!(ack),
            Err(err) => failure(err),
        }
    }

    /// Decode and handle one raw message body.
    pub async fn handle_bytes(&self, body: &[u8]) -> Value {
        match serde_json::from_slice::<Request>(body) {
            Ok(request) => {
                debug!(?request, "Host request");
                self.handle(request).await
            }
            Err(err) => {
                error!(error = %err, "Malformed host request");
                failure(format!("Malformed request: {}", err))
            }
        }
    }

    /// Serve requests until the reader reaches end of stream.
    ///
    /// A response too large to frame is replaced by a failure response, so
    /// only transport errors end the loop. Returns the number of requests
    /// handled.
    pub async fn serve<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<usize, HostError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut handled = 0;
        while let Some(body) = read_message(reader).await? {
            let response = self.handle_bytes(&body).await;
            match write_message(writer, &response).await {
                Err(HostError::MessageTooLarge(len)) => {
                    error!(len, "Response exceeds the native messaging limit");
                    let replacement = failure(format!(
                        "Response of {} bytes exceeds the 1 MiB limit",
                        len
                    ));
                    write_message(writer, &replacement).await?;
                }
                result => result?,
            }
            handled += 1;
        }
        info!(handled, "Host input closed");
        Ok(handled)
    }
}
