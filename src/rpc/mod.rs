//! Generic request/response transport shared by every component.
//!
//! A listener exposes an object implementing a remote interface on a TCP
//! endpoint; a typed proxy lets callers invoke that interface by network
//! address. The substrate marshals method identity, arguments, and either a
//! return value or a remote exception. One call per connection; no retries;
//! no imposed timeouts.

pub mod client;
pub mod codec;
pub mod listener;

use std::io::{self, Error, ErrorKind};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use self::codec::{CallFrame, ReplyFrame, MAX_PAYLOAD_LEN};

/// Upper bound on a whole record: frame header plus payload.
const MAX_RECORD_LEN: usize = MAX_PAYLOAD_LEN + 4096;

/// Server-side half of a remote interface: reads the method identity from an
/// unmarshalled call and invokes the backing implementation.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Interface name, used in diagnostics.
    fn interface(&self) -> &'static str;

    /// Handles one call and produces the reply frame. Logical failures are
    /// encoded into the frame, never raised out of this method.
    async fn dispatch(&self, call: CallFrame) -> ReplyFrame;
}

/// Reads one length-prefixed record from the stream.
pub(crate) async fn read_record(stream: &mut (impl AsyncRead + Unpin)) -> io::Result<Vec<u8>> {
    let len = stream.read_u32().await? as usize;
    if len > MAX_RECORD_LEN {
        return Err(Error::new(ErrorKind::InvalidData, "record exceeds maximum length"));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(body)
}

/// Writes one length-prefixed record to the stream.
pub(crate) async fn write_record(
    stream: &mut (impl AsyncWrite + Unpin),
    body: &[u8],
) -> io::Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| Error::new(ErrorKind::InvalidInput, "record exceeds u32 length"))?;
    stream.write_u32(len).await?;
    stream.write_all(body).await?;
    stream.flush().await
}
