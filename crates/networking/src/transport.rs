// networking/src/transport.rs

use crate::{peer::PeerAddress, protocol::WireMessage, NetworkError, NetworkResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// One message exchange per connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a message that has no reply
    async fn send(&self, peer: &PeerAddress, message: &WireMessage) -> NetworkResult<()>;

    /// Deliver a message and wait for the single reply
    async fn request(&self, peer: &PeerAddress, message: &WireMessage) -> NetworkResult<WireMessage>;
}

/// Write `message` and close the write half so the reader sees EOF
pub async fn write_message<W>(writer: &mut W, message: &WireMessage, max_bytes: usize) -> NetworkResult<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message.encode()?;
    if bytes.len() > max_bytes {
        return Err(NetworkError::MessageTooLarge(max_bytes));
    }
    writer.write_all(&bytes).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Read one message up to EOF, refusing anything over `max_bytes`
pub async fn read_message<R>(reader: &mut R, max_bytes: usize) -> NetworkResult<WireMessage>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(max_bytes as u64 + 1);
    limited.read_to_end(&mut buf).await?;

    if buf.len() > max_bytes {
        return Err(NetworkError::MessageTooLarge(max_bytes));
    }
    if buf.is_empty() {
        return Err(NetworkError::ProtocolError("empty message".into()));
    }
    WireMessage::decode(&buf)
}

/// Plain TCP transport with bounded connect and I/O time
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    io_timeout: Duration,
    max_message_bytes: usize,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, io_timeout: Duration, max_message_bytes: usize) -> Self {
        Self {
            connect_timeout,
            io_timeout,
            max_message_bytes,
        }
    }

    async fn connect(&self, peer: &PeerAddress) -> NetworkResult<TcpStream> {
        let target = (peer.address.as_str(), peer.port);
        match timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(NetworkError::ConnectionError(format!("{}: {}", peer, e))),
            Err(_) => Err(NetworkError::Timeout(format!("connecting to {}", peer))),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, DEFAULT_MAX_MESSAGE_BYTES)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, peer: &PeerAddress, message: &WireMessage) -> NetworkResult<()> {
        if message.expects_reply() {
            return Err(NetworkError::ProtocolError(format!(
                "{} must be sent as a request",
                message.kind()
            )));
        }
        let mut stream = self.connect(peer).await?;
        timeout(self.io_timeout, write_message(&mut stream, message, self.max_message_bytes))
            .await
            .map_err(|_| NetworkError::Timeout(format!("sending {} to {}", message.kind(), peer)))??;
        tracing::trace!("Sent {} to {}", message.kind(), peer);
        Ok(())
    }

    async fn request(&self, peer: &PeerAddress, message: &WireMessage) -> NetworkResult<WireMessage> {
        if !message.expects_reply() {
            return Err(NetworkError::ProtocolError(format!(
                "{} has no reply",
                message.kind()
            )));
        }
        let mut stream = self.connect(peer).await?;
        let max = self.max_message_bytes;
        let exchange = async {
            write_message(&mut stream, message, max).await?;
            read_message(&mut stream, max).await
        };
        let reply = timeout(self.io_timeout, exchange)
            .await
            .map_err(|_| NetworkError::Timeout(format!("awaiting reply from {}", peer)))??;
        tracing::trace!("{} answered {} with {}", peer, message.kind(), reply.kind());
        Ok(reply)
    }
}
