//! Socket plumbing for one connection.
//!
//! A reader task decodes frames and forwards them to the connection worker;
//! a writer task owns the write half and applies cipher and compression
//! changes in command order, so a switch never overtakes a queued packet.

pub mod codec;
pub mod socks;

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, Instrument};

use mc_swarm_crypto::SECRET_LEN;
use mc_swarm_proto::packets::RawPacket;

use crate::config::ProxySection;
use crate::error::BotError;

use self::codec::{PacketReader, PacketWriter};

const READ_BUFFER: usize = 16 * 1024;
const INBOUND_CAPACITY: usize = 512;

/// What the reader task hands to the worker.
#[derive(Debug)]
pub enum InboundEvent {
    Packet(RawPacket),
    /// The stream ended; carries the disconnect reason.
    Closed(String),
}

#[derive(Debug)]
pub enum WriterCommand {
    /// An unframed `id + body` packet.
    Packet(Bytes),
    EnableEncryption([u8; SECRET_LEN]),
    SetCompression(i32),
    /// Flush and shut the write half down.
    Close,
}

#[derive(Debug)]
pub enum ReaderCommand {
    EnableEncryption([u8; SECRET_LEN]),
}

/// Cloneable sending side of a transport.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    writer: mpsc::UnboundedSender<WriterCommand>,
    reader: mpsc::UnboundedSender<ReaderCommand>,
    reader_task: Option<AbortHandle>,
}

impl TransportHandle {
    /// Queue an encoded packet.
    pub fn send_raw(&self, packet: Bytes) -> Result<(), BotError> {
        self.writer
            .send(WriterCommand::Packet(packet))
            .map_err(|_| BotError::Closed)
    }

    /// Turn the cipher on around the key response: inbound before the
    /// packet leaves, outbound right after it.
    pub fn send_key_and_encrypt(&self, key_packet: Bytes, secret: [u8; SECRET_LEN]) -> Result<(), BotError> {
        self.reader
            .send(ReaderCommand::EnableEncryption(secret))
            .map_err(|_| BotError::Closed)?;
        self.send_raw(key_packet)?;
        self.writer
            .send(WriterCommand::EnableEncryption(secret))
            .map_err(|_| BotError::Closed)
    }

    /// Compress outgoing packets from now on. Inbound compression is picked
    /// up by the reader itself.
    pub fn set_compression(&self, threshold: i32) -> Result<(), BotError> {
        self.writer
            .send(WriterCommand::SetCompression(threshold))
            .map_err(|_| BotError::Closed)
    }

    /// Flush what is queued and shut the write side down.
    pub fn close(&self) {
        let _ = self.writer.send(WriterCommand::Close);
    }

    /// Stop reading immediately.
    pub fn abort_reader(&self) {
        if let Some(task) = &self.reader_task {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    /// A handle backed by plain channels, for driving handlers in tests.
    #[cfg(test)]
    pub(crate) fn channel() -> (
        Self,
        mpsc::UnboundedReceiver<WriterCommand>,
        mpsc::UnboundedReceiver<ReaderCommand>,
    ) {
        let (writer, writer_rx) = mpsc::unbounded_channel();
        let (reader, reader_rx) = mpsc::unbounded_channel();
        (
            Self {
                writer,
                reader,
                reader_task: None,
            },
            writer_rx,
            reader_rx,
        )
    }
}

/// A running transport: the handle plus the inbound event stream.
pub struct Transport {
    pub handle: TransportHandle,
    pub inbound: mpsc::Receiver<InboundEvent>,
}

/// Open the socket, directly or through a SOCKS5 proxy.
pub async fn open_stream(
    address: SocketAddr,
    host: &str,
    proxy: Option<&ProxySection>,
    connect_timeout: Duration,
) -> Result<TcpStream, BotError> {
    let stream = match proxy {
        None => timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| BotError::Timeout("connecting"))??,
        Some(proxy) => {
            let mut stream = timeout(connect_timeout, TcpStream::connect(proxy.address.as_str()))
                .await
                .map_err(|_| BotError::Timeout("connecting to proxy"))??;
            let credentials = match (&proxy.username, &proxy.password) {
                (Some(username), password) => Some(socks::Credentials {
                    username,
                    password: password.as_deref().unwrap_or_default(),
                }),
                _ => None,
            };
            timeout(
                connect_timeout,
                socks::connect(&mut stream, host, address.port(), credentials),
            )
            .await
            .map_err(|_| BotError::Timeout("opening proxy tunnel"))??;
            debug!("Connected through proxy {}", proxy.address);
            stream
        }
    };
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Start the reader and writer tasks on `stream`. Both inherit the current
/// span.
pub fn spawn<S>(stream: S, read_timeout: Duration, write_timeout: Duration) -> Transport
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (inbound_tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
    let (writer_tx, writer_rx) = mpsc::unbounded_channel();
    let (reader_tx, reader_rx) = mpsc::unbounded_channel();

    let span = tracing::Span::current();
    let reader = tokio::spawn(
        read_loop(read_half, reader_rx, inbound_tx.clone(), read_timeout).instrument(span.clone()),
    );
    tokio::spawn(write_loop(write_half, writer_rx, inbound_tx, write_timeout).instrument(span));

    Transport {
        handle: TransportHandle {
            writer: writer_tx,
            reader: reader_tx,
            reader_task: Some(reader.abort_handle()),
        },
        inbound,
    }
}

async fn read_loop<R>(
    mut stream: R,
    mut commands: mpsc::UnboundedReceiver<ReaderCommand>,
    events: mpsc::Sender<InboundEvent>,
    read_timeout: Duration,
) where
    R: AsyncRead + Unpin,
{
    let mut codec = PacketReader::new();
    let mut buf = vec![0u8; READ_BUFFER];
    let reason = 'read: loop {
        loop {
            match codec.next_packet() {
                Ok(Some(packet)) => {
                    if events.send(InboundEvent::Packet(packet)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => break 'read format!("Internal Exception: {e}"),
            }
        }

        tokio::select! {
            biased;
            Some(command) = commands.recv() => match command {
                ReaderCommand::EnableEncryption(secret) => {
                    if let Err(e) = codec.enable_encryption(&secret) {
                        break format!("Internal Exception: {e}");
                    }
                    debug!("Inbound encryption enabled");
                }
            },
            read = timeout(read_timeout, stream.read(&mut buf)) => match read {
                Err(_) => break "Timed out".to_string(),
                Ok(Ok(0)) => break "End of stream".to_string(),
                Ok(Ok(n)) => codec.feed(&mut buf[..n]),
                Ok(Err(e)) => break format!("Internal Exception: {e}"),
            },
        }
    };
    debug!("Reader stopped: {reason}");
    let _ = events.send(InboundEvent::Closed(reason)).await;
}

async fn write_loop<W>(
    mut stream: W,
    mut commands: mpsc::UnboundedReceiver<WriterCommand>,
    events: mpsc::Sender<InboundEvent>,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    let mut codec = PacketWriter::new();
    while let Some(command) = commands.recv().await {
        let result = match command {
            WriterCommand::Packet(packet) => match codec.encode(&packet) {
                Ok(bytes) => match timeout(write_timeout, stream.write_all(&bytes)).await {
                    Ok(written) => written.map_err(BotError::from),
                    Err(_) => Err(BotError::Timeout("writing a packet")),
                },
                Err(e) => Err(e),
            },
            WriterCommand::EnableEncryption(secret) => codec.enable_encryption(&secret),
            WriterCommand::SetCompression(threshold) => {
                codec.set_compression(threshold);
                Ok(())
            }
            WriterCommand::Close => {
                let _ = timeout(write_timeout, stream.flush()).await;
                let _ = timeout(write_timeout, stream.shutdown()).await;
                debug!("Writer closed");
                return;
            }
        };
        if let Err(e) = result {
            let _ = events
                .send(InboundEvent::Closed(format!("Internal Exception: {e}")))
                .await;
            return;
        }
    }
}
