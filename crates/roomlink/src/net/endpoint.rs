use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};

use super::protocol::ENCODE_BUFFER_CAPACITY;

/// Largest frame accepted from or written to a TCP peer.
pub const MAX_FRAME_LEN: usize = ENCODE_BUFFER_CAPACITY;

/// Outbound half of a message-oriented connection.
///
/// Implementations must not block: rooms call `send` from inside handlers and
/// the tick hook. Incoming messages and close notifications are delivered by
/// the host calling back into the room.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    Message(Vec<u8>),
    Closed(Option<String>),
}

#[derive(Debug)]
enum Outbound {
    Frame(Vec<u8>),
    Close,
}

/// [`Transport`] handle feeding a TCP writer task.
///
/// Closing or dropping it also stops the paired reader task.
#[derive(Debug)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<Outbound>,
    stop_reader: Option<oneshot::Sender<()>>,
}

impl Transport for FrameSender {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.stop_reader.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        if bytes.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Frame exceeds maximum length",
            ));
        }
        self.tx
            .send(Outbound::Frame(bytes.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "writer task stopped"))
    }

    fn close(&mut self) {
        if let Some(stop_reader) = self.stop_reader.take() {
            let _ = stop_reader.send(());
            let _ = self.tx.send(Outbound::Close);
        }
    }
}

/// Inbound half; turned into a reader task with [`FrameReceiver::spawn`].
#[derive(Debug)]
pub struct FrameReceiver {
    reader: OwnedReadHalf,
    peer_addr: SocketAddr,
    stopped: oneshot::Receiver<()>,
}

impl FrameReceiver {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Forwards every frame as `(tag, event)` until the peer hangs up or the
    /// paired [`FrameSender`] is closed. The last event is always `Closed`.
    pub fn spawn<T>(self, tag: T, events: mpsc::UnboundedSender<(T, EndpointEvent)>)
    where
        T: Clone + Send + 'static,
    {
        let FrameReceiver {
            mut reader,
            peer_addr,
            mut stopped,
        } = self;

        tokio::spawn(async move {
            let reason = loop {
                let result = tokio::select! {
                    biased;
                    _ = &mut stopped => break None,
                    result = read_frame(&mut reader) => result,
                };
                match result {
                    Ok(Some(frame)) => {
                        if events
                            .send((tag.clone(), EndpointEvent::Message(frame)))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Ok(None) => break None,
                    Err(e) => break Some(e.to_string()),
                }
            };

            log::debug!("Connection to {} closed ({:?})", peer_addr, reason);
            let _ = events.send((tag, EndpointEvent::Closed(reason)));
        });
    }
}

pub struct TcpEndpoint;

impl TcpEndpoint {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<(FrameSender, FrameReceiver)> {
        let stream = TcpStream::connect(addr).await?;
        Self::split(stream)
    }

    /// Splits an accepted or connected stream and starts its writer task.
    pub fn split(stream: TcpStream) -> io::Result<(FrameSender, FrameReceiver)> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, rx, peer_addr));
        let (stop_tx, stopped) = oneshot::channel();

        Ok((
            FrameSender {
                tx,
                stop_reader: Some(stop_tx),
            },
            FrameReceiver {
                reader,
                peer_addr,
                stopped,
            },
        ))
    }
}

async fn read_frame(reader: &mut OwnedReadHalf) -> io::Result<Option<Vec<u8>>> {
    let len = match reader.read_u32_le().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame of {} bytes exceeds maximum length", len),
        ));
    }

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(frame))
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    peer_addr: SocketAddr,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Frame(frame) => {
                let result = async {
                    writer.write_u32_le(frame.len() as u32).await?;
                    writer.write_all(&frame).await
                }
                .await;

                if let Err(e) = result {
                    log::warn!("Failed to write to {}: {}", peer_addr, e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }

    let _ = writer.shutdown().await;
}
