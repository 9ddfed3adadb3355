use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use roomlink::{EndpointEvent, RoomHooks, ServerRoom, SessionId, TcpEndpoint};

use crate::events::{ServerEvent, spawn_acceptor};

/// Drives one [`ServerRoom`] from TCP connections on a single-threaded runtime.
pub struct RoomHost<H: RoomHooks> {
    room: ServerRoom<H>,
    local_addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<ServerEvent>,
    endpoint_tx: mpsc::UnboundedSender<(SessionId, EndpointEvent)>,
    endpoint_rx: mpsc::UnboundedReceiver<(SessionId, EndpointEvent)>,
    peers: HashMap<SessionId, SocketAddr>,
}

impl<H: RoomHooks> RoomHost<H> {
    pub async fn bind(bind_addr: &str, room: ServerRoom<H>) -> io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let (accepted_tx, accepted) = mpsc::unbounded_channel();
        spawn_acceptor(listener, accepted_tx);
        let (endpoint_tx, endpoint_rx) = mpsc::unbounded_channel();

        Ok(Self {
            room,
            local_addr,
            accepted,
            endpoint_tx,
            endpoint_rx,
            peers: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn room(&mut self) -> &mut ServerRoom<H> {
        &mut self.room
    }

    /// Runs until `shutdown` completes, then closes the room.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) {
        tokio::pin!(shutdown);

        loop {
            if self.room.is_ticking() {
                self.drain_ready();
                self.room.wake(Instant::now());

                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::task::yield_now() => {}
                }
            } else {
                // Nothing to simulate; sleep until the network has news.
                tokio::select! {
                    _ = &mut shutdown => break,
                    Some(event) = self.accepted.recv() => self.on_server_event(event),
                    Some((session, event)) = self.endpoint_rx.recv() => {
                        self.on_endpoint_event(session, event)
                    }
                }
            }
        }

        self.room.shutdown();
        let stats = self.room.stats();
        log::info!(
            "Room {} stopped at tick {} ({} frames sent, {} received)",
            self.room.id(),
            stats.tick,
            stats.network.frames_sent,
            stats.network.frames_received
        );
    }

    fn drain_ready(&mut self) {
        while let Ok(event) = self.accepted.try_recv() {
            self.on_server_event(event);
        }
        while let Ok((session, event)) = self.endpoint_rx.try_recv() {
            self.on_endpoint_event(session, event);
        }
    }

    fn on_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Accepted { stream, addr } => {
                if let Err(e) = self.admit(stream, addr) {
                    log::warn!("Failed to admit {}: {}", addr, e);
                }
            }
            ServerEvent::AcceptFailed { message } => {
                log::error!("Accept failed: {}", message);
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, addr: SocketAddr) -> anyhow::Result<()> {
        let (sender, receiver) = TcpEndpoint::split(stream)?;
        let session = self.room.accept(Box::new(sender))?;
        receiver.spawn(session, self.endpoint_tx.clone());

        log::info!("Session {} connecting from {}", session, addr);
        self.peers.insert(session, addr);
        Ok(())
    }

    fn on_endpoint_event(&mut self, session: SessionId, event: EndpointEvent) {
        match event {
            EndpointEvent::Message(bytes) => self.room.handle_message(session, &bytes),
            EndpointEvent::Closed(reason) => {
                let addr = self.peers.remove(&session);
                log::info!(
                    "Session {} ({:?}) disconnected{}",
                    session,
                    addr,
                    reason.map(|r| format!(": {}", r)).unwrap_or_default()
                );
                self.room.handle_close(session);
            }
        }
    }
}
