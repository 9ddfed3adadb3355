use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::sync::oneshot;

use crate::error::{ConnectError, RoomError};
use crate::net::{
    CodecError, Frame, FrameEncoder, IntoEventKey, LatencyTracker, NetworkStats, Payload,
    Transport, decode_message,
};

use super::config::ClientConfig;
use super::handlers::HandlerRegistry;

pub type ClientHandler = Box<dyn FnMut(&Payload)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Transport still opening.
    Pending,
    /// Auth sent, waiting for the server to admit us.
    AwaitingRoomInfo,
    Connected,
    /// Error or close reason arrived before room info.
    Failed,
    Closed,
}

/// What a successful connect resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: String,
    pub session_id: Option<u32>,
}

/// Outcome of a client room's connect attempt. Resolves exactly once.
#[derive(Debug)]
pub struct ConnectFuture {
    rx: oneshot::Receiver<Result<RoomInfo, ConnectError>>,
}

impl ConnectFuture {
    /// Non-blocking check; `None` while the attempt is still in flight.
    pub fn try_result(&mut self) -> Option<Result<RoomInfo, ConnectError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ConnectError::Abandoned)),
        }
    }
}

impl Future for ConnectFuture {
    type Output = Result<RoomInfo, ConnectError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ConnectError::Abandoned)))
    }
}

/// Client side of a room.
///
/// Sans-IO like the server room: the host reports the transport opening,
/// incoming frames and the close, and calls [`ClientRoom::poll`] to let the
/// ping cycle fire.
pub struct ClientRoom {
    config: ClientConfig,
    status: ClientStatus,
    transport: Option<Box<dyn Transport>>,
    encoder: FrameEncoder,
    handlers: HandlerRegistry<ClientHandler>,
    latency: LatencyTracker,
    connect_tx: Option<oneshot::Sender<Result<RoomInfo, ConnectError>>>,
    room_id: Option<String>,
    session_id: Option<u32>,
    close_reason: Option<String>,
    ping_sent_at: Option<Instant>,
    next_ping_at: Option<Instant>,
    error_observers: Vec<Box<dyn FnMut(&str)>>,
    close_observers: Vec<Box<dyn FnMut(Option<&str>)>>,
    stats: NetworkStats,
}

impl ClientRoom {
    pub fn new(config: ClientConfig) -> (Self, ConnectFuture) {
        let (connect_tx, rx) = oneshot::channel();
        let latency = LatencyTracker::new(config.latency_window);

        let room = Self {
            config,
            status: ClientStatus::Pending,
            transport: None,
            encoder: FrameEncoder::new(),
            handlers: HandlerRegistry::new(),
            latency,
            connect_tx: Some(connect_tx),
            room_id: None,
            session_id: None,
            close_reason: None,
            ping_sent_at: None,
            next_ping_at: None,
            error_observers: Vec::new(),
            close_observers: Vec::new(),
            stats: NetworkStats::default(),
        };

        (room, ConnectFuture { rx })
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ClientStatus::Connected
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Last reason the server gave for closing us.
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    /// Most recent round trip in milliseconds.
    pub fn current_latency(&self) -> Option<f64> {
        self.latency.current()
    }

    pub fn average_latency(&self) -> Option<f64> {
        self.latency.average()
    }

    pub fn next_ping_at(&self) -> Option<Instant> {
        self.next_ping_at
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Registers `handler` for user packets carrying `event`, replacing any
    /// earlier one.
    pub fn on_message<E, F>(&mut self, event: E, handler: F) -> Result<(), CodecError>
    where
        E: IntoEventKey,
        F: FnMut(&Payload) + 'static,
    {
        self.handlers.insert(event.into_event_key()?, Box::new(handler));
        Ok(())
    }

    pub fn on_error<F: FnMut(&str) + 'static>(&mut self, observer: F) {
        self.error_observers.push(Box::new(observer));
    }

    pub fn on_close<F: FnMut(Option<&str>) + 'static>(&mut self, observer: F) {
        self.close_observers.push(Box::new(observer));
    }

    /// The transport is open: send the auth frame and start pinging.
    pub fn handle_open(
        &mut self,
        transport: Box<dyn Transport>,
        now: Instant,
    ) -> Result<(), RoomError> {
        if self.status != ClientStatus::Pending {
            log::warn!("Transport opened in state {:?}; ignoring", self.status);
            return Ok(());
        }

        self.transport = Some(transport);
        self.status = ClientStatus::AwaitingRoomInfo;

        let auth = Frame::Auth {
            credential: self.config.credential.clone(),
        };
        self.send_frame(&auth)?;
        self.ping(now);
        Ok(())
    }

    /// The transport failed before it opened.
    pub fn handle_connect_error(&mut self, error: impl ToString) {
        let message = error.to_string();
        log::warn!("Failed to connect: {}", message);

        self.transport = None;
        self.resolve(Err(ConnectError::Transport(message)));
        self.status = ClientStatus::Failed;
    }

    pub fn handle_message(&mut self, bytes: &[u8], now: Instant) {
        self.stats.record_received(bytes.len());

        let frame = match decode_message(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Malformed frame from server: {}", e);
                self.stats.malformed_frames += 1;
                self.close();
                return;
            }
        };

        match frame {
            Frame::Ping => self.handle_pong(now),
            Frame::ClientId { session_id } => {
                log::debug!("Assigned session id {}", session_id);
                self.session_id = Some(session_id);
            }
            Frame::RoomInfo { room_id } => {
                let info = RoomInfo {
                    room_id: room_id.clone(),
                    session_id: self.session_id,
                };
                self.room_id = Some(room_id);
                if self.resolve(Ok(info)) {
                    log::info!("Connected to room {}", self.room_id().unwrap_or_default());
                    self.status = ClientStatus::Connected;
                }
            }
            Frame::Error { message } => {
                log::warn!("Server error: {}", message);
                if self.resolve(Err(ConnectError::Server(message.clone()))) {
                    self.status = ClientStatus::Failed;
                }
                for observer in &mut self.error_observers {
                    observer(&message);
                }
            }
            Frame::CloseReason { reason } => {
                log::info!("Server closing connection: {}", reason);
                if self.resolve(Err(ConnectError::Rejected(reason.clone()))) {
                    self.status = ClientStatus::Failed;
                }
                self.close_reason = Some(reason);
            }
            Frame::UserPacket { event, payload } => match self.handlers.get_mut(&event) {
                Some(handler) => handler(&payload),
                None => log::debug!("No handler for {}", event),
            },
            Frame::Auth { .. } => log::warn!("Ignoring auth frame from server"),
        }
    }

    /// The transport closed, from either end.
    pub fn handle_close(&mut self, reason: Option<String>) {
        if let Some(reason) = reason {
            log::debug!("Transport closed: {}", reason);
        }
        self.finish_close();
    }

    /// Closes the transport from our side.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
        self.finish_close();
    }

    /// Sends a ping now, replacing any scheduled one.
    pub fn ping(&mut self, now: Instant) {
        if self.transport.is_none() {
            return;
        }

        self.next_ping_at = None;
        self.ping_sent_at = Some(now);
        if let Err(e) = self.send_frame(&Frame::Ping) {
            log::warn!("Failed to send ping: {}", e);
        }
    }

    /// Fires a due ping and returns when the host should call again.
    pub fn poll(&mut self, now: Instant) -> Option<Instant> {
        if self.next_ping_at.is_some_and(|at| now >= at) {
            self.ping(now);
        }
        self.next_ping_at
    }

    pub fn send<E: IntoEventKey>(
        &mut self,
        event: E,
        payload: impl Into<Payload>,
    ) -> Result<(), RoomError> {
        let frame = Frame::user(event.into_event_key()?, payload);
        if self.status != ClientStatus::Connected {
            return Err(RoomError::NotConnected);
        }
        self.send_frame(&frame)
    }

    fn handle_pong(&mut self, now: Instant) {
        let Some(sent_at) = self.ping_sent_at.take() else {
            log::debug!("Unsolicited ping reply");
            return;
        };

        let rtt = now.saturating_duration_since(sent_at);
        self.latency.record_rtt(rtt);
        log::debug!("Round trip {:?}", rtt);

        if let Some(delay) = self.config.ping_delay() {
            self.next_ping_at = Some(now + delay);
        }
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<(), RoomError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(RoomError::NotConnected);
        };
        let bytes = self.encoder.encode(frame)?;
        transport.send(bytes)?;
        self.stats.record_sent(bytes.len());
        Ok(())
    }

    /// Settles the connect outcome if nothing has yet.
    fn resolve(&mut self, result: Result<RoomInfo, ConnectError>) -> bool {
        match self.connect_tx.take() {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    fn finish_close(&mut self) {
        if self.status == ClientStatus::Closed {
            return;
        }

        self.transport = None;
        self.ping_sent_at = None;
        self.next_ping_at = None;

        if self.resolve(Err(ConnectError::Closed)) {
            self.status = ClientStatus::Failed;
        }
        self.status = ClientStatus::Closed;
        log::info!("Connection closed");

        let reason = self.close_reason.clone();
        for observer in &mut self.close_observers {
            observer(reason.as_deref());
        }
    }
}
