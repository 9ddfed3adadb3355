use std::time::Instant;

use crate::error::RoomError;
use crate::net::{
    CodecError, Frame, FrameEncoder, IntoEventKey, NetworkStats, Payload, SessionId,
    SessionManager, SessionStatus, Transport, decode_message, generate_room_id,
};
use crate::simulation::TickLoop;

use super::config::RoomConfig;
use super::handlers::HandlerRegistry;

pub const MALFORMED_FRAME_REASON: &str = "malformed frame";
pub const ROOM_CLOSED_REASON: &str = "room closed";

pub type ServerHandler = Box<dyn FnMut(&mut RoomContext, SessionId, &Payload)>;

/// Application callbacks for a server room. Every method has a no-op default
/// (auth accepts everyone).
pub trait RoomHooks {
    type Options;

    fn init(&mut self, _room: &mut RoomContext, _options: Self::Options) {}

    fn tick(&mut self, _room: &mut RoomContext) {}

    fn cleanup(&mut self, _room: &mut RoomContext) {}

    /// Returning `Err` rejects the client; the message is sent back as its
    /// close reason.
    fn on_client_auth(
        &mut self,
        _room: &mut RoomContext,
        _session: SessionId,
        _credential: &str,
    ) -> Result<(), String> {
        Ok(())
    }

    fn on_client_joined(&mut self, _room: &mut RoomContext, _session: SessionId) {}

    /// Runs after the session has left the registry.
    fn on_client_left(&mut self, _room: &mut RoomContext, _session: SessionId) {}
}

/// The part of a room that hooks and handlers may touch.
pub struct RoomContext {
    id: String,
    sessions: SessionManager,
    encoder: FrameEncoder,
    stats: NetworkStats,
    tick_number: u64,
    pending_closes: Vec<(SessionId, String)>,
    stop_requested: bool,
}

impl RoomContext {
    fn new(id: String, max_clients: Option<usize>) -> Self {
        Self {
            id,
            sessions: SessionManager::new(max_clients),
            encoder: FrameEncoder::new(),
            stats: NetworkStats::default(),
            tick_number: 0,
            pending_closes: Vec::new(),
            stop_requested: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Inside the tick hook: the number of the step being run.
    pub fn tick_number(&self) -> u64 {
        self.tick_number
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn is_full(&self) -> bool {
        self.sessions.is_full()
    }

    pub fn client_count(&self) -> usize {
        self.sessions.client_count()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.sessions.is_client(session)
    }

    pub fn clients(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.clients().map(|s| s.id())
    }

    pub fn session_status(&self, session: SessionId) -> Option<SessionStatus> {
        self.sessions.get(session).map(|s| s.status())
    }

    /// Silently dropped unless `session` has joined.
    pub fn send<E: IntoEventKey>(
        &mut self,
        session: SessionId,
        event: E,
        payload: impl Into<Payload>,
    ) -> Result<(), CodecError> {
        let frame = Frame::user(event.into_event_key()?, payload);

        if !self.sessions.is_joined(session) {
            log::debug!("Dropping message for session {} (not joined)", session);
            self.stats.frames_dropped += 1;
            return Ok(());
        }

        self.deliver(session, &frame)
    }

    /// Encodes once and delivers to every joined session in join order.
    /// Returns the number of sessions the frame was handed to.
    pub fn broadcast<E: IntoEventKey>(
        &mut self,
        event: E,
        payload: impl Into<Payload>,
    ) -> Result<usize, CodecError> {
        self.broadcast_filtered(event, payload, None)
    }

    pub fn broadcast_except<E: IntoEventKey>(
        &mut self,
        except: SessionId,
        event: E,
        payload: impl Into<Payload>,
    ) -> Result<usize, CodecError> {
        self.broadcast_filtered(event, payload, Some(except))
    }

    fn broadcast_filtered<E: IntoEventKey>(
        &mut self,
        event: E,
        payload: impl Into<Payload>,
        except: Option<SessionId>,
    ) -> Result<usize, CodecError> {
        let frame = Frame::user(event.into_event_key()?, payload);
        let bytes = self.encoder.encode(&frame)?;

        let mut delivered = 0;
        for session in self.sessions.clients_mut() {
            if Some(session.id()) == except {
                continue;
            }
            match session.send_raw(bytes) {
                Ok(()) => {
                    self.stats.record_sent(bytes.len());
                    delivered += 1;
                }
                Err(e) => {
                    log::warn!("Failed to broadcast to session {}: {}", session.id(), e);
                    self.stats.frames_dropped += 1;
                }
            }
        }

        Ok(delivered)
    }

    /// Sends an `Error` control frame to any live session, joined or not.
    pub fn send_error(&mut self, session: SessionId, message: &str) -> Result<(), CodecError> {
        self.deliver(
            session,
            &Frame::Error {
                message: message.to_owned(),
            },
        )
    }

    /// Sends `reason` as the close reason and closes the session once the
    /// current hook or handler returns.
    pub fn kick(&mut self, session: SessionId, reason: impl Into<String>) {
        if self.sessions.get(session).is_some() {
            self.pending_closes.push((session, reason.into()));
        }
    }

    /// Stops the tick loop after the current batch of steps.
    pub fn stop_ticking(&mut self) {
        self.stop_requested = true;
    }

    fn deliver(&mut self, session: SessionId, frame: &Frame) -> Result<(), CodecError> {
        let bytes = self.encoder.encode(frame)?;
        let Some(target) = self.sessions.get_mut(session) else {
            self.stats.frames_dropped += 1;
            return Ok(());
        };

        match target.send_raw(bytes) {
            Ok(()) => self.stats.record_sent(bytes.len()),
            Err(e) => {
                log::warn!("Failed to send to session {}: {}", session, e);
                self.stats.frames_dropped += 1;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub tick: u64,
    pub client_count: usize,
    pub session_count: usize,
    pub max_clients: Option<usize>,
    pub network: NetworkStats,
}

/// Server side of a room: session registry, handler table and tick loop.
///
/// Sans-IO. The host feeds it accepted transports, received frames, close
/// notifications and scheduler wakes, all from one thread.
pub struct ServerRoom<H: RoomHooks> {
    ctx: RoomContext,
    handlers: HandlerRegistry<ServerHandler>,
    hooks: H,
    tick_loop: TickLoop,
}

impl<H: RoomHooks> ServerRoom<H> {
    pub fn new(config: RoomConfig, hooks: H) -> Self {
        let id = config.room_id.clone().unwrap_or_else(generate_room_id);
        let tick_loop = TickLoop::new(config.tick_rate, config.max_accumulation(), Instant::now());

        Self {
            ctx: RoomContext::new(id, config.max_clients),
            handlers: HandlerRegistry::new(),
            hooks,
            tick_loop,
        }
    }

    /// Runs the init hook and starts the tick clock at `now`.
    pub fn start(&mut self, options: H::Options, now: Instant) {
        log::info!("Room {} starting", self.ctx.id);
        self.hooks.init(&mut self.ctx, options);
        self.tick_loop.restart(now);
        self.apply_stop_request();
        self.flush_closes();
    }

    pub fn id(&self) -> &str {
        self.ctx.id()
    }

    pub fn context(&self) -> &RoomContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RoomContext {
        &mut self.ctx
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn tick_number(&self) -> u64 {
        self.tick_loop.tick_number()
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_loop.is_running()
    }

    pub fn is_full(&self) -> bool {
        self.ctx.is_full()
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.tick_loop.tick_number(),
            client_count: self.ctx.sessions.client_count(),
            session_count: self.ctx.sessions.total_count(),
            max_clients: self.ctx.sessions.max_clients(),
            network: self.ctx.stats.clone(),
        }
    }

    /// Registers `handler` for user packets carrying `event`, replacing any
    /// earlier one.
    pub fn on_message<E, F>(&mut self, event: E, handler: F) -> Result<(), CodecError>
    where
        E: IntoEventKey,
        F: FnMut(&mut RoomContext, SessionId, &Payload) + 'static,
    {
        self.handlers.insert(event.into_event_key()?, Box::new(handler));
        Ok(())
    }

    pub fn send<E: IntoEventKey>(
        &mut self,
        session: SessionId,
        event: E,
        payload: impl Into<Payload>,
    ) -> Result<(), CodecError> {
        self.ctx.send(session, event, payload)
    }

    pub fn broadcast<E: IntoEventKey>(
        &mut self,
        event: E,
        payload: impl Into<Payload>,
    ) -> Result<usize, CodecError> {
        self.ctx.broadcast(event, payload)
    }

    pub fn kick(&mut self, session: SessionId, reason: impl Into<String>) {
        self.ctx.kick(session, reason);
        self.flush_closes();
    }

    /// New transport connection; the session waits in `Connecting` for the
    /// client's auth frame.
    pub fn accept(&mut self, transport: Box<dyn Transport>) -> Result<SessionId, RoomError> {
        let id = self.ctx.sessions.create(transport)?;
        log::debug!("Session {} connecting", id);
        Ok(id)
    }

    pub fn handle_message(&mut self, session: SessionId, bytes: &[u8]) {
        if self.ctx.sessions.get(session).is_none() {
            log::debug!("Frame for unknown session {}", session);
            return;
        }
        self.ctx.stats.record_received(bytes.len());

        match decode_message(bytes) {
            Ok(Frame::Ping) => {
                if let Err(e) = self.ctx.deliver(session, &Frame::Ping) {
                    log::warn!("Failed to answer ping: {}", e);
                }
            }
            Ok(Frame::Auth { credential }) => self.authenticate(session, &credential),
            Ok(Frame::UserPacket { event, payload }) => {
                if !self.ctx.sessions.is_client(session) {
                    log::debug!("Dropping {} from session {} (not joined)", event, session);
                    self.ctx.stats.frames_dropped += 1;
                } else if let Some(handler) = self.handlers.get_mut(&event) {
                    handler(&mut self.ctx, session, &payload);
                } else {
                    log::debug!("No handler for {}", event);
                }
            }
            Ok(other) => {
                log::warn!(
                    "Ignoring {:?} frame from session {}",
                    other.kind(),
                    session
                );
            }
            Err(e) => {
                log::warn!("Malformed frame from session {}: {}", session, e);
                self.ctx.stats.malformed_frames += 1;
                self.close_session(session, Some(MALFORMED_FRAME_REASON.to_string()));
            }
        }

        self.flush_closes();
    }

    /// The transport reported the connection closed.
    pub fn handle_close(&mut self, session: SessionId) {
        self.close_session(session, None);
        self.flush_closes();
    }

    /// One scheduler wake. Returns whether the host should wake the room again.
    pub fn wake(&mut self, now: Instant) -> bool {
        // Handlers may have asked to stop since the last wake.
        self.apply_stop_request();

        let Self {
            ctx,
            hooks,
            tick_loop,
            ..
        } = self;

        tick_loop.wake(now, |tick| {
            ctx.tick_number = tick;
            hooks.tick(ctx);
        });
        self.ctx.tick_number = self.tick_loop.tick_number();

        self.apply_stop_request();
        self.flush_closes();
        self.tick_loop.is_running()
    }

    pub fn stop_ticking(&mut self) {
        self.tick_loop.stop();
    }

    pub fn restart_ticking(&mut self, now: Instant) {
        self.tick_loop.restart(now);
    }

    /// Stops ticking, closes every session and runs the cleanup hook.
    pub fn shutdown(&mut self) {
        log::info!("Room {} shutting down", self.ctx.id);
        self.tick_loop.stop();

        for session in self.ctx.sessions.ids() {
            self.close_session(session, Some(ROOM_CLOSED_REASON.to_string()));
        }
        self.flush_closes();

        self.hooks.cleanup(&mut self.ctx);
        self.flush_closes();
    }

    fn authenticate(&mut self, session: SessionId, credential: &str) {
        let Some(target) = self.ctx.sessions.get_mut(session) else {
            return;
        };
        if !target.advance(SessionStatus::Authenticating) {
            log::warn!("Session {} sent a second auth frame", session);
            return;
        }

        match self.hooks.on_client_auth(&mut self.ctx, session, credential) {
            Ok(()) => self.join(session),
            Err(reason) => {
                log::info!("Session {} rejected: {}", session, reason);
                self.close_session(session, Some(reason));
            }
        }
    }

    fn join(&mut self, session: SessionId) {
        if self.ctx.session_status(session) != Some(SessionStatus::Authenticating) {
            return;
        }

        let client_id = Frame::ClientId {
            session_id: session.0,
        };
        let room_info = Frame::RoomInfo {
            room_id: self.ctx.id.clone(),
        };
        for frame in [client_id, room_info] {
            if let Err(e) = self.ctx.deliver(session, &frame) {
                log::warn!("Failed to send {:?} to session {}: {}", frame.kind(), session, e);
            }
        }

        if let Some(target) = self.ctx.sessions.get_mut(session) {
            target.advance(SessionStatus::Joined);
        }
        log::info!("Session {} joined room {}", session, self.ctx.id);

        self.hooks.on_client_joined(&mut self.ctx, session);

        // Broadcasts from the join hook skip the newcomer.
        if let Some(target) = self.ctx.sessions.get_mut(session) {
            target.list();
        }
    }

    /// Removes the session, then notifies the peer (if `reason` is set),
    /// closes its transport and finally runs the leave hook for joined
    /// sessions.
    fn close_session(&mut self, session: SessionId, reason: Option<String>) {
        let Some(mut removed) = self.ctx.sessions.remove(session) else {
            return;
        };
        let was_joined = removed.is_joined();

        if let Some(reason) = reason {
            match self.ctx.encoder.encode(&Frame::CloseReason { reason }) {
                Ok(bytes) => match removed.send_raw(bytes) {
                    Ok(()) => self.ctx.stats.record_sent(bytes.len()),
                    Err(e) => log::debug!("Close reason not delivered to {}: {}", session, e),
                },
                Err(e) => log::warn!("Failed to encode close reason: {}", e),
            }
        }

        removed.close_transport();
        removed.advance(SessionStatus::Closed);
        log::info!("Session {} closed", session);

        if was_joined {
            self.hooks.on_client_left(&mut self.ctx, session);
        }
    }

    fn flush_closes(&mut self) {
        loop {
            let pending = std::mem::take(&mut self.ctx.pending_closes);
            if pending.is_empty() {
                break;
            }
            for (session, reason) in pending {
                self.close_session(session, Some(reason));
            }
        }
    }

    fn apply_stop_request(&mut self) {
        if std::mem::take(&mut self.ctx.stop_requested) {
            log::info!("Room {} stopped ticking at tick {}", self.ctx.id, self.tick_number());
            self.tick_loop.stop();
        }
    }
}
