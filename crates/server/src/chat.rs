use roomlink::{CodecError, EventKey, RoomContext, RoomHooks, ServerRoom, SessionId};

pub const CHAT_EVENT: &str = "chat";
pub const SYSTEM_EVENT: &str = "system";
pub const HEARTBEAT_EVENT: u8 = 0;

pub struct ChatOptions {
    pub welcome: String,
}

/// Demo room: password-gated chat with a periodic tick heartbeat.
pub struct ChatRoom {
    password: Option<String>,
    heartbeat_ticks: u64,
    welcome: String,
}

impl ChatRoom {
    pub fn new(password: Option<String>, heartbeat_ticks: u64) -> Self {
        Self {
            password,
            heartbeat_ticks,
            welcome: String::new(),
        }
    }
}

impl RoomHooks for ChatRoom {
    type Options = ChatOptions;

    fn init(&mut self, room: &mut RoomContext, options: ChatOptions) {
        log::info!("Chat room {} ready", room.id());
        self.welcome = options.welcome;
    }

    fn tick(&mut self, room: &mut RoomContext) {
        if self.heartbeat_ticks == 0 || room.tick_number() % self.heartbeat_ticks != 0 {
            return;
        }
        let tick = room.tick_number().to_le_bytes().to_vec();
        if let Err(e) = room.broadcast(HEARTBEAT_EVENT, tick) {
            log::warn!("Heartbeat failed: {}", e);
        }
    }

    fn cleanup(&mut self, room: &mut RoomContext) {
        log::info!(
            "Chat room {} closed after {} frames sent",
            room.id(),
            room.stats().frames_sent
        );
    }

    fn on_client_auth(
        &mut self,
        room: &mut RoomContext,
        session: SessionId,
        credential: &str,
    ) -> Result<(), String> {
        if room.is_full() {
            return Err("room is full".to_string());
        }
        match &self.password {
            Some(password) if password != credential => {
                log::warn!("Session {} gave a wrong password", session);
                Err("wrong password".to_string())
            }
            _ => Ok(()),
        }
    }

    fn on_client_joined(&mut self, room: &mut RoomContext, session: SessionId) {
        let result = room
            .send(session, SYSTEM_EVENT, self.welcome.as_str())
            .and_then(|_| room.broadcast(SYSTEM_EVENT, format!("{} joined", session)));
        if let Err(e) = result {
            log::warn!("Failed to announce session {}: {}", session, e);
        }
    }

    fn on_client_left(&mut self, room: &mut RoomContext, session: SessionId) {
        if let Err(e) = room.broadcast(SYSTEM_EVENT, format!("{} left", session)) {
            log::warn!("Failed to announce departure of {}: {}", session, e);
        }
    }
}

pub fn install_handlers(room: &mut ServerRoom<ChatRoom>) -> Result<(), CodecError> {
    room.on_message(CHAT_EVENT, |ctx, session, payload| {
        let result = match payload.as_text() {
            Some(text) => ctx
                .broadcast(CHAT_EVENT, format!("[{}] {}", session, text))
                .map(|_| ()),
            None => ctx.send_error(session, "chat messages must be text"),
        };
        if let Err(e) = result {
            log::warn!("Chat from {} dropped: {}", session, e);
        }
    })?;

    room.on_message(EventKey::Named("quit".to_string()), |ctx, session, _| {
        ctx.kick(session, "bye");
    })
}
