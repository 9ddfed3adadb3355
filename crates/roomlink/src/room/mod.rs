mod client;
mod config;
mod handlers;
mod server;

pub use client::{ClientHandler, ClientRoom, ClientStatus, ConnectFuture, RoomInfo};
pub use config::{ClientConfig, RoomConfig};
pub use handlers::HandlerRegistry;
pub use server::{
    MALFORMED_FRAME_REASON, ROOM_CLOSED_REASON, RoomContext, RoomHooks, ServerHandler,
    ServerRoom, ServerStats,
};
