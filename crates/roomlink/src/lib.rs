pub mod error;
pub mod net;
pub mod room;
pub mod simulation;

pub use error::{ConnectError, RoomError};
pub use net::{
    CodecError, DEFAULT_PORT, DEFAULT_TICK_RATE, EndpointEvent, EventKey, Frame, FrameEncoder,
    FrameKind, FrameReceiver, FrameSender, IntoEventKey, LatencyTracker, MalformedFrame,
    NetworkStats, Payload, SessionId, SessionStatus, TcpEndpoint, Transport, decode,
    decode_message,
};
pub use room::{
    ClientConfig, ClientRoom, ClientStatus, ConnectFuture, RoomConfig, RoomContext, RoomHooks,
    RoomInfo, ServerRoom, ServerStats,
};
pub use simulation::TickLoop;
