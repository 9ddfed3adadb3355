mod codec;
mod connection;
mod endpoint;
mod protocol;
mod stats;
mod tracking;

pub use codec::{FrameEncoder, FrameReader, decode, decode_message};
pub use connection::{Session, SessionId, SessionManager, SessionStatus};
pub use endpoint::{
    EndpointEvent, FrameReceiver, FrameSender, MAX_FRAME_LEN, TcpEndpoint, Transport,
};
pub use protocol::{
    CodecError, DEFAULT_LATENCY_WINDOW, DEFAULT_MAX_ACCUMULATION_MS, DEFAULT_PING_DELAY_MS,
    DEFAULT_PORT, DEFAULT_TICK_RATE, ENCODE_BUFFER_CAPACITY, EventKey, Frame, FrameKind,
    IntoEventKey, MAX_TEXT_UNITS, MalformedFrame, Payload,
};
pub use stats::{NetworkStats, generate_room_id, rand_u64};
pub use tracking::LatencyTracker;
