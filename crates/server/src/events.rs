use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Produced by the acceptor task and consumed by the room loop.
#[derive(Debug)]
pub enum ServerEvent {
    Accepted { stream: TcpStream, addr: SocketAddr },
    AcceptFailed { message: String },
}

pub fn spawn_acceptor(listener: TcpListener, events: mpsc::UnboundedSender<ServerEvent>) {
    tokio::spawn(async move {
        loop {
            let event = match listener.accept().await {
                Ok((stream, addr)) => ServerEvent::Accepted { stream, addr },
                Err(e) => ServerEvent::AcceptFailed {
                    message: e.to_string(),
                },
            };
            if events.send(event).is_err() {
                break;
            }
        }
    });
}
