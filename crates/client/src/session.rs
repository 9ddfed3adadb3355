use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use roomlink::{ClientConfig, ClientRoom, EndpointEvent, TcpEndpoint};

const CHAT_EVENT: &str = "chat";
const SYSTEM_EVENT: &str = "system";
const HEARTBEAT_EVENT: u8 = 0;

/// How long the loop sleeps when no ping is scheduled.
const IDLE_POLL: Duration = Duration::from_secs(1);

fn install_handlers(room: &mut ClientRoom) -> anyhow::Result<()> {
    room.on_message(CHAT_EVENT, |payload| {
        if let Some(text) = payload.as_text() {
            println!("{}", text);
        }
    })?;
    room.on_message(SYSTEM_EVENT, |payload| {
        if let Some(text) = payload.as_text() {
            println!("* {}", text);
        }
    })?;
    room.on_message(HEARTBEAT_EVENT, |payload| {
        let tick = payload
            .as_bytes()
            .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
            .map(u64::from_le_bytes);
        log::debug!("Server heartbeat at tick {:?}", tick);
    })?;

    room.on_error(|message| log::error!("Server error: {}", message));
    room.on_close(|reason| match reason {
        Some(reason) => log::info!("Disconnected: {}", reason),
        None => log::info!("Disconnected"),
    });
    Ok(())
}

pub async fn run(server: &str, config: ClientConfig) -> anyhow::Result<()> {
    let (mut room, mut connect) = ClientRoom::new(config);
    install_handlers(&mut room)?;

    let (sender, receiver) = match TcpEndpoint::connect(server).await {
        Ok(halves) => halves,
        Err(e) => {
            room.handle_connect_error(&e);
            return Err(e).with_context(|| format!("Failed to connect to {}", server));
        }
    };
    log::info!("Connected to {}, joining room", receiver.peer_addr());

    let (events_tx, mut events) = mpsc::unbounded_channel();
    receiver.spawn((), events_tx);
    room.handle_open(Box::new(sender), Instant::now())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut resolved = false;
    let mut samples = 0;

    loop {
        let deadline = room
            .poll(Instant::now())
            .unwrap_or_else(|| Instant::now() + IDLE_POLL);

        tokio::select! {
            event = events.recv() => match event {
                Some(((), EndpointEvent::Message(bytes))) => {
                    room.handle_message(&bytes, Instant::now())
                }
                Some(((), EndpointEvent::Closed(reason))) => {
                    room.handle_close(reason);
                    break;
                }
                None => {
                    room.handle_close(None);
                    break;
                }
            },
            result = &mut connect, if !resolved => {
                resolved = true;
                match result {
                    Ok(info) => log::info!(
                        "Joined room {} as session {}",
                        info.room_id,
                        info.session_id.map(|id| id.to_string()).unwrap_or_else(|| "?".into())
                    ),
                    Err(e) => log::error!("Could not join: {}", e.message()),
                }
            },
            line = lines.next_line(), if room.is_connected() => match line? {
                Some(text) if text.trim().is_empty() => {}
                Some(text) => room.send(CHAT_EVENT, text)?,
                None => {
                    room.close();
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline.into()) => {}
            _ = tokio::signal::ctrl_c() => {
                room.close();
                break;
            }
        }

        // The window stops growing at capacity, so compare lifetime counts.
        if room.latency().recorded() != samples {
            samples = room.latency().recorded();
            if let (Some(current), Some(average)) =
                (room.current_latency(), room.average_latency())
            {
                log::info!("Latency {:.1} ms (average {:.1} ms)", current, average);
            }
        }
    }

    if room.room_id().is_none() {
        bail!(
            "{}",
            room.close_reason().unwrap_or("connection closed before joining")
        );
    }
    Ok(())
}
