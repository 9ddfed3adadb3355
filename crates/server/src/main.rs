mod chat;
mod config;
mod events;
mod server;

use anyhow::Result;
use clap::Parser;

use chat::{ChatOptions, ChatRoom};
use config::ServerConfig;
use roomlink::{RoomConfig, ServerRoom};
use server::RoomHost;

#[derive(Parser)]
#[command(name = "roomlink-server")]
#[command(about = "Hosts a single roomlink chat room over TCP")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = roomlink::DEFAULT_PORT)]
    port: u16,

    #[arg(
        short,
        long,
        default_value_t = roomlink::DEFAULT_TICK_RATE,
        help = "Ticks per second (0 disables ticking)"
    )]
    tick_rate: u32,

    #[arg(
        long,
        default_value_t = roomlink::net::DEFAULT_MAX_ACCUMULATION_MS,
        help = "Longest pause simulated in one wake, in ms"
    )]
    max_accumulation: u64,

    #[arg(short, long, help = "Report the room as full at this many clients")]
    max_clients: Option<usize>,

    #[arg(long, help = "Fixed room id (generated when omitted)")]
    room_id: Option<String>,

    #[arg(long, help = "Password clients must present")]
    password: Option<String>,

    #[arg(long, default_value_t = 60, help = "Heartbeat every N ticks (0 disables)")]
    heartbeat_ticks: u64,

    #[arg(long, default_value = "Welcome!")]
    welcome: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.bind, args.port),
        room: RoomConfig {
            room_id: args.room_id,
            tick_rate: args.tick_rate,
            max_accumulation_ms: args.max_accumulation,
            max_clients: args.max_clients,
        },
        password: args.password,
        heartbeat_ticks: args.heartbeat_ticks,
        welcome: args.welcome,
    };

    let mut room = ServerRoom::new(
        config.room.clone(),
        ChatRoom::new(config.password.clone(), config.heartbeat_ticks),
    );
    chat::install_handlers(&mut room)?;

    let mut host = RoomHost::bind(&config.bind_addr, room).await?;
    let local_addr = host.local_addr();
    log::info!("Room {} listening on {}", host.room().id(), local_addr);
    host.room().start(
        ChatOptions {
            welcome: config.welcome,
        },
        std::time::Instant::now(),
    );

    host.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Shutting down");
    })
    .await;

    Ok(())
}
