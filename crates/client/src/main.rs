mod session;

use clap::Parser;

use roomlink::ClientConfig;

#[derive(Parser)]
#[command(name = "roomlink-client")]
#[command(about = "Joins a roomlink chat room and relays stdin lines")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "127.0.0.1:27015",
        help = "Server address to connect to"
    )]
    server: String,

    #[arg(long, default_value = "", help = "Credential sent when joining")]
    password: String,

    #[arg(
        long,
        default_value_t = roomlink::net::DEFAULT_PING_DELAY_MS,
        help = "Delay between pings in ms (0 pings once)"
    )]
    ping_delay: u64,

    #[arg(long, default_value_t = roomlink::net::DEFAULT_LATENCY_WINDOW)]
    latency_window: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ClientConfig {
        credential: args.password,
        ping_delay_ms: args.ping_delay,
        latency_window: args.latency_window,
    };

    session::run(&args.server, config).await
}
