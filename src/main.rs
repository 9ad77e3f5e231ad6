use anyhow::{Context, Result};
use clap::Parser;
use shared::{ChatConfig, Driver, Mode, StdConsole, Termination, DEFAULT_ADDRESS, DEFAULT_PORT};
use tracing::{error, Level};

/// Simple chat over TCP or UDP
#[derive(Parser)]
#[command(version)]
struct Args {
    /// tcp_server, tcp_client, udp_server or udp_client
    mode: Mode,

    /// Address to bind (server) or send to (client)
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    address: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[arg(long, default_value_t = false)]
    very_verbose: bool,
}

fn run(args: Args) -> Result<Termination> {
    let config = ChatConfig::new(args.mode, args.address, args.port);
    let endpoint = config.endpoint.to_string();

    let mut console = StdConsole::new(args.mode);
    let mut driver = Driver::new(config);
    driver
        .run(&mut console)
        .with_context(|| format!("Failed to start {} on {}", args.mode, endpoint))
}

fn main() {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    // Initialize the tracing subscriber for logging, on stderr so prompts stay readable
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
