//! meetpointd entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use meetpoint_core::{
    DstPolicy, Granularity, TracingConfig, TracingOutputFormat, init_tracing,
};
use meetpoint_server::{
    LoggingTransport, MemoryStore, NotificationBus, NotificationDispatcher, RequestHandler,
    ServerConfig, ServerResult, SignalHandler, SocketServer, make_connection_handler,
    new_shared_state,
};

#[derive(Debug, Parser)]
#[command(name = "meetpointd", about = "Meeting time coordination daemon", version)]
struct Cli {
    /// Path to the Unix socket (defaults to the runtime directory).
    #[arg(long)]
    socket: Option<PathBuf>,

    /// DST transition policy: earlier, later, or reject.
    #[arg(long, default_value = "earlier")]
    dst_policy: String,

    /// Comparison granularity: minute or second.
    #[arg(long, default_value = "minute")]
    granularity: String,

    /// Maximum concurrent client connections.
    #[arg(long, default_value_t = 100)]
    max_connections: usize,

    /// Emit JSON logs instead of the terminal format.
    #[arg(long)]
    json_logs: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn parse_dst_policy(raw: &str) -> Option<DstPolicy> {
    match raw {
        "earlier" => Some(DstPolicy::Earlier),
        "later" => Some(DstPolicy::Later),
        "reject" => Some(DstPolicy::Reject),
        _ => None,
    }
}

fn parse_granularity(raw: &str) -> Option<Granularity> {
    match raw {
        "minute" => Some(Granularity::Minute),
        "second" => Some(Granularity::Second),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut tracing_config = if cli.json_logs {
        TracingConfig::daemon()
    } else {
        TracingConfig::default().with_format(TracingOutputFormat::Pretty)
    };
    if cli.debug {
        tracing_config = tracing_config.with_level(tracing::Level::DEBUG);
    }
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let Some(dst_policy) = parse_dst_policy(&cli.dst_policy) else {
        eprintln!(
            "error: unknown DST policy {:?} (expected earlier, later, or reject)",
            cli.dst_policy
        );
        return ExitCode::FAILURE;
    };
    let Some(granularity) = parse_granularity(&cli.granularity) else {
        eprintln!(
            "error: unknown granularity {:?} (expected minute or second)",
            cli.granularity
        );
        return ExitCode::FAILURE;
    };

    match run(cli, dst_policy, granularity).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, dst_policy: DstPolicy, granularity: Granularity) -> ServerResult<()> {
    let config = match cli.socket {
        Some(path) => ServerConfig::new(path),
        None => ServerConfig::default(),
    }
    .with_max_connections(cli.max_connections)
    .with_dst_policy(dst_policy)
    .with_granularity(granularity);

    let resolver = config.resolver();
    let server = SocketServer::new(config).await?;

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let state = new_shared_state();
    state
        .write()
        .await
        .set_shutdown_handle(signals.shutdown_handle());

    let handler = Arc::new(RequestHandler::new(
        state,
        resolver,
        Arc::new(MemoryStore::new()),
        NotificationBus::new(),
        NotificationDispatcher::new(Arc::new(LoggingTransport)),
    ));

    info!(socket = %server.socket_path().display(), "meetpointd started");
    server
        .run_until_shutdown(make_connection_handler(handler), signals.shutdown().wait())
        .await
}
