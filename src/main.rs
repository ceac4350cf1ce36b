use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use reader_proxy::config::{self, AppState, Config};
use reader_proxy::logger;
use reader_proxy::proxy::{sanitize, StorageClient};
use reader_proxy::server;

/// Serve object-store web bundles under a foreign path prefix
#[derive(Parser, Debug)]
#[command(name = "reader-proxy", version, about)]
struct Cli {
    /// Configuration file (extension optional, missing file is allowed)
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print a signed URL for an object key
    Sign {
        /// Object key, e.g. `my-book/index.html`
        key: String,
        /// Lifetime in seconds (defaults to `upstream.signed_url_ttl`)
        #[arg(long)]
        ttl: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg),
        Command::Sign { key, ttl } => sign(&cfg, &key, ttl),
    }
}

fn serve(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    logger::init(&cfg)?;

    // Worker count from config, otherwise one per CPU core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;

    if cfg.upstream.origin.is_none() {
        logger::log_warning(
            "upstream.origin is not set; reader requests will fail until it is configured",
        );
    }

    logger::log_server_start(&addr, &cfg);
    let state = Arc::new(AppState::new(cfg)?);

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            Arc::clone(&signals.shutdown),
        ))
        .await?;
    Ok(())
}

fn sign(cfg: &Config, key: &str, ttl: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let key = sanitize(key.split('/'))?;
    let client = StorageClient::new(&cfg.upstream)?;
    let bucket = cfg
        .upstream
        .signed_bucket
        .as_deref()
        .unwrap_or(&cfg.upstream.bucket);
    let ttl = Duration::from_secs(ttl.unwrap_or(cfg.upstream.signed_url_ttl));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let url = runtime.block_on(client.create_signed_url(bucket, &key, ttl))?;
    println!("{url}");
    Ok(())
}
