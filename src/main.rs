//! multireq: a redundant-request reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                   MULTIREQ                    │
//!                        │                                               │
//!   Client Request       │  ┌─────────┐    ┌─────────────┐   forwarder A ─┼──▶ Target A
//!   ─────────────────────┼─▶│  http   │───▶│    race     │──┤             │
//!                        │  │ server  │    │ coordinator │   forwarder B ─┼──▶ Target B
//!                        │  └─────────┘    └──────┬──────┘               │
//!                        │                        │ first acceptable     │
//!                        │                        ▼ response wins        │
//!   Client Response      │  ┌──────────┐    ┌─────────────┐              │
//!   ◀────────────────────┼──│ response │◀───│ buffer pool │              │
//!                        │  │ emitter  │    │  (prefix)   │              │
//!                        │  └──────────┘    └─────────────┘              │
//!                        │                                               │
//!                        │  config · observability · lifecycle           │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tokio::net::TcpListener;

use multireq::config::{read_config, resolve_listen_addr, validate_config, ProxyConfig};
use multireq::lifecycle::{spawn_signal_handler, Shutdown};
use multireq::observability::{logging, metrics};
use multireq::HttpServer;

/// Race every request against two upstream targets.
#[derive(Parser, Debug)]
#[command(name = "multireq", version, long_about = None)]
struct Cli {
    /// Address to serve proxied traffic on (e.g. ":8080").
    listen: String,

    /// Address to serve Prometheus metrics on (e.g. ":9090").
    metrics: String,

    /// First upstream target, an absolute http(s) URL.
    target_a: String,

    /// Second upstream target, an absolute http(s) URL.
    target_b: String,

    /// Optional TOML file with tuning settings.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Merge the command line over the (possibly default) file config.
    fn into_config(self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        config.listener.bind_address = self.listen;
        config.observability.metrics_address = self.metrics;
        config.targets.a = self.target_a;
        config.targets.b = self.target_b;
        Ok(config)
    }
}

fn usage_exit(message: impl std::fmt::Display) -> ExitCode {
    use clap::CommandFactory;

    println!("{message}");
    println!("{}", Cli::command().render_usage());
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // clap's rendered error already ends with the usage line.
            print!("{}", e.render());
            return ExitCode::FAILURE;
        }
    };

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => return usage_exit(format!("error: {e}")),
    };
    if let Err(errors) = validate_config(&config) {
        let messages: Vec<String> = errors.iter().map(|e| format!("error: {e}")).collect();
        return usage_exit(messages.join("\n"));
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability);

    tracing::info!("multireq v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        metrics_address = %config.observability.metrics_address,
        target_a = %config.targets.a,
        target_b = %config.targets.b,
        buffer_size = config.buffers.size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match resolve_listen_addr(&config.observability.metrics_address).await {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to resolve metrics address"
            ),
        }
    }

    let bind_addr = resolve_listen_addr(&config.listener.bind_address).await?;
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
