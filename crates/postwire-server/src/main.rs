//! postwire-server: serves the demo procedures over binary RPC.
//!
//! Prints `RPC_ADDR=<host:port>` on stdout once the listener is bound so a
//! supervising process can find it when `--port 0` is used.

mod procedures;

use anyhow::Result;
use clap::Parser;
use postwire::{RpcConfig, Server, TransportConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "postwire-server")]
#[command(about = "Binary RPC server over HTTP POST")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Request path of the RPC route
    #[arg(long, default_value = RpcConfig::DEFAULT_PATH)]
    path: String,

    /// Origin allowed to call the server from a browser
    #[arg(long)]
    allow_origin: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn transport_config(&self) -> TransportConfig {
        let addr = if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        };

        let config = TransportConfig::new(addr).with_path(self.path.clone());
        match &self.allow_origin {
            Some(origin) => config.with_allowed_origin(origin.clone()),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --debug
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!("Starting postwire server");

    let mut server = Server::new(args.transport_config())?;
    procedures::register(&mut server);
    for (name, signature) in server.procedures() {
        info!("Serving {} {}", name, signature);
    }

    let mut handle = server.start().await?;

    // Intentional stdout: supervising processes parse this line
    println!("RPC_ADDR={}", handle.addr());

    info!("RPC server running at {}", handle.url());

    tokio::select! {
        _ = handle.wait() => warn!("RPC listener stopped unexpectedly"),
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, exiting");
        }
    }

    handle.shutdown().await;
    Ok(())
}
