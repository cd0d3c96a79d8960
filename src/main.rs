//! Postilion Proxy - TCP Transport for Card-Payment Links
//!
//! This is the main entry point for the proxy.
//! It starts the issuing and acquiring listeners and shuts both down on Ctrl+C.

use anyhow::Context;
use postilion_proxy::buffer::BufferPool;
use postilion_proxy::config::{Command, ProxyConfig};
use postilion_proxy::connection::ConnectionServer;
use postilion_proxy::handler::{AcquiringMessageHandler, IssuingMessageHandler};
use postilion_proxy::{AcquiringBridge, ActiveConnectionRegistry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn print_help() {
    println!(
        r#"
Postilion Proxy - TCP Transport for Card-Payment Links

USAGE:
    postilion-proxy [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 0.0.0.0)
        --issuing-port <PORT>      Issuing link port (default: 5000)
        --acquiring-port <PORT>    Acquiring link port (default: 5001)
        --queue-depth <N>          Frames queued per connection (default: 1024)
        --pool-capacity <N>        Pre-allocated pool buffers (default: 64)
    -v, --version                  Print version information
        --help                     Print this help message

ENVIRONMENT:
    POSTILION_ISSUING_PORT         Overrides the default issuing port
    POSTILION_ACQUIRING_PORT       Overrides the default acquiring port
    RUST_LOG                       Log filter (default: info)

EXAMPLES:
    postilion-proxy                                    # Listen on :5000 and :5001
    postilion-proxy --issuing-port 6000 --acquiring-port 6001
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = match ProxyConfig::load() {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            println!("postilion-proxy version {}", postilion_proxy::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(version = postilion_proxy::VERSION, "Postilion proxy starting");

    // One pool shared by both links
    let pool = BufferPool::with_capacity(config.pool_capacity, config.pool_buffer_size);

    let issuing = ConnectionServer::new(
        config.server_config("issuing"),
        IssuingMessageHandler::new,
        pool.clone(),
    );

    let registry = Arc::new(ActiveConnectionRegistry::new());
    let factory_registry = Arc::clone(&registry);
    let acquiring = ConnectionServer::new(
        config.server_config("acquiring"),
        move || AcquiringMessageHandler::new(Arc::clone(&factory_registry)),
        pool.clone(),
    );

    // Entry point for an external front end injecting acquiring messages
    let _bridge = AcquiringBridge::new(Arc::clone(&registry));

    issuing
        .listen(config.issuing_address())
        .await
        .with_context(|| format!("failed to bind issuing link on {}", config.issuing_address()))?;
    acquiring
        .listen(config.acquiring_address())
        .await
        .with_context(|| {
            format!(
                "failed to bind acquiring link on {}",
                config.acquiring_address()
            )
        })?;

    info!("Ready to accept connections. Use Ctrl+C to shutdown gracefully.");

    signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("Shutdown signal received, stopping servers...");

    tokio::join!(issuing.shutdown(), acquiring.shutdown());

    let issuing_stats = issuing.stats();
    let acquiring_stats = acquiring.stats();
    info!(
        issuing_connections = issuing_stats.connections_accepted.load(Ordering::Relaxed),
        acquiring_connections = acquiring_stats.connections_accepted.load(Ordering::Relaxed),
        outstanding_leases = pool.stats().outstanding(),
        "Server shutdown complete"
    );
    Ok(())
}
