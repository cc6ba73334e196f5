//! `cache-proxy` binary: parse arguments, bind, print the banner, then run the
//! listener and the operator console side by side.

use std::process;
use std::sync::Arc;

use cache_proxy::cache::CacheStore;
use cache_proxy::config::{Cli, Config, USAGE_HINT};
use cache_proxy::console::Console;
use cache_proxy::proxy::{DenylistMiddleware, OriginClient, ProxyHandler};
use cache_proxy::server::Server;
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config, port: u16) {
    println!("\n=================================");
    println!("🚀 Cache Proxy Server Started");
    println!("=================================");
    println!("📍 Server: http://{}:{}", config.host, port);
    println!("🎯 Origin: {}", config.origin);
    println!("💾 Cache: Ready");
    println!("=================================");
    println!("\nType -h or --help for available commands\n");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they do not interleave with the console on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            println!("{USAGE_HINT}");
            println!("{e}");
            process::exit(1);
        }
    };

    let store = Arc::new(CacheStore::new(config.secret.clone()));
    let origin = OriginClient::new(config.origin.clone())?;
    let pipeline = ProxyHandler::new(Arc::clone(&store), origin)
        .into_pipeline(DenylistMiddleware::new(config.denylist.clone()));

    let server = match Server::bind(config.listen_addr()).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "cannot start listener");
            println!("{e}");
            process::exit(1);
        }
    };

    print_banner(&config, server.local_addr().port());

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let listener = tokio::spawn(server.serve(pipeline, async move {
        let _ = shutdown_rx.await;
    }));

    let console = Console::new(store);
    if let Err(e) = console
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
    {
        error!(error = %e, "console stopped");
    }

    info!("shutting down");
    let _ = shutdown_tx.send(());
    listener.await??;
    Ok(())
}
