//! fuzzgroup-server - Main Entry Point
//!
//! Usage:
//!     fuzzgroup-server --port 8000
//!     DB_DSN=sqlite:///clients.db APP_NAME=dedup fuzzgroup-server

use std::convert::Infallible;
use std::sync::Arc;

use clap::Parser;
use fuzzgroup_core::GroupingEngine;
use fuzzgroup_server::config::{Database, Settings};
use fuzzgroup_server::logging::{self, prefix};
use fuzzgroup_server::shutdown::shutdown_signal;
use fuzzgroup_server::{FuzzService, HandlerContext};
use fuzzgroup_sqlite::SqliteRowStore;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up panic hook to log panics before they terminate the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: fuzzgroup-server panicked");
        eprintln!(
            "  Location: {}",
            panic_info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        eprintln!(
            "  Message: {}",
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<no message>")
        );
    }));

    let settings = Settings::parse();
    settings.validate()?;
    logging::init(&settings.log_level, &settings.log_dir)?;

    info!("{} Starting fuzzgroup-server", prefix::PULSE_OPEN);
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));

    let store = match settings.database()? {
        Database::Memory => SqliteRowStore::in_memory(settings.table.as_str())?,
        Database::File(path) => {
            info!("{} Opening database {}", prefix::DB, path.display());
            SqliteRowStore::open(&path, settings.table.as_str())?
        }
    };
    info!("{} Using table '{}'", prefix::DB, settings.table);

    let engine_config = settings.engine_config();
    info!("  Matching workers: {}", engine_config.workers);
    let engine = GroupingEngine::with_config(engine_config);

    let service = Arc::new(FuzzService::from_settings(
        HandlerContext::new(store, engine),
        &settings,
    ));

    let listener = TcpListener::bind(settings.socket_addr()?).await?;
    let root = settings.root_path();
    info!(
        "{} Listening on http://{}{}",
        prefix::PULSE_OPEN,
        listener.local_addr()?,
        if root.is_empty() { "/" } else { root.as_str() }
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut watching_signals = true;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let svc = service_fn(move |req| {
                        let service = Arc::clone(&service);
                        async move { Ok::<_, Infallible>(service.handle(req).await) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await
                    {
                        debug!("Connection from {} closed with error: {}", peer, e);
                    }
                });
            }
            received = &mut shutdown, if watching_signals => match received {
                Ok(_) => break,
                Err(e) => {
                    warn!("Signal handlers unavailable, serving until killed: {}", e);
                    watching_signals = false;
                }
            },
        }
    }

    info!("{} Shutdown complete", prefix::PULSE_CLOSE);
    Ok(())
}
