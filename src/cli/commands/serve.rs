//! `serve` command: runs the match server until cancelled.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::broadcast::ChannelBroadcaster;
use crate::cli::args::ServeArgs;
use crate::config::{Config, ConfigLoader};
use crate::error::SignClashError;
use crate::game::MatchEngine;
use crate::observability::{Event, EventEmitter, init_metrics};
use crate::store::MemoryStore;
use crate::transport::{AppState, HttpServer, parse_bind_addr};

/// Start the HTTP server and block until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the events file or
/// metrics endpoint cannot be opened, or the listener cannot bind.
pub async fn run(args: &ServeArgs, cancel: CancellationToken) -> Result<(), SignClashError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = load_config(args.config.as_deref())?;
    let bind = parse_bind_addr(args.bind.as_deref().unwrap_or(&config.server.bind))?;

    let events = Arc::new(open_events(args.events_file.as_deref())?);
    let topics = Arc::new(ChannelBroadcaster::new(config.server.sse_buffer));
    let engine = MatchEngine::new(
        Arc::new(MemoryStore::new()),
        topics.clone(),
        Arc::clone(&events),
        config.game.clone(),
    );
    let state = AppState {
        engine: Arc::new(engine),
        topics,
    };

    let server = HttpServer::bind(&bind, state, cancel.clone()).await?;
    let local_addr = server.local_addr();
    tracing::info!(%local_addr, "listening");
    events.emit(Event::ServerStarted {
        timestamp: Utc::now(),
        bind_addr: local_addr.to_string(),
    });

    let result = server.wait().await;
    events.emit(Event::ServerStopped {
        timestamp: Utc::now(),
        reason: match &result {
            Ok(()) => "shutdown".to_string(),
            Err(e) => e.to_string(),
        },
    });
    Ok(result?)
}

fn load_config(path: Option<&Path>) -> Result<Config, SignClashError> {
    let Some(path) = path else {
        tracing::debug!("no configuration file, using defaults");
        return Ok(Config::default());
    };

    tracing::info!(config = %path.display(), "loading configuration");
    let loaded = ConfigLoader::with_defaults().load(path)?;
    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(Config::clone(&loaded.config))
}

fn open_events(path: Option<&Path>) -> Result<EventEmitter, SignClashError> {
    Ok(match path {
        None => EventEmitter::noop(),
        Some(p) if p == Path::new("-") => EventEmitter::stderr(),
        Some(p) => EventEmitter::from_file(p)?,
    })
}
