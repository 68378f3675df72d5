//! `signclash` binary entry point

use clap::Parser;
use tokio_util::sync::CancellationToken;

use signclash::cli::args::Cli;
use signclash::cli::commands;
use signclash::error::ExitCode;
use signclash::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format(), cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(handle_signals(cancel.clone()));

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// First signal starts a graceful shutdown; a second one exits immediately.
#[cfg(unix)]
async fn handle_signals(cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }

    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    cancel.cancel();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
        _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
    }
}

#[cfg(not(unix))]
async fn handle_signals(cancel: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    cancel.cancel();
    let _ = tokio::signal::ctrl_c().await;
    std::process::exit(ExitCode::INTERRUPTED);
}
