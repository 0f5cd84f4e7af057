//! Hourglass CLI and REST API entry point.
//!
//! Binary name: `hourglass`
//!
//! Parses CLI arguments, installs tracing, then either starts the REST API
//! server, runs an in-memory simulation or inspects stored sessions.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use hourglass_infra::config::load_config;
use hourglass_observe::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, LogFormatArg};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "hourglass", &mut std::io::stdout());
        return Ok(());
    }

    let mut tracing_options = TracingOptions::from_verbosity(cli.verbose, cli.quiet);
    tracing_options.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Json => LogFormat::Json,
    };
    tracing_options.enable_otel = cli.otel;
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(hourglass_infra::config::data_dir);

    let result = run(cli, &data_dir).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, data_dir: &std::path::Path) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let state = AppState::init(data_dir).await?;

            let rearmed = state.engine.recover().await?;
            if rearmed > 0 {
                tracing::info!(turns = rearmed, "re-armed pending turn timers");
            }

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} Hourglass API listening on {}",
                console::style("⏳").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state.clone());

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            state.shutdown().await;
            println!("\n  Server stopped.");
        }

        Commands::Simulate {
            length,
            genre,
            answered,
            wait,
        } => {
            let config = load_config(data_dir).await;
            let options = cli::simulate::SimulateOptions {
                length,
                genre,
                answered,
                wait,
            };
            cli::simulate::simulate(options, &config, cli.json).await?;
        }

        Commands::Show { id } => {
            let state = AppState::init(data_dir).await?;
            let result = cli::show::show_session(&state, &id, cli.json).await;
            state.shutdown().await;
            result?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
