use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use router::{ProxyStateImpl, create_router};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "ast-server")]
#[command(about = "PromQL AST server - parses expressions to JSON and proxies the Prometheus API")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<ServerCommands>,

    #[arg(long, help = "Web API listen address (e.g. :8000 or 127.0.0.1:8000)")]
    listen_addr: Option<String>,

    #[arg(long, help = "Prometheus server to forward API queries to")]
    prometheus_url: Option<String>,
}

#[derive(Subcommand)]
enum ServerCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for ServerCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    // Flags take precedence over file and environment configuration
    let config = utils::load_config(cli.common.config.as_ref())?
        .with_overrides(cli.listen_addr, cli.prometheus_url);

    let command = cli.command.unwrap_or_default();
    let ServerCommands::Common(ref common_cmd) = command;
    let version = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if utils::handle_common_command(common_cmd, &config, &version).await? {
        return Ok(());
    }

    log::info!("Starting PromQL AST server");

    let listen_addr = config
        .listen_socket_addr()
        .context("Invalid listen address")?;
    let state = ProxyStateImpl::new(&config.upstream)
        .context("Error parsing Prometheus proxy URL")?;

    log::info!("Forwarding /api/v1/* to {}", config.upstream.url);

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {listen_addr}"))?;

    log::info!("HTTP API server listening on {listen_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl+c signal: {e}");
        }
        log::info!("Shutting down PromQL AST server...");
    })
    .await
    .context("HTTP server error")?;

    log::info!("PromQL AST server stopped gracefully");

    Ok(())
}
