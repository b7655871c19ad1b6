use clap::Parser;
use claude_local_proxy::config::config_search_paths;
use claude_local_proxy::{build_router, AppState, ProxyConfig};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "claude-local-proxy",
    about = "Serve the Anthropic Messages API on localhost, backed by a local OpenAI-compatible model server",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend base URL, e.g. http://localhost:11434 (overrides config)
    #[arg(long)]
    backend_url: Option<String>,

    /// Backend model used for the "opus" alias
    #[arg(long)]
    opus_model: Option<String>,

    /// Backend model used for the "sonnet" alias
    #[arg(long)]
    sonnet_model: Option<String>,

    /// Backend model used for the "haiku" alias
    #[arg(long)]
    haiku_model: Option<String>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claude_local_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
    }
    if cli.opus_model.is_some() {
        config.models.opus = cli.opus_model;
    }
    if cli.sonnet_model.is_some() {
        config.models.sonnet = cli.sonnet_model;
    }
    if cli.haiku_model.is_some() {
        config.models.haiku = cli.haiku_model;
    }

    config.validate()?;

    let state = Arc::new(AppState::from_config(&config)?);

    info!("claude-local-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend:   {}", state.backend.base_url());
    info!("  Port:      {}", config.port);
    info!("  Models:    {} aliases mapped", state.models.len());
    info!("  Timeout:   {}s (non-streaming)", config.request_timeout_secs);
    for (role, model) in config.models.roles() {
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            info!("  {:<9}  {}", format!("{role}:"), model);
        }
    }

    let app = build_router(state);
    let bind_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("");
    info!("  To use with Claude Code:");
    info!("    ANTHROPIC_BASE_URL=http://localhost:{} claude", config.port);
    info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
