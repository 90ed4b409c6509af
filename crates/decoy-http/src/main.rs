use anyhow::Context;
use clap::{Parser, ValueEnum};
use decoy_http::actions::{ActionPipeline, ScriptSandbox};
use decoy_http::config::ServerConfig;
use decoy_http::engine::Engine;
use decoy_http::proxy::{create_http_client, ProxyExecutor};
use decoy_http::selection::RoundRobinScheduler;
use decoy_http::server::{serve_metrics, DecoyServer};
use decoy_http::store::InMemoryStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "decoy", version, about = "HTTP service virtualization server")]
struct Args {
    /// Server configuration file (YAML)
    #[arg(short, long, env = "DECOY_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog of projects to serve (YAML or JSON); overrides the config file
    #[arg(long, env = "DECOY_CATALOG")]
    catalog: Option<PathBuf>,

    /// Listen port; overrides the config file
    #[arg(short, long, env = "DECOY_PORT")]
    port: Option<u16>,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(catalog) = &args.catalog {
        config.catalog = Some(catalog.clone());
    }
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let config = load_config(&args)?;

    let store = match &config.catalog {
        Some(path) => InMemoryStore::from_file(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => {
            warn!("No catalog configured; every request will answer 404");
            InMemoryStore::default()
        }
    };
    info!("Loaded {} project(s)", store.project_count());
    let store = Arc::new(store);

    let client = create_http_client(&config.proxy)?;
    let executor = ProxyExecutor::new(client, config.proxy.timeout());
    let scheduler = Arc::new(RoundRobinScheduler::new(config.round_robin.state_ttl()));
    let actions = ActionPipeline::new(store.clone(), ScriptSandbox::new(&config.scripting));
    let engine = Arc::new(Engine::new(store, executor, scheduler).with_actions(actions));

    let addr: SocketAddr = config
        .listen
        .address()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen.address()))?;

    if config.metrics.enabled {
        let metrics_addr = SocketAddr::new(addr.ip(), config.metrics.port);
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(metrics_addr).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let server = DecoyServer::new(addr, engine);
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }
    Ok(())
}
