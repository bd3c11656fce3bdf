use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hubgate::config::load_config;
use hubgate::http::{self, ProxyState};
use hubgate::ProxyConfig;

#[derive(Parser, Debug)]
#[command(name = "hubgate", version, about = "Transforming mirror proxy for a code-hosting service")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when absent.
    #[arg(short, long, default_value = "hubgate.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = std::path::Path::new(&args.config);
    let config = if config_path.exists() {
        load_config(config_path)?
    } else {
        ProxyConfig::default()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hubgate={},tower_http=warn", config.observability.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        site = %config.upstreams.site,
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    let state = ProxyState::from_config(config);
    http::run(state).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
