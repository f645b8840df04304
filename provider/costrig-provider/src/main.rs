use anyhow::Result;
use clap::Command;
use costrig_provider::{
    bootstrap::build_provider_from_env, source::ChannelEventSource,
};
use std::env;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let _matches = Command::new("costrig-provider")
        .about("Object storage trigger provider")
        .version(env!("CARGO_PKG_VERSION"))
        .get_matches();

    info!("Loading configuration from environment variables...");
    let source = ChannelEventSource::new();
    let provider = build_provider_from_env(source.clone()).await?;
    info!(
        "starting trigger provider for {} on {}",
        provider.config.worker, provider.config.host
    );

    provider.coordinator.init().await?;

    let token = CancellationToken::new();
    source.start(provider.adapter.clone(), token.clone());

    // Follow first so nothing between reconciliation and the feed is lost.
    let watcher = provider.watcher.clone();
    let watch_token = token.clone();
    tokio::spawn(async move { watcher.run(watch_token).await });
    provider.watcher.reconcile().await;

    let server = provider.server;
    tokio::spawn(async move {
        if let Err(err) = server.serve().await {
            error!("server error: {}", err);
        }
    });

    shutdown_signal().await;
    info!("starting a clean up for shutdown");
    token.cancel();
    provider.coordinator.handoff().await;
    info!("done clean up");
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{
        EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let json_format = env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "plain".to_string())
        .to_lowercase()
        == "json";

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let fmt_layer = if json_format {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.boxed()
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
