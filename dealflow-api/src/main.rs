use anyhow::Context;
use dealflow_api::{app, wiring, AppState};
use dealflow_cycle::run_scheduled;
use dealflow_store::app_config::Config;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load config")?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.logging.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dealflow_api=info,dealflow_cycle=info,dealflow_offer=info,dealflow_store=info,tower_http=debug".into()
            }),
        )
        .init();

    tracing::info!(
        "Starting dealflow: {} source(s), quota {}, every {}s",
        config.sources.iter().filter(|s| s.enabled).count(),
        config.decision.quota,
        config.cycle.interval_seconds
    );

    let wiring::Runtime { mut orchestrator, stats, metrics } = wiring::build(&config).await?;

    // Scheduler only looks at this between cycles
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(async move { run_scheduled(&mut orchestrator, shutdown_rx).await });

    if config.server.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        tracing::info!("Monitoring API listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        axum::serve(listener, app(AppState { stats, metrics }))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")?;
    } else {
        shutdown_signal().await;
    }

    tracing::info!("Shutdown requested, waiting for the current cycle to finish");
    let _ = shutdown_tx.send(true);
    let cycles = worker.await.context("Scheduler task failed")?;
    tracing::info!("Stopped after {} cycle(s)", cycles);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
