use clap::Parser; // for cli
use std::sync::Arc;

use species_proxy::config::Args;
use species_proxy::handlers::router;
use species_proxy::rate_limit::sweeper;
use species_proxy::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "species_proxy=info".into()),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();

    // creating shared state
    let state = Arc::new(AppState::from_args(&args)?);

    // spawn the upload log sweeper
    tokio::spawn(sweeper(Arc::clone(&state.rate_limiter), args.sweep_interval()));

    let policy = state.policy();
    let upstream = state.classifier.base_url().to_string();
    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Proxy running on http://localhost:{}", args.port);
    tracing::info!("Forwarding to classifier at {}", upstream);
    tracing::info!(
        "Rate limit: {} uploads per {} ms, resizing to {}px",
        policy.max, policy.window_ms, args.resize_width
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
