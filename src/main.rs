use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use wpu_basket::datasource::DemoFeedSource;
use wpu_basket::{api, config::Config, FeedSource, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;

    let source: Box<dyn FeedSource> = if config.demo_mode {
        tracing::info!("using synthetic demo data");
        Box::new(DemoFeedSource::ending_now())
    } else {
        Box::new(config.file_source())
    };

    let market = Pipeline::build(source.as_ref(), &config.pipeline_options())
        .await
        .context("failed to build market data")?;
    for diagnostic in market.diagnostics() {
        tracing::warn!(feed = %diagnostic.feed, "{}", diagnostic.message);
    }

    let state = api::AppState::new(
        Arc::new(market),
        Arc::new(config.session_store()),
        config.data_tz,
    );
    let app = api::create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
