use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use csv_preview::api;
use csv_preview::config;
use csv_preview::locator::ObjectLocator;
use csv_preview::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csv_preview=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let config_path = config::get_config_path();
    let app_config = config::load_config(&config_path).map_err(anyhow::Error::msg)?;
    tracing::info!("Configuration loaded from {:?}", config_path);

    // Credentials and object identity must be present before serving / 启动前校验凭据与对象
    let locator = ObjectLocator::new(&app_config.storage)?;
    tracing::info!("Previewing {}", locator.identity());

    let state = Arc::new(AppState::new(&app_config, locator));
    let app = api::router(state);

    let addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
