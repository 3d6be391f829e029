use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use rubyan::{app_state::AppState, config::Config, routes::create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rubyan=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.server_address();

    let app_state = AppState::new(config).await?;

    let app = create_router(app_state).layer(CorsLayer::permissive());

    tracing::info!("listening on http://{}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
