//! OpenSASE Orders - checkout and order lifecycle service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_orders::api::{self, AppState};
use opensase_orders::services::notify::EventPublisher;
use opensase_orders::{AppConfig, OrderService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "NATS unavailable, order events will not be published");
                None
            }
        },
        None => None,
    };
    let events = EventPublisher::new(nats, config.events_subject.clone());
    let state = AppState { orders: OrderService::new(db, config.orders.clone(), events) };

    let app = api::router(state);
    tracing::info!("OpenSASE Orders listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
