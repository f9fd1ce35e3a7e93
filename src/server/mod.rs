//! JSON API over the offer store.
//!
//! Read-only analytics endpoints plus the chat surface. No HTML is
//! rendered here; the front-end is an external consumer of these
//! endpoints.

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Settings;
use crate::llm::{generator_from_settings, TextGenerator};
use crate::repository::OfferRepository;

pub struct AppState {
    pub repo: OfferRepository,
    pub settings: Settings,
    pub generator: Box<dyn TextGenerator>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/products", get(handlers::list_products))
        .route("/api/products/:product_id", get(handlers::product_detail))
        .route("/api/chat", post(handlers::chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let repo = OfferRepository::open(&settings.database_path)?;
    let generator = generator_from_settings(&settings.chat);
    let bind = settings.server.bind.clone();

    let state = Arc::new(AppState {
        repo,
        settings,
        generator,
    });

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("API listening on {}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
