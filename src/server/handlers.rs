//! HTTP request handlers for the JSON API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::analytics::{
    competitor_analysis, price_suggestion, product_context, site_rating_summary, OfferSummary,
    PriceSuggestion, SiteRatingSummary,
};
use crate::llm::{ChatMessage, RuleBasedResponder, TextGenerator};

#[derive(Debug, Serialize)]
pub struct ProductListItem {
    pub product_id: String,
    pub product_name: String,
    pub category: Option<String>,
}

/// GET /api/products - every product with at least one offer.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductListItem>>, StatusCode> {
    let rows = state.repo.product_summaries().map_err(|e| {
        warn!("Product listing failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(
        rows.into_iter()
            .map(|(product_id, product_name, category)| ProductListItem {
                product_id,
                product_name,
                category,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub product_id: String,
    pub product_name: String,
    pub offers: Vec<OfferSummary>,
    pub price_suggestion: Option<PriceSuggestion>,
    pub rating_summary: Vec<SiteRatingSummary>,
}

/// GET /api/products/{id} - latest offers and analytics for one product.
pub async fn product_detail(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Result<Json<ProductDetailResponse>, StatusCode> {
    let offers = state.repo.offers_for_product(&product_id).map_err(|e| {
        warn!("Offer lookup failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if offers.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    let product_name = offers
        .last()
        .map(|o| o.product_name.clone())
        .unwrap_or_else(|| product_id.clone());
    let margin = state.settings.chat.price_margin_pct;

    Ok(Json(ProductDetailResponse {
        product_name,
        offers: competitor_analysis(&offers),
        price_suggestion: price_suggestion(&product_id, &offers, margin),
        rating_summary: site_rating_summary(&offers),
        product_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub product_id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// POST /api/chat - grounded Q&A over one product's offers.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let Some(product_id) = request.product_id.filter(|id| !id.is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "product_id alanı gerekli."})),
        ));
    };

    let offers = state.repo.offers_for_product(&product_id).map_err(|e| {
        warn!("Offer lookup failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "store unavailable"})),
        )
    })?;

    let margin = state.settings.chat.price_margin_pct;
    let Some(context) = product_context(&product_id, &offers, margin) else {
        return Ok(Json(json!({
            "answer": "Bu ürün için henüz veri bulunamadı.",
            "cheapest": null,
            "best_rated": null,
            "fiyat_oneri": null,
        })));
    };

    // The configured generator answers; any failure degrades to the
    // deterministic responder instead of surfacing an error
    let answer = match state
        .generator
        .generate(&context, &request.question, &request.history)
        .await
    {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Text service failed, using rule-based fallback: {}", e);
            RuleBasedResponder
                .generate(&context, &request.question, &request.history)
                .await
                .unwrap_or_else(|_| "Şu anda cevap üretilemiyor.".to_string())
        }
    };

    Ok(Json(json!({
        "answer": answer,
        "cheapest": context.cheapest,
        "best_rated": context.best_rated,
        "fiyat_oneri": context.price_suggestion,
    })))
}
