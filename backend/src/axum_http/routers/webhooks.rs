use crate::{
    axum_http::error_responses::ApiError,
    usecases::subscriptions::{StripeGateway, SubscriptionUseCase},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::{repositories::subscriptions::SubscriptionRepository, value_objects::plans::PlanCatalog},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::subscriptions::SubscriptionPostgres,
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use std::sync::Arc;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    catalog: Arc<PlanCatalog>,
) -> Router {
    let subscriptions_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let usecase =
        SubscriptionUseCase::new(Arc::new(subscriptions_repository), stripe_client, catalog);

    Router::new()
        .route("/stripe", post(stripe_webhook))
        .with_state(Arc::new(usecase))
}

/// Raw body is required: the signature covers the exact bytes Stripe sent.
pub async fn stripe_webhook<S, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, Stripe>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle_webhook(&body, signature).await {
        Ok(_) => Json(json!({ "received": true })).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
