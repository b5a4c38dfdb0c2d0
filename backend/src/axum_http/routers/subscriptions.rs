use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::subscriptions::{StripeGateway, SubscriptionUseCase},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::{plans::PlanCatalog, subscriptions::CreateCheckoutRequest},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::subscriptions::SubscriptionPostgres,
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;
use tracing::info;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    catalog: Arc<PlanCatalog>,
) -> Router {
    let subscriptions_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase =
        SubscriptionUseCase::new(Arc::new(subscriptions_repository), stripe_client, catalog);

    Router::new()
        .route("/plans", get(list_plans))
        .route("/current", get(current_subscription))
        .route("/free", post(activate_free))
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
        .with_state(Arc::new(subscriptions_usecase))
}

pub async fn list_plans<S, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, Stripe>>>,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    Json(usecase.list_plans()).into_response()
}

pub async fn current_subscription<S, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, Stripe>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    match usecase.current(user_id).await {
        Ok(current) => Json(current).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn activate_free<S, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, Stripe>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    info!(%user_id, "subscriptions: free plan activation requested");
    match usecase.activate_free(user_id).await {
        Ok(subscription) => (StatusCode::CREATED, Json(subscription)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn create_checkout<S, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, Stripe>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(body): Json<CreateCheckoutRequest>,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    match usecase.create_checkout(user_id, &body.plan).await {
        Ok(session) => Json(session).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn create_portal<S, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, Stripe>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    match usecase.create_portal(user_id).await {
        Ok(portal) => Json(portal).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
