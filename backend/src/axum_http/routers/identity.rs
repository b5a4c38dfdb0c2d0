use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::identity::IdentityUseCase,
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
        repositories::{
            identity::IdentityProvider, profiles::ProfileRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::identity::CredentialsRequest,
    },
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{profiles::ProfilePostgres, subscriptions::SubscriptionPostgres},
        },
        identity::supabase_auth::SupabaseAuthClient,
    },
};
use std::sync::Arc;
use tracing::info;

pub fn routes(db_pool: Arc<PgPoolSquad>, identity: Arc<SupabaseAuthClient>) -> Router {
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let profile_repository = ProfilePostgres::new(Arc::clone(&db_pool));
    let usecase = IdentityUseCase::new(
        identity,
        Arc::new(subscription_repository),
        Arc::new(profile_repository),
    );

    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/me", get(me))
        .with_state(Arc::new(usecase))
}

pub async fn sign_up<I, S, P>(
    State(usecase): State<Arc<IdentityUseCase<I, S, P>>>,
    Json(body): Json<CredentialsRequest>,
) -> impl IntoResponse
where
    I: IdentityProvider + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    match usecase.sign_up(&body.email, &body.password).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn sign_in<I, S, P>(
    State(usecase): State<Arc<IdentityUseCase<I, S, P>>>,
    Json(body): Json<CredentialsRequest>,
) -> impl IntoResponse
where
    I: IdentityProvider + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    match usecase.sign_in(&body.email, &body.password).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn sign_out<I, S, P>(
    State(usecase): State<Arc<IdentityUseCase<I, S, P>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    I: IdentityProvider + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    match usecase.sign_out(auth.user_id, &auth.access_token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn me<I, S, P>(
    State(usecase): State<Arc<IdentityUseCase<I, S, P>>>,
    AuthUser { user_id, email, .. }: AuthUser,
) -> impl IntoResponse
where
    I: IdentityProvider + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    info!(%user_id, "identity: session context requested");
    match usecase.session_context(user_id, email).await {
        Ok(context) => Json(context).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
