use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::profiles::ProfileUseCase,
};
use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
};
use crates::{
    domain::{
        repositories::{generation::ImageGenerator, profiles::ProfileRepository},
        value_objects::profiles::{SetApiKeyRequest, SyncApiKeyRequest},
    },
    generation::openai_client::OpenAiImageClient,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::profiles::ProfilePostgres,
    },
};
use std::sync::Arc;

pub fn routes(db_pool: Arc<PgPoolSquad>, generator: Arc<OpenAiImageClient>) -> Router {
    let profile_repository = ProfilePostgres::new(Arc::clone(&db_pool));
    let usecase = ProfileUseCase::new(Arc::new(profile_repository), generator);

    Router::new()
        .route("/", get(get_profile))
        .route("/api-key", put(set_api_key).delete(clear_api_key))
        .route("/api-key/sync", post(sync_api_key))
        .with_state(Arc::new(usecase))
}

pub async fn get_profile<P, G>(
    State(usecase): State<Arc<ProfileUseCase<P, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: ProfileRepository + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    match usecase.get_profile(user_id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn set_api_key<P, G>(
    State(usecase): State<Arc<ProfileUseCase<P, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(body): Json<SetApiKeyRequest>,
) -> impl IntoResponse
where
    P: ProfileRepository + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    match usecase.set_api_key(user_id, &body.api_key).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn clear_api_key<P, G>(
    State(usecase): State<Arc<ProfileUseCase<P, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: ProfileRepository + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    match usecase.clear_api_key(user_id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn sync_api_key<P, G>(
    State(usecase): State<Arc<ProfileUseCase<P, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(body): Json<SyncApiKeyRequest>,
) -> impl IntoResponse
where
    P: ProfileRepository + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    match usecase.sync_api_key(user_id, body.api_key.as_deref()).await {
        Ok(synced) => Json(synced).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
