use crate::{
    auth::AuthUser,
    axum_http::error_responses::ApiError,
    usecases::emojis::EmojiUseCase,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            emojis::EmojiRepository, generation::ImageGenerator, profiles::ProfileRepository,
            storage::EmojiStorageClient, subscriptions::SubscriptionRepository,
        },
        value_objects::emojis::GenerateEmojiRequest,
    },
    generation::openai_client::OpenAiImageClient,
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                emojis::EmojiPostgres, profiles::ProfilePostgres,
                subscriptions::SubscriptionPostgres,
            },
        },
        storages::supabase_storage::SupabaseStorageClient,
    },
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    storage: Arc<SupabaseStorageClient>,
    generator: Arc<OpenAiImageClient>,
    default_api_key: Option<String>,
) -> Router {
    let usecase = EmojiUseCase::new(
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ProfilePostgres::new(Arc::clone(&db_pool))),
        Arc::new(EmojiPostgres::new(Arc::clone(&db_pool))),
        storage,
        generator,
        default_api_key,
    );

    Router::new()
        .route("/", get(list_emojis))
        .route("/generate", post(generate_emoji))
        .route("/:id", get(get_emoji).delete(delete_emoji))
        .with_state(Arc::new(usecase))
}

pub async fn generate_emoji<S, P, E, St, G>(
    State(usecase): State<Arc<EmojiUseCase<S, P, E, St, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(body): Json<GenerateEmojiRequest>,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
    E: EmojiRepository + Send + Sync + 'static,
    St: EmojiStorageClient + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    info!(%user_id, "emojis: generation request received");
    match usecase.generate(user_id, &body.description).await {
        Ok(generated) => (StatusCode::CREATED, Json(generated)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn list_emojis<S, P, E, St, G>(
    State(usecase): State<Arc<EmojiUseCase<S, P, E, St, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
    E: EmojiRepository + Send + Sync + 'static,
    St: EmojiStorageClient + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    match usecase.list_emojis(user_id).await {
        Ok(emojis) => Json(emojis).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn get_emoji<S, P, E, St, G>(
    State(usecase): State<Arc<EmojiUseCase<S, P, E, St, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(raw_id): Path<String>,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
    E: EmojiRepository + Send + Sync + 'static,
    St: EmojiStorageClient + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    let Ok(emoji_id) = Uuid::parse_str(&raw_id) else {
        return ApiError::bad_request("id must be a valid UUID").into_response();
    };

    match usecase.get_emoji(user_id, emoji_id).await {
        Ok(emoji) => Json(emoji).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn delete_emoji<S, P, E, St, G>(
    State(usecase): State<Arc<EmojiUseCase<S, P, E, St, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(raw_id): Path<String>,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
    E: EmojiRepository + Send + Sync + 'static,
    St: EmojiStorageClient + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    let Ok(emoji_id) = Uuid::parse_str(&raw_id) else {
        return ApiError::bad_request("id must be a valid UUID").into_response();
    };

    match usecase.delete_emoji(user_id, emoji_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
