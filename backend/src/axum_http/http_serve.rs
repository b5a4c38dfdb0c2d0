use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::value_objects::plans::PlanCatalog,
    generation::openai_client::OpenAiImageClient,
    infra::{
        db::postgres::postgres_connection::PgPoolSquad,
        identity::supabase_auth::SupabaseAuthClient,
        storages::supabase_storage::{SupabaseStorageClient, SupabaseStorageConfig},
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let catalog = Arc::new(PlanCatalog::new(
        config.stripe.pro_price_id.clone(),
        config.stripe.enterprise_price_id.clone(),
    ));

    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.success_url.clone(),
        config.stripe.cancel_url.clone(),
        config.stripe.portal_return_url.clone(),
    ));

    let storage = Arc::new(
        SupabaseStorageClient::new(SupabaseStorageConfig {
            project_url: config.supabase.project_url.clone(),
            endpoint: config.supabase.s3_endpoint.clone(),
            region: config.supabase.s3_region.clone(),
            bucket: config.supabase.emoji_bucket.clone(),
            access_key: config.supabase.s3_access_key.clone(),
            secret_key: config.supabase.s3_secret_key.clone(),
        })
        .await?,
    );
    info!(bucket = %config.supabase.emoji_bucket, "Supabase storage client has been built");

    let generator = Arc::new(OpenAiImageClient::new(config.openai.api_base.clone())?);
    let identity = Arc::new(SupabaseAuthClient::new(
        &config.supabase.project_url,
        config.supabase.anon_key.clone(),
    )?);

    let api = Router::new()
        .route("/health-check", get(default_routers::health_check))
        .merge(routers::identity::routes(Arc::clone(&db_pool), identity))
        .nest(
            "/profile",
            routers::profiles::routes(Arc::clone(&db_pool), Arc::clone(&generator)),
        )
        .nest(
            "/subscriptions",
            routers::subscriptions::routes(
                Arc::clone(&db_pool),
                Arc::clone(&stripe_client),
                Arc::clone(&catalog),
            ),
        )
        .nest(
            "/webhooks",
            routers::webhooks::routes(
                Arc::clone(&db_pool),
                Arc::clone(&stripe_client),
                Arc::clone(&catalog),
            ),
        )
        .nest(
            "/emojis",
            routers::emojis::routes(
                Arc::clone(&db_pool),
                storage,
                generator,
                config.openai.default_api_key.clone(),
            ),
        );

    let app = Router::new()
        .nest("/api/v1", api)
        .fallback(default_routers::not_found)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(stage = %config.stage, "Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
