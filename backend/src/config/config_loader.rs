use std::str::FromStr;

use anyhow::{Context, Result};
use crates::generation::openai_client::DEFAULT_OPENAI_API_BASE;

use super::{
    config_model::{BackendServer, Database, DotEnvyConfig, OpenAi, Stripe, Supabase},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: parsed("SERVER_PORT_BACKEND")?,
        body_limit: parsed("SERVER_BODY_LIMIT")?,
        timeout: parsed("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS")
            .map(|raw| raw.parse())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?
            .unwrap_or(10),
    };

    let project_url = required("SUPABASE_PROJECT_URL")?;
    let supabase = Supabase {
        s3_endpoint: optional("SUPABASE_S3_ENDPOINT").unwrap_or_else(|| {
            format!("{}/storage/v1/s3", project_url.trim_end_matches('/'))
        }),
        s3_region: required("SUPABASE_S3_REGION")?,
        s3_access_key: required("SUPABASE_S3_ACCESS_KEY_ID")?,
        s3_secret_key: required("SUPABASE_S3_SECRET_ACCESS_KEY")?,
        emoji_bucket: optional("SUPABASE_EMOJI_BUCKET")
            .unwrap_or_else(|| "emoji_images".to_string()),
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
        anon_key: required("SUPABASE_ANON_KEY")?,
        project_url,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        success_url: required("STRIPE_SUCCESS_URL")?,
        cancel_url: required("STRIPE_CANCEL_URL")?,
        portal_return_url: required("STRIPE_PORTAL_RETURN_URL")?,
        pro_price_id: optional("STRIPE_PRO_PRICE_ID"),
        enterprise_price_id: optional("STRIPE_ENTERPRISE_PRICE_ID"),
    };

    let openai = OpenAi {
        api_base: optional("OPENAI_API_BASE")
            .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
        default_api_key: optional("OPENAI_API_KEY"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        stripe,
        openai,
        stage: get_stage(),
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

/// Only the JWT secret, for extractors that run outside router state.
pub fn get_supabase_jwt_secret() -> Result<String> {
    dotenvy::dotenv().ok();

    required("SUPABASE_JWT_SECRET")
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(key)?
        .parse()
        .with_context(|| format!("{key} is invalid"))
}
