//! In-memory collaborators for use-case tests that need state across calls.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use crates::domain::{
    entities::{
        emojis::{EmojiEntity, InsertEmojiEntity},
        profiles::ProfileEntity,
        subscriptions::{SubscriptionChangeset, SubscriptionEntity, UpsertSubscriptionEntity},
    },
    repositories::{
        emojis::EmojiRepository,
        generation::{GenerationFailure, ImageGenerator},
        profiles::ProfileRepository,
        storage::{EmojiStorageClient, StoredObject},
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{plan_tiers::PlanTier, subscription_statuses::SubscriptionStatus},
        generation::GeneratedImage,
    },
};
use uuid::Uuid;

pub fn subscription_row(user_id: Uuid, tier: PlanTier, credits_used: i32) -> SubscriptionEntity {
    let now = Utc::now();
    SubscriptionEntity {
        id: Uuid::new_v4(),
        user_id,
        plan: tier.to_string(),
        credits_used,
        current_period_start: now - Duration::days(1),
        current_period_end: now + Duration::days(29),
        status: SubscriptionStatus::Active.to_string(),
        cancel_at_period_end: false,
        stripe_customer_id: None,
        stripe_subscription_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct InMemorySubscriptions {
    rows: Mutex<HashMap<Uuid, SubscriptionEntity>>,
    fail_writes: bool,
}

impl InMemorySubscriptions {
    pub fn with(rows: Vec<SubscriptionEntity>) -> Self {
        Self {
            rows: Mutex::new(rows.into_iter().map(|row| (row.user_id, row)).collect()),
            fail_writes: false,
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn get(&self, user_id: Uuid) -> Option<SubscriptionEntity> {
        self.rows.lock().unwrap().get(&user_id).cloned()
    }

    fn write_guard(&self) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("database unavailable"));
        }
        Ok(())
    }
}

fn materialize(existing: Option<&SubscriptionEntity>, row: UpsertSubscriptionEntity) -> SubscriptionEntity {
    SubscriptionEntity {
        id: existing.map(|e| e.id).unwrap_or_else(Uuid::new_v4),
        user_id: row.user_id,
        plan: row.plan,
        credits_used: row.credits_used,
        current_period_start: row.current_period_start,
        current_period_end: row.current_period_end,
        status: row.status,
        cancel_at_period_end: row.cancel_at_period_end,
        stripe_customer_id: row.stripe_customer_id,
        stripe_subscription_id: row.stripe_subscription_id,
        created_at: existing.map(|e| e.created_at).unwrap_or(row.updated_at),
        updated_at: row.updated_at,
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        Ok(self.get(user_id))
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|row| row.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        self.write_guard()?;
        let mut rows = self.rows.lock().unwrap();
        let stored = rows
            .entry(subscription.user_id)
            .or_insert_with(|| materialize(None, subscription));
        Ok(stored.clone())
    }

    async fn upsert_by_user_id(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        self.write_guard()?;
        let mut rows = self.rows.lock().unwrap();
        let row = materialize(rows.get(&subscription.user_id), subscription);
        rows.insert(row.user_id, row.clone());
        Ok(row)
    }

    async fn update_credits_used(&self, user_id: Uuid, credits_used: i32) -> Result<()> {
        self.write_guard()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("no subscription row"))?;
        row.credits_used = credits_used;
        Ok(())
    }

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        changes: SubscriptionChangeset,
    ) -> Result<usize> {
        self.write_guard()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .values_mut()
            .find(|row| row.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
        else {
            return Ok(0);
        };

        if let Some(plan) = changes.plan {
            row.plan = plan;
        }
        if let Some(credits_used) = changes.credits_used {
            row.credits_used = credits_used;
        }
        if let Some(start) = changes.current_period_start {
            row.current_period_start = start;
        }
        if let Some(end) = changes.current_period_end {
            row.current_period_end = end;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(cancel) = changes.cancel_at_period_end {
            row.cancel_at_period_end = cancel;
        }
        if let Some(updated_at) = changes.updated_at {
            row.updated_at = updated_at;
        }
        Ok(1)
    }
}

#[derive(Default)]
pub struct InMemoryEmojis {
    rows: Mutex<Vec<EmojiEntity>>,
    fail_inserts: bool,
}

impl InMemoryEmojis {
    pub fn failing_inserts() -> Self {
        Self {
            fail_inserts: true,
            ..Default::default()
        }
    }

    pub fn all(&self) -> Vec<EmojiEntity> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmojiRepository for InMemoryEmojis {
    async fn insert(&self, emoji: InsertEmojiEntity) -> Result<EmojiEntity> {
        if self.fail_inserts {
            return Err(anyhow!("insert failed"));
        }
        let entity = EmojiEntity {
            id: Uuid::new_v4(),
            user_id: emoji.user_id,
            description: emoji.description,
            image_url: emoji.image_url,
            storage_path: emoji.storage_path,
            revised_prompt: emoji.revised_prompt,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(entity.clone());
        Ok(entity)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<EmojiEntity>> {
        let mut rows: Vec<_> = self
            .all()
            .into_iter()
            .filter(|row| row.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_for_user(&self, emoji_id: Uuid, user_id: Uuid) -> Result<Option<EmojiEntity>> {
        Ok(self
            .all()
            .into_iter()
            .find(|row| row.id == emoji_id && row.user_id == user_id))
    }

    async fn delete(&self, emoji_id: Uuid) -> Result<()> {
        self.rows.lock().unwrap().retain(|row| row.id != emoji_id);
        Ok(())
    }
}

const STORAGE_PUBLIC_BASE: &str = "https://cdn.test/";

#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: bool,
}

impl InMemoryStorage {
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Default::default()
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Resolves a public URL handed out by `upload_emoji` back to the stored bytes.
    pub fn fetch(&self, public_url: &str) -> Option<Vec<u8>> {
        public_url
            .strip_prefix(STORAGE_PUBLIC_BASE)
            .and_then(|key| self.object(key))
    }
}

#[async_trait]
impl EmojiStorageClient for InMemoryStorage {
    async fn upload_emoji(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredObject> {
        if self.fail_uploads {
            return Err(anyhow!("storage unavailable"));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(object_key.to_string(), bytes);
        Ok(StoredObject {
            object_key: object_key.to_string(),
            public_url: format!("{STORAGE_PUBLIC_BASE}{object_key}"),
        })
    }

    async fn delete_object(&self, object_key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(object_key);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProfiles {
    rows: Mutex<HashMap<Uuid, ProfileEntity>>,
}

impl InMemoryProfiles {
    pub fn with_key(user_id: Uuid, api_key: &str) -> Self {
        let now = Utc::now();
        let profile = ProfileEntity {
            id: user_id,
            generation_api_key: Some(api_key.to_string()),
            created_at: now,
            updated_at: now,
        };
        Self {
            rows: Mutex::new(HashMap::from([(user_id, profile)])),
        }
    }

    pub fn key_of(&self, user_id: Uuid) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&user_id)
            .and_then(|row| row.generation_api_key.clone())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfiles {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<ProfileEntity>> {
        Ok(self.rows.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert_api_key(&self, user_id: Uuid, api_key: Option<String>) -> Result<ProfileEntity> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(user_id).or_insert_with(|| ProfileEntity {
            id: user_id,
            generation_api_key: None,
            created_at: now,
            updated_at: now,
        });
        row.generation_api_key = api_key;
        row.updated_at = now;
        Ok(row.clone())
    }
}

/// Generator returning a fixed image or failure and counting calls.
pub struct StubGenerator {
    pub outcome: Result<GeneratedImage, GenerationFailure>,
    pub calls: AtomicUsize,
}

impl StubGenerator {
    pub fn succeeding(bytes: &[u8]) -> Self {
        Self {
            outcome: Ok(GeneratedImage {
                bytes: bytes.to_vec(),
                content_type: "image/png".to_string(),
                revised_prompt: Some("a revised prompt".to_string()),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(failure: GenerationFailure) -> Self {
        Self {
            outcome: Err(failure),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate_emoji(
        &self,
        _api_key: &str,
        _description: &str,
    ) -> std::result::Result<GeneratedImage, GenerationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    async fn validate_api_key(&self, api_key: &str) -> Result<bool> {
        Ok(api_key.starts_with("sk-"))
    }
}
