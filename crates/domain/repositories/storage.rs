use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub object_key: String,
    pub public_url: String,
}

#[automock]
#[async_trait]
pub trait EmojiStorageClient {
    async fn upload_emoji(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject>;

    async fn delete_object(&self, object_key: &str) -> Result<()>;
}
