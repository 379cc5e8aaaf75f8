use async_trait::async_trait;

use crate::application::error::ApplicationError;

pub const FILES_DOCUMENT: &str = "files.json";
pub const USERS_DOCUMENT: &str = "users.json";

/// Whole-document persistence for the metadata and account tables.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document has never been written.
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ApplicationError>;
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<(), ApplicationError>;
}
