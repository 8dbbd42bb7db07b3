use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ContentId, ContentItem, Profile, RatingEntry};
use crate::upload::ContentRecord;

mod supabase;

pub use supabase::SupabaseClient;

pub const AVATAR_BUCKET: &str = "avatars";

/// The three backend seams the application talks to.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn CatalogStore>,
    pub auth: Arc<dyn AuthService>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Backend {
    pub fn supabase(client: Arc<SupabaseClient>) -> Self {
        Self {
            store: client.clone(),
            auth: client.clone(),
            storage: client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// Row storage: catalog content, profiles and the per-user lists.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Newest first.
    async fn list_content(&self) -> Result<Vec<ContentItem>>;
    async fn upsert_content(&self, record: &ContentRecord) -> Result<()>;
    async fn delete_content(&self, id: ContentId) -> Result<()>;
    /// Writes both columns in one request so they never diverge.
    async fn update_ratings(
        &self,
        id: ContentId,
        ratings: &[RatingEntry],
        aggregate: f64,
    ) -> Result<()>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>>;
    async fn insert_profile(&self, user_id: &str, username: &str) -> Result<()>;
    async fn update_profile(
        &self,
        user_id: &str,
        username: &str,
        profile_image_url: Option<&str>,
    ) -> Result<()>;

    async fn list_wishlist(&self, user_id: &str) -> Result<Vec<ContentId>>;
    async fn add_to_wishlist(&self, user_id: &str, content_id: ContentId) -> Result<()>;
    async fn remove_from_wishlist(&self, user_id: &str, content_id: ContentId) -> Result<()>;

    /// Most recently watched first.
    async fn list_watch_history(&self, user_id: &str) -> Result<Vec<ContentId>>;
    async fn upsert_watch_history(
        &self,
        user_id: &str,
        content_id: ContentId,
        watched_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Most recently downloaded first.
    async fn list_download_history(&self, user_id: &str) -> Result<Vec<ContentId>>;
    async fn insert_download_history(&self, user_id: &str, content_id: ContentId) -> Result<()>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;
    /// Returns the new user; a session is only issued when the backend auto-confirms.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<(AuthUser, Option<AuthSession>)>;
    /// Re-validate a persisted access token.
    async fn restore(&self, access_token: &str) -> Result<AuthSession>;
    async fn sign_out(&self) -> Result<()>;
    async fn update_password(&self, new_password: &str) -> Result<()>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, body: Bytes, content_type: &str)
        -> Result<()>;
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
