use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{AuthService, AuthSession, AuthUser, CatalogStore, ObjectStorage};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::models::{ContentId, ContentItem, Profile, RatingEntry};
use crate::upload::ContentRecord;

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";
const PREFER_MINIMAL: &str = "return=minimal";

/// REST client for a Supabase project: PostgREST rows, GoTrue auth and storage.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
}

#[derive(Deserialize)]
struct ContentIdRow {
    content_id: ContentId,
}

impl SupabaseClient {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let user_agent = format!("cinevault/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
        })
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn object_path(bucket: &str, path: &str) -> String {
        let encoded = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", urlencoding::encode(bucket), encoded)
    }

    /// Attach the project key and the user's token (or the anon key when signed out).
    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = match self.session.read().await.as_ref() {
            Some(s) => s.access_token.clone(),
            None => self.anon_key.clone(),
        };
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let res = builder
            .send()
            .await
            .map_err(|e| Error::backend(format!("{} request failed: {}", what, e)))?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(Error::backend(format!(
            "{} failed (status {}): {}",
            what,
            status,
            backend_message(&body)
        )))
    }

    async fn json<T: DeserializeOwned>(res: Response, what: &str) -> Result<T> {
        let bytes = res
            .bytes()
            .await
            .map_err(|e| Error::backend(format!("failed to read {} body: {}", what, e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::backend(format!("failed to parse {} JSON: {}", what, e)))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<Vec<T>> {
        let builder = self
            .request(Method::GET, &self.rest_url(table))
            .await
            .query(query);
        let res = self.send(builder, what).await?;
        Self::json(res, what).await
    }

    async fn content_ids(
        &self,
        table: &str,
        user_id: &str,
        order: Option<&str>,
    ) -> Result<Vec<ContentId>> {
        let mut query = vec![
            ("select", "content_id".to_string()),
            ("user_id", format!("eq.{}", user_id)),
        ];
        if let Some(column) = order {
            query.push(("order", format!("{}.desc", column)));
        }
        let rows: Vec<ContentIdRow> = self.select(table, &query, table).await?;
        Ok(rows.into_iter().map(|r| r.content_id).collect())
    }

    async fn insert(&self, table: &str, row: Value, prefer: &str, query: &[(&str, String)]) -> Result<()> {
        let builder = self
            .request(Method::POST, &self.rest_url(table))
            .await
            .header("Prefer", prefer)
            .query(query)
            .json(&row);
        self.send(builder, table).await.map(|_| ())
    }

    async fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().await = session;
    }
}

/// GoTrue and PostgREST report errors under a few different keys.
fn backend_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        })
        .map(|s| s.to_string())
        .unwrap_or_else(|| body.to_string())
}

fn session_from_value(value: &Value) -> Option<AuthSession> {
    let access_token = value.get("access_token")?.as_str()?.to_string();
    let user: AuthUser = serde_json::from_value(value.get("user")?.clone()).ok()?;
    Some(AuthSession { access_token, user })
}

#[async_trait]
impl CatalogStore for SupabaseClient {
    async fn list_content(&self) -> Result<Vec<ContentItem>> {
        let query = [
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        let items: Vec<ContentItem> = self.select("content", &query, "content").await?;
        debug!("Fetched {} content rows", items.len());
        Ok(items)
    }

    async fn upsert_content(&self, record: &ContentRecord) -> Result<()> {
        let row = serde_json::to_value(record)
            .map_err(|e| Error::backend(format!("failed to encode content: {}", e)))?;
        self.insert("content", row, PREFER_UPSERT, &[]).await
    }

    async fn delete_content(&self, id: ContentId) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &self.rest_url("content"))
            .await
            .query(&[("id", format!("eq.{}", id))]);
        self.send(builder, "content delete").await.map(|_| ())
    }

    async fn update_ratings(
        &self,
        id: ContentId,
        ratings: &[RatingEntry],
        aggregate: f64,
    ) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &self.rest_url("content"))
            .await
            .header("Prefer", PREFER_MINIMAL)
            .query(&[("id", format!("eq.{}", id))])
            .json(&json!({ "ratings": ratings, "rating": aggregate }));
        self.send(builder, "rating update").await.map(|_| ())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let query = [
            ("select", "username,profile_image_url".to_string()),
            ("id", format!("eq.{}", user_id)),
        ];
        let rows: Vec<Profile> = self.select("profiles", &query, "profile").await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, user_id: &str, username: &str) -> Result<()> {
        self.insert(
            "profiles",
            json!({ "id": user_id, "username": username }),
            PREFER_MINIMAL,
            &[],
        )
        .await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        username: &str,
        profile_image_url: Option<&str>,
    ) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &self.rest_url("profiles"))
            .await
            .header("Prefer", PREFER_MINIMAL)
            .query(&[("id", format!("eq.{}", user_id))])
            .json(&json!({ "username": username, "profile_image_url": profile_image_url }));
        self.send(builder, "profile update").await.map(|_| ())
    }

    async fn list_wishlist(&self, user_id: &str) -> Result<Vec<ContentId>> {
        self.content_ids("wishlist", user_id, None).await
    }

    async fn add_to_wishlist(&self, user_id: &str, content_id: ContentId) -> Result<()> {
        self.insert(
            "wishlist",
            json!({ "user_id": user_id, "content_id": content_id }),
            PREFER_MINIMAL,
            &[],
        )
        .await
    }

    async fn remove_from_wishlist(&self, user_id: &str, content_id: ContentId) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &self.rest_url("wishlist"))
            .await
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("content_id", format!("eq.{}", content_id)),
            ]);
        self.send(builder, "wishlist delete").await.map(|_| ())
    }

    async fn list_watch_history(&self, user_id: &str) -> Result<Vec<ContentId>> {
        self.content_ids("watch_history", user_id, Some("watched_at"))
            .await
    }

    async fn upsert_watch_history(
        &self,
        user_id: &str,
        content_id: ContentId,
        watched_at: DateTime<Utc>,
    ) -> Result<()> {
        self.insert(
            "watch_history",
            json!({
                "user_id": user_id,
                "content_id": content_id,
                "watched_at": watched_at.to_rfc3339(),
            }),
            PREFER_UPSERT,
            &[("on_conflict", "user_id,content_id".to_string())],
        )
        .await
    }

    async fn list_download_history(&self, user_id: &str) -> Result<Vec<ContentId>> {
        self.content_ids("download_history", user_id, Some("downloaded_at"))
            .await
    }

    async fn insert_download_history(&self, user_id: &str, content_id: ContentId) -> Result<()> {
        self.insert(
            "download_history",
            json!({ "user_id": user_id, "content_id": content_id }),
            PREFER_MINIMAL,
            &[],
        )
        .await
    }
}

#[async_trait]
impl AuthService for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let builder = self
            .client
            .post(self.auth_url("token"))
            .header("apikey", &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let res = self.send(builder, "sign-in").await?;
        let body: Value = Self::json(res, "sign-in").await?;
        let session = session_from_value(&body)
            .ok_or_else(|| Error::backend("sign-in response carried no session"))?;
        info!("Signed in user {}", session.user.id);
        self.set_session(Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<(AuthUser, Option<AuthSession>)> {
        let builder = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username }
            }));
        let res = self.send(builder, "sign-up").await?;
        let body: Value = Self::json(res, "sign-up").await?;

        // Auto-confirmed projects answer with a session, others with the bare user.
        if let Some(session) = session_from_value(&body) {
            self.set_session(Some(session.clone())).await;
            return Ok((session.user.clone(), Some(session)));
        }
        let user: AuthUser = serde_json::from_value(body.get("user").cloned().unwrap_or(body))
            .map_err(|e| Error::backend(format!("sign-up response carried no user: {}", e)))?;
        Ok((user, None))
    }

    async fn restore(&self, access_token: &str) -> Result<AuthSession> {
        let builder = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        let res = self.send(builder, "session restore").await?;
        let user: AuthUser = Self::json(res, "session restore").await?;
        let session = AuthSession {
            access_token: access_token.to_string(),
            user,
        };
        self.set_session(Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let builder = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token);
        self.send(builder, "sign-out").await.map(|_| ())
    }

    async fn update_password(&self, new_password: &str) -> Result<()> {
        if self.session.read().await.is_none() {
            return Err(Error::backend("not signed in"));
        }
        let builder = self
            .request(Method::PUT, &self.auth_url("user"))
            .await
            .json(&json!({ "password": new_password }));
        self.send(builder, "password update").await.map(|_| ())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}",
            self.base_url,
            Self::object_path(bucket, path)
        );
        let builder = self
            .request(Method::POST, &url)
            .await
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        self.send(builder, "storage upload").await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}",
            self.base_url,
            Self::object_path(bucket, path)
        )
    }
}
