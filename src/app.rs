//! Application state: the signed-in user, the loaded catalog, per-user caches and the
//! current view, plus every user and admin action that changes them.
use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::backend::{AuthSession, AuthUser, Backend, AVATAR_BUCKET};
use crate::catalog;
use crate::config::AdminCredentials;
use crate::download::{DownloadKey, DownloadOutcome, DownloadRequest, DownloadState, Downloader, Progress};
use crate::error::{Error, Result};
use crate::models::{ContentId, ContentItem, User};
use crate::notice::{Notice, Notifier};
use crate::prefs::{LocalStore, Theme, SESSION_KEY};
use crate::rating::{merge_rating, Rating};
use crate::router::{guard_protected, Navigator, Role, Route, View};
use crate::upload::{ContentRecord, ContentUpload};
use crate::utils::credentials_match;

pub const VIDEO_UNAVAILABLE: &str = "Video content not available.";
const ADMIN_USER_ID: &str = "admin-id";
const ADMIN_EMAIL: &str = "admin@cinevault.app";

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// What the profile settings form submits. Empty strings count as "not provided".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub username: String,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
    pub avatar: Option<AvatarUpload>,
}

fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(new_password) = provided(&self.new_password) {
            if provided(&self.confirm_password) != Some(new_password) {
                return Err(Error::invalid("New passwords do not match."));
            }
            if provided(&self.current_password).is_none() {
                return Err(Error::invalid(
                    "Please enter your current password to set a new one.",
                ));
            }
        }
        Ok(())
    }
}

fn fallback_username(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or("New User")
        .to_string()
}

fn move_to_front(ids: &mut Vec<ContentId>, id: ContentId) {
    ids.retain(|existing| *existing != id);
    ids.insert(0, id);
}

/// A download bound to one catalog entry. Feed a `Downloaded` outcome back
/// through `App::record_download` with `content_id`.
pub struct PendingDownload {
    downloader: Arc<Downloader>,
    request: DownloadRequest,
}

impl PendingDownload {
    pub fn key(&self) -> &DownloadKey {
        &self.request.key
    }

    /// History is kept under the parent item for episodes.
    pub fn content_id(&self) -> ContentId {
        self.request.key.content_id()
    }

    pub async fn run<P>(self, on_progress: P) -> Result<DownloadOutcome>
    where
        P: FnMut(Progress) + Send,
    {
        self.downloader
            .download(self.request, on_progress, |_| {})
            .await
    }
}

pub struct App {
    backend: Backend,
    notifier: Arc<dyn Notifier>,
    local: LocalStore,
    downloader: Arc<Downloader>,
    admin: AdminCredentials,
    catalog: Vec<ContentItem>,
    user: Option<User>,
    role: Role,
    wishlist: HashSet<ContentId>,
    watch_history: Vec<ContentId>,
    download_history: Vec<ContentId>,
    theme: Theme,
    nav: Navigator,
    login_prompt: bool,
}

impl App {
    pub fn new(
        backend: Backend,
        notifier: Arc<dyn Notifier>,
        downloader: Arc<Downloader>,
        local: LocalStore,
        admin: AdminCredentials,
    ) -> Self {
        Self {
            backend,
            notifier,
            local,
            downloader,
            admin,
            catalog: Vec::new(),
            user: None,
            role: Role::Unauthenticated,
            wishlist: HashSet::new(),
            watch_history: Vec::new(),
            download_history: Vec::new(),
            theme: Theme::default(),
            nav: Navigator::default(),
            login_prompt: false,
        }
    }

    /// Load the theme, restore a persisted session if it is still valid, then the catalog.
    pub async fn start(&mut self) {
        self.theme = self.local.theme().await;
        if let Some(token) = self.local.get(SESSION_KEY).await {
            match self.backend.auth.restore(&token).await {
                Ok(session) => {
                    info!("Restored session for user {}", session.user.id);
                    self.activate(&session.user).await;
                }
                Err(e) => {
                    warn!("Stored session is no longer valid: {}", e);
                    if let Err(e) = self.local.remove(SESSION_KEY).await {
                        warn!("Failed to clear stored session: {}", e);
                    }
                }
            }
        }
        if let Err(e) = self.refresh_content().await {
            debug!("Starting with an empty catalog: {}", e);
        }
    }

    pub async fn refresh_content(&mut self) -> Result<()> {
        match self.backend.store.list_content().await {
            Ok(items) => {
                debug!("Loaded {} catalog items", items.len());
                self.catalog = items;
                Ok(())
            }
            Err(e) => {
                error!("Error fetching content: {}", e);
                self.notifier.notify(Notice::error("Failed to load content."));
                Err(e)
            }
        }
    }

    // --- accessors ---

    pub fn catalog(&self) -> &[ContentItem] {
        &self.catalog
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn view(&self) -> View {
        self.nav.view()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn is_wishlisted(&self, id: ContentId) -> bool {
        self.wishlist.contains(&id)
    }

    /// Set when a protected action or view was refused for lack of a session.
    pub fn login_prompt_visible(&self) -> bool {
        self.login_prompt
    }

    pub fn dismiss_login_prompt(&mut self) {
        self.login_prompt = false;
    }

    pub fn find(&self, id: ContentId) -> Result<&ContentItem> {
        self.catalog
            .iter()
            .find(|item| item.id() == id)
            .ok_or_else(|| Error::invalid(format!("unknown content id {}", id)))
    }

    // --- derived views ---

    pub fn selected_content(&self) -> Option<&ContentItem> {
        let id = self.nav.selected()?;
        self.catalog.iter().find(|item| item.id() == id)
    }

    pub fn editing_content(&self) -> Option<&ContentItem> {
        let id = self.nav.editing()?;
        self.catalog.iter().find(|item| item.id() == id)
    }

    /// Catalog order, not insertion order.
    pub fn wishlisted_content(&self) -> Vec<&ContentItem> {
        self.catalog
            .iter()
            .filter(|item| self.wishlist.contains(&item.id()))
            .collect()
    }

    pub fn watch_history(&self) -> Vec<&ContentItem> {
        self.resolve(&self.watch_history)
    }

    pub fn download_history(&self) -> Vec<&ContentItem> {
        self.resolve(&self.download_history)
    }

    pub fn recommendations(&self, limit: usize) -> Vec<&ContentItem> {
        catalog::recommendations(&self.catalog, &self.watch_history(), limit)
    }

    fn resolve(&self, ids: &[ContentId]) -> Vec<&ContentItem> {
        ids.iter()
            .filter_map(|id| self.catalog.iter().find(|item| item.id() == *id))
            .collect()
    }

    // --- accounts ---

    pub async fn login(&mut self, email: &str, password: &str) -> bool {
        match self.backend.auth.sign_in(email, password).await {
            Ok(session) => {
                self.begin_session(session).await;
                self.nav.land_on(View::Home);
                true
            }
            Err(e) => {
                error!("Login error: {}", e);
                false
            }
        }
    }

    pub async fn signup(&mut self, username: &str, email: &str, password: &str) -> bool {
        let (user, session) = match self.backend.auth.sign_up(email, password, username).await {
            Ok(created) => created,
            Err(e) => {
                error!("Signup error: {}", e);
                return false;
            }
        };
        if let Err(e) = self.backend.store.insert_profile(&user.id, username).await {
            error!("Profile creation error: {}", e);
            return false;
        }
        match session {
            Some(session) => self.begin_session(session).await,
            None => {
                info!("Account {} created; waiting for email confirmation", user.id);
                self.notifier
                    .notify(Notice::info("Check your email to confirm your account."));
            }
        }
        self.nav.land_on(View::Home);
        true
    }

    pub async fn admin_login(&mut self, username: &str, password: &str) -> bool {
        let user_ok = credentials_match(username, &self.admin.username);
        let pass_ok = credentials_match(password, &self.admin.password);
        if !(user_ok && pass_ok) {
            warn!("Rejected admin login for '{}'", username);
            return false;
        }
        info!("Admin signed in");
        self.user = Some(User {
            id: ADMIN_USER_ID.to_string(),
            email: Some(ADMIN_EMAIL.to_string()),
            username: "Admin".to_string(),
            profile_image_url: None,
        });
        self.role = Role::Admin;
        self.login_prompt = false;
        self.load_user_data().await;
        self.nav.land_on(View::AdminDashboard);
        true
    }

    pub async fn logout(&mut self) {
        if let Err(e) = self.backend.auth.sign_out().await {
            warn!("Sign out failed: {}", e);
        }
        if let Err(e) = self.local.remove(SESSION_KEY).await {
            warn!("Failed to clear stored session: {}", e);
        }
        self.user = None;
        self.role = Role::Unauthenticated;
        self.load_user_data().await;
        self.nav.go_home(self.role);
        info!("Signed out");
    }

    async fn begin_session(&mut self, session: AuthSession) {
        if let Err(e) = self.local.set(SESSION_KEY, &session.access_token).await {
            warn!("Failed to persist session: {}", e);
        }
        self.login_prompt = false;
        self.activate(&session.user).await;
    }

    async fn activate(&mut self, auth_user: &AuthUser) {
        let profile = match self.backend.store.fetch_profile(&auth_user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Failed to fetch profile for {}: {}", auth_user.id, e);
                None
            }
        };
        let (username, profile_image_url) = match profile {
            Some(p) => (p.username, p.profile_image_url),
            None => (fallback_username(auth_user.email.as_deref()), None),
        };
        self.user = Some(User {
            id: auth_user.id.clone(),
            email: auth_user.email.clone(),
            username,
            profile_image_url,
        });
        self.role = Role::User;
        self.load_user_data().await;
    }

    /// Rebuild the per-user caches. A list that fails to load keeps its previous value.
    pub async fn load_user_data(&mut self) {
        let Some(user_id) = self.user.as_ref().map(|u| u.id.clone()) else {
            self.wishlist.clear();
            self.watch_history.clear();
            self.download_history.clear();
            return;
        };
        let store = &self.backend.store;
        match store.list_wishlist(&user_id).await {
            Ok(ids) => self.wishlist = ids.into_iter().collect(),
            Err(e) => warn!("Failed to load wishlist: {}", e),
        }
        match store.list_watch_history(&user_id).await {
            Ok(ids) => self.watch_history = ids,
            Err(e) => warn!("Failed to load watch history: {}", e),
        }
        match store.list_download_history(&user_id).await {
            Ok(ids) => self.download_history = ids,
            Err(e) => warn!("Failed to load download history: {}", e),
        }
    }

    pub async fn update_profile(&mut self, update: ProfileUpdate) -> bool {
        let Some(user) = self.user.clone() else {
            self.login_prompt = true;
            return false;
        };
        if let Err(e) = update.validate() {
            self.notifier.notify(Notice::error(e.user_message()));
            return false;
        }

        if let Some(new_password) = provided(&update.new_password) {
            if let Err(e) = self.backend.auth.update_password(new_password).await {
                warn!("Password update failed for {}: {}", user.id, e);
                self.notifier.notify(Notice::error(format!(
                    "Failed to update password: {}",
                    e.user_message()
                )));
                return false;
            }
        }

        let mut profile_image_url = user.profile_image_url.clone();
        if let Some(avatar) = update.avatar {
            let path = format!("{}/{}", user.id, avatar.file_name);
            let uploaded = self
                .backend
                .storage
                .upload(AVATAR_BUCKET, &path, avatar.body, &avatar.content_type)
                .await;
            if let Err(e) = uploaded {
                error!("Image upload error: {}", e);
                self.notifier
                    .notify(Notice::error("Failed to upload new profile image."));
                return false;
            }
            profile_image_url = Some(self.backend.storage.public_url(AVATAR_BUCKET, &path));
        }

        let saved = self
            .backend
            .store
            .update_profile(&user.id, &update.username, profile_image_url.as_deref())
            .await;
        if let Err(e) = saved {
            error!("Profile update error: {}", e);
            self.notifier.notify(Notice::error("Failed to update profile."));
            return false;
        }

        match self.backend.store.fetch_profile(&user.id).await {
            Ok(Some(profile)) => {
                if let Some(current) = self.user.as_mut() {
                    current.username = profile.username;
                    current.profile_image_url = profile.profile_image_url;
                }
            }
            Ok(None) => warn!("Profile for {} vanished after update", user.id),
            Err(e) => warn!("Failed to re-read profile for {}: {}", user.id, e),
        }
        self.notifier
            .notify(Notice::info("Profile updated successfully!"));
        true
    }

    // --- protected actions ---

    fn protect(&mut self) -> Result<String> {
        if let Err(e) = guard_protected(self.role) {
            self.login_prompt = true;
            return Err(e);
        }
        self.user
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or(Error::AuthRequired)
    }

    /// Returns whether the item is wishlisted afterwards.
    pub async fn toggle_wishlist(&mut self, id: ContentId) -> Result<bool> {
        let user_id = self.protect()?;
        let store = &self.backend.store;
        let result = if self.wishlist.contains(&id) {
            store.remove_from_wishlist(&user_id, id).await
        } else {
            store.add_to_wishlist(&user_id, id).await
        };
        if let Err(e) = result {
            warn!("Wishlist update failed for {}: {}", id, e);
            self.notifier
                .notify(Notice::error("Failed to update wishlist."));
            return Err(e);
        }
        if !self.wishlist.remove(&id) {
            self.wishlist.insert(id);
        }
        Ok(self.wishlist.contains(&id))
    }

    pub async fn record_download(&mut self, id: ContentId) -> Result<()> {
        let Some(user_id) = self.user.as_ref().map(|u| u.id.clone()) else {
            debug!("No user; not recording download of {}", id);
            return Ok(());
        };
        if let Err(e) = self.backend.store.insert_download_history(&user_id, id).await {
            warn!("Failed to record download of {}: {}", id, e);
            return Err(e);
        }
        move_to_front(&mut self.download_history, id);
        Ok(())
    }

    pub async fn add_to_watch_history(&mut self, id: ContentId) -> Result<()> {
        let Some(user_id) = self.user.as_ref().map(|u| u.id.clone()) else {
            debug!("No user; not recording watch of {}", id);
            return Ok(());
        };
        let stored = self
            .backend
            .store
            .upsert_watch_history(&user_id, id, Utc::now())
            .await;
        if let Err(e) = stored {
            warn!("Failed to record watch of {}: {}", id, e);
            return Err(e);
        }
        move_to_front(&mut self.watch_history, id);
        Ok(())
    }

    /// Play a movie, or one episode of a show.
    pub async fn play_content(&mut self, id: ContentId, episode_id: Option<&str>) -> Result<()> {
        self.protect()?;
        let (url, title) = match self.find(id)? {
            ContentItem::Movie(m) => (m.file_url.clone(), m.info.title.clone()),
            ContentItem::Show(s) => {
                let episode_id = episode_id
                    .ok_or_else(|| Error::invalid("pick an episode to play"))?;
                let episode = s.episode(episode_id).ok_or_else(|| {
                    Error::invalid(format!("unknown episode '{}'", episode_id))
                })?;
                (episode.file_url.clone(), episode.title.clone())
            }
        };
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            self.notifier.notify(Notice::error(VIDEO_UNAVAILABLE));
            return Err(Error::invalid(VIDEO_UNAVAILABLE));
        };
        if let Err(e) = self.add_to_watch_history(id).await {
            debug!("Playing {} without a history entry: {}", id, e);
        }
        self.nav.play(url, title);
        Ok(())
    }

    fn download_request(&self, id: ContentId, episode_id: Option<&str>) -> Result<DownloadRequest> {
        let (key, url, file_name) = match self.find(id)? {
            ContentItem::Movie(m) => (
                DownloadKey::Movie(id),
                m.file_url.clone(),
                m.file_name.clone(),
            ),
            ContentItem::Show(s) => {
                let episode_id = episode_id
                    .ok_or_else(|| Error::invalid("pick an episode to download"))?;
                let episode = s.episode(episode_id).ok_or_else(|| {
                    Error::invalid(format!("unknown episode '{}'", episode_id))
                })?;
                (
                    DownloadKey::Episode {
                        content_id: id,
                        episode_id: episode.id.clone(),
                    },
                    episode.file_url.clone(),
                    episode.file_name.clone(),
                )
            }
        };
        match (url, file_name) {
            (Some(url), Some(file_name)) => Ok(DownloadRequest {
                key,
                url,
                file_name,
            }),
            _ => Err(Error::invalid(format!("{} has no downloadable file", key))),
        }
    }

    pub fn download_state(&self, id: ContentId, episode_id: Option<&str>) -> DownloadState {
        let key = match episode_id {
            Some(episode_id) => DownloadKey::Episode {
                content_id: id,
                episode_id: episode_id.to_string(),
            },
            None => DownloadKey::Movie(id),
        };
        self.downloader.state(&key)
    }

    /// Resolve a download against the catalog. The returned transfer does not
    /// borrow the app, so several can run while the app keeps handling input.
    pub fn prepare_download(
        &mut self,
        id: ContentId,
        episode_id: Option<&str>,
    ) -> Result<PendingDownload> {
        self.protect()?;
        let request = self.download_request(id, episode_id)?;
        Ok(PendingDownload {
            downloader: Arc::clone(&self.downloader),
            request,
        })
    }

    /// Download a movie, or one episode of a show, recording it in history once saved.
    pub async fn download_content<P>(
        &mut self,
        id: ContentId,
        episode_id: Option<&str>,
        on_progress: P,
    ) -> Result<DownloadOutcome>
    where
        P: FnMut(Progress) + Send,
    {
        let pending = self.prepare_download(id, episode_id)?;
        let content_id = pending.content_id();
        let outcome = pending.run(on_progress).await?;
        if let DownloadOutcome::Downloaded(_) = outcome {
            if let Err(e) = self.record_download(content_id).await {
                debug!("Download of {} kept out of history: {}", content_id, e);
            }
        }
        Ok(outcome)
    }

    /// Returns the new aggregate.
    pub async fn rate_content(&mut self, id: ContentId, value: i64) -> Result<f64> {
        let user_id = self.protect()?;
        let rating = Rating::new(value)?;
        let update = merge_rating(&self.find(id)?.info().ratings, &user_id, rating);
        let saved = self
            .backend
            .store
            .update_ratings(id, &update.ratings, update.aggregate)
            .await;
        if let Err(e) = saved {
            warn!("Failed to save rating for {}: {}", id, e);
            self.notifier.notify(Notice::error("Failed to save rating."));
            return Err(e);
        }
        info!(content = id, rating = rating.value(), aggregate = update.aggregate, "Rating saved");
        if let Err(e) = self.refresh_content().await {
            debug!("Catalog refresh after rating failed: {}", e);
        }
        Ok(update.aggregate)
    }

    // --- admin ---

    fn require_admin(&self) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    pub async fn save_content(
        &mut self,
        upload: ContentUpload,
        existing_id: Option<ContentId>,
    ) -> Result<()> {
        self.require_admin()?;
        if let Err(e) = upload.validate(existing_id.is_none()) {
            self.notifier.notify(Notice::error(e.user_message()));
            return Err(e);
        }
        let existing = existing_id.map(|id| self.find(id)).transpose()?;
        let record = ContentRecord::new(upload, existing, Utc::now());
        if let Err(e) = self.backend.store.upsert_content(&record).await {
            error!("Save content error: {}", e);
            self.notifier.notify(Notice::error("Failed to save content."));
            return Err(e);
        }
        info!("Saved '{}'", record.upload.title());
        if let Err(e) = self.refresh_content().await {
            debug!("Catalog refresh after save failed: {}", e);
        }
        self.nav.finish_edit();
        self.nav.land_on(View::AdminDashboard);
        Ok(())
    }

    pub async fn delete_content(&mut self, id: ContentId) -> Result<()> {
        self.require_admin()?;
        if let Err(e) = self.backend.store.delete_content(id).await {
            error!("Delete error: {}", e);
            self.notifier.notify(Notice::error("Failed to delete content."));
            return Err(e);
        }
        info!("Deleted content {}", id);
        if let Err(e) = self.refresh_content().await {
            debug!("Catalog refresh after delete failed: {}", e);
        }
        Ok(())
    }

    pub fn start_edit(&mut self, id: ContentId) -> Result<Route> {
        self.find(id)?;
        Ok(self.nav.start_edit(self.role, id))
    }

    // --- navigation ---

    pub fn change_view(&mut self, view: View) -> Route {
        let decision = self.nav.navigate(self.role, view);
        if decision == Route::AuthRequired {
            self.login_prompt = true;
        }
        decision
    }

    pub fn go_home(&mut self) -> View {
        self.nav.go_home(self.role)
    }

    pub fn select_content(&mut self, id: ContentId) {
        self.nav.select_content(id);
    }

    pub async fn toggle_theme(&mut self) -> Result<Theme> {
        self.theme = self.theme.toggled();
        if let Err(e) = self.local.set_theme(self.theme).await {
            warn!("Failed to persist theme: {}", e);
            return Err(e);
        }
        Ok(self.theme)
    }
}
