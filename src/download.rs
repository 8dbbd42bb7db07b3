use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::ContentId;
use crate::notice::{Notice, Notifier};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
pub const DOWNLOAD_FAILED: &str = "Download failed. Please try again.";

/// Finite, non-restartable sequence of body chunks.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

pub struct RemoteFile {
    /// Advertised `Content-Length`, if any.
    pub total_size: Option<u64>,
    pub chunks: ChunkStream,
}

#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn open(&self, url: &str) -> Result<RemoteFile>;
}

/// The platform's "save this file locally" step.
#[async_trait]
pub trait FileSaver: Send + Sync {
    async fn save(&self, file_name: &str, body: Bytes) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let user_agent = format!("cinevault/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn open(&self, url: &str) -> Result<RemoteFile> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(format!("request to {} failed: {}", url, e)))?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::network(format!("HTTP error! status: {}", status)));
        }
        let total_size = res.content_length();
        let chunks = res
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::network(format!("stream error: {}", e))))
            .boxed();
        Ok(RemoteFile { total_size, chunks })
    }
}

/// Writes finished downloads into a fixed directory.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl FileSaver for DirectorySaver {
    async fn save(&self, file_name: &str, body: Bytes) -> Result<PathBuf> {
        // Only the final path component is honoured; a name like "../x" must not escape.
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| Error::invalid(format!("unusable file name '{}'", file_name)))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(Error::Save)?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, &body).await.map_err(Error::Save)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DownloadKey {
    Movie(ContentId),
    Episode {
        content_id: ContentId,
        episode_id: String,
    },
}

impl DownloadKey {
    pub fn content_id(&self) -> ContentId {
        match self {
            DownloadKey::Movie(id) => *id,
            DownloadKey::Episode { content_id, .. } => *content_id,
        }
    }
}

impl fmt::Display for DownloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadKey::Movie(id) => write!(f, "movie {}", id),
            DownloadKey::Episode {
                content_id,
                episode_id,
            } => write!(f, "show {} episode {}", content_id, episode_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub key: DownloadKey,
    pub url: String,
    pub file_name: String,
}

impl DownloadRequest {
    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::invalid("download URL is empty"));
        }
        if self.file_name.trim().is_empty() {
            return Err(Error::invalid("download file name is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading,
    Downloaded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Share of the advertised size, rounded to a whole percent.
    Percent(u32),
    /// Received so far when no size was advertised.
    Megabytes(f64),
}

impl Progress {
    pub fn from_counts(received: u64, total: Option<u64>) -> Self {
        match total.filter(|t| *t > 0) {
            Some(total) => Progress::Percent((received as f64 / total as f64 * 100.0).round() as u32),
            None => Progress::Megabytes(received as f64 / BYTES_PER_MB),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Percent(p) => write!(f, "{}%", p),
            Progress::Megabytes(mb) => write!(f, "{:.1} MB", mb),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    /// Nothing was done: the key was already downloading or done.
    Suppressed(DownloadState),
}

/// Streams remote files with per-chunk progress. At most one transfer per key is
/// in flight; distinct keys are independent.
pub struct Downloader {
    source: Arc<dyn ByteSource>,
    saver: Arc<dyn FileSaver>,
    notifier: Arc<dyn Notifier>,
    states: Mutex<HashMap<DownloadKey, DownloadState>>,
}

impl Downloader {
    pub fn new(
        source: Arc<dyn ByteSource>,
        saver: Arc<dyn FileSaver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            saver,
            notifier,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, key: &DownloadKey) -> DownloadState {
        self.table().get(key).copied().unwrap_or_default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<DownloadKey, DownloadState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claims `key` for a transfer, or reports why it is busy.
    fn claim(&self, key: &DownloadKey) -> std::result::Result<InFlight<'_>, DownloadState> {
        let mut states = self.table();
        match states.get(key).copied().unwrap_or_default() {
            DownloadState::Idle => {
                states.insert(key.clone(), DownloadState::Downloading);
                Ok(InFlight {
                    downloader: self,
                    key: key.clone(),
                    done: false,
                })
            }
            busy => Err(busy),
        }
    }

    pub async fn download<P, C>(
        &self,
        request: DownloadRequest,
        mut on_progress: P,
        on_complete: C,
    ) -> Result<DownloadOutcome>
    where
        P: FnMut(Progress) + Send,
        C: FnOnce(&DownloadKey) + Send,
    {
        request.validate()?;

        let mut in_flight = match self.claim(&request.key) {
            Ok(in_flight) => in_flight,
            Err(busy) => {
                debug!(key = %request.key, state = ?busy, "Ignoring repeated download request");
                return Ok(DownloadOutcome::Suppressed(busy));
            }
        };

        info!("Starting download of {} from {}", request.key, request.url);
        match self.transfer(&request, &mut on_progress).await {
            Ok(path) => {
                in_flight.finish();
                info!("Saved {} to {:?}", request.key, path);
                on_complete(&request.key);
                Ok(DownloadOutcome::Downloaded(path))
            }
            Err(e) => {
                drop(in_flight);
                warn!("Download failed for {}: {}", request.key, e);
                self.notifier.notify(Notice::error(DOWNLOAD_FAILED));
                Err(e)
            }
        }
    }

    async fn transfer<P>(&self, request: &DownloadRequest, on_progress: &mut P) -> Result<PathBuf>
    where
        P: FnMut(Progress) + Send,
    {
        let RemoteFile {
            total_size,
            mut chunks,
        } = self.source.open(&request.url).await?;

        let mut parts: Vec<Bytes> = Vec::new();
        let mut received: u64 = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            parts.push(chunk);
            on_progress(Progress::from_counts(received, total_size));
        }

        let mut body = BytesMut::with_capacity(received as usize);
        for part in &parts {
            body.extend_from_slice(part);
        }
        self.saver.save(&request.file_name, body.freeze()).await
    }
}

/// A claimed key. Dropping it before `finish` (failure, or the future being
/// dropped mid-transfer) returns the key to idle.
struct InFlight<'a> {
    downloader: &'a Downloader,
    key: DownloadKey,
    done: bool,
}

impl InFlight<'_> {
    fn finish(&mut self) {
        self.downloader
            .table()
            .insert(self.key.clone(), DownloadState::Downloaded);
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.downloader.table().remove(&self.key);
        }
    }
}
