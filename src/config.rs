use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const REQUIRED_ENV: [&str; 4] = [
    "SUPABASE_URL",
    "SUPABASE_ANON_KEY",
    "ADMIN_USERNAME",
    "ADMIN_PASSWORD",
];

const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
const DEFAULT_STATE_FILE: &str = "cinevault-state.json";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub admin: AdminCredentials,
    pub download_dir: PathBuf,
    pub state_file: PathBuf,
}

fn required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{} must be set", key))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let backend = BackendConfig {
            url: required("SUPABASE_URL")?,
            anon_key: required("SUPABASE_ANON_KEY")?,
        };
        let admin = AdminCredentials {
            username: required("ADMIN_USERNAME")?,
            password: required("ADMIN_PASSWORD")?,
        };
        let download_dir = env::var("CINEVAULT_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DOWNLOAD_DIR));
        let state_file = env::var("CINEVAULT_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_FILE));
        Ok(Self {
            backend,
            admin,
            download_dir,
            state_file,
        })
    }
}
