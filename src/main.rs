use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use cinevault::app::App;
use cinevault::backend::{Backend, SupabaseClient};
use cinevault::catalog;
use cinevault::config::{Config, REQUIRED_ENV};
use cinevault::download::{DirectorySaver, DownloadOutcome, Downloader, HttpSource};
use cinevault::models::{ContentId, ContentItem};
use cinevault::notice::{Notifier, TracingNotifier};
use cinevault::prefs::{LocalStore, Theme};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cinevault", about = "Headless client for a CineVault catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists every catalog item, newest first.
    Catalog,

    /// Lists items whose title contains the query.
    Search { query: String },

    /// Shows dashboard statistics for the catalog.
    Stats,

    /// Shows the theme, or sets it when one is given.
    Theme { theme: Option<Theme> },

    /// Signs in and remembers the session for later commands.
    Login { email: String, password: String },

    /// Signs out and forgets the stored session.
    Logout,

    /// Downloads a movie, or one episode of a show.
    Download {
        content_id: ContentId,
        episode_id: Option<String>,
    },

    /// Rates an item from 1 to 10.
    Rate { content_id: ContentId, rating: i64 },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn report_env(loaded: &dotenvy::Result<PathBuf>) {
    match loaded {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
}

fn check_env() -> Result<()> {
    for key in REQUIRED_ENV {
        if env::var(key).is_err() {
            anyhow::bail!("Missing required environment variable: {}", key);
        }
    }
    info!("All required environment variables are set");
    Ok(())
}

fn print_item(item: &ContentItem, user_id: Option<&str>) {
    let info = item.info();
    let (aggregate, own) = catalog::rating_summary(item, user_id);
    let own = own.map(|r| format!(" (you: {})", r)).unwrap_or_default();
    println!(
        "{:>5}  {:<5}  {:<40}  {:>4.1}{}  {}",
        info.id,
        item.kind(),
        info.title,
        aggregate,
        own,
        info.genres.join(", ")
    );
}

async fn build_app(config: &Config) -> Result<App> {
    let client = Arc::new(SupabaseClient::new(&config.backend)?);
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let source = Arc::new(HttpSource::new().context("failed to set up downloads")?);
    let saver = Arc::new(DirectorySaver::new(config.download_dir.clone()));
    let downloader = Arc::new(Downloader::new(source, saver, notifier.clone()));
    let mut app = App::new(
        Backend::supabase(client),
        notifier,
        downloader,
        LocalStore::new(config.state_file.clone()),
        config.admin.clone(),
    );
    app.start().await;
    Ok(app)
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let mut app = build_app(config).await?;
    let user_id = app.user().map(|u| u.id.clone());
    match command {
        Command::Catalog => {
            for item in app.catalog() {
                print_item(item, user_id.as_deref());
            }
        }
        Command::Search { query } => {
            let hits = catalog::search(app.catalog(), &query);
            info!("{} result(s) for '{}'", hits.len(), query);
            for item in hits {
                print_item(item, user_id.as_deref());
            }
        }
        Command::Stats => {
            let items = app.catalog();
            let stats = catalog::dashboard_stats(items);
            println!("Total content:  {}", stats.total_content);
            println!("Storage used:   {:.2} GB", stats.storage_gb);
            println!("Average rating: {:.1}", stats.average_rating);
            for (genre, count) in catalog::genre_breakdown(items) {
                println!("  {:<20} {}", genre, count);
            }
            let months = catalog::monthly_uploads(items, Utc::now().year());
            println!("Uploads this year by month: {:?}", months);
        }
        Command::Theme { theme: None } => println!("{}", app.theme()),
        Command::Theme { theme: Some(theme) } => {
            if app.theme() != theme {
                app.toggle_theme().await?;
            }
            println!("{}", app.theme());
        }
        Command::Login { email, password } => {
            if !app.login(&email, &password).await {
                anyhow::bail!("Invalid email or password.");
            }
            if let Some(user) = app.user() {
                info!("Signed in as {}", user.username);
            }
        }
        Command::Logout => app.logout().await,
        Command::Download {
            content_id,
            episode_id,
        } => {
            let outcome = app
                .download_content(content_id, episode_id.as_deref(), |progress| {
                    info!("Downloading... ({})", progress)
                })
                .await?;
            match outcome {
                DownloadOutcome::Downloaded(path) => println!("Saved to {}", path.display()),
                DownloadOutcome::Suppressed(state) => {
                    warn!("Download skipped, already {:?}", state)
                }
            }
        }
        Command::Rate { content_id, rating } => {
            let aggregate = app.rate_content(content_id, rating).await?;
            println!("New rating: {:.1}", aggregate);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG may come from .env.
    let loaded = dotenv();
    init_tracing();
    report_env(&loaded);
    let cli = Cli::parse();
    check_env()?;
    let config = Config::from_env()?;
    run(cli.command, &config).await
}
