//! starforge CLI — operator interface to the artwork pipeline.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use starforge::api::{self, AppState};
use starforge::backend::HttpBackend;
use starforge::broadcast::Broadcaster;
use starforge::config::Config;
use starforge::db::Db;
use starforge::queue::{ArtQueue, QueueConfig};
use starforge::storage::ArtStore;
use starforge::telemetry::{TelemetryConfig, init_telemetry};
use starforge::worker::{WorkerConfig, WorkerPool};

/// How often the startup readiness check probes the generation backend.
const READINESS_PROBE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "starforge", about = "Satellite signature artwork pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and worker pool
    Serve {
        /// Override the configured HTTP port
        #[arg(long)]
        port: Option<u16>,
        /// Override the configured worker concurrency
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Queue operations
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Gallery operations
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Show waiting/active counts
    Counts,
}

#[derive(Subcommand)]
enum GalleryAction {
    /// List stored artworks
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// Filter by satellite name
        #[arg(long)]
        satellite: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, concurrency } => cmd_serve(port, concurrency).await,
        Command::Queue { action } => {
            let (_db, queue) = connect(&Config::from_env()?).await?;
            match action {
                QueueAction::Counts => {
                    let counts = queue.counts().await?;
                    println!("waiting: {}", counts.waiting);
                    println!("active:  {}", counts.active);
                    Ok(())
                }
            }
        }
        Command::Gallery { action } => {
            let (db, _queue) = connect(&Config::from_env()?).await?;
            match action {
                GalleryAction::List {
                    page,
                    limit,
                    satellite,
                } => cmd_gallery_list(&db, page, limit, satellite).await,
            }
        }
    }
}

async fn connect(config: &Config) -> anyhow::Result<(Arc<Db>, ArtQueue)> {
    let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
    db.migrate().await?;
    let queue = ArtQueue::new(
        Arc::clone(&db),
        QueueConfig {
            visibility_timeout_secs: config.visibility_timeout_secs,
            max_attempts: config.max_attempts,
        },
    );
    queue.ensure_created().await?;
    Ok((db, queue))
}

async fn cmd_serve(port: Option<u16>, concurrency: Option<usize>) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "starforge".to_string(),
    })?;

    let (db, queue) = connect(&config).await?;
    let queue = Arc::new(queue);
    let store = ArtStore::from_config(&config)?;
    let broadcaster = Arc::new(Broadcaster::new());
    let backend = Arc::new(HttpBackend::new(&config.backend_url)?);

    // Bind the HTTP surface first so enqueues and the gallery are reachable
    // while the generation backend is still warming up.
    let state = AppState {
        db: Arc::clone(&db),
        queue: Arc::clone(&queue),
        broadcaster: Arc::clone(&broadcaster),
    };
    let port = port.unwrap_or(config.port);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "http server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, api::router(state)).await {
            tracing::error!("http server error: {e}");
        }
    });

    // Workers only start accepting leases once the backend answers its
    // health check.
    backend.wait_until_ready(READINESS_PROBE_INTERVAL).await;

    let pool = WorkerPool::new(
        queue,
        backend,
        store,
        broadcaster,
        WorkerConfig {
            max_concurrent: concurrency.unwrap_or(config.worker_concurrency),
            poll_interval: Duration::from_secs(5),
        },
    );

    let shutdown = pool.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown.notify_one();
    });

    pool.run().await?;
    Ok(())
}

async fn cmd_gallery_list(
    db: &Db,
    page: i64,
    limit: i64,
    satellite: Option<String>,
) -> anyhow::Result<()> {
    let gallery = db.list_artworks(page, limit, satellite.as_deref()).await?;

    if gallery.artworks.is_empty() {
        println!("No artworks found.");
        return Ok(());
    }

    println!(
        "{:<38}  {:<24}  {:<20}  CREATED",
        "ID", "NAME", "SATELLITE"
    );
    println!("{}", "-".repeat(100));
    for artwork in &gallery.artworks {
        println!(
            "{:<38}  {:<24}  {:<20}  {}",
            artwork.id,
            truncate(&artwork.name, 24),
            truncate(&artwork.satellite_name, 20),
            artwork.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!(
        "\npage {}/{} — {} artwork(s) total",
        gallery.current_page, gallery.total_pages, gallery.total_artworks
    );
    Ok(())
}

/// Cut to at most `max` characters, never splitting a multibyte char.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_short_string_is_identity() {
        assert_eq!(truncate("Zarya Pass", 24), "Zarya Pass");
    }

    #[test]
    fn truncate_cuts_long_string() {
        assert_eq!(truncate("abcdefgh", 4), "abcd");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // 'é' starts at byte 23; a byte slice at 24 would panic.
        let name = "aaaaaaaaaaaaaaaaaaaaaaaéclair orbit pass";
        assert_eq!(truncate(name, 24), "aaaaaaaaaaaaaaaaaaaaaaaé");
    }
}
