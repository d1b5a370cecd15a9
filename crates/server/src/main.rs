//! Huddle server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderValue, Method, header};
use huddle_api::{ApiRateLimiter, AppState, Hub, RateLimitConfig};
use huddle_common::{Config, DisabledStorage, HttpOgpFetcher, StorageService, UrlPreviewConfig};
use huddle_core::{AttachmentService, JwtIdentityProvider};
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired pending uploads are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// How often idle rate limiter entries are dropped.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "huddle=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(feature = "s3")]
fn storage(config: &Config) -> Arc<dyn StorageService> {
    match config.object_storage() {
        Some(storage) => {
            info!(bucket = %storage.bucket, endpoint = %storage.endpoint, "Object storage enabled");
            Arc::new(huddle_common::S3Storage::new(&storage))
        }
        None => {
            warn!("No object storage configured, uploads are disabled");
            Arc::new(DisabledStorage)
        }
    }
}

#[cfg(not(feature = "s3"))]
fn storage(_config: &Config) -> Arc<dyn StorageService> {
    warn!("Built without S3 support, uploads are disabled");
    Arc::new(DisabledStorage)
}

fn spawn_attachment_sweeper(attachments: AttachmentService) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = attachments.sweep_expired(chrono::Utc::now()).await {
                error!(error = %e, "Attachment sweep failed");
            }
        }
    });
}

fn spawn_rate_limit_cleanup(limiter: ApiRateLimiter) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.cleanup(Instant::now()).await;
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting huddle server...");

    let db = huddle_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    huddle_db::migrate(&db).await?;
    info!("Migrations completed");

    let hub = Hub::spawn();
    let identity = Arc::new(JwtIdentityProvider::new(
        &config.jwt_secret,
        config.access_token_ttl(),
    ));
    let fetcher = Arc::new(HttpOgpFetcher::new(UrlPreviewConfig::default())?);

    let state = AppState::new(
        Arc::new(db),
        hub,
        identity,
        fetcher,
        storage(&config),
    );

    let limiter = ApiRateLimiter::new(RateLimitConfig::new(
        config.rate_limit_requests,
        config.rate_limit_window_secs,
    ));

    spawn_attachment_sweeper(state.attachment_service.clone());
    spawn_rate_limit_cleanup(limiter.clone());

    let app = huddle_api::app(state, limiter)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
