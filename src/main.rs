use std::sync::{Arc, Mutex};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use staybook::config::{AppConfig, StorageBackend};
use staybook::db;
use staybook::handlers;
use staybook::services::identity::HmacTokenVerifier;
use staybook::services::storage::http::HttpBlobStore;
use staybook::services::storage::local::LocalBlobStore;
use staybook::services::storage::BlobStore;
use staybook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(!config.auth_secret.is_empty(), "AUTH_SECRET must be set");
    let pricing = config.pricing_policy()?;

    let conn = db::init_db(&config.database_url)?;

    let blobs: Box<dyn BlobStore> = match config.storage_backend {
        StorageBackend::Http => {
            anyhow::ensure!(
                !config.storage_bucket_url.is_empty(),
                "STORAGE_BUCKET_URL must be set when STORAGE_BACKEND=http"
            );
            tracing::info!("using HTTP blob store (bucket: {})", config.storage_bucket_url);
            Box::new(HttpBlobStore::new(
                config.storage_bucket_url.clone(),
                config.storage_api_key.clone(),
            ))
        }
        StorageBackend::Local => {
            tracing::info!("using local blob store (dir: {})", config.storage_dir);
            Box::new(LocalBlobStore::new(&config.storage_dir, &config.public_base_url))
        }
    };

    tracing::info!(
        advance_fraction = %pricing.advance_fraction,
        food_rate = %pricing.food_rate,
        "pricing policy loaded"
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        pricing,
        identity: Box::new(HmacTokenVerifier::new(config.auth_secret.clone())),
        blobs,
    });

    // Several files per request, each up to max_upload_bytes.
    let body_limit = config.max_upload_bytes.saturating_mul(8);

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/properties", get(handlers::properties::list_properties))
        .route("/api/properties/:id", get(handlers::properties::get_property))
        .route(
            "/api/properties/:id/booked-dates",
            get(handlers::properties::booked_dates),
        )
        .route("/api/quotes", post(handlers::properties::quote))
        .route(
            "/api/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        )
        .route(
            "/api/bookings",
            get(handlers::bookings::list_my_bookings).post(handlers::bookings::create_booking),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/id-proofs",
            post(handlers::bookings::upload_id_proofs),
        )
        .route(
            "/api/bookings/:id/payment",
            post(handlers::bookings::submit_payment),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/calendar.ics",
            get(handlers::bookings::download_calendar),
        )
        .route(
            "/api/admin/properties",
            get(handlers::properties::admin_list_properties)
                .post(handlers::properties::create_property),
        )
        .route(
            "/api/admin/properties/:id",
            axum::routing::put(handlers::properties::update_property),
        )
        .route(
            "/api/admin/properties/:id/media",
            post(handlers::properties::upload_media),
        )
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .route(
            "/api/admin/bookings/:id/verify",
            post(handlers::admin::verify_booking),
        )
        .route(
            "/api/admin/bookings/:id/confirm",
            post(handlers::admin::confirm_booking),
        )
        .route(
            "/api/admin/bookings/:id/complete",
            post(handlers::admin::complete_booking),
        )
        .nest_service("/uploads", ServeDir::new(&config.storage_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
