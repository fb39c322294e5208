//! EduPlatform HTTP Server
//!
//! Axum server for course checkout, free enrollment, purchase status and the
//! payment provider's webhook.

mod app;
mod auth;
mod config;
mod error;
mod handlers;
mod seed;
mod state;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edu_core::{MemoryStore, Store};
use edu_payments::{CheckoutSettings, HttpPaymentProvider, PaymentProvider, WebhookVerifier};

use crate::config::{AppEnv, Config};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "Configuration loaded");

    let store = build_store(&config).await?;

    // Payment provider
    let provider: Option<Arc<dyn PaymentProvider>> =
        match config.payments_access_token.as_deref() {
            Some(token) => {
                let client = HttpPaymentProvider::new(
                    token,
                    &config.payments_api_base,
                    config.payments_timeout,
                )
                .context("payment provider client")?;
                tracing::info!(
                    api_base = %config.payments_api_base,
                    "✓ Payment provider configured"
                );
                Some(Arc::new(client) as Arc<dyn PaymentProvider>)
            }
            None => {
                tracing::warn!("⚠ Payment provider not configured - checkout disabled");
                tracing::warn!("  Set PAYMENTS_ACCESS_TOKEN in .env");
                None
            }
        };

    // Webhook verification
    let verifier = WebhookVerifier::from_config(
        config.webhook_secret.clone(),
        config.webhook_insecure,
        config.webhook_tolerance_secs,
    );
    if !verifier.has_secret() {
        if config.webhook_insecure {
            tracing::warn!("⚠ PAYMENTS_WEBHOOK_INSECURE set - webhook signatures are NOT checked");
        } else {
            tracing::warn!("⚠ Webhook secret not configured - notifications will be rejected");
            tracing::warn!("  Set PAYMENTS_WEBHOOK_SECRET in .env");
        }
    }

    let settings = CheckoutSettings {
        public_base_url: config.public_base_url.clone(),
        currency: config.currency.clone(),
        ..CheckoutSettings::default()
    };

    let state = AppState::new(store, provider, verifier, settings);
    let app = app::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 EduPlatform server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  POST /api/checkout                    - Start course checkout");
    tracing::info!("  POST /api/enrollments                 - Enroll in a free course");
    tracing::info!("  GET  /api/purchases/{{id}}/status       - Purchase status");
    tracing::info!("  POST /api/admin/purchases/{{id}}/sync   - Re-sync purchase (admin)");
    tracing::info!("  POST /webhook/payments                - Provider notifications");
    tracing::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if let Some(url) = config.database_url.as_deref() {
        return connect_database(url, config.database_max_connections).await;
    }

    if config.env == AppEnv::Production {
        anyhow::bail!("DATABASE_URL is required when APP_ENV=production");
    }

    let store = MemoryStore::new();
    tracing::warn!("⚠ DATABASE_URL not set - using in-memory store (data is lost on restart)");
    if config.dev_seed {
        let seeded = seed::seed(&store)?;
        tracing::info!(
            student_token = seed::STUDENT_TOKEN,
            admin_token = seed::ADMIN_TOKEN,
            student_id = %seeded.student_id,
            admin_id = %seeded.admin_id,
            paid_course_id = %seeded.paid_course_id,
            free_course_id = %seeded.free_course_id,
            "Seeded development data"
        );
    }
    Ok(Arc::new(store) as Arc<dyn Store>)
}

#[cfg(feature = "postgres")]
async fn connect_database(url: &str, max_connections: u32) -> anyhow::Result<Arc<dyn Store>> {
    let store = edu_core::PgStore::connect(url, max_connections)
        .await
        .context("connecting to database")?;
    tracing::info!("✓ Connected to PostgreSQL");
    Ok(Arc::new(store) as Arc<dyn Store>)
}

#[cfg(not(feature = "postgres"))]
async fn connect_database(_url: &str, _max_connections: u32) -> anyhow::Result<Arc<dyn Store>> {
    anyhow::bail!("DATABASE_URL is set but this build has no postgres support")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
