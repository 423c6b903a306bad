//! MailChats - server entry point

use anyhow::{Context, Result};
use mailchats_api::{auth::hash_password, create_router, AppState, SessionStore};
use mailchats_common::config::{Config, LoggingConfig};
use mailchats_core::{
    CampaignEngine, DeepSeekClient, Dispatcher, LicenseVerifier, ProgressHub, SmtpCodeMailer,
    ThemeStore, VerificationService,
};
use mailchats_storage::{create_storage, NewUser, Storage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting MailChats server...");
    match &config.source {
        Some(path) => info!(path = %path.display(), "Loaded configuration file"),
        None => warn!("No configuration file found, using defaults"),
    }

    // Initialize storage
    let storage = create_storage(&config).await?;
    seed_default_user(storage.as_ref(), &config).await?;

    // Initialize services
    let hub = ProgressHub::default();
    let dispatcher = Arc::new(Dispatcher::new(&config.mailer));
    let engine = Arc::new(CampaignEngine::new(
        storage.clone(),
        hub.clone(),
        dispatcher,
        config.mailer.default_api_key.clone(),
    ));

    let ai = Arc::new(DeepSeekClient::new(&config.ai));
    if !ai.is_configured() {
        warn!("DEEPSEEK_API_KEY is not set, AI features will report errors");
    }

    let verification = Arc::new(VerificationService::new(
        Arc::new(SmtpCodeMailer::new(config.verification.clone())),
        Duration::from_secs(config.verification.code_ttl_secs),
    ));
    let theme = Arc::new(ThemeStore::new(&config.theme.path, hub.clone()));
    let license = Arc::new(LicenseVerifier::new(&config.auth));
    let sessions = SessionStore::new(chrono::Duration::hours(config.auth.session_ttl_hours));

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        storage,
        hub,
        engine,
        ai,
        verification,
        theme,
        license,
        sessions,
    };

    // Build the HTTP application
    let app = mailchats_web::with_static_files(
        create_router(state),
        config.server.static_dir.as_deref(),
    );

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("MailChats listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("MailChats server shutdown complete");
    Ok(())
}

/// Create the configured default account if it does not exist yet
async fn seed_default_user(storage: &dyn Storage, config: &Config) -> Result<()> {
    let (Some(username), Some(password)) = (
        config.auth.default_username.as_deref(),
        config.auth.default_user_password.as_deref(),
    ) else {
        return Ok(());
    };

    if storage.get_user_by_username(username).await?.is_some() {
        return Ok(());
    }

    storage
        .create_user(NewUser {
            username: username.to_string(),
            password: hash_password(password)?,
        })
        .await?;
    info!(username, "Default user created");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},mailchats=debug", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailchats_storage::MemStorage;

    #[tokio::test]
    async fn test_seed_default_user_once() {
        let storage = MemStorage::new();
        let mut config = Config::default();
        config.auth.default_username = Some("admin@example.com".into());
        config.auth.default_user_password = Some("changeme".into());

        seed_default_user(&storage, &config).await.unwrap();
        seed_default_user(&storage, &config).await.unwrap();

        let user = storage
            .get_user_by_username("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.password.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_seed_skipped_without_credentials() {
        let storage = MemStorage::new();
        seed_default_user(&storage, &Config::default()).await.unwrap();
        assert!(storage.get_user_by_username("admin").await.unwrap().is_none());
    }
}
