//! ledger_bot - personal income/expense ledger over Telegram
//!
//! A single authorized user records, edits, deletes and bulk-imports
//! transactions through a chat dialog backed by SQLite.

mod chat;
mod config;
mod db;
mod import;
mod reports;
mod runtime;
mod state_machine;
mod telegram;

use clap::Parser;
use config::{Args, Config};
use db::{Database, DEFAULT_CATEGORIES};
use reports::ScriptReports;
use runtime::Dispatcher;
use telegram::TelegramClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_bot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::resolve(Args::parse(), |name| std::env::var(name).ok())?;

    // Initialize database
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    db.seed_categories(DEFAULT_CATEGORIES)?;
    let categories = db.list_categories()?;
    tracing::info!(?categories, "Categories loaded");

    let client = TelegramClient::new(&config.api_token)?;
    match client.get_me().await {
        Ok(me) => tracing::info!(bot_id = me.id, username = ?me.username, "Telegram client initialized"),
        Err(e) => tracing::warn!(error = %e, "getMe failed, continuing"),
    }

    // Report scripts read the same database and credentials
    let reports = ScriptReports::new(
        config.python_bin.clone(),
        config.reports_dir.clone(),
        config.report_timeout,
    )
    .with_env("DB_PATH", config.db_path.display().to_string())
    .with_env("API_TOKEN", config.api_token.clone())
    .with_env("ALLOWED_USER_ID", config.allowed_user.to_string());

    let mut dispatcher = Dispatcher::new(
        config.allowed_user,
        db,
        client.clone(),
        reports,
        categories,
    );

    tracing::info!(allowed_user = %config.allowed_user, "Bot started");
    tokio::select! {
        () = telegram::run_polling(&client, &mut dispatcher) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
