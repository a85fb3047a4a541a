// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relief Donation API Server
//!
//! Connects donators of relief goods with affected people. Subcommands
//! cover serving the API, applying schema migrations and creating
//! administrator accounts.

use anyhow::Context;
use clap::{Parser, Subcommand};
use donation_backend::{
    admin, config::Config, db::Db, services::PasswordHasher, time_utils::format_utc_rfc3339,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "donation-backend", version, about = "Relief donation API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Apply pending schema migrations
    Migrate {
        /// Show applied and pending migrations without applying anything
        #[arg(long)]
        list: bool,
    },
    /// Create an administrator account
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let db = Db::open(&config.database_path).context("Failed to open database")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::Migrate { list } => migrate(&db, list).await,
        Command::CreateSuperuser {
            email,
            password,
            first_name,
            last_name,
        } => create_superuser(&config, &db, email, password, first_name, last_name).await,
    }
}

async fn serve(config: Config, db: Db) -> anyhow::Result<()> {
    tracing::info!(port = config.port, "Starting relief donation API");

    let pending: Vec<_> = db
        .migration_status()
        .await?
        .into_iter()
        .filter(|m| m.applied_at.is_none())
        .map(|m| m.name)
        .collect();
    if !pending.is_empty() {
        tracing::warn!(
            ?pending,
            "Unapplied migrations; run `donation-backend migrate`"
        );
    }

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("Failed to create {}", config.media_root.display()))?;

    let port = config.port;
    let state = Arc::new(AppState::new(config, db));
    let app = donation_backend::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn migrate(db: &Db, list: bool) -> anyhow::Result<()> {
    if list {
        for migration in db.migration_status().await? {
            match migration.applied_at {
                Some(at) => println!("[X] {} (applied {})", migration.name, format_utc_rfc3339(at)),
                None => println!("[ ] {}", migration.name),
            }
        }
        return Ok(());
    }

    let applied = db.migrate().await?;
    if applied.is_empty() {
        println!("No migrations to apply.");
    } else {
        for name in applied {
            println!("Applied {}", name);
        }
    }
    Ok(())
}

async fn create_superuser(
    config: &Config,
    db: &Db,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> anyhow::Result<()> {
    let passwords = PasswordHasher::new(config.password_hash_iterations);
    let user = admin::create_superuser(db, &passwords, &email, &password, &first_name, &last_name)
        .await
        .with_context(|| format!("Failed to create superuser {}", email))?;

    println!("Superuser {} created.", user.email);
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("donation_backend=debug".parse().expect("static directive"))
                .add_directive("info".parse().expect("static directive")),
        )
        .with(format)
        .init();
}
