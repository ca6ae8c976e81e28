//! Drop provisioned databases older than TENANT_MAX_AGE_HOURS.
//! Run daily at the advertised reset time (e.g., cron: 0 0 * * * /app/purge-tenants)
//!
//! Usage: purge-tenants [--dry-run]

use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pgdrop::config::Config;
use pgdrop::db::credentials::username_for;
use pgdrop::db::provisioner::Provisioner;
use pgdrop::models::tenant::created_at_from_db_name;

#[derive(Parser)]
#[command(name = "purge-tenants", about = "Drop expired tenant databases and roles")]
struct Args {
    /// List what would be dropped without dropping anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let provisioner = Provisioner::from_url(&config.database_url, config.provision_settings())?;

    let cutoff = Utc::now() - Duration::hours(config.tenant_max_age_hours);
    let databases = provisioner.list_tenant_databases().await?;
    tracing::info!(total = databases.len(), %cutoff, "Starting tenant purge");

    let mut dropped = 0usize;
    for db_name in databases {
        let Some(created_at) = created_at_from_db_name(&db_name) else {
            tracing::warn!(db = %db_name, "Skipping database with unrecognised name");
            continue;
        };
        if created_at >= cutoff {
            continue;
        }

        let username = username_for(&db_name);
        if args.dry_run {
            tracing::info!(db = %db_name, %created_at, "Would drop");
            continue;
        }
        match provisioner.drop_tenant(&db_name, &username).await {
            Ok(()) => dropped += 1,
            Err(e) => tracing::error!(db = %db_name, "Error dropping tenant: {}", e),
        }
    }

    tracing::info!(dropped, "Tenant purge completed");
    Ok(())
}
