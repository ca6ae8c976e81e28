use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use redis::Client as RedisClient;
use sqlx::postgres::PgConnectOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pgdrop::config::Config;
use pgdrop::db::{self, provisioner::Provisioner, registry::TenantPoolRegistry};
use pgdrop::services::verification::RecaptchaVerifier;
use pgdrop::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let admin = PgConnectOptions::from_str(&config.database_url)?;
    let provisioner = Arc::new(Provisioner::new(admin.clone(), config.provision_settings()));
    provisioner.ping().await?;
    info!(
        quota_limit_bytes = config.quota_limit_bytes,
        "Administrative database reachable"
    );

    let registry = Arc::new(TenantPoolRegistry::new(admin, config.registry_settings()));
    let sweep_every = Duration::from_secs((config.tenant_pool_idle_secs / 2).max(1));
    Arc::clone(&registry).spawn_sweeper(sweep_every);

    let stats_db = match &config.stats_database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            info!("Stats database connected and migrations applied");
            Some(pool)
        }
        None => {
            info!("STATS_DATABASE_URL not set, creation statistics disabled");
            None
        }
    };

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    let verifier = config.recaptcha_secret.clone().map(|secret| {
        Arc::new(RecaptchaVerifier::new(reqwest::Client::new(), secret, config.recaptcha_min_score))
    });
    if verifier.is_none() {
        info!("RECAPTCHA_SECRET_KEY not set, /verify disabled");
    }

    let state = AppState {
        provisioner,
        registry,
        redis,
        verifier,
        stats_db,
        config: config.clone(),
    };

    let app = pgdrop::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("pgdrop API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
