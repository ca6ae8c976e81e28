use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Provisioning counts over common calendar windows.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CreationStats {
    pub today: i64,
    pub yesterday: i64,
    pub this_week: i64,
    pub this_month: i64,
    pub this_year: i64,
    pub last_7_days: i64,
    pub last_30_days: i64,
}

pub struct StatsService;

impl StatsService {
    pub async fn record_creation(pool: &PgPool, db_name: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO database_creation_logs (db_name) VALUES ($1)")
            .bind(db_name)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn creation_stats(pool: &PgPool) -> anyhow::Result<CreationStats> {
        let stats = sqlx::query_as::<_, CreationStats>(
            r#"SELECT
                 COUNT(*) FILTER (WHERE time >= DATE_TRUNC('day', NOW()))                   AS today,
                 COUNT(*) FILTER (WHERE time >= DATE_TRUNC('day', NOW() - INTERVAL '1 day')
                                    AND time <  DATE_TRUNC('day', NOW()))                   AS yesterday,
                 COUNT(*) FILTER (WHERE time >= DATE_TRUNC('week', NOW()))                  AS this_week,
                 COUNT(*) FILTER (WHERE time >= DATE_TRUNC('month', NOW()))                 AS this_month,
                 COUNT(*) FILTER (WHERE time >= DATE_TRUNC('year', NOW()))                  AS this_year,
                 COUNT(*) FILTER (WHERE time >= NOW() - INTERVAL '7 days')                  AS last_7_days,
                 COUNT(*) FILTER (WHERE time >= NOW() - INTERVAL '30 days')                 AS last_30_days
               FROM database_creation_logs"#,
        )
        .fetch_one(pool)
        .await?;
        Ok(stats)
    }
}
