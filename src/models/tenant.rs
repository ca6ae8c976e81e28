use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Database name, role and password handed to exactly one caller.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantIdentity {
    pub db_name: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for TenantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantIdentity")
            .field("db_name", &self.db_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Recover the creation time from a generated `db_<millis>_<suffix>` name.
pub fn created_at_from_db_name(db_name: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = db_name.strip_prefix("db_")?.split('_').next()?.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaScope {
    Database,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaPolicy {
    pub limit_bytes: u64,
    pub scope: QuotaScope,
}

impl QuotaPolicy {
    pub fn database(limit_bytes: u64) -> Self {
        Self { limit_bytes, scope: QuotaScope::Database }
    }
}

/// Result of a successful provisioning call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedDatabase {
    #[serde(flatten)]
    pub identity: TenantIdentity,
    #[serde(rename = "directConnectionUrl")]
    pub connection_url: String,
    pub pooled_connection_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatabaseRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub recaptcha_token: String,
    pub session: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyStatusQuery {
    pub session: String,
}

/// Body returned by `POST /create-database`; also read back by the CLI.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatabaseResponse {
    pub db_name: String,
    pub username: String,
    pub password: String,
    pub direct_connection_url: String,
    pub pooled_connection_url: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    pub reset_time: String,
}
