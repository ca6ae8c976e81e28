use super::error::ProvisionError;
use super::registry::TenantPoolRegistry;

/// SQLSTATEs a cached pool sees once its tenant has been dropped: the database
/// is gone (`3D000`) or the role is (`28P01`, `28000`).
const TENANT_GONE: [&str; 3] = ["3D000", "28P01", "28000"];

/// Size of a tenant database, in bytes and as `pg_size_pretty` renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSize {
    pub bytes: i64,
    pub pretty: String,
}

/// Current size of a tenant database, queried as the tenant's own role.
///
/// A cached pool whose database or role no longer exists is dropped from the
/// registry, so the next call for that name starts fresh.
pub async fn database_size(
    registry: &TenantPoolRegistry,
    db_name: &str,
    username: &str,
    password: &str,
) -> Result<DatabaseSize, ProvisionError> {
    let entry = registry.get_or_create(db_name, username, password)?;
    let mut conn = match entry.pool.acquire().await {
        Ok(conn) => conn,
        Err(source) => {
            if tenant_gone(&source) {
                registry.remove(db_name);
            }
            return Err(ProvisionError::PoolAcquisitionFailed { db: db_name.to_string(), source });
        }
    };
    let (bytes, pretty) = sqlx::query_as::<_, (i64, String)>(
        "SELECT s, pg_size_pretty(s) FROM (SELECT pg_database_size(current_database()) AS s) AS size",
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(|source| ProvisionError::Query { source })?;
    Ok(DatabaseSize { bytes, pretty })
}

fn tenant_gone(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| TENANT_GONE.contains(&&*code))
}
