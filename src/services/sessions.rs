use redis::aio::MultiplexedConnection;

/// Verified session ids live in Redis as `verified_session:<id>` with a TTL and
/// are consumed by the first database creation that presents them.
pub struct SessionStore;

impl SessionStore {
    pub fn key(session: &str) -> String {
        format!("verified_session:{session}")
    }

    /// Session ids are short opaque tokens chosen by the client.
    pub fn is_valid_id(session: &str) -> bool {
        (4..=64).contains(&session.len())
            && session.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub async fn mark_verified(
        redis: &mut MultiplexedConnection,
        session: &str,
        ttl_secs: u64,
    ) -> redis::RedisResult<()> {
        redis::cmd("SET")
            .arg(Self::key(session))
            .arg(1)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(redis)
            .await
    }

    pub async fn is_verified(redis: &mut MultiplexedConnection, session: &str) -> redis::RedisResult<bool> {
        redis::cmd("EXISTS").arg(Self::key(session)).query_async(redis).await
    }

    /// Delete the session; true if it was verified. Two racing requests cannot
    /// both consume one session.
    pub async fn consume(redis: &mut MultiplexedConnection, session: &str) -> redis::RedisResult<bool> {
        let deleted: u64 = redis::cmd("DEL").arg(Self::key(session)).query_async(redis).await?;
        Ok(deleted == 1)
    }
}

/// Puts a consumed session back when dropped while still armed, so a failed or
/// abandoned creation does not cost the caller their verification.
pub struct SessionRestore {
    redis: MultiplexedConnection,
    session: String,
    ttl_secs: u64,
    armed: bool,
}

impl SessionRestore {
    pub fn new(redis: MultiplexedConnection, session: &str, ttl_secs: u64) -> Self {
        Self { redis, session: session.to_string(), ttl_secs, armed: true }
    }

    /// The session was used for good; do not restore it.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SessionRestore {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no runtime to restore session on");
            return;
        };
        let mut redis = self.redis.clone();
        let session = std::mem::take(&mut self.session);
        let ttl_secs = self.ttl_secs;
        runtime.spawn(async move {
            if let Err(e) = SessionStore::mark_verified(&mut redis, &session, ttl_secs).await {
                tracing::warn!("Could not restore session after failed creation: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids() {
        assert!(SessionStore::is_valid_id("k3j9x0"));
        assert!(SessionStore::is_valid_id("0f8fad5b-d9cb-469f-a165-70867728950e"));
        assert!(!SessionStore::is_valid_id("abc"));
        assert!(!SessionStore::is_valid_id("abc def"));
        assert!(!SessionStore::is_valid_id(&"a".repeat(65)));
        assert_eq!(SessionStore::key("abcd"), "verified_session:abcd");
    }
}
