//! Cache of connection pools authenticated as tenant roles.
//!
//! One entry per tenant database. The first call for a database decides the
//! credentials its pool uses; later calls get the same entry back whatever
//! credentials they pass. Entries are evicted when idle for too long, or least
//! recently used first when the registry is full.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::error::ProvisionError;
use super::ident::Ident;
use crate::services::metrics::TENANT_POOLS_GAUGE;

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub idle_timeout: Duration,
    pub max_entries: usize,
    pub max_connections: u32,
    pub statement_timeout: Duration,
}

#[derive(Debug)]
pub struct PoolEntry {
    pub db_name: String,
    pub authenticated_as: String,
    pub pool: PgPool,
}

struct Slot {
    entry: Arc<PoolEntry>,
    last_used: Instant,
}

pub struct TenantPoolRegistry {
    /// Server address; database and credentials are filled in per tenant.
    base: PgConnectOptions,
    settings: RegistrySettings,
    slots: Mutex<HashMap<String, Slot>>,
}

impl TenantPoolRegistry {
    pub fn new(base: PgConnectOptions, settings: RegistrySettings) -> Self {
        Self { base, settings, slots: Mutex::new(HashMap::new()) }
    }

    /// Pool for `db_name`, created on first use. Creating a pool does not open
    /// a connection; the first query does.
    pub fn get_or_create(
        &self,
        db_name: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<PoolEntry>, ProvisionError> {
        let db = Ident::new(db_name)?;
        let role = Ident::new(username)?;

        // Check and insert under one lock; nothing in here awaits.
        let mut slots = self.lock();
        if let Some(slot) = slots.get_mut(db.as_str()) {
            slot.last_used = Instant::now();
            return Ok(Arc::clone(&slot.entry));
        }

        if slots.len() >= self.settings.max_entries {
            evict_lru(&mut slots);
        }

        let opts = self
            .base
            .clone()
            .database(db.as_str())
            .username(role.as_str())
            .password(password)
            .options([("statement_timeout", format!("{}ms", self.settings.statement_timeout.as_millis()))]);
        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .idle_timeout(self.settings.idle_timeout.max(Duration::from_secs(1)))
            .connect_lazy_with(opts);

        let entry = Arc::new(PoolEntry {
            db_name: db.as_str().to_string(),
            authenticated_as: role.as_str().to_string(),
            pool,
        });
        slots.insert(
            db.as_str().to_string(),
            Slot { entry: Arc::clone(&entry), last_used: Instant::now() },
        );
        TENANT_POOLS_GAUGE.set(slots.len() as i64);
        debug!(db = %db_name, role = %username, "tenant pool created");
        Ok(entry)
    }

    /// Drop and close the pool for `db_name`, if cached.
    pub fn remove(&self, db_name: &str) -> bool {
        let mut slots = self.lock();
        let removed = slots.remove(db_name);
        TENANT_POOLS_GAUGE.set(slots.len() as i64);
        drop(slots);
        match removed {
            Some(slot) => {
                close_in_background(slot.entry);
                true
            }
            None => false,
        }
    }

    /// Evict entries unused for longer than the idle timeout. Returns how many
    /// were evicted.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.settings.idle_timeout;
        let mut slots = self.lock();
        let expired: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| now.duration_since(slot.last_used) >= idle_timeout)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &expired {
            if let Some(slot) = slots.remove(name) {
                close_in_background(slot.entry);
            }
        }
        TENANT_POOLS_GAUGE.set(slots.len() as i64);
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Periodically evict idle pools.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle();
                if evicted > 0 {
                    info!(evicted, remaining = self.len(), "evicted idle tenant pools");
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn evict_lru(slots: &mut HashMap<String, Slot>) {
    let oldest = slots
        .iter()
        .min_by_key(|(_, slot)| slot.last_used)
        .map(|(name, _)| name.clone());
    if let Some(name) = oldest {
        if let Some(slot) = slots.remove(&name) {
            debug!(db = %name, "evicting least recently used tenant pool");
            close_in_background(slot.entry);
        }
    }
}

fn close_in_background(entry: Arc<PoolEntry>) {
    let pool = entry.pool.clone();
    tokio::spawn(async move { pool.close().await });
}
