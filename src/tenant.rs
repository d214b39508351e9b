use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::compactor;
use crate::limits::*;
use crate::registrar::{ConflictPolicy, Registrar};
use crate::store::LocalStore;

pub type TenantRegistrar = Registrar<LocalStore>;

/// Manages per-tenant registrars. Each tenant gets its own store + WAL + compactor.
/// Tenant = database name from the pgwire connection.
pub struct TenantManager {
    registrars: DashMap<String, Arc<TenantRegistrar>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    policy: ConflictPolicy,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, policy: ConflictPolicy) -> Self {
        Self {
            registrars: DashMap::new(),
            data_dir,
            compact_threshold,
            policy,
        }
    }

    /// Get or lazily open the registrar for the given tenant. Names that sanitize to
    /// the same string share one registrar, since they share one WAL file.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<TenantRegistrar>> {
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        let safe_name = sanitize(tenant);
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }
        if let Some(registrar) = self.registrars.get(&safe_name) {
            return Ok(registrar.value().clone());
        }
        if self.registrars.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // Two first connections may race here; the entry API keeps one store per tenant.
        let entry = self.registrars.entry(safe_name.clone());
        if let dashmap::mapref::entry::Entry::Occupied(existing) = &entry {
            return Ok(existing.get().clone());
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let store = Arc::new(LocalStore::open(wal_path)?);

        let threshold = self.compact_threshold;
        let compactor_store = store.clone();
        tokio::spawn(async move {
            compactor::run_compactor(compactor_store, threshold).await;
        });

        let registrar = Arc::new(Registrar::new(store, self.policy));
        entry.insert(registrar.clone());
        tracing::info!("opened tenant {safe_name} ({} policy)", self.policy.name());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.registrars.len() as f64);
        Ok(registrar)
    }
}

/// Strip everything but `[A-Za-z0-9_-]` so a name can't escape the data dir.
fn sanitize(tenant: &str) -> String {
    tenant
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
