use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::info;

use appointment_service::{
    AppointmentLifecycle, BroadcastPublisher, QueueReporter, ReportService, TokenAllocator,
};
use database_layer::{BookingStore, DatabasePool, MemoryStore, PostgresStore};
use wallet_service::{RefundConfig, RefundEngine, WalletLedger};

use crate::config::ServerConfig;

/// Shared application state: one store plus the service layer wired on top
/// of it. Cheap to clone; every field is an `Arc`.
#[derive(Clone)]
pub struct ClinicFlowServer {
    pub config: ServerConfig,
    pub db: Option<DatabasePool>,
    pub store: Arc<dyn BookingStore>,
    pub allocator: Arc<TokenAllocator>,
    pub lifecycle: Arc<AppointmentLifecycle>,
    pub queue: Arc<QueueReporter>,
    pub reports: Arc<ReportService>,
    pub refunds: Arc<RefundEngine>,
    pub ledger: Arc<WalletLedger>,
    pub events: Arc<BroadcastPublisher>,
}

impl ClinicFlowServer {
    /// Connect to Postgres from `DATABASE_URL` and wire up the services.
    pub async fn from_env(config: ServerConfig) -> Result<Self> {
        let database_url = config
            .database_url
            .clone()
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        let db = DatabasePool::new(&database_url, config.max_db_connections).await?;
        let store: Arc<dyn BookingStore> = Arc::new(PostgresStore::from_database_pool(&db));

        info!(name = %config.name, "Server state initialized with Postgres store");
        Ok(Self::wire(config, store, Some(db)))
    }

    /// In-memory backend, used by tests and local development without a
    /// database.
    pub fn in_memory(config: ServerConfig) -> Self {
        let store: Arc<dyn BookingStore> = Arc::new(MemoryStore::new());
        Self::wire(config, store, None)
    }

    fn wire(config: ServerConfig, store: Arc<dyn BookingStore>, db: Option<DatabasePool>) -> Self {
        let events = Arc::new(BroadcastPublisher::new(config.event_channel_capacity));

        let allocator = Arc::new(TokenAllocator::new(store.clone(), events.clone()));
        let lifecycle = Arc::new(AppointmentLifecycle::new(store.clone(), events.clone()));
        let queue = Arc::new(QueueReporter::new(store.clone()));
        let reports = Arc::new(ReportService::new(store.clone()));
        let ledger = Arc::new(WalletLedger::new(store.clone()));
        let refunds = Arc::new(RefundEngine::new(
            store.clone(),
            events.clone(),
            lifecycle.clone(),
            RefundConfig {
                default_consultation_fee: config.default_consultation_fee,
            },
        ));

        Self {
            config,
            db,
            store,
            allocator,
            lifecycle,
            queue,
            reports,
            refunds,
            ledger,
            events,
        }
    }

    /// Database reachability; always true for the in-memory backend.
    pub async fn is_database_healthy(&self) -> bool {
        match &self.db {
            Some(db) => db.is_healthy().await,
            None => true,
        }
    }
}

impl std::fmt::Debug for ClinicFlowServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicFlowServer")
            .field("config", &self.config)
            .field("postgres", &self.db.is_some())
            .finish()
    }
}
