use std::sync::Arc;

use arcana_ai::StageSet;
use arcana_cards::CardCatalog;
use arcana_infra::ledger::PostgresCreditLedger;
use arcana_infra::store::PostgresPredictionStore;
use arcana_infra::{
    InMemoryPredictionStore, PredictionStore, RateLimiter, TaskSpawner, TokioSpawner,
    WorkflowConfig, WorkflowOrchestrator,
};
use arcana_ledger::{CreditLedger, InMemoryCreditLedger};
use sqlx::PgPool;

use crate::config::AppConfig;

/// Shared service graph injected into handlers.
///
/// Everything is behind trait objects so tests (and the in-memory dev mode)
/// substitute implementations without touching handlers.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn PredictionStore>,
    pub ledger: Arc<dyn CreditLedger>,
    pub catalog: Arc<CardCatalog>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub rate_limiter: RateLimiter,
    pub spawner: Arc<dyn TaskSpawner>,
}

pub async fn build_services(config: &AppConfig) -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services(config).await
    } else {
        build_in_memory_services(config)
    }
}

fn build_in_memory_services(config: &AppConfig) -> AppServices {
    let store: Arc<dyn PredictionStore> = Arc::new(InMemoryPredictionStore::new());
    let ledger: Arc<dyn CreditLedger> = Arc::new(InMemoryCreditLedger::new());
    wire(config, store, ledger)
}

async fn build_persistent_services(config: &AppConfig) -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let store: Arc<dyn PredictionStore> = Arc::new(PostgresPredictionStore::new(pool.clone()));
    let ledger: Arc<dyn CreditLedger> = Arc::new(PostgresCreditLedger::new(pool));
    wire(config, store, ledger)
}

fn wire(
    config: &AppConfig,
    store: Arc<dyn PredictionStore>,
    ledger: Arc<dyn CreditLedger>,
) -> AppServices {
    let catalog = Arc::new(CardCatalog::standard());

    // Deterministic in-process stages; model-backed clients drop in here.
    let stages = StageSet::local(catalog.clone());

    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        store.clone(),
        ledger.clone(),
        stages,
        catalog.clone(),
        WorkflowConfig {
            retry: config.retry.clone(),
            stage_timeout: config.stage_timeout,
        },
    ));

    AppServices {
        rate_limiter: RateLimiter::new(store.clone(), config.cooldown),
        store,
        ledger,
        catalog,
        orchestrator,
        spawner: Arc::new(TokioSpawner::new()),
    }
}
