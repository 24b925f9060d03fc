use std::process::ExitCode;
use std::sync::Arc;

use accolade_core::config::EngineConfig;
use accolade_core::criteria::CriteriaRegistry;
use accolade_core::{AwardCoordinator, MatchingEngine};
use accolade_db::{builtin_catalog, DbConfig, PgAchievementStore};
use accolade_events::{BusNotifier, EventBus, NoticeLog};
use accolade_worker::{parse_triggers, BackfillJob};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accolade_worker=info,accolade_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let triggers = if args.is_empty() {
        parse_triggers(&std::env::var("BACKFILL_TRIGGERS").unwrap_or_default())
    } else {
        parse_triggers(&args.join(","))
    };
    if triggers.is_empty() {
        tracing::error!("No triggers given; pass trigger names as arguments or set BACKFILL_TRIGGERS");
        return ExitCode::FAILURE;
    }

    let engine_config = EngineConfig::from_env().expect("Invalid engine configuration");
    let db_config = DbConfig::from_env().expect("Invalid database configuration");

    let pool = accolade_db::create_pool(&db_config.database_url, db_config.max_connections)
        .await
        .expect("Failed to connect to database");
    accolade_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    accolade_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(PgAchievementStore::new(pool.clone()));
    let registry = Arc::new(CriteriaRegistry::new(Arc::new(builtin_catalog(&pool))));
    let engine = MatchingEngine::new(registry, store.clone());
    let bus = Arc::new(EventBus::default());
    let notice_log = tokio::spawn(NoticeLog::run(bus.subscribe()));
    let notifier = Arc::new(BusNotifier::new(bus));
    let coordinator =
        AwardCoordinator::new(engine, store.clone(), store, notifier).configured(&engine_config);

    tracing::info!(
        triggers = ?triggers,
        max_meta_depth = engine_config.max_meta_depth,
        pruning = engine_config.pruning.as_str(),
        "Worker starting backfill",
    );

    let job = BackfillJob::new(Arc::new(coordinator), triggers);
    let report = job.run().await;

    // Dropping the job releases the last bus handle; the log drains and exits.
    drop(job);
    match notice_log.await {
        Ok(logged) => tracing::debug!(logged, "Notice log finished"),
        Err(e) => tracing::error!(error = %e, "Notice log task failed"),
    }

    tracing::info!(
        awarded = report.total_awarded(),
        unlocked = report.total_unlocked(),
        failed = report.failed(),
        "Backfill finished",
    );

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
