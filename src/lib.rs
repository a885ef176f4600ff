pub mod aic;
pub mod chat;
pub mod config;
pub mod error;
pub mod event_log;
pub mod grid;
pub mod idempotency;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod pack;
pub mod rate_limit;
pub mod room;
pub mod safety;
pub mod session;
pub mod skill;
pub mod transport;
pub mod zone;

use std::sync::Arc;

use rocket_cors::CorsOptions;

use config::AppConfig;
use idempotency::IdempotencyCache;
use metrics::Metrics;
use pack::LoadedPack;
use rate_limit::RateLimiter;
use room::registry::RoomRegistry;
use safety::SafetyRegistry;
use session::SessionStore;

/// Builds the Rocket instance against an already-loaded map pack. Split
/// out from [`rocket`] so tests can supply a small in-memory pack instead
/// of reading one off disk.
pub fn build_rocket(pack: LoadedPack, config: AppConfig) -> rocket::Rocket<rocket::Build> {
    let config = Arc::new(config);
    let sessions = Arc::new(SessionStore::new());
    let safety = Arc::new(SafetyRegistry::new());
    let idempotency = Arc::new(IdempotencyCache::new(config.idempotency_ttl));
    let limiter = Arc::new(RateLimiter::new(&config.rate_limits));
    let metrics = Arc::new(Metrics::new());
    let registry = Arc::new(RoomRegistry::new(
        Arc::new(pack),
        config.clone(),
        sessions.clone(),
        safety.clone(),
        metrics.clone(),
    ));

    let cors = CorsOptions::default().to_cors().expect("failed to build CORS fairing");

    let idempotency_sweep = idempotency.clone();

    rocket::build()
        .manage(config)
        .manage(sessions)
        .manage(safety)
        .manage(idempotency)
        .manage(limiter)
        .manage(metrics)
        .manage(registry)
        .attach(cors)
        .attach(metrics::MetricsFairing)
        .mount("/aic/v0.1", aic::routes())
        .mount("/aic/v0.1", rocket::routes![transport::connect])
        .attach(rocket::fairing::AdHoc::on_liftoff("Idempotency Sweep", |_rocket| {
            Box::pin(async move {
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
                    loop {
                        interval.tick().await;
                        idempotency_sweep.sweep_expired();
                    }
                });
            })
        }))
}

/// Loads the map pack from `config.pack_dir` and builds the Rocket
/// instance. This is the entry point `main.rs` calls; splitting it from
/// `build_rocket` keeps pack loading (which touches the filesystem) out
/// of anything that wants to build a Rocket instance against a synthetic
/// pack in tests.
pub fn rocket(config: AppConfig) -> rocket::Rocket<rocket::Build> {
    let pack = pack::load_pack(std::path::Path::new(&config.pack_dir))
        .unwrap_or_else(|e| panic!("failed to load map pack from {}: {e}", config.pack_dir));
    build_rocket(pack, config)
}
