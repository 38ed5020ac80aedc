use log::info;

use shareroom::db::{establish_db, init_schema};
use shareroom::store::Store;
use shareroom::sweep::{self, DEFAULT_INTERVAL_SECS, DEFAULT_TTL_HOURS};

/// Stale-room sweeper: evicts rooms past their TTL, once at startup and
/// then on a fixed interval.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    dotenv::dotenv().ok();

    let db_pool = establish_db().await.expect("DB connection failed");
    init_schema(&db_pool).await.expect("schema init failed");
    info!("Database connection established.");

    let ttl_hours = std::env::var("ROOM_TTL_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TTL_HOURS);
    let interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_INTERVAL_SECS);

    info!(
        "Starting sweeper: ttl={}h interval={}s",
        ttl_hours, interval_secs
    );
    sweep::run_sweeper(Store::new(db_pool), ttl_hours, interval_secs).await;

    Ok(())
}
