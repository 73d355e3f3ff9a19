pub mod db;

mod catalog;
mod coupons;
mod ledger;
mod merchants;
mod payments;
mod payouts;
mod refunds;
mod stats;
mod subscriptions;

use std::{env, str::FromStr, time::Duration};

pub use db::SqliteDatabase;
use log::{info, trace};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::db::traits::SettlementError;

const SQLITE_DB_URL: &str = "sqlite://data/mse_store.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub static MIGRATOR: Migrator = sqlx::migrate!("./src/db/sqlite/migrations");

pub fn db_url() -> String {
    let result = env::var("MSE_DATABASE_URL").unwrap_or_else(|_| {
        info!("MSE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Creates a connection pool for the database at `url`, creating the database file if it does not exist.
///
/// Writers that find the database locked wait for up to `busy_timeout` before giving up, so concurrent settlements
/// queue behind each other instead of failing.
pub async fn new_pool(url: &str, max_connections: u32, busy_timeout: Duration) -> Result<SqlitePool, SettlementError> {
    trace!("🗃️ Opening pool for {url} with {max_connections} connections");
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(busy_timeout);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
