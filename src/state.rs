use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Process-wide state, built once at startup and cloned into each handler.
/// Nothing in here mutates after construction.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
}
