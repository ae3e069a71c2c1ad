use crate::core::aliases::DbPool;

/// Shared state handed to every handler. The connection pool is the only
/// in-process state the service carries.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
}
