use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, PoolError};

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Build the connection pool. The schema is managed outside this service,
/// so no migrations are run here.
pub fn create_pool(database_url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder().build(manager)
}
