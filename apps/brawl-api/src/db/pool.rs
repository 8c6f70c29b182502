use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncPgConnection>;

/// Lookups are single-row reads, so a small pool is plenty.
const MAX_POOL_SIZE: usize = 10;

/// Create a Diesel async connection pool for the users store.
pub async fn connect(database_url: &str) -> DbPool {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder(manager)
        .max_size(MAX_POOL_SIZE)
        .build()
        .expect("failed to build connection pool");

    tracing::info!(max_size = MAX_POOL_SIZE, "users store pool created");

    pool
}
