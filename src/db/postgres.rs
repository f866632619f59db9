use sqlx::{
    postgres::{PgListener, PgPoolOptions},
    PgPool,
};

/// Creates a PostgreSQL connection pool
///
/// The pool is shared by request handling and the polling scan.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Opens a dedicated notification connection subscribed to `channels`
///
/// The listener owns its own connection, separate from the pool, so a
/// blocking wait never starves query traffic.
pub async fn create_listener(database_url: &str, channels: &[&str]) -> sqlx::Result<PgListener> {
    let mut listener = PgListener::connect(database_url).await?;
    listener.listen_all(channels.iter().copied()).await?;
    Ok(listener)
}
