use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("chatlog_db")]
pub struct ChatlogDb(sqlx::PgPool);

/// Apply pending schema migrations from `./migrations`.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
