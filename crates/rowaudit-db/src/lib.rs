pub use sea_orm;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub mod entities;

/// Opens the connection the audited handle wraps. Accepts a plain URL or tuned
/// [`ConnectOptions`] (pool size, statement logging).
pub async fn connect(
    options: impl Into<ConnectOptions>,
) -> Result<DatabaseConnection, sea_orm::DbErr> {
    Database::connect(options).await
}
