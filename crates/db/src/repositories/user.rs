use sqlx::Row;

use mandi_core::domain::user::UserId;

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn all_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
        let rows = sqlx::query("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("id")
                    .map(UserId)
                    .map_err(|e| RepositoryError::Decode(e.to_string()))
            })
            .collect()
    }
}
