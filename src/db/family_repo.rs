// src/db/family_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::AppError;

#[derive(Clone)]
pub struct FamilyRepository {
    pool: PgPool,
}

impl FamilyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Verifica se o utilizador pertence à família pedida.
    pub async fn check_user_family(&self, user_id: Uuid, family_id: Uuid) -> Result<bool, AppError> {
        // SELECT EXISTS: só precisamos de saber se a linha existe.
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_families
                WHERE user_id = $1 AND family_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(family_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
