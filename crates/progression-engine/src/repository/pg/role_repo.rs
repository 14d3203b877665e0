//! 角色分配仓储

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::repository::traits::RoleRepositoryTrait;

/// 角色分配仓储
///
/// 只增不减，引擎从不移除角色
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_roles(&self, user_id: &str) -> Result<Vec<String>> {
        let roles: Vec<String> = sqlx::query_scalar(
            r#"SELECT role_name FROM user_roles WHERE user_id = $1 ORDER BY granted_at, role_name"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    pub async fn assign_role(&self, user_id: &str, role: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_name, granted_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id, role_name) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleRepositoryTrait for PgRoleRepository {
    async fn get_roles(&self, user_id: &str) -> Result<Vec<String>> {
        self.get_roles(user_id).await
    }

    async fn assign_role(&self, user_id: &str, role: &str) -> Result<bool> {
        self.assign_role(user_id, role).await
    }
}
