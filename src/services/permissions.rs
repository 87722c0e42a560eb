use crate::{
    auth::{grants_to_permissions, is_known_role, merge_grants, role_defaults, ModuleGrant, Modules},
    db::DbPool,
    entities::{
        role_permission::{self, Entity as RolePermissionEntity},
        user::{self, Entity as UserEntity},
        user_permission::{self, Entity as UserPermissionEntity},
    },
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub role: String,
    pub grants: Vec<ModuleGrant>,
    pub permissions: Vec<String>,
}

fn check_grants(grants: &[ModuleGrant]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for grant in grants {
        grant.validate()?;
        if !Modules::is_known(&grant.module) {
            return Err(ServiceError::ValidationError(format!(
                "Unknown module '{}'",
                grant.module
            )));
        }
        if !seen.insert(grant.module.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "Module '{}' listed twice",
                grant.module
            )));
        }
    }
    Ok(())
}

/// Role grants and per-user overrides
#[derive(Clone)]
pub struct PermissionService {
    db_pool: Arc<DbPool>,
}

impl PermissionService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Stored rows for a role layered over its built-in defaults
    pub async fn role_grants<C: ConnectionTrait>(
        conn: &C,
        role: &str,
    ) -> Result<Vec<ModuleGrant>, ServiceError> {
        let stored: Vec<ModuleGrant> = RolePermissionEntity::find()
            .filter(role_permission::Column::Role.eq(role))
            .order_by_asc(role_permission::Column::Module)
            .all(conn)
            .await?
            .into_iter()
            .map(|row| ModuleGrant {
                module: row.module,
                can_view: row.can_view,
                can_create: row.can_create,
                can_edit: row.can_edit,
                can_delete: row.can_delete,
            })
            .collect();
        Ok(merge_grants(&role_defaults(role), &stored))
    }

    pub async fn user_grants<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
    ) -> Result<Vec<ModuleGrant>, ServiceError> {
        Ok(UserPermissionEntity::find()
            .filter(user_permission::Column::UserId.eq(user_id))
            .order_by_asc(user_permission::Column::Module)
            .all(conn)
            .await?
            .into_iter()
            .map(|row| ModuleGrant {
                module: row.module,
                can_view: row.can_view,
                can_create: row.can_create,
                can_edit: row.can_edit,
                can_delete: row.can_delete,
            })
            .collect())
    }

    /// What a user can actually do: role grants with the user's overrides on top
    pub async fn effective_for<C: ConnectionTrait>(
        conn: &C,
        user: &user::Model,
    ) -> Result<EffectivePermissions, ServiceError> {
        let role = Self::role_grants(conn, &user.role).await?;
        let overrides = Self::user_grants(conn, user.id).await?;
        let grants = merge_grants(&role, &overrides);
        Ok(EffectivePermissions {
            user_id: user.id,
            role: user.role.clone(),
            permissions: grants_to_permissions(&grants),
            grants,
        })
    }

    pub async fn effective(&self, user_id: Uuid) -> Result<EffectivePermissions, ServiceError> {
        let db = &*self.db_pool;
        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;
        Self::effective_for(db, &user).await
    }

    pub async fn get_role(&self, role: &str) -> Result<Vec<ModuleGrant>, ServiceError> {
        if !is_known_role(role) {
            return Err(ServiceError::not_found("Role", role));
        }
        Self::role_grants(&*self.db_pool, role).await
    }

    /// Replace every stored row for `role`
    #[instrument(skip(self, grants))]
    pub async fn set_role(
        &self,
        role: &str,
        grants: Vec<ModuleGrant>,
    ) -> Result<Vec<ModuleGrant>, ServiceError> {
        if !is_known_role(role) {
            return Err(ServiceError::not_found("Role", role));
        }
        check_grants(&grants)?;

        let txn = self.db_pool.begin().await?;
        RolePermissionEntity::delete_many()
            .filter(role_permission::Column::Role.eq(role))
            .exec(&txn)
            .await?;
        for grant in &grants {
            role_permission::ActiveModel {
                id: Set(Uuid::new_v4()),
                role: Set(role.to_string()),
                module: Set(grant.module.clone()),
                can_view: Set(grant.can_view),
                can_create: Set(grant.can_create),
                can_edit: Set(grant.can_edit),
                can_delete: Set(grant.can_delete),
            }
            .insert(&txn)
            .await?;
        }
        let resolved = Self::role_grants(&txn, role).await?;
        txn.commit().await?;
        info!(modules = grants.len(), "Role permissions replaced");
        Ok(resolved)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Vec<ModuleGrant>, ServiceError> {
        let db = &*self.db_pool;
        UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;
        Self::user_grants(db, user_id).await
    }

    /// Replace every override row for a user. An empty list clears them.
    #[instrument(skip(self, grants), fields(user_id = %user_id))]
    pub async fn set_user(
        &self,
        user_id: Uuid,
        grants: Vec<ModuleGrant>,
    ) -> Result<EffectivePermissions, ServiceError> {
        check_grants(&grants)?;

        let txn = self.db_pool.begin().await?;
        let user = UserEntity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;
        UserPermissionEntity::delete_many()
            .filter(user_permission::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        for grant in &grants {
            user_permission::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                module: Set(grant.module.clone()),
                can_view: Set(grant.can_view),
                can_create: Set(grant.can_create),
                can_edit: Set(grant.can_edit),
                can_delete: Set(grant.can_delete),
            }
            .insert(&txn)
            .await?;
        }
        let effective = Self::effective_for(&txn, &user).await?;
        txn.commit().await?;
        info!(overrides = grants.len(), "User permissions replaced");
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn grants_must_name_known_modules_once() {
        assert!(check_grants(&[ModuleGrant::full("orders")]).is_ok());
        assert_matches!(
            check_grants(&[ModuleGrant::full("returns")]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            check_grants(&[ModuleGrant::full("orders"), ModuleGrant::view_only("orders")]),
            Err(ServiceError::ValidationError(_))
        );
    }
}
