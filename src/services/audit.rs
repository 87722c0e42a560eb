use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        audit_log::{self, Entity as AuditLogEntity},
        login_log::{self, Entity as LoginLogEntity},
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogFilter {
    pub user_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub action: Option<String>,
}

/// A login attempt as seen by the HTTP layer
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub user_id: Option<Uuid>,
    pub username: String,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Append-only audit and login trails
#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Records an admin action. Failures are logged, never surfaced: the
    /// action itself already succeeded.
    pub async fn record(
        &self,
        actor: &AuthUser,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        details: Option<Value>,
    ) {
        let row = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(Some(actor.user_id)),
            username: Set(Some(actor.username.clone())),
            action: Set(action.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id),
            details: Set(details),
            created_at: Set(Utc::now()),
        };
        if let Err(e) = row.insert(&*self.db_pool).await {
            warn!(error = %e, action, entity_type, "Failed to write audit log");
        }
    }

    pub async fn record_login(&self, attempt: LoginAttempt) {
        let row = login_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(attempt.user_id),
            username: Set(attempt.username),
            success: Set(attempt.success),
            ip_address: Set(attempt.ip_address),
            user_agent: Set(attempt.user_agent),
            created_at: Set(Utc::now()),
        };
        if let Err(e) = row.insert(&*self.db_pool).await {
            warn!(error = %e, "Failed to write login log");
        }
    }

    pub async fn list(
        &self,
        filter: &AuditLogFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), ServiceError> {
        let mut query = AuditLogEntity::find();
        if let Some(user_id) = filter.user_id {
            query = query.filter(audit_log::Column::UserId.eq(user_id));
        }
        if let Some(entity_type) = &filter.entity_type {
            query = query.filter(audit_log::Column::EntityType.eq(entity_type.as_str()));
        }
        if let Some(action) = &filter.action {
            query = query.filter(audit_log::Column::Action.eq(action.as_str()));
        }

        let paginator = query
            .order_by_desc(audit_log::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    pub async fn list_logins(
        &self,
        user_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<login_log::Model>, u64), ServiceError> {
        let mut query = LoginLogEntity::find();
        if let Some(user_id) = user_id {
            query = query.filter(login_log::Column::UserId.eq(user_id));
        }
        let paginator = query
            .order_by_desc(login_log::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }
}
