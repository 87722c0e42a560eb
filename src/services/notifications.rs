use crate::{
    db::DbPool,
    entities::notification::{self, Entity as NotificationEntity, NotificationKind},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr,
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// A notification waiting to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

/// Persisted notification feed, pruned to the newest `retention` rows
#[derive(Clone)]
pub struct NotificationService {
    db_pool: Arc<DbPool>,
    retention: u64,
}

impl NotificationService {
    pub fn new(db_pool: Arc<DbPool>, retention: u64) -> Self {
        Self {
            db_pool,
            retention: retention.max(1),
        }
    }

    #[instrument(skip(self, new), fields(kind = %new.kind))]
    pub async fn push(&self, new: NewNotification) -> Result<notification::Model, ServiceError> {
        let db = &*self.db_pool;
        let model = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title),
            message: Set(new.message),
            kind: Set(new.kind),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        let pruned = self.prune().await?;
        if pruned > 0 {
            debug!(pruned, "Pruned old notifications");
        }
        metrics::counter!("bakery_notifications_created", 1);
        Ok(model)
    }

    /// Delete everything past the newest `retention` rows
    pub async fn prune(&self) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;
        // The table never grows far past `retention`, so walking the ids is cheap.
        let ids: Vec<Uuid> = NotificationEntity::find()
            .select_only()
            .column(notification::Column::Id)
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .into_tuple()
            .all(db)
            .await?;
        let stale: Vec<Uuid> = ids.into_iter().skip(self.retention as usize).collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let result = NotificationEntity::delete_many()
            .filter(notification::Column::Id.is_in(stale))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn list(
        &self,
        unread_only: bool,
        limit: u64,
    ) -> Result<Vec<notification::Model>, ServiceError> {
        let mut query = NotificationEntity::find();
        if unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }
        Ok(query
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .limit(limit.min(self.retention))
            .all(&*self.db_pool)
            .await?)
    }

    pub async fn unread_count(&self) -> Result<u64, ServiceError> {
        Ok(NotificationEntity::find()
            .filter(notification::Column::IsRead.eq(false))
            .count(&*self.db_pool)
            .await?)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<notification::Model, ServiceError> {
        let db = &*self.db_pool;
        let existing = NotificationEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Notification", id))?;

        let mut active: notification::ActiveModel = existing.into();
        active.is_read = Set(true);
        Ok(active.update(db).await?)
    }

    pub async fn mark_all_read(&self) -> Result<u64, ServiceError> {
        let result = NotificationEntity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::IsRead.eq(false))
            .exec(&*self.db_pool)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = NotificationEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Notification", id));
        }
        Ok(())
    }
}
