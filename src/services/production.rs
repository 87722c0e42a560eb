use crate::{
    db::DbPool,
    entities::{
        product::Entity as ProductEntity,
        production_item::{self, Entity as ProductionEntity, ProductionStatus},
        staff::Entity as StaffEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::{AppliedAdjustment, InventoryService},
    services::validate_amount,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateProductionRequest {
    pub product_id: Uuid,
    #[validate(custom = "validate_amount")]
    pub quantity: Decimal,
    pub scheduled_date: NaiveDate,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProductionRequest {
    #[validate(custom = "validate_amount")]
    pub quantity: Option<Decimal>,
    pub scheduled_date: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProductionStatusRequest {
    pub status: ProductionStatus,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<ProductionStatus>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductionEntry {
    #[serde(flatten)]
    pub item: production_item::Model,
    pub product_name: String,
}

#[derive(Clone)]
pub struct ProductionService {
    db_pool: Arc<DbPool>,
    inventory: Arc<InventoryService>,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductionService {
    pub fn new(
        db_pool: Arc<DbPool>,
        inventory: Arc<InventoryService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            inventory,
            event_sender,
        }
    }

    async fn check_refs<C: ConnectionTrait>(
        conn: &C,
        product_id: Option<Uuid>,
        assigned_to: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if let Some(product_id) = product_id {
            ProductEntity::find_by_id(product_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Product", product_id))?;
        }
        if let Some(staff_id) = assigned_to {
            StaffEntity::find_by_id(staff_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Staff", staff_id))?;
        }
        Ok(())
    }

    async fn with_names(
        &self,
        items: Vec<production_item::Model>,
    ) -> Result<Vec<ProductionEntry>, ServiceError> {
        let products = items.load_one(ProductEntity, &*self.db_pool).await?;
        Ok(items
            .into_iter()
            .zip(products)
            .map(|(item, product)| ProductionEntry {
                product_name: product.map(|p| p.name).unwrap_or_default(),
                item,
            })
            .collect())
    }

    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn create(
        &self,
        request: CreateProductionRequest,
    ) -> Result<production_item::Model, ServiceError> {
        request.validate()?;
        if request.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }
        Self::check_refs(&*self.db_pool, Some(request.product_id), request.assigned_to).await?;

        let now = Utc::now();
        let model = production_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(request.product_id),
            quantity: Set(request.quantity),
            scheduled_date: Set(request.scheduled_date),
            status: Set(ProductionStatus::Planned),
            assigned_to: Set(request.assigned_to),
            notes: Set(request.notes),
            started_at: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(schedule_id = %model.id, "Production scheduled");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<production_item::Model, ServiceError> {
        ProductionEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Production item", id))
    }

    pub async fn list(
        &self,
        filter: &ProductionFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ProductionEntry>, u64), ServiceError> {
        let mut query = ProductionEntity::find();
        if let Some(from) = filter.from {
            query = query.filter(production_item::Column::ScheduledDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(production_item::Column::ScheduledDate.lte(to));
        }
        if let Some(status) = filter.status {
            query = query.filter(production_item::Column::Status.eq(status));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(production_item::Column::ProductId.eq(product_id));
        }

        let paginator = query
            .order_by_asc(production_item::Column::ScheduledDate)
            .order_by_asc(production_item::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((self.with_names(items).await?, total))
    }

    /// Everything scheduled for `date`
    pub async fn for_date(&self, date: NaiveDate) -> Result<Vec<ProductionEntry>, ServiceError> {
        let items = ProductionEntity::find()
            .filter(production_item::Column::ScheduledDate.eq(date))
            .order_by_asc(production_item::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        self.with_names(items).await
    }

    #[instrument(skip(self, request), fields(schedule_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductionRequest,
    ) -> Result<production_item::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        if existing.status != ProductionStatus::Planned {
            return Err(ServiceError::InvalidStatus(format!(
                "Only planned batches can be edited; this one is {}",
                existing.status
            )));
        }
        Self::check_refs(&*self.db_pool, None, request.assigned_to).await?;

        let mut active: production_item::ActiveModel = existing.into();
        if let Some(quantity) = request.quantity {
            if quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Quantity must be greater than zero".to_string(),
                ));
            }
            active.quantity = Set(quantity);
        }
        if let Some(date) = request.scheduled_date {
            active.scheduled_date = Set(date);
        }
        if request.assigned_to.is_some() {
            active.assigned_to = Set(request.assigned_to);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db_pool).await?)
    }

    /// Move a batch along its lifecycle. Completion adds the batch to the
    /// finished-good stock of the product, when one is tracked.
    #[instrument(skip(self), fields(schedule_id = %id, to = %next))]
    pub async fn set_status(
        &self,
        id: Uuid,
        next: ProductionStatus,
        actor: Option<Uuid>,
    ) -> Result<production_item::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let existing = ProductionEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Production item", id))?;

        if !existing.status.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move production from {} to {}",
                existing.status, next
            )));
        }

        let now = Utc::now();
        let product_id = existing.product_id;
        let quantity = existing.quantity;
        let mut active: production_item::ActiveModel = existing.clone().into();
        active.status = Set(next);
        active.updated_at = Set(now);
        match next {
            ProductionStatus::InProgress => active.started_at = Set(Some(now)),
            ProductionStatus::Completed => active.completed_at = Set(Some(now)),
            ProductionStatus::Planned | ProductionStatus::Cancelled => {}
        }
        // Only one caller may move the batch out of the status it read
        let moved = ProductionEntity::update_many()
            .set(active)
            .filter(production_item::Column::Id.eq(id))
            .filter(production_item::Column::Status.eq(existing.status))
            .exec(&txn)
            .await?;
        if moved.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Production item {} changed status concurrently",
                id
            )));
        }
        let updated = ProductionEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Production item", id))?;

        let mut applied: Option<AppliedAdjustment> = None;
        if next == ProductionStatus::Completed {
            match InventoryService::finished_good_for(&txn, product_id).await? {
                Some(item) => {
                    applied = Some(
                        InventoryService::adjust_in(
                            &txn,
                            item.id,
                            quantity,
                            "production",
                            Some(id.to_string()),
                            actor,
                        )
                        .await?,
                    );
                }
                None => warn!(%product_id, "No finished-good item tracks this product"),
            }
        }
        let product_name = ProductEntity::find_by_id(product_id)
            .one(&txn)
            .await?
            .map(|p| p.name)
            .unwrap_or_default();
        txn.commit().await?;

        info!("Production status changed");
        if let Some(applied) = &applied {
            self.inventory.publish_low_stock(applied).await;
        }
        if next == ProductionStatus::Completed {
            metrics::counter!("bakery_production_completed", 1);
            if let Some(sender) = &self.event_sender {
                sender
                    .publish(Event::ProductionCompleted {
                        schedule_id: id,
                        product_name,
                        quantity,
                    })
                    .await;
            }
        }
        Ok(updated)
    }

    #[instrument(skip(self), fields(schedule_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if existing.status == ProductionStatus::Completed {
            return Err(ServiceError::InvalidStatus(
                "Completed batches are part of stock history and cannot be deleted".to_string(),
            ));
        }
        ProductionEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        Ok(())
    }
}
