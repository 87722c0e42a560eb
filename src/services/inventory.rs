use crate::{
    db::DbPool,
    entities::{
        inventory_item::{self, Entity as InventoryItemEntity, InventoryCategory},
        inventory_movement::{self, Entity as InventoryMovementEntity},
        party::Entity as PartyEntity,
        product::Entity as ProductEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{products::validate_sku, validate_amount, validate_signed_amount},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, ExprTrait}, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateInventoryItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "validate_sku")]
    pub sku: String,
    pub category: InventoryCategory,
    #[validate(length(min = 1, max = 32))]
    pub unit: String,
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub quantity: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub reorder_level: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub unit_cost: Decimal,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
}

/// Quantity is changed only through adjustments so every change has a movement.
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateInventoryItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(custom = "validate_sku")]
    pub sku: Option<String>,
    pub category: Option<InventoryCategory>,
    #[validate(length(min = 1, max = 32))]
    pub unit: Option<String>,
    #[validate(custom = "validate_amount")]
    pub reorder_level: Option<Decimal>,
    #[validate(custom = "validate_amount")]
    pub unit_cost: Option<Decimal>,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdjustStockRequest {
    /// Signed change; negative to consume
    #[validate(custom = "validate_signed_amount")]
    pub delta: Decimal,
    #[validate(length(min = 1, max = 64))]
    pub reason: String,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InventoryFilter {
    pub search: Option<String>,
    pub category: Option<InventoryCategory>,
    pub low_stock: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockAdjustment {
    pub item: inventory_item::Model,
    pub movement: inventory_movement::Model,
}

/// Result of an adjustment made inside someone else's transaction
#[derive(Debug, Clone)]
pub struct AppliedAdjustment {
    pub item: inventory_item::Model,
    pub movement: inventory_movement::Model,
    pub became_low: bool,
}

impl AppliedAdjustment {
    pub fn low_stock_event(&self) -> Option<Event> {
        self.became_low.then(|| Event::LowStock {
            item_id: self.item.id,
            name: self.item.name.clone(),
            quantity: self.item.quantity,
            reorder_level: self.item.reorder_level,
            unit: self.item.unit.clone(),
        })
    }
}

/// New quantity after applying `delta`, refusing to go below zero
pub fn apply_delta(quantity: Decimal, delta: Decimal) -> Result<Decimal, ServiceError> {
    let next = quantity.checked_add(delta).ok_or_else(|| {
        ServiceError::ValidationError("Stock quantity is out of range".to_string())
    })?;
    if next < Decimal::ZERO {
        return Err(ServiceError::InsufficientStock(format!(
            "Cannot remove {} with only {} on hand",
            -delta, quantity
        )));
    }
    Ok(next)
}

#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn check_links<C: ConnectionTrait>(
        conn: &C,
        product_id: Option<Uuid>,
        supplier_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if let Some(product_id) = product_id {
            ProductEntity::find_by_id(product_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Product", product_id))?;
        }
        if let Some(supplier_id) = supplier_id {
            PartyEntity::find_by_id(supplier_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Party", supplier_id))?;
        }
        Ok(())
    }

    async fn ensure_unique_sku(&self, sku: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = InventoryItemEntity::find().filter(inventory_item::Column::Sku.eq(sku));
        if let Some(id) = except {
            query = query.filter(inventory_item::Column::Id.ne(id));
        }
        if query.one(&*self.db_pool).await?.is_some() {
            return Err(ServiceError::Conflict(format!("SKU '{}' is already in use", sku)));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create(
        &self,
        request: CreateInventoryItemRequest,
        created_by: Option<Uuid>,
    ) -> Result<inventory_item::Model, ServiceError> {
        request.validate()?;
        if request.quantity < Decimal::ZERO || request.reorder_level < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Quantity and reorder level cannot be negative".to_string(),
            ));
        }
        self.ensure_unique_sku(&request.sku, None).await?;

        let txn = self.db_pool.begin().await?;
        Self::check_links(&txn, request.product_id, request.supplier_id).await?;

        let now = Utc::now();
        let item = inventory_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            sku: Set(request.sku),
            category: Set(request.category),
            unit: Set(request.unit),
            quantity: Set(request.quantity),
            reorder_level: Set(request.reorder_level),
            unit_cost: Set(request.unit_cost),
            product_id: Set(request.product_id),
            supplier_id: Set(request.supplier_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        if !item.quantity.is_zero() {
            Self::record_movement(&txn, &item, item.quantity, "opening_stock", None, created_by)
                .await?;
        }
        txn.commit().await?;

        info!(item_id = %item.id, "Inventory item created");
        Ok(item)
    }

    pub async fn get(&self, id: Uuid) -> Result<inventory_item::Model, ServiceError> {
        InventoryItemEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Inventory item", id))
    }

    pub async fn list(
        &self,
        filter: &InventoryFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_item::Model>, u64), ServiceError> {
        let mut query = InventoryItemEntity::find();
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(inventory_item::Column::Name.contains(term))
                    .add(inventory_item::Column::Sku.contains(term)),
            );
        }
        if let Some(category) = filter.category {
            query = query.filter(inventory_item::Column::Category.eq(category));
        }
        if filter.low_stock == Some(true) {
            query = query.filter(
                Expr::col(inventory_item::Column::Quantity)
                    .lte(Expr::col(inventory_item::Column::ReorderLevel)),
            );
        }

        let paginator = query
            .order_by_asc(inventory_item::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Items at or below their reorder level, worst first
    pub async fn low_stock(&self) -> Result<Vec<inventory_item::Model>, ServiceError> {
        // Compared in Rust: SQLite stores decimals as REAL.
        let mut items: Vec<_> = InventoryItemEntity::find()
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .filter(inventory_item::Model::is_low_stock)
            .collect();
        items.sort_by(|a, b| (a.quantity - a.reorder_level).cmp(&(b.quantity - b.reorder_level)));
        Ok(items)
    }

    #[instrument(skip(self, request), fields(item_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateInventoryItemRequest,
    ) -> Result<inventory_item::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        if let Some(sku) = &request.sku {
            self.ensure_unique_sku(sku, Some(id)).await?;
        }
        Self::check_links(&*self.db_pool, request.product_id, request.supplier_id).await?;

        let mut active: inventory_item::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(sku) = request.sku {
            active.sku = Set(sku);
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(reorder_level) = request.reorder_level {
            if reorder_level < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Reorder level cannot be negative".to_string(),
                ));
            }
            active.reorder_level = Set(reorder_level);
        }
        if let Some(unit_cost) = request.unit_cost {
            active.unit_cost = Set(unit_cost);
        }
        if request.product_id.is_some() {
            active.product_id = Set(request.product_id);
        }
        if request.supplier_id.is_some() {
            active.supplier_id = Set(request.supplier_id);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        InventoryItemEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Inventory item", id))?;
        InventoryMovementEntity::delete_many()
            .filter(inventory_movement::Column::ItemId.eq(id))
            .exec(&txn)
            .await?;
        InventoryItemEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        info!("Inventory item deleted");
        Ok(())
    }

    async fn record_movement<C: ConnectionTrait>(
        conn: &C,
        item: &inventory_item::Model,
        delta: Decimal,
        reason: &str,
        reference: Option<String>,
        created_by: Option<Uuid>,
    ) -> Result<inventory_movement::Model, ServiceError> {
        Ok(inventory_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item.id),
            delta: Set(delta),
            quantity_after: Set(item.quantity),
            reason: Set(reason.to_string()),
            reference: Set(reference),
            created_by: Set(created_by),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?)
    }

    /// Apply a signed stock change and write its movement row.
    pub async fn adjust_in<C: ConnectionTrait>(
        conn: &C,
        item_id: Uuid,
        delta: Decimal,
        reason: &str,
        reference: Option<String>,
        created_by: Option<Uuid>,
    ) -> Result<AppliedAdjustment, ServiceError> {
        if delta.is_zero() {
            return Err(ServiceError::ValidationError(
                "Adjustment must change the quantity".to_string(),
            ));
        }
        // Single conditional update so concurrent adjustments cannot lose writes
        // or take the quantity below zero
        let changed = InventoryItemEntity::update_many()
            .col_expr(
                inventory_item::Column::Quantity,
                Expr::col(inventory_item::Column::Quantity).add(delta),
            )
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_item::Column::Id.eq(item_id))
            .filter(Expr::col(inventory_item::Column::Quantity).add(delta).gte(0))
            .exec(conn)
            .await?;
        if changed.rows_affected == 0 {
            let existing = InventoryItemEntity::find_by_id(item_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Inventory item", item_id))?;
            apply_delta(existing.quantity, delta)?;
            return Err(ServiceError::Conflict(format!(
                "Stock for item {} changed concurrently",
                item_id
            )));
        }

        let item = InventoryItemEntity::find_by_id(item_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Inventory item", item_id))?;
        let before = item.quantity - delta;
        let was_low = before <= item.reorder_level;

        let movement =
            Self::record_movement(conn, &item, delta, reason, reference, created_by).await?;
        let became_low = !was_low && item.is_low_stock();
        Ok(AppliedAdjustment {
            item,
            movement,
            became_low,
        })
    }

    pub async fn publish_low_stock(&self, applied: &AppliedAdjustment) {
        if let (Some(event), Some(sender)) = (applied.low_stock_event(), &self.event_sender) {
            sender.publish(event).await;
        }
    }

    #[instrument(skip(self, request), fields(item_id = %id, delta = %request.delta))]
    pub async fn adjust(
        &self,
        id: Uuid,
        request: AdjustStockRequest,
        created_by: Option<Uuid>,
    ) -> Result<StockAdjustment, ServiceError> {
        request.validate()?;
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin stock adjustment");
            ServiceError::DatabaseError(e)
        })?;
        let applied = Self::adjust_in(
            &txn,
            id,
            request.delta,
            request.reason.trim(),
            request.reference,
            created_by,
        )
        .await?;
        txn.commit().await?;

        info!(quantity = %applied.item.quantity, "Stock adjusted");
        metrics::counter!("bakery_stock_adjustments", 1);
        self.publish_low_stock(&applied).await;
        Ok(StockAdjustment {
            item: applied.item,
            movement: applied.movement,
        })
    }

    pub async fn movements(
        &self,
        id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_movement::Model>, u64), ServiceError> {
        self.get(id).await?;
        let paginator = InventoryMovementEntity::find()
            .filter(inventory_movement::Column::ItemId.eq(id))
            .order_by_desc(inventory_movement::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// The finished-good item that stocks a product, if any
    pub async fn finished_good_for<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
    ) -> Result<Option<inventory_item::Model>, ServiceError> {
        Ok(InventoryItemEntity::find()
            .filter(inventory_item::Column::ProductId.eq(product_id))
            .filter(inventory_item::Column::Category.eq(InventoryCategory::FinishedGood))
            .one(conn)
            .await?)
    }
}
