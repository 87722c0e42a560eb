use crate::{
    db::DbPool,
    entities::{
        customer::{self, Entity as CustomerEntity},
        ledger_transaction::{self, Entity as LedgerEntity, LedgerEntityType},
        order::{self, Entity as OrderEntity, OrderStatus, PaymentStatus},
        order_item::{self, Entity as OrderItemEntity},
        order_payment::{self, Entity as OrderPaymentEntity},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{LedgerGuard, LedgerService, NewLedgerRow},
    services::{start_of_day, validate_amount},
};
use chrono::{NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(custom = "validate_amount")]
    pub quantity: Decimal,
    /// Defaults to the product's current price
    #[validate(custom = "validate_amount")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub customer_id: Option<Uuid>,
    /// Required for walk-in orders without a customer account
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 32))]
    pub customer_phone: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "An order needs at least one item"))]
    pub items: Vec<OrderItemRequest>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Advance paid when the order is taken
    #[validate(custom = "validate_amount")]
    pub initial_payment: Option<Decimal>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderRequest {
    #[validate(length(max = 32))]
    pub customer_phone: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecordPaymentRequest {
    #[validate(custom = "validate_amount")]
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    /// Inclusive, on the order's creation date
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub payments: Vec<order_payment::Model>,
}

/// `ORD-YYYYMMDD-XXXXXX`
pub fn generate_order_number(date: NaiveDate) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", date.format("%Y%m%d"), suffix)
}

/// Line totals (rounded to cents) and the order total for `(quantity, unit_price)` pairs
pub fn price_lines(lines: &[(Decimal, Decimal)]) -> Result<(Vec<Decimal>, Decimal), ServiceError> {
    let too_large = || ServiceError::ValidationError("Order total is too large".to_string());
    let totals = lines
        .iter()
        .map(|(qty, price)| qty.checked_mul(*price).map(|t| t.round_dp(2)).ok_or_else(too_large))
        .collect::<Result<Vec<_>, _>>()?;
    let total = totals
        .iter()
        .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(*t))
        .ok_or_else(too_large)?;
    Ok((totals, total))
}

#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    ledger: Arc<LedgerService>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        ledger: Arc<LedgerService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db_pool,
            ledger,
            event_sender,
        }
    }

    async fn publish(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.publish(event).await;
        }
    }

    async fn lock_customer(&self, customer_id: Option<Uuid>) -> Option<LedgerGuard> {
        match customer_id {
            Some(id) => Some(self.ledger.lock(LedgerEntityType::Customer, id).await),
            None => None,
        }
    }

    /// Write `active` only while the order still has the status and paid
    /// amount that `existing` was read with.
    async fn update_unchanged<C: ConnectionTrait>(
        conn: &C,
        existing: &order::Model,
        active: order::ActiveModel,
    ) -> Result<order::Model, ServiceError> {
        let result = OrderEntity::update_many()
            .set(active)
            .filter(order::Column::Id.eq(existing.id))
            .filter(order::Column::Status.eq(existing.status))
            .filter(order::Column::AmountPaid.eq(existing.amount_paid))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Order {} was changed by another request",
                existing.order_number
            )));
        }
        OrderEntity::find_by_id(existing.id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", existing.id))
    }

    async fn begin(&self) -> Result<DatabaseTransaction, ServiceError> {
        self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin order transaction");
            ServiceError::DatabaseError(e)
        })
    }

    async fn post_to_customer(
        txn: &DatabaseTransaction,
        order: &order::Model,
        description: String,
        debit: Decimal,
        credit: Decimal,
        created_by: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let Some(customer_id) = order.customer_id else {
            return Ok(());
        };
        let today = Utc::now().date_naive();
        LedgerService::insert_in(
            txn,
            NewLedgerRow {
                entity_type: LedgerEntityType::Customer,
                entity_id: customer_id,
                txn_date: today,
                description,
                reference: Some(order.order_number.clone()),
                debit,
                credit,
                order_id: Some(order.id),
                created_by,
            },
        )
        .await?;
        LedgerService::recalculate_in(txn, LedgerEntityType::Customer, customer_id, Some(today))
            .await?;
        Ok(())
    }

    async fn load_detail<C: ConnectionTrait>(
        conn: &C,
        order: order::Model,
    ) -> Result<OrderDetail, ServiceError> {
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(conn)
            .await?;
        let payments = OrderPaymentEntity::find()
            .filter(order_payment::Column::OrderId.eq(order.id))
            .order_by_asc(order_payment::Column::ReceivedAt)
            .all(conn)
            .await?;
        Ok(OrderDetail {
            order,
            items,
            payments,
        })
    }

    #[instrument(skip(self, request), fields(customer_id = ?request.customer_id, items = request.items.len()))]
    pub async fn create(
        &self,
        request: CreateOrderRequest,
        created_by: Option<Uuid>,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
            if item.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Item quantity must be greater than zero".to_string(),
                ));
            }
            if item.unit_price.map_or(false, |p| p < Decimal::ZERO) {
                return Err(ServiceError::ValidationError(
                    "Unit price cannot be negative".to_string(),
                ));
            }
        }

        let _guard = self.lock_customer(request.customer_id).await;
        let txn = self.begin().await?;

        let customer_name = match request.customer_id {
            Some(customer_id) => {
                let customer: customer::Model = CustomerEntity::find_by_id(customer_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Customer", customer_id))?;
                request.customer_name.clone().unwrap_or(customer.name)
            }
            None => request
                .customer_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| {
                    ServiceError::ValidationError(
                        "customer_name is required when no customer is selected".to_string(),
                    )
                })?,
        };

        let product_ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = products
                .get(&item.product_id)
                .ok_or_else(|| ServiceError::not_found("Product", item.product_id))?;
            if !product.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Product '{}' is not available",
                    product.name
                )));
            }
            lines.push((product, item.quantity, item.unit_price.unwrap_or(product.price)));
        }
        let priced: Vec<_> = lines.iter().map(|(_, q, p)| (*q, *p)).collect();
        let (line_totals, total) = price_lines(&priced)?;

        let paid = request.initial_payment.unwrap_or(Decimal::ZERO);
        if paid < Decimal::ZERO || paid > total {
            return Err(ServiceError::ValidationError(format!(
                "Initial payment must be between 0 and the order total {}",
                total
            )));
        }

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(generate_order_number(now.date_naive())),
            customer_id: Set(request.customer_id),
            customer_name: Set(customer_name.trim().to_string()),
            customer_phone: Set(request.customer_phone),
            status: Set(OrderStatus::Pending),
            delivery_date: Set(request.delivery_date),
            total_amount: Set(total),
            amount_paid: Set(paid),
            payment_status: Set(PaymentStatus::from_amounts(total, paid)),
            notes: Set(request.notes),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for ((product, quantity, unit_price), line_total) in lines.into_iter().zip(line_totals) {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(quantity),
                unit_price: Set(unit_price),
                line_total: Set(line_total),
            }
            .insert(&txn)
            .await?;
        }

        if total > Decimal::ZERO {
            Self::post_to_customer(
                &txn,
                &order,
                format!("Order {}", order.order_number),
                total,
                Decimal::ZERO,
                created_by,
            )
            .await?;
        }
        if paid > Decimal::ZERO {
            order_payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                amount: Set(paid),
                note: Set(Some("Advance".to_string())),
                recorded_by: Set(created_by),
                received_at: Set(now),
            }
            .insert(&txn)
            .await?;
            Self::post_to_customer(
                &txn,
                &order,
                format!("Advance for order {}", order.order_number),
                Decimal::ZERO,
                paid,
                created_by,
            )
            .await?;
        }

        let detail = Self::load_detail(&txn, order).await?;
        txn.commit().await?;
        drop(_guard);

        info!(order_id = %detail.order.id, order_number = %detail.order.order_number, total = %total, "Order created");
        metrics::counter!("bakery_orders_created", 1);
        self.publish(Event::OrderCreated {
            order_id: detail.order.id,
            order_number: detail.order.order_number.clone(),
            customer_name: detail.order.customer_name.clone(),
            total,
        })
        .await;
        if paid > Decimal::ZERO {
            self.publish(Event::PaymentRecorded {
                order_id: detail.order.id,
                order_number: detail.order.order_number.clone(),
                amount: paid,
            })
            .await;
        }
        Ok(detail)
    }

    pub async fn get(&self, id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = OrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;
        Self::load_detail(&*self.db_pool, order).await
    }

    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(order::Column::CreatedAt.gte(start_of_day(from)));
        }
        if let Some(to) = filter.to.and_then(|d| d.succ_opt()) {
            query = query.filter(order::Column::CreatedAt.lt(start_of_day(to)));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(order::Column::OrderNumber.contains(term))
                    .add(order::Column::CustomerName.contains(term))
                    .add(order::Column::CustomerPhone.contains(term)),
            );
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, request), fields(order_id = %id))]
    pub async fn update(&self, id: Uuid, request: UpdateOrderRequest) -> Result<order::Model, ServiceError> {
        request.validate()?;
        let existing = OrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;
        if existing.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order is {} and can no longer be edited",
                existing.status
            )));
        }

        let mut active: order::ActiveModel = existing.into();
        if let Some(phone) = request.customer_phone {
            active.customer_phone = Set(Some(phone));
        }
        if let Some(date) = request.delivery_date {
            active.delivery_date = Set(Some(date));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self), fields(order_id = %id, to = %next))]
    pub async fn set_status(
        &self,
        id: Uuid,
        next: OrderStatus,
        actor: Option<Uuid>,
    ) -> Result<order::Model, ServiceError> {
        let customer_id = OrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?
            .customer_id;
        let _guard = self.lock_customer(customer_id).await;
        let txn = self.begin().await?;

        let existing = OrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;
        let from = existing.status;
        if !from.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move order from {} to {}",
                from, next
            )));
        }

        let mut active: order::ActiveModel = existing.clone().into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = Self::update_unchanged(&txn, &existing, active).await?;

        if next == OrderStatus::Cancelled {
            let unpaid = existing.balance_due();
            if unpaid > Decimal::ZERO {
                Self::post_to_customer(
                    &txn,
                    &updated,
                    format!("Order {} cancelled", updated.order_number),
                    Decimal::ZERO,
                    unpaid,
                    actor,
                )
                .await?;
            }
        }
        txn.commit().await?;
        drop(_guard);

        info!(from = %from, "Order status changed");
        self.publish(Event::OrderStatusChanged {
            order_id: id,
            order_number: updated.order_number.clone(),
            from,
            to: next,
        })
        .await;
        Ok(updated)
    }

    #[instrument(skip(self, request), fields(order_id = %id, amount = %request.amount))]
    pub async fn record_payment(
        &self,
        id: Uuid,
        request: RecordPaymentRequest,
        actor: Option<Uuid>,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Payment amount must be greater than zero".to_string(),
            ));
        }

        let customer_id = OrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?
            .customer_id;
        let _guard = self.lock_customer(customer_id).await;
        let txn = self.begin().await?;

        let existing = OrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;
        if existing.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidStatus(
                "Cannot take payment for a cancelled order".to_string(),
            ));
        }
        if request.amount > existing.balance_due() {
            return Err(ServiceError::ValidationError(format!(
                "Payment of {} exceeds the balance due of {}",
                request.amount,
                existing.balance_due()
            )));
        }

        let now = Utc::now();
        order_payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(id),
            amount: Set(request.amount),
            note: Set(request.note),
            recorded_by: Set(actor),
            received_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let paid = existing.amount_paid + request.amount;
        let mut active: order::ActiveModel = existing.clone().into();
        active.amount_paid = Set(paid);
        active.payment_status = Set(PaymentStatus::from_amounts(existing.total_amount, paid));
        active.updated_at = Set(now);
        let updated = Self::update_unchanged(&txn, &existing, active).await?;

        Self::post_to_customer(
            &txn,
            &updated,
            format!("Payment for order {}", updated.order_number),
            Decimal::ZERO,
            request.amount,
            actor,
        )
        .await?;

        let detail = Self::load_detail(&txn, updated).await?;
        txn.commit().await?;
        drop(_guard);

        info!(paid = %paid, "Payment recorded");
        metrics::counter!("bakery_order_payments", 1);
        self.publish(Event::PaymentRecorded {
            order_id: id,
            order_number: detail.order.order_number.clone(),
            amount: request.amount,
        })
        .await;
        Ok(detail)
    }

    /// Remove a pending or cancelled order along with the ledger rows it posted
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let customer_id = OrderEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?
            .customer_id;
        let _guard = self.lock_customer(customer_id).await;
        let txn = self.begin().await?;

        let existing = OrderEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;
        if !matches!(existing.status, OrderStatus::Pending | OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidStatus(format!(
                "Only pending or cancelled orders can be deleted; this one is {}",
                existing.status
            )));
        }

        let posted = LedgerEntity::find()
            .filter(ledger_transaction::Column::OrderId.eq(id))
            .all(&txn)
            .await?;
        let earliest = posted.iter().map(|r| r.txn_date).min();
        LedgerEntity::delete_many()
            .filter(ledger_transaction::Column::OrderId.eq(id))
            .exec(&txn)
            .await?;
        OrderPaymentEntity::delete_many()
            .filter(order_payment::Column::OrderId.eq(id))
            .exec(&txn)
            .await?;
        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(id))
            .exec(&txn)
            .await?;
        OrderEntity::delete_by_id(id).exec(&txn).await?;

        if let (Some(customer_id), Some(from)) = (existing.customer_id, earliest) {
            LedgerService::recalculate_in(&txn, LedgerEntityType::Customer, customer_id, Some(from))
                .await?;
        }
        txn.commit().await?;
        info!("Order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_number_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let number = generate_order_number(date);
        assert!(number.starts_with("ORD-20240309-"));
        let suffix = &number["ORD-20240309-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn lines_round_to_cents() {
        let (lines, total) =
            price_lines(&[(dec!(3), dec!(12.333)), (dec!(0.5), dec!(240))]).unwrap();
        assert_eq!(lines, vec![dec!(37.00), dec!(120.00)]);
        assert_eq!(total, dec!(157.00));
    }

    #[test]
    fn overflowing_line_is_rejected() {
        let huge = Decimal::MAX;
        assert_matches::assert_matches!(
            price_lines(&[(huge, dec!(2))]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches::assert_matches!(
            price_lines(&[(huge, dec!(1)), (huge, dec!(1))]),
            Err(ServiceError::ValidationError(_))
        );
    }
}
