use crate::{
    db::DbPool,
    entities::{
        customer::{self, Entity as CustomerEntity},
        ledger_transaction::LedgerEntityType,
        order::{self, Entity as OrderEntity},
    },
    errors::ServiceError,
    services::{ledger::LedgerService, validate_signed_amount},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_signed_amount")]
    pub opening_balance: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(custom = "validate_signed_amount")]
    pub opening_balance: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
    ledger: Arc<LedgerService>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>, ledger: Arc<LedgerService>) -> Self {
        Self { db_pool, ledger }
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateCustomerRequest) -> Result<customer::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            phone: Set(request.phone),
            email: Set(request.email),
            address: Set(request.address),
            opening_balance: Set(request.opening_balance),
            current_balance: Set(request.opening_balance),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(customer_id = %model.id, "Customer created");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        CustomerEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    pub async fn list(
        &self,
        search: Option<&str>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        let mut query = CustomerEntity::find();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(customer::Column::Name.contains(term))
                    .add(customer::Column::Phone.contains(term))
                    .add(customer::Column::Email.contains(term)),
            );
        }
        let paginator = query
            .order_by_asc(customer::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Orders placed by the customer, newest first
    pub async fn orders(&self, id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        self.get(id).await?;
        Ok(OrderEntity::find()
            .filter(order::Column::CustomerId.eq(id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, request), fields(customer_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;

        let _guard = self.ledger.lock(LedgerEntityType::Customer, id).await;
        let txn = self.db_pool.begin().await?;
        let existing = CustomerEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))?;
        let opening_changed = request
            .opening_balance
            .map_or(false, |ob| ob != existing.opening_balance);

        let mut active: customer::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(opening) = request.opening_balance {
            active.opening_balance = Set(opening);
        }
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        if opening_changed {
            LedgerService::recalculate_in(&txn, LedgerEntityType::Customer, id, None).await?;
        }
        let updated = CustomerEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))?;
        txn.commit().await?;

        info!(opening_changed, "Customer updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let _guard = self.ledger.lock(LedgerEntityType::Customer, id).await;
        let txn = self.db_pool.begin().await?;
        CustomerEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))?;

        if LedgerService::has_transactions(&txn, LedgerEntityType::Customer, id).await? {
            return Err(ServiceError::Conflict(
                "Customer has ledger transactions and cannot be deleted".to_string(),
            ));
        }
        let orders = OrderEntity::find()
            .filter(order::Column::CustomerId.eq(id))
            .count(&txn)
            .await?;
        if orders > 0 {
            return Err(ServiceError::Conflict(
                "Customer has orders and cannot be deleted".to_string(),
            ));
        }

        CustomerEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        info!("Customer deleted");
        Ok(())
    }
}
