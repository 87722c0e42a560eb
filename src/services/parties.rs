use crate::{
    db::DbPool,
    entities::{
        inventory_item::{self, Entity as InventoryItemEntity},
        ledger_transaction::LedgerEntityType,
        party::{self, Entity as PartyEntity},
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
pub struct CreatePartyRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 32))]
    pub tax_id: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_signed_amount")]
    pub opening_balance: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdatePartyRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 32))]
    pub tax_id: Option<String>,
    #[validate(custom = "validate_signed_amount")]
    pub opening_balance: Option<Decimal>,
    pub notes: Option<String>,
}

/// Suppliers and other counterparties we keep a payable ledger for
#[derive(Clone)]
pub struct PartyService {
    db_pool: Arc<DbPool>,
    ledger: Arc<LedgerService>,
}

impl PartyService {
    pub fn new(db_pool: Arc<DbPool>, ledger: Arc<LedgerService>) -> Self {
        Self { db_pool, ledger }
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreatePartyRequest) -> Result<party::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let model = party::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            company: Set(request.company),
            phone: Set(request.phone),
            email: Set(request.email),
            address: Set(request.address),
            tax_id: Set(request.tax_id),
            opening_balance: Set(request.opening_balance),
            current_balance: Set(request.opening_balance),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(party_id = %model.id, "Party created");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<party::Model, ServiceError> {
        PartyEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Party", id))
    }

    pub async fn list(
        &self,
        search: Option<&str>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<party::Model>, u64), ServiceError> {
        let mut query = PartyEntity::find();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(party::Column::Name.contains(term))
                    .add(party::Column::Company.contains(term))
                    .add(party::Column::Phone.contains(term)),
            );
        }
        let paginator = query
            .order_by_asc(party::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, request), fields(party_id = %id))]
    pub async fn update(&self, id: Uuid, request: UpdatePartyRequest) -> Result<party::Model, ServiceError> {
        request.validate()?;

        let _guard = self.ledger.lock(LedgerEntityType::Party, id).await;
        let txn = self.db_pool.begin().await?;
        let existing = PartyEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Party", id))?;
        let opening_changed = request
            .opening_balance
            .map_or(false, |ob| ob != existing.opening_balance);

        let mut active: party::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(company) = request.company {
            active.company = Set(Some(company));
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
        if let Some(tax_id) = request.tax_id {
            active.tax_id = Set(Some(tax_id));
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
            LedgerService::recalculate_in(&txn, LedgerEntityType::Party, id, None).await?;
        }
        let updated = PartyEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Party", id))?;
        txn.commit().await?;

        info!(opening_changed, "Party updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(party_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let _guard = self.ledger.lock(LedgerEntityType::Party, id).await;
        let txn = self.db_pool.begin().await?;
        PartyEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Party", id))?;

        if LedgerService::has_transactions(&txn, LedgerEntityType::Party, id).await? {
            return Err(ServiceError::Conflict(
                "Party has ledger transactions and cannot be deleted".to_string(),
            ));
        }
        let supplied = InventoryItemEntity::find()
            .filter(inventory_item::Column::SupplierId.eq(id))
            .count(&txn)
            .await?;
        if supplied > 0 {
            return Err(ServiceError::Conflict(
                "Party is the supplier of inventory items".to_string(),
            ));
        }

        PartyEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        info!("Party deleted");
        Ok(())
    }
}
