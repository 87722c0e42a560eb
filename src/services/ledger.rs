//! Customer and party ledgers.
//!
//! Every row stores the running balance after it is applied:
//! `balance[i] = opening + sum(debit - credit)` over rows `0..=i` ordered by
//! `(txn_date, created_at, id)`. Any change to a ledger replays the balances
//! from the earliest affected date inside one database transaction, while a
//! per-entity lock keeps two writers for the same account from interleaving.

use crate::{
    db::DbPool,
    entities::{
        customer::{self, Entity as CustomerEntity},
        ledger_transaction::{self, Entity as LedgerEntity, LedgerEntityType},
        party::{self, Entity as PartyEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::validate_amount,
};
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn balance_overflow() -> ServiceError {
    ServiceError::ValidationError("Ledger balance is out of range".to_string())
}

fn apply_entry(balance: Decimal, debit: Decimal, credit: Decimal) -> Result<Decimal, ServiceError> {
    balance
        .checked_add(debit)
        .and_then(|b| b.checked_sub(credit))
        .ok_or_else(balance_overflow)
}

/// Running balance after each `(debit, credit)` entry, starting from `opening`.
pub fn running_balances(
    opening: Decimal,
    entries: &[(Decimal, Decimal)],
) -> Result<Vec<Decimal>, ServiceError> {
    let mut balance = opening;
    entries
        .iter()
        .map(|(debit, credit)| {
            balance = apply_entry(balance, *debit, *credit)?;
            Ok(balance)
        })
        .collect()
}

/// Balance carried into a period given every entry before it.
pub fn carried_balance(
    opening: Decimal,
    earlier: &[(Decimal, Decimal)],
) -> Result<Decimal, ServiceError> {
    earlier
        .iter()
        .try_fold(opening, |acc, (debit, credit)| apply_entry(acc, *debit, *credit))
}

/// Exactly one side positive, neither negative
pub fn validate_amounts(debit: Decimal, credit: Decimal) -> Result<(), ServiceError> {
    if debit < Decimal::ZERO || credit < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Debit and credit cannot be negative".to_string(),
        ));
    }
    match (debit > Decimal::ZERO, credit > Decimal::ZERO) {
        (true, false) | (false, true) => Ok(()),
        (true, true) => Err(ServiceError::ValidationError(
            "A transaction is either a debit or a credit, not both".to_string(),
        )),
        (false, false) => Err(ServiceError::ValidationError(
            "Either debit or credit must be greater than zero".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LedgerEntryRequest {
    pub txn_date: NaiveDate,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub debit: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub credit: Decimal,
}

impl LedgerEntryRequest {
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        validate_amounts(self.debit, self.credit)
    }
}

/// A row to be written by another service inside its own transaction
#[derive(Debug, Clone)]
pub struct NewLedgerRow {
    pub entity_type: LedgerEntityType,
    pub entity_id: Uuid,
    pub txn_date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub debit: Decimal,
    pub credit: Decimal,
    pub order_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerStatement {
    pub entity_type: LedgerEntityType,
    pub entity_id: Uuid,
    pub entity_name: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub opening_balance: Decimal,
    pub transactions: Vec<ledger_transaction::Model>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub closing_balance: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecalculationResult {
    pub entity_type: LedgerEntityType,
    pub entity_id: Uuid,
    pub rows: usize,
    pub balance: Decimal,
}

struct Account {
    name: String,
    opening_balance: Decimal,
}

type LockKey = (LedgerEntityType, Uuid);

/// One async mutex per ledger, created on demand. An entry is dropped again
/// when its last holder releases it with nobody else waiting.
#[derive(Default)]
struct LockTable {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl LockTable {
    async fn acquire(self: &Arc<Self>, key: LockKey) -> LedgerGuard {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        LedgerGuard {
            guard: Some(lock.lock_owned().await),
            table: Arc::clone(self),
            key,
        }
    }

    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive access to one ledger until dropped
pub struct LedgerGuard {
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
    key: LockKey,
}

impl Drop for LedgerGuard {
    fn drop(&mut self) {
        self.guard.take();
        // The map's own reference is the only one left when nobody waits
        self.table
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct LedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    locks: Arc<LockTable>,
}

impl LedgerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
            locks: Arc::new(LockTable::default()),
        }
    }

    /// Serialises writers of one ledger. Hold the guard across the whole
    /// transaction that touches the ledger.
    pub async fn lock(&self, entity_type: LedgerEntityType, entity_id: Uuid) -> LedgerGuard {
        self.locks.acquire((entity_type, entity_id)).await
    }

    /// Ledgers currently locked or waited on
    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }

    async fn account<C: ConnectionTrait>(
        conn: &C,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
    ) -> Result<Account, ServiceError> {
        match entity_type {
            LedgerEntityType::Customer => CustomerEntity::find_by_id(entity_id)
                .one(conn)
                .await?
                .map(|c| Account {
                    name: c.name,
                    opening_balance: c.opening_balance,
                })
                .ok_or_else(|| ServiceError::not_found("Customer", entity_id)),
            LedgerEntityType::Party => PartyEntity::find_by_id(entity_id)
                .one(conn)
                .await?
                .map(|p| Account {
                    name: p.name,
                    opening_balance: p.opening_balance,
                })
                .ok_or_else(|| ServiceError::not_found("Party", entity_id)),
        }
    }

    async fn store_current_balance<C: ConnectionTrait>(
        conn: &C,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
        balance: Decimal,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        match entity_type {
            LedgerEntityType::Customer => {
                customer::ActiveModel {
                    id: Set(entity_id),
                    current_balance: Set(balance),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .update(conn)
                .await?;
            }
            LedgerEntityType::Party => {
                party::ActiveModel {
                    id: Set(entity_id),
                    current_balance: Set(balance),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .update(conn)
                .await?;
            }
        }
        Ok(())
    }

    async fn rows<C: ConnectionTrait>(
        conn: &C,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<ledger_transaction::Model>, ServiceError> {
        Ok(LedgerEntity::find()
            .filter(ledger_transaction::Column::EntityType.eq(entity_type))
            .filter(ledger_transaction::Column::EntityId.eq(entity_id))
            .order_by_asc(ledger_transaction::Column::TxnDate)
            .order_by_asc(ledger_transaction::Column::CreatedAt)
            .order_by_asc(ledger_transaction::Column::Id)
            .all(conn)
            .await?)
    }

    /// Replay balances for one ledger from `from` (or the beginning) and
    /// store the closing balance on the account. Must run inside the
    /// caller's transaction while the caller holds [`LedgerService::lock`].
    pub async fn recalculate_in<C: ConnectionTrait>(
        conn: &C,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
        from: Option<NaiveDate>,
    ) -> Result<RecalculationResult, ServiceError> {
        let account = Self::account(conn, entity_type, entity_id).await?;
        let rows = Self::rows(conn, entity_type, entity_id).await?;

        let split = from.map_or(0, |date| rows.partition_point(|r| r.txn_date < date));
        let (earlier, affected) = rows.split_at(split);

        let earlier: Vec<_> = earlier.iter().map(|r| (r.debit, r.credit)).collect();
        let carried = carried_balance(account.opening_balance, &earlier)?;
        let entries: Vec<_> = affected.iter().map(|r| (r.debit, r.credit)).collect();
        let balances = running_balances(carried, &entries)?;

        for (row, balance) in affected.iter().zip(&balances) {
            if row.balance != *balance {
                ledger_transaction::ActiveModel {
                    id: Set(row.id),
                    balance: Set(*balance),
                    ..Default::default()
                }
                .update(conn)
                .await?;
            }
        }

        let closing = balances.last().copied().unwrap_or(carried);
        Self::store_current_balance(conn, entity_type, entity_id, closing).await?;

        Ok(RecalculationResult {
            entity_type,
            entity_id,
            rows: affected.len(),
            balance: closing,
        })
    }

    /// Insert a row with a placeholder balance. Follow with [`Self::recalculate_in`].
    pub async fn insert_in<C: ConnectionTrait>(
        conn: &C,
        row: NewLedgerRow,
    ) -> Result<ledger_transaction::Model, ServiceError> {
        validate_amounts(row.debit, row.credit)?;
        let now = Utc::now();
        Ok(ledger_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            entity_type: Set(row.entity_type),
            entity_id: Set(row.entity_id),
            txn_date: Set(row.txn_date),
            description: Set(row.description),
            reference: Set(row.reference),
            debit: Set(row.debit),
            credit: Set(row.credit),
            balance: Set(Decimal::ZERO),
            order_id: Set(row.order_id),
            created_by: Set(row.created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?)
    }

    pub async fn has_transactions<C: ConnectionTrait>(
        conn: &C,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
    ) -> Result<bool, ServiceError> {
        Ok(LedgerEntity::find()
            .filter(ledger_transaction::Column::EntityType.eq(entity_type))
            .filter(ledger_transaction::Column::EntityId.eq(entity_id))
            .one(conn)
            .await?
            .is_some())
    }

    async fn publish(&self, result: &RecalculationResult) {
        if let Some(sender) = &self.event_sender {
            sender
                .publish(Event::LedgerRecalculated {
                    entity_type: result.entity_type,
                    entity_id: result.entity_id,
                    balance: result.balance,
                    rows: result.rows,
                })
                .await;
        }
    }

    #[instrument(skip(self, request), fields(entity_type = %entity_type, entity_id = %entity_id))]
    pub async fn post(
        &self,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
        request: LedgerEntryRequest,
        created_by: Option<Uuid>,
    ) -> Result<ledger_transaction::Model, ServiceError> {
        request.check()?;

        let _guard = self.lock(entity_type, entity_id).await;
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin ledger transaction");
            ServiceError::DatabaseError(e)
        })?;

        Self::account(&txn, entity_type, entity_id).await?;
        let row = Self::insert_in(
            &txn,
            NewLedgerRow {
                entity_type,
                entity_id,
                txn_date: request.txn_date,
                description: request.description,
                reference: request.reference,
                debit: request.debit,
                credit: request.credit,
                order_id: None,
                created_by,
            },
        )
        .await?;
        let result = Self::recalculate_in(&txn, entity_type, entity_id, Some(row.txn_date)).await?;
        let stored = LedgerEntity::find_by_id(row.id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Ledger transaction", row.id))?;

        txn.commit().await?;
        drop(_guard);

        info!(txn_id = %stored.id, balance = %result.balance, "Ledger transaction posted");
        metrics::counter!("bakery_ledger_postings", 1, "entity_type" => entity_type.to_string());
        self.publish(&result).await;
        Ok(stored)
    }

    #[instrument(skip(self, request), fields(txn_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: LedgerEntryRequest,
    ) -> Result<ledger_transaction::Model, ServiceError> {
        request.check()?;

        let existing = self.get(id).await?;
        let _guard = self.lock(existing.entity_type, existing.entity_id).await;
        let txn = self.db_pool.begin().await?;

        // Re-read under the lock; the row may have moved since the first read.
        let existing = LedgerEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Ledger transaction", id))?;
        if existing.order_id.is_some() {
            return Err(ServiceError::Conflict(
                "Transaction was posted by an order; change the order instead".to_string(),
            ));
        }
        let replay_from = existing.txn_date.min(request.txn_date);

        let mut active: ledger_transaction::ActiveModel = existing.clone().into();
        active.txn_date = Set(request.txn_date);
        active.description = Set(request.description);
        active.reference = Set(request.reference);
        active.debit = Set(request.debit);
        active.credit = Set(request.credit);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let result = Self::recalculate_in(
            &txn,
            existing.entity_type,
            existing.entity_id,
            Some(replay_from),
        )
        .await?;
        let stored = LedgerEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Ledger transaction", id))?;
        txn.commit().await?;
        drop(_guard);

        info!(balance = %result.balance, "Ledger transaction updated");
        self.publish(&result).await;
        Ok(stored)
    }

    #[instrument(skip(self), fields(txn_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<RecalculationResult, ServiceError> {
        let existing = self.get(id).await?;
        let _guard = self.lock(existing.entity_type, existing.entity_id).await;
        let txn = self.db_pool.begin().await?;

        let existing = LedgerEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Ledger transaction", id))?;
        if existing.order_id.is_some() {
            return Err(ServiceError::Conflict(
                "Transaction was posted by an order; change the order instead".to_string(),
            ));
        }
        LedgerEntity::delete_by_id(id).exec(&txn).await?;

        let result = Self::recalculate_in(
            &txn,
            existing.entity_type,
            existing.entity_id,
            Some(existing.txn_date),
        )
        .await?;
        txn.commit().await?;
        drop(_guard);

        info!(balance = %result.balance, "Ledger transaction deleted");
        self.publish(&result).await;
        Ok(result)
    }

    pub async fn get(&self, id: Uuid) -> Result<ledger_transaction::Model, ServiceError> {
        LedgerEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Ledger transaction", id))
    }

    /// Full replay of one ledger
    #[instrument(skip(self), fields(entity_type = %entity_type, entity_id = %entity_id))]
    pub async fn recalculate(
        &self,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
    ) -> Result<RecalculationResult, ServiceError> {
        let _guard = self.lock(entity_type, entity_id).await;
        let txn = self.db_pool.begin().await?;
        let result = Self::recalculate_in(&txn, entity_type, entity_id, None).await?;
        txn.commit().await?;
        drop(_guard);

        info!(rows = result.rows, balance = %result.balance, "Ledger recalculated");
        self.publish(&result).await;
        Ok(result)
    }

    /// Replay every customer and party ledger
    pub async fn recalculate_all(&self) -> Result<Vec<RecalculationResult>, ServiceError> {
        let db = &*self.db_pool;
        let mut accounts: Vec<LockKey> = CustomerEntity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (LedgerEntityType::Customer, c.id))
            .collect();
        accounts.extend(
            PartyEntity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|p| (LedgerEntityType::Party, p.id)),
        );

        let mut results = Vec::with_capacity(accounts.len());
        for (entity_type, entity_id) in accounts {
            results.push(self.recalculate(entity_type, entity_id).await?);
        }
        Ok(results)
    }

    #[instrument(skip(self), fields(entity_type = %entity_type, entity_id = %entity_id))]
    pub async fn statement(
        &self,
        entity_type: LedgerEntityType,
        entity_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<LedgerStatement, ServiceError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ServiceError::BadRequest(
                    "'from' must not be after 'to'".to_string(),
                ));
            }
        }

        let db = &*self.db_pool;
        let account = Self::account(db, entity_type, entity_id).await?;
        let rows = Self::rows(db, entity_type, entity_id).await?;

        let (earlier, in_range): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .filter(|r| to.map_or(true, |to| r.txn_date <= to))
            .partition(|r| from.map_or(false, |from| r.txn_date < from));

        let earlier: Vec<_> = earlier.iter().map(|r| (r.debit, r.credit)).collect();
        let opening = carried_balance(account.opening_balance, &earlier)?;
        let totals = in_range
            .iter()
            .try_fold((Decimal::ZERO, Decimal::ZERO), |(debit, credit), r| {
                Some((debit.checked_add(r.debit)?, credit.checked_add(r.credit)?))
            })
            .ok_or_else(balance_overflow)?;
        let (total_debit, total_credit) = totals;
        let closing = apply_entry(opening, total_debit, total_credit)?;

        Ok(LedgerStatement {
            entity_type,
            entity_id,
            entity_name: account.name,
            from,
            to,
            opening_balance: opening,
            closing_balance: closing,
            transactions: in_range,
            total_debit,
            total_credit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn running_balance_accumulates() {
        let entries = [(dec!(100), dec!(0)), (dec!(0), dec!(30)), (dec!(50), dec!(0))];
        assert_eq!(
            running_balances(dec!(10), &entries).unwrap(),
            vec![dec!(110), dec!(80), dec!(130)]
        );
    }

    #[test]
    fn empty_ledger_keeps_opening() {
        assert!(running_balances(dec!(5), &[]).unwrap().is_empty());
        assert_eq!(carried_balance(dec!(5), &[]).unwrap(), dec!(5));
    }

    #[test]
    fn overflowing_balance_is_an_error() {
        let entries = [(Decimal::MAX, dec!(0)), (Decimal::MAX, dec!(0))];
        assert_matches!(
            running_balances(dec!(0), &entries),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            carried_balance(dec!(1), &entries[..1]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            running_balances(Decimal::MIN, &[(dec!(0), dec!(1))]),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn released_locks_leave_the_table() {
        let table = Arc::new(LockTable::default());
        let key = (LedgerEntityType::Party, Uuid::new_v4());

        let first = table.acquire(key).await;
        assert_eq!(table.len(), 1);

        let waiter = {
            let table = Arc::clone(&table);
            tokio::spawn(async move {
                let _second = table.acquire(key).await;
            })
        };
        tokio::task::yield_now().await;
        drop(first);
        // Still present while the waiter holds it, gone after
        waiter.await.unwrap();
        assert_eq!(table.len(), 0);

        let other = table.acquire((LedgerEntityType::Customer, Uuid::new_v4())).await;
        assert_eq!(table.len(), 1);
        drop(other);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn amounts_must_be_one_sided() {
        assert!(validate_amounts(dec!(10), dec!(0)).is_ok());
        assert!(validate_amounts(dec!(0), dec!(10)).is_ok());
        assert_matches!(
            validate_amounts(dec!(10), dec!(10)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            validate_amounts(dec!(0), dec!(0)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            validate_amounts(dec!(-5), dec!(10)),
            Err(ServiceError::ValidationError(_))
        );
    }

    fn amount() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn last_balance_matches_carried(opening in amount(), entries in prop::collection::vec((amount(), amount()), 0..40)) {
            let balances = running_balances(opening, &entries).unwrap();
            let carried = carried_balance(opening, &entries).unwrap();
            prop_assert_eq!(balances.last().copied().unwrap_or(opening), carried);
        }

        #[test]
        fn replay_from_split_matches_full(opening in amount(), entries in prop::collection::vec((amount(), amount()), 1..40), split in 0usize..40) {
            let split = split.min(entries.len());
            let full = running_balances(opening, &entries).unwrap();
            let carried = carried_balance(opening, &entries[..split]).unwrap();
            let tail = running_balances(carried, &entries[split..]).unwrap();
            prop_assert_eq!(&full[split..], &tail[..]);
        }
    }
}
