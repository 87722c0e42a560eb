use crate::{
    db::DbPool,
    entities::{
        attendance::{self, AttendanceStatus, Entity as AttendanceEntity},
        customer::Entity as CustomerEntity,
        inventory_item::Entity as InventoryItemEntity,
        order::{self, Entity as OrderEntity, OrderStatus},
        party::Entity as PartyEntity,
        production_item::{self, Entity as ProductionEntity, ProductionStatus},
    },
    errors::ServiceError,
    services::start_of_day,
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub orders_today: u64,
    pub revenue_today: Decimal,
    pub pending_orders: u64,
    pub low_stock_items: u64,
    pub production_planned_today: u64,
    pub production_completed_today: u64,
    pub staff_present_today: u64,
    pub receivables: Decimal,
    pub payables: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalesPoint {
    pub date: NaiveDate,
    pub orders: u64,
    pub total: Decimal,
}

/// Bucket `(date, amount)` pairs into one point per day for `days` days ending at `end`.
/// Days without orders are present with zero totals.
pub fn daily_series(end: NaiveDate, days: u32, orders: &[(NaiveDate, Decimal)]) -> Vec<SalesPoint> {
    let start = end - Duration::days(i64::from(days.max(1)) - 1);
    let mut buckets: BTreeMap<NaiveDate, (u64, Decimal)> = BTreeMap::new();
    let mut day = start;
    while day <= end {
        buckets.insert(day, (0, Decimal::ZERO));
        day += Duration::days(1);
    }
    for (date, amount) in orders {
        if let Some(bucket) = buckets.get_mut(date) {
            bucket.0 += 1;
            bucket.1 += *amount;
        }
    }
    buckets
        .into_iter()
        .map(|(date, (orders, total))| SalesPoint {
            date,
            orders,
            total,
        })
        .collect()
}

#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        let todays_orders = OrderEntity::find()
            .filter(order::Column::CreatedAt.gte(start_of_day(today)))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .all(db)
            .await?;
        let revenue_today = todays_orders.iter().map(|o| o.total_amount).sum();

        let pending_orders = OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .count(db)
            .await?;

        let low_stock_items = InventoryItemEntity::find()
            .all(db)
            .await?
            .iter()
            .filter(|item| item.is_low_stock())
            .count() as u64;

        let production_today = ProductionEntity::find()
            .filter(production_item::Column::ScheduledDate.eq(today))
            .all(db)
            .await?;
        let production_planned_today = production_today
            .iter()
            .filter(|p| matches!(p.status, ProductionStatus::Planned | ProductionStatus::InProgress))
            .count() as u64;
        let production_completed_today = production_today
            .iter()
            .filter(|p| p.status == ProductionStatus::Completed)
            .count() as u64;

        let staff_present_today = AttendanceEntity::find()
            .filter(attendance::Column::Date.eq(today))
            .filter(
                attendance::Column::Status
                    .is_in([AttendanceStatus::Present, AttendanceStatus::HalfDay]),
            )
            .count(db)
            .await?;

        // Summed in Rust: SQLite keeps decimals as REAL.
        let receivables = CustomerEntity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| c.current_balance)
            .filter(|b| *b > Decimal::ZERO)
            .sum();
        let payables = PartyEntity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|p| p.current_balance)
            .filter(|b| *b > Decimal::ZERO)
            .sum();

        Ok(DashboardSummary {
            date: today,
            orders_today: todays_orders.len() as u64,
            revenue_today,
            pending_orders,
            low_stock_items,
            production_planned_today,
            production_completed_today,
            staff_present_today,
            receivables,
            payables,
        })
    }

    pub async fn sales_trend(&self, days: u32) -> Result<Vec<SalesPoint>, ServiceError> {
        let days = days.clamp(1, 90);
        let today = Utc::now().date_naive();
        let start = today - Duration::days(i64::from(days) - 1);

        let orders: Vec<(NaiveDate, Decimal)> = OrderEntity::find()
            .filter(order::Column::CreatedAt.gte(start_of_day(start)))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|o| (o.created_at.date_naive(), o.total_amount))
            .collect();
        Ok(daily_series(today, days, &orders))
    }

    pub async fn recent_orders(&self, limit: u64) -> Result<Vec<order::Model>, ServiceError> {
        Ok(OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit.clamp(1, 50))
            .all(&*self.db_pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn series_fills_missing_days() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let orders = vec![
            (NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(), dec!(100)),
            (NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(), dec!(50)),
            (NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(), dec!(20)),
            (NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), dec!(999)),
        ];
        let series = daily_series(end, 3, &orders);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].total, dec!(150));
        assert_eq!(series[0].orders, 2);
        assert_eq!(series[1].total, dec!(0));
        assert_eq!(series[2].total, dec!(20));
    }
}
