//! Staff records, daily attendance and monthly payroll.

use crate::{
    db::DbPool,
    entities::{
        attendance::{self, AttendanceStatus, Entity as AttendanceEntity},
        production_item::{self, Entity as ProductionEntity},
        staff::{self, Entity as StaffEntity, SalaryType},
    },
    errors::ServiceError,
    services::validate_amount,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateStaffRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub position: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub salary_type: SalaryType,
    #[validate(custom = "validate_amount")]
    pub salary_amount: Decimal,
    pub join_date: NaiveDate,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateStaffRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub position: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub salary_type: Option<SalaryType>,
    #[validate(custom = "validate_amount")]
    pub salary_amount: Option<Decimal>,
    pub join_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MarkAttendanceRequest {
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    /// Derived from check-in/out when omitted
    pub hours_worked: Option<Decimal>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CheckRequest {
    pub staff_id: Uuid,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    pub staff_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Attendance counts for one staff member over a period
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceTally {
    pub present: u32,
    pub absent: u32,
    pub half_day: u32,
    pub leave: u32,
    pub hours_worked: Decimal,
}

impl AttendanceTally {
    pub fn add(&mut self, row: &attendance::Model) {
        match row.status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::HalfDay => self.half_day += 1,
            AttendanceStatus::Leave => self.leave += 1,
        }
        self.hours_worked += row.hours_worked;
    }

    /// Present and leave days count in full, half days as one half
    pub fn payable_days(&self) -> Decimal {
        Decimal::from(self.present + self.leave) + Decimal::from(self.half_day) / Decimal::TWO
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollLine {
    pub staff_id: Uuid,
    pub name: String,
    pub position: String,
    pub salary_type: SalaryType,
    pub salary_amount: Decimal,
    #[serde(flatten)]
    pub attendance: AttendanceTally,
    pub payable_days: Decimal,
    pub gross_pay: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollSummary {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    pub lines: Vec<PayrollLine>,
    pub total: Decimal,
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

/// Gross pay for a month, rounded to cents
pub fn compute_pay(
    salary_type: SalaryType,
    salary_amount: Decimal,
    tally: &AttendanceTally,
    days_in_month: u32,
) -> Decimal {
    let pay = match salary_type {
        SalaryType::Monthly if days_in_month > 0 => {
            salary_amount * tally.payable_days() / Decimal::from(days_in_month)
        }
        SalaryType::Monthly => Decimal::ZERO,
        SalaryType::Daily => salary_amount * tally.payable_days(),
        SalaryType::Hourly => salary_amount * tally.hours_worked,
    };
    pay.round_dp(2)
}

/// Hours between check-in and check-out, rounded to cents of an hour
pub fn hours_between(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Result<Decimal, ServiceError> {
    let minutes = (check_out - check_in).num_minutes();
    if minutes < 0 {
        return Err(ServiceError::ValidationError(
            "Check-out cannot be before check-in".to_string(),
        ));
    }
    Ok((Decimal::from(minutes) / Decimal::from(60)).round_dp(2))
}

#[derive(Clone)]
pub struct StaffService {
    db_pool: Arc<DbPool>,
}

impl StaffService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateStaffRequest) -> Result<staff::Model, ServiceError> {
        request.validate()?;
        if request.salary_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Salary cannot be negative".to_string(),
            ));
        }
        let now = Utc::now();
        let model = staff::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            position: Set(request.position),
            phone: Set(request.phone),
            salary_type: Set(request.salary_type),
            salary_amount: Set(request.salary_amount),
            join_date: Set(request.join_date),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;
        info!(staff_id = %model.id, "Staff member added");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<staff::Model, ServiceError> {
        StaffEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Staff", id))
    }

    pub async fn list(
        &self,
        search: Option<&str>,
        active: Option<bool>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<staff::Model>, u64), ServiceError> {
        let mut query = StaffEntity::find();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(staff::Column::Name.contains(term))
                    .add(staff::Column::Position.contains(term)),
            );
        }
        if let Some(active) = active {
            query = query.filter(staff::Column::IsActive.eq(active));
        }
        let paginator = query
            .order_by_asc(staff::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, request), fields(staff_id = %id))]
    pub async fn update(&self, id: Uuid, request: UpdateStaffRequest) -> Result<staff::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        let mut active: staff::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(position) = request.position {
            active.position = Set(position);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(salary_type) = request.salary_type {
            active.salary_type = Set(salary_type);
        }
        if let Some(amount) = request.salary_amount {
            if amount < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Salary cannot be negative".to_string(),
                ));
            }
            active.salary_amount = Set(amount);
        }
        if let Some(join_date) = request.join_date {
            active.join_date = Set(join_date);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self), fields(staff_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        StaffEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Staff", id))?;
        let assigned = ProductionEntity::find()
            .filter(production_item::Column::AssignedTo.eq(id))
            .count(&txn)
            .await?;
        if assigned > 0 {
            return Err(ServiceError::Conflict(
                "Staff member is assigned to production; deactivate instead".to_string(),
            ));
        }
        AttendanceEntity::delete_many()
            .filter(attendance::Column::StaffId.eq(id))
            .exec(&txn)
            .await?;
        StaffEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        info!("Staff member deleted");
        Ok(())
    }

    async fn attendance_on(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<attendance::Model>, ServiceError> {
        Ok(AttendanceEntity::find()
            .filter(attendance::Column::StaffId.eq(staff_id))
            .filter(attendance::Column::Date.eq(date))
            .one(&*self.db_pool)
            .await?)
    }

    /// Create or replace the attendance row for (staff, date)
    #[instrument(skip(self, request), fields(staff_id = %request.staff_id, date = %request.date))]
    pub async fn mark_attendance(
        &self,
        request: MarkAttendanceRequest,
    ) -> Result<attendance::Model, ServiceError> {
        request.validate()?;
        self.get(request.staff_id).await?;

        let hours = match (request.hours_worked, request.check_in, request.check_out) {
            (Some(hours), _, _) if hours < Decimal::ZERO || hours > Decimal::from(24) => {
                return Err(ServiceError::ValidationError(
                    "hours_worked must be between 0 and 24".to_string(),
                ))
            }
            (Some(hours), _, _) => hours,
            (None, Some(check_in), Some(check_out)) => hours_between(check_in, check_out)?,
            (None, _, _) => Decimal::ZERO,
        };

        let now = Utc::now();
        let saved = match self.attendance_on(request.staff_id, request.date).await? {
            Some(existing) => {
                let mut active: attendance::ActiveModel = existing.into();
                active.status = Set(request.status);
                active.check_in = Set(request.check_in);
                active.check_out = Set(request.check_out);
                active.hours_worked = Set(hours);
                active.notes = Set(request.notes);
                active.updated_at = Set(now);
                active.update(&*self.db_pool).await?
            }
            None => {
                attendance::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    staff_id: Set(request.staff_id),
                    date: Set(request.date),
                    status: Set(request.status),
                    check_in: Set(request.check_in),
                    check_out: Set(request.check_out),
                    hours_worked: Set(hours),
                    notes: Set(request.notes),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db_pool)
                .await?
            }
        };
        Ok(saved)
    }

    /// Stamp today's check-in and mark the staff member present
    #[instrument(skip(self), fields(staff_id = %staff_id))]
    pub async fn check_in(&self, staff_id: Uuid) -> Result<attendance::Model, ServiceError> {
        let member = self.get(staff_id).await?;
        if !member.is_active {
            return Err(ServiceError::InvalidStatus(
                "Inactive staff cannot check in".to_string(),
            ));
        }
        let now = Utc::now();
        let today = now.date_naive();
        match self.attendance_on(staff_id, today).await? {
            Some(existing) if existing.check_in.is_some() => Err(ServiceError::Conflict(
                "Already checked in today".to_string(),
            )),
            Some(existing) => {
                let mut active: attendance::ActiveModel = existing.into();
                active.status = Set(AttendanceStatus::Present);
                active.check_in = Set(Some(now));
                active.updated_at = Set(now);
                Ok(active.update(&*self.db_pool).await?)
            }
            None => Ok(attendance::ActiveModel {
                id: Set(Uuid::new_v4()),
                staff_id: Set(staff_id),
                date: Set(today),
                status: Set(AttendanceStatus::Present),
                check_in: Set(Some(now)),
                check_out: Set(None),
                hours_worked: Set(Decimal::ZERO),
                notes: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&*self.db_pool)
            .await?),
        }
    }

    /// Stamp today's check-out and compute hours worked
    #[instrument(skip(self), fields(staff_id = %staff_id))]
    pub async fn check_out(&self, staff_id: Uuid) -> Result<attendance::Model, ServiceError> {
        self.get(staff_id).await?;
        let now = Utc::now();
        let existing = self
            .attendance_on(staff_id, now.date_naive())
            .await?
            .ok_or_else(|| ServiceError::InvalidStatus("Not checked in today".to_string()))?;
        let check_in = existing
            .check_in
            .ok_or_else(|| ServiceError::InvalidStatus("Not checked in today".to_string()))?;
        if existing.check_out.is_some() {
            return Err(ServiceError::Conflict("Already checked out today".to_string()));
        }

        let hours = hours_between(check_in, now)?;
        let mut active: attendance::ActiveModel = existing.into();
        active.check_out = Set(Some(now));
        active.hours_worked = Set(hours);
        active.updated_at = Set(now);
        Ok(active.update(&*self.db_pool).await?)
    }

    pub async fn attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<Vec<attendance::Model>, ServiceError> {
        let mut query = AttendanceEntity::find();
        if let Some(staff_id) = filter.staff_id {
            query = query.filter(attendance::Column::StaffId.eq(staff_id));
        }
        if let Some(date) = filter.date {
            query = query.filter(attendance::Column::Date.eq(date));
        }
        if let Some(from) = filter.from {
            query = query.filter(attendance::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(attendance::Column::Date.lte(to));
        }
        Ok(query
            .order_by_desc(attendance::Column::Date)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn payroll(&self, year: i32, month: u32) -> Result<PayrollSummary, ServiceError> {
        let days = days_in_month(year, month)
            .ok_or_else(|| ServiceError::BadRequest(format!("Invalid month {}-{}", year, month)))?;
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| ServiceError::BadRequest(format!("Invalid month {}-{}", year, month)))?;
        let last = first + chrono::Duration::days(i64::from(days) - 1);

        let db = &*self.db_pool;
        let members = StaffEntity::find()
            .filter(staff::Column::IsActive.eq(true))
            .order_by_asc(staff::Column::Name)
            .all(db)
            .await?;
        let rows = AttendanceEntity::find()
            .filter(attendance::Column::Date.gte(first))
            .filter(attendance::Column::Date.lte(last))
            .all(db)
            .await?;

        let mut tallies: HashMap<Uuid, AttendanceTally> = HashMap::new();
        for row in &rows {
            tallies.entry(row.staff_id).or_default().add(row);
        }

        let lines: Vec<PayrollLine> = members
            .into_iter()
            .map(|member| {
                let tally = tallies.remove(&member.id).unwrap_or_default();
                let gross_pay = compute_pay(member.salary_type, member.salary_amount, &tally, days);
                PayrollLine {
                    staff_id: member.id,
                    name: member.name,
                    position: member.position,
                    salary_type: member.salary_type,
                    salary_amount: member.salary_amount,
                    payable_days: tally.payable_days(),
                    attendance: tally,
                    gross_pay,
                }
            })
            .collect();
        let total = lines.iter().map(|l| l.gross_pay).sum();

        info!(year, month = first.month(), staff = lines.len(), total = %total, "Payroll computed");
        Ok(PayrollSummary {
            year,
            month,
            days_in_month: days,
            lines,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn tally(present: u32, half_day: u32, leave: u32, hours: Decimal) -> AttendanceTally {
        AttendanceTally {
            present,
            absent: 0,
            half_day,
            leave,
            hours_worked: hours,
        }
    }

    #[rstest]
    #[case(2024, 2, 29)]
    #[case(2023, 2, 28)]
    #[case(2024, 12, 31)]
    #[case(2024, 4, 30)]
    fn month_lengths(#[case] year: i32, #[case] month: u32, #[case] days: u32) {
        assert_eq!(days_in_month(year, month), Some(days));
    }

    #[test]
    fn invalid_month_has_no_length() {
        assert_eq!(days_in_month(2024, 13), None);
    }

    #[test]
    fn monthly_pay_is_prorated() {
        let t = tally(20, 2, 5, dec!(0));
        assert_eq!(t.payable_days(), dec!(26));
        assert_eq!(compute_pay(SalaryType::Monthly, dec!(30000), &t, 30), dec!(26000.00));
    }

    #[test]
    fn daily_and_hourly_pay() {
        let t = tally(3, 1, 0, dec!(27.5));
        assert_eq!(compute_pay(SalaryType::Daily, dec!(500), &t, 30), dec!(1750.00));
        assert_eq!(compute_pay(SalaryType::Hourly, dec!(120), &t, 30), dec!(3300.00));
    }

    #[test]
    fn hours_from_stamps() {
        let check_in = "2024-05-01T08:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let check_out = "2024-05-01T16:45:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(hours_between(check_in, check_out).unwrap(), dec!(8.75));
        assert!(hours_between(check_out, check_in).is_err());
    }

    proptest! {
        #[test]
        fn full_attendance_earns_full_monthly_salary(cents in 0i64..10_000_000, days in 28u32..=31) {
            let salary = Decimal::new(cents, 2);
            let t = tally(days, 0, 0, Decimal::ZERO);
            prop_assert_eq!(compute_pay(SalaryType::Monthly, salary, &t, days), salary.round_dp(2));
        }

        #[test]
        fn pay_never_negative(present in 0u32..31, half in 0u32..31, leave in 0u32..31, rate in 0i64..100_000) {
            let t = tally(present, half, leave, Decimal::from(present) * dec!(8));
            let rate = Decimal::new(rate, 2);
            for salary_type in [SalaryType::Monthly, SalaryType::Daily, SalaryType::Hourly] {
                prop_assert!(compute_pay(salary_type, rate, &t, 30) >= Decimal::ZERO);
            }
        }
    }
}
