//! Property-based tests for the pure arithmetic behind ledgers, stock,
//! order pricing and payroll.

use assert_matches::assert_matches;
use bakery_api::{
    auth::permission_matches,
    entities::{
        order::{OrderStatus, PaymentStatus},
        production_item::ProductionStatus,
        staff::SalaryType,
    },
    errors::ServiceError,
    services::{
        inventory::apply_delta,
        ledger::{carried_balance, running_balances, validate_amounts},
        orders::price_lines,
        staff::{compute_pay, days_in_month, AttendanceTally},
    },
};
use proptest::prelude::*;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn cents() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|c| Decimal::new(c, 2))
}

/// One-sided ledger entry
fn entry() -> impl Strategy<Value = (Decimal, Decimal)> {
    (cents(), any::<bool>()).prop_map(|(amount, is_debit)| {
        if is_debit {
            (amount, Decimal::ZERO)
        } else {
            (Decimal::ZERO, amount)
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn last_running_balance_is_opening_plus_net(
        opening in cents(),
        entries in prop::collection::vec(entry(), 0..50),
    ) {
        let balances = running_balances(opening, &entries).unwrap();
        prop_assert_eq!(balances.len(), entries.len());

        let net: Decimal = entries.iter().map(|(d, c)| *d - *c).sum();
        let closing = balances.last().copied().unwrap_or(opening);
        prop_assert_eq!(closing, opening + net);
    }

    #[test]
    fn each_balance_differs_from_previous_by_its_entry(
        opening in cents(),
        entries in prop::collection::vec(entry(), 1..50),
    ) {
        let balances = running_balances(opening, &entries).unwrap();
        let mut previous = opening;
        for ((debit, credit), balance) in entries.iter().zip(&balances) {
            prop_assert_eq!(*balance - previous, *debit - *credit);
            previous = *balance;
        }
    }

    #[test]
    fn replay_from_any_split_matches_full_replay(
        opening in cents(),
        entries in prop::collection::vec(entry(), 0..50),
        split in 0usize..50,
    ) {
        let split = split.min(entries.len());
        let (earlier, later) = entries.split_at(split);

        let full = running_balances(opening, &entries).unwrap();
        let carried = carried_balance(opening, earlier).unwrap();
        let partial = running_balances(carried, later).unwrap();
        prop_assert_eq!(&full[split..], &partial[..]);
    }

    #[test]
    fn stock_never_goes_negative(quantity in cents(), delta in -10_000_000i64..10_000_000) {
        let delta = Decimal::new(delta, 2);
        match apply_delta(quantity, delta) {
            Ok(next) => {
                prop_assert!(next >= Decimal::ZERO);
                prop_assert_eq!(next, quantity + delta);
            }
            Err(e) => {
                prop_assert!(quantity + delta < Decimal::ZERO);
                prop_assert!(matches!(e, ServiceError::InsufficientStock(_)));
            }
        }
    }

    #[test]
    fn order_total_is_sum_of_rounded_lines(
        lines in prop::collection::vec((1i64..1000, cents()), 1..20),
    ) {
        let lines: Vec<(Decimal, Decimal)> = lines
            .into_iter()
            .map(|(qty, price)| (Decimal::new(qty, 1), price))
            .collect();
        let (totals, total) = price_lines(&lines).unwrap();
        prop_assert_eq!(totals.len(), lines.len());
        prop_assert!(totals.iter().all(|t| t.scale() <= 2));
        prop_assert_eq!(total, totals.iter().copied().sum::<Decimal>());
    }

    #[test]
    fn monthly_pay_never_exceeds_salary_for_days_worked(
        salary in cents(),
        present in 0u32..28,
        half_day in 0u32..3,
        month in 1u32..=12,
    ) {
        let days = days_in_month(2024, month).unwrap();
        let tally = AttendanceTally { present, half_day, ..Default::default() };
        let pay = compute_pay(SalaryType::Monthly, salary, &tally, days);
        prop_assert!(pay >= Decimal::ZERO);
        prop_assert!(pay <= salary.round_dp(2));
        prop_assert!(pay.scale() <= 2);
    }
}

#[rstest]
#[case(2024, 2, Some(29))]
#[case(2023, 2, Some(28))]
#[case(2024, 4, Some(30))]
#[case(2024, 12, Some(31))]
#[case(2024, 13, None)]
#[case(2024, 0, None)]
fn month_lengths(#[case] year: i32, #[case] month: u32, #[case] expected: Option<u32>) {
    assert_eq!(days_in_month(year, month), expected);
}

#[rstest]
#[case(SalaryType::Monthly, dec!(31000), 20, 2, dec!(0), dec!(21000.00))]
#[case(SalaryType::Daily, dec!(750), 4, 1, dec!(0), dec!(3375.00))]
#[case(SalaryType::Hourly, dec!(120.50), 0, 0, dec!(7.5), dec!(903.75))]
fn pay_by_salary_type(
    #[case] salary_type: SalaryType,
    #[case] amount: Decimal,
    #[case] present: u32,
    #[case] half_day: u32,
    #[case] hours: Decimal,
    #[case] expected: Decimal,
) {
    let tally = AttendanceTally {
        present,
        half_day,
        hours_worked: hours,
        ..Default::default()
    };
    assert_eq!(compute_pay(salary_type, amount, &tally, 31), expected);
}

#[rstest]
#[case(dec!(0), dec!(0), PaymentStatus::Unpaid)]
#[case(dec!(100), dec!(0), PaymentStatus::Unpaid)]
#[case(dec!(100), dec!(40), PaymentStatus::Partial)]
#[case(dec!(100), dec!(100), PaymentStatus::Paid)]
fn payment_status_from_amounts(
    #[case] total: Decimal,
    #[case] paid: Decimal,
    #[case] expected: PaymentStatus,
) {
    assert_eq!(PaymentStatus::from_amounts(total, paid), expected);
}

#[rstest]
#[case(OrderStatus::Pending, OrderStatus::Confirmed, true)]
#[case(OrderStatus::Confirmed, OrderStatus::Ready, true)]
#[case(OrderStatus::Ready, OrderStatus::Delivered, true)]
#[case(OrderStatus::Pending, OrderStatus::Delivered, false)]
#[case(OrderStatus::Ready, OrderStatus::Pending, false)]
#[case(OrderStatus::InProduction, OrderStatus::Cancelled, true)]
#[case(OrderStatus::Delivered, OrderStatus::Cancelled, false)]
#[case(OrderStatus::Cancelled, OrderStatus::Pending, false)]
fn order_transitions(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[rstest]
#[case(ProductionStatus::Planned, ProductionStatus::InProgress, true)]
#[case(ProductionStatus::Planned, ProductionStatus::Completed, false)]
#[case(ProductionStatus::InProgress, ProductionStatus::Completed, true)]
#[case(ProductionStatus::Planned, ProductionStatus::Cancelled, true)]
#[case(ProductionStatus::InProgress, ProductionStatus::Cancelled, true)]
#[case(ProductionStatus::Completed, ProductionStatus::Cancelled, false)]
#[case(ProductionStatus::Cancelled, ProductionStatus::Planned, false)]
fn production_transitions(
    #[case] from: ProductionStatus,
    #[case] to: ProductionStatus,
    #[case] allowed: bool,
) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[rstest]
#[case("orders:view", "orders:view", true)]
#[case("orders:*", "orders:delete", true)]
#[case("*", "payroll:view", true)]
#[case("orders:view", "orders:edit", false)]
#[case("order:*", "orders:view", false)]
fn permission_patterns(#[case] granted: &str, #[case] required: &str, #[case] expected: bool) {
    assert_eq!(permission_matches(granted, required), expected);
}

#[test]
fn ledger_entries_are_one_sided() {
    assert!(validate_amounts(dec!(5), dec!(0)).is_ok());
    assert_matches!(
        validate_amounts(dec!(5), dec!(5)),
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        validate_amounts(dec!(0), dec!(0)),
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        validate_amounts(dec!(-1), dec!(0)),
        Err(ServiceError::ValidationError(_))
    );
}
