//! Database entities (sea-orm).

pub mod attendance;
pub mod audit_log;
pub mod customer;
pub mod inventory_item;
pub mod inventory_movement;
pub mod ledger_transaction;
pub mod login_log;
pub mod notification;
pub mod order;
pub mod order_item;
pub mod order_payment;
pub mod party;
pub mod product;
pub mod production_item;
pub mod role_permission;
pub mod setting;
pub mod staff;
pub mod user;
pub mod user_permission;
