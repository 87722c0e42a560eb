pub mod auth;
pub mod common;
pub mod customers;
pub mod dashboard;
pub mod inventory;
pub mod ledger;
pub mod notifications;
pub mod orders;
pub mod parties;
pub mod permissions;
pub mod production;
pub mod products;
pub mod settings;
pub mod staff;
pub mod users;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    audit::AuditService, customers::CustomerService, dashboard::DashboardService,
    inventory::InventoryService, ledger::LedgerService, notifications::NotificationService,
    orders::OrderService, parties::PartyService, permissions::PermissionService,
    production::ProductionService, products::ProductService, settings::SettingsService,
    staff::StaffService, users::UserService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub permissions: Arc<PermissionService>,
    pub audit: Arc<AuditService>,
    pub products: Arc<ProductService>,
    pub orders: Arc<OrderService>,
    pub inventory: Arc<InventoryService>,
    pub production: Arc<ProductionService>,
    pub customers: Arc<CustomerService>,
    pub parties: Arc<PartyService>,
    pub ledger: Arc<LedgerService>,
    pub staff: Arc<StaffService>,
    pub settings: Arc<SettingsService>,
    pub notifications: Arc<NotificationService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// Wire every service against one pool and one event channel.
    ///
    /// The ledger service is shared so that customers, parties and orders
    /// serialize on the same per-account locks.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let events = Some(event_sender);
        let ledger = Arc::new(LedgerService::new(db_pool.clone(), events.clone()));
        let inventory = Arc::new(InventoryService::new(db_pool.clone(), events.clone()));

        Self {
            users: Arc::new(UserService::new(db_pool.clone())),
            permissions: Arc::new(PermissionService::new(db_pool.clone())),
            audit: Arc::new(AuditService::new(db_pool.clone())),
            products: Arc::new(ProductService::new(
                db_pool.clone(),
                config.uploads_dir.clone(),
                config.max_upload_bytes,
            )),
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                ledger.clone(),
                events.clone(),
            )),
            production: Arc::new(ProductionService::new(
                db_pool.clone(),
                inventory.clone(),
                events,
            )),
            inventory,
            customers: Arc::new(CustomerService::new(db_pool.clone(), ledger.clone())),
            parties: Arc::new(PartyService::new(db_pool.clone(), ledger.clone())),
            ledger,
            staff: Arc::new(StaffService::new(db_pool.clone())),
            settings: Arc::new(SettingsService::new(
                db_pool.clone(),
                &config.default_currency,
            )),
            notifications: Arc::new(NotificationService::new(
                db_pool.clone(),
                config.notification_retention,
            )),
            dashboard: Arc::new(DashboardService::new(db_pool)),
        }
    }
}
