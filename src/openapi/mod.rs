use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{entities, handlers, services};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bakery API",
        version = "1.0.0",
        description = r#"
# Bakery Back-Office API

Orders, products, stock, daily production, staff attendance and payroll, and
running ledgers for customers and trading parties.

## Authentication

Log in with `POST /api/v1/auth/login`. Send the returned token as

```
Authorization: Bearer <token>
```

or rely on the session cookie set by the login response. Each endpoint needs a
`module:action` permission such as `orders:create`.

## Responses

Every body is wrapped in an envelope:

```json
{ "success": true, "data": { }, "message": null, "errors": null }
```

Errors carry `success: false` with a message and, for validation failures, a
list of field errors.

## Pagination

List endpoints accept `page` (from 1) and `limit`.
"#
    ),
    servers(
        (url = "/", description = "This server")
    ),
    paths(
        crate::health::health_check,
        // Auth
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::auth::change_password,
        // Dashboard
        handlers::dashboard::summary,
        handlers::dashboard::sales_trend,
        handlers::dashboard::recent_orders,
        // Orders
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::update_order,
        handlers::orders::update_order_status,
        handlers::orders::record_payment,
        handlers::orders::delete_order,
        // Products
        handlers::products::list_products,
        handlers::products::list_categories,
        handlers::products::get_product,
        handlers::products::create_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::upload_product_image,
        // Inventory
        handlers::inventory::list_inventory,
        handlers::inventory::get_low_stock_items,
        handlers::inventory::get_inventory,
        handlers::inventory::create_inventory,
        handlers::inventory::update_inventory,
        handlers::inventory::delete_inventory,
        handlers::inventory::adjust_inventory,
        handlers::inventory::list_movements,
        // Production
        handlers::production::list_production,
        handlers::production::production_today,
        handlers::production::get_production,
        handlers::production::create_production,
        handlers::production::update_production,
        handlers::production::update_production_status,
        handlers::production::delete_production,
        // Customers and parties
        handlers::customers::list_customers,
        handlers::customers::get_customer,
        handlers::customers::customer_orders,
        handlers::customers::create_customer,
        handlers::customers::update_customer,
        handlers::customers::delete_customer,
        handlers::parties::list_parties,
        handlers::parties::get_party,
        handlers::parties::create_party,
        handlers::parties::update_party,
        handlers::parties::delete_party,
        // Ledger
        handlers::ledger::post_customer_entry,
        handlers::ledger::post_party_entry,
        handlers::ledger::customer_statement,
        handlers::ledger::party_statement,
        handlers::ledger::recalculate_customer,
        handlers::ledger::recalculate_party,
        handlers::ledger::get_transaction,
        handlers::ledger::update_transaction,
        handlers::ledger::delete_transaction,
        // Staff
        handlers::staff::list_staff,
        handlers::staff::get_staff,
        handlers::staff::create_staff,
        handlers::staff::update_staff,
        handlers::staff::delete_staff,
        handlers::staff::list_attendance,
        handlers::staff::mark_attendance,
        handlers::staff::check_in,
        handlers::staff::check_out,
        handlers::staff::payroll,
        // Users and permissions
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::reset_password,
        handlers::users::delete_user,
        handlers::users::list_audit_logs,
        handlers::users::list_login_logs,
        handlers::permissions::get_role_permissions,
        handlers::permissions::set_role_permissions,
        handlers::permissions::get_user_permissions,
        handlers::permissions::set_user_permissions,
        handlers::permissions::get_effective_permissions,
        // Settings and notifications
        handlers::settings::get_settings,
        handlers::settings::get_setting,
        handlers::settings::put_setting,
        handlers::settings::delete_setting,
        handlers::notifications::list_notifications,
        handlers::notifications::unread_count,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::delete_notification,
    ),
    components(
        schemas(
            // Stored records
            entities::order::Model,
            entities::order::OrderStatus,
            entities::order::PaymentStatus,
            entities::order_item::Model,
            entities::order_payment::Model,
            entities::product::Model,
            entities::inventory_item::Model,
            entities::inventory_item::InventoryCategory,
            entities::inventory_movement::Model,
            entities::production_item::Model,
            entities::production_item::ProductionStatus,
            entities::customer::Model,
            entities::party::Model,
            entities::ledger_transaction::Model,
            entities::ledger_transaction::LedgerEntityType,
            entities::staff::Model,
            entities::staff::SalaryType,
            entities::attendance::Model,
            entities::attendance::AttendanceStatus,
            entities::notification::Model,
            entities::notification::NotificationKind,
            entities::audit_log::Model,
            entities::login_log::Model,
            entities::setting::Model,

            // Requests and views
            handlers::auth::LoginRequest,
            handlers::auth::LoginResponse,
            handlers::auth::MeResponse,
            handlers::settings::SettingValue,
            crate::auth::TokenPair,
            crate::auth::ModuleGrant,
            services::users::CreateUserRequest,
            services::users::UpdateUserRequest,
            services::users::ResetPasswordRequest,
            services::users::ChangePasswordRequest,
            services::users::UserView,
            services::permissions::EffectivePermissions,
            services::orders::OrderItemRequest,
            services::orders::CreateOrderRequest,
            services::orders::UpdateOrderRequest,
            services::orders::OrderStatusRequest,
            services::orders::RecordPaymentRequest,
            services::orders::OrderDetail,
            services::products::CreateProductRequest,
            services::products::UpdateProductRequest,
            services::inventory::CreateInventoryItemRequest,
            services::inventory::UpdateInventoryItemRequest,
            services::inventory::AdjustStockRequest,
            services::inventory::StockAdjustment,
            services::production::CreateProductionRequest,
            services::production::UpdateProductionRequest,
            services::production::ProductionStatusRequest,
            services::production::ProductionEntry,
            services::customers::CreateCustomerRequest,
            services::customers::UpdateCustomerRequest,
            services::parties::CreatePartyRequest,
            services::parties::UpdatePartyRequest,
            services::ledger::LedgerEntryRequest,
            services::ledger::LedgerStatement,
            services::ledger::RecalculationResult,
            services::staff::CreateStaffRequest,
            services::staff::UpdateStaffRequest,
            services::staff::MarkAttendanceRequest,
            services::staff::CheckRequest,
            services::staff::AttendanceTally,
            services::staff::PayrollLine,
            services::staff::PayrollSummary,
            services::dashboard::DashboardSummary,
            services::dashboard::SalesPoint,
            crate::health::HealthReport,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Sessions and the current user"),
        (name = "dashboard", description = "Daily counters and sales trend"),
        (name = "orders", description = "Customer orders and payments"),
        (name = "products", description = "Product catalog"),
        (name = "inventory", description = "Raw materials and stock movements"),
        (name = "production", description = "Daily production plan"),
        (name = "customers", description = "Customer records"),
        (name = "parties", description = "Suppliers and other trading parties"),
        (name = "ledger", description = "Running balances for customers and parties"),
        (name = "staff", description = "Staff, attendance and payroll"),
        (name = "users", description = "Back-office accounts, grants and audit trails"),
        (name = "settings", description = "Business settings"),
        (name = "notifications", description = "In-app notification feed"),
        (name = "health", description = "Liveness and readiness checks"),
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Bakery API"));
        assert!(json.contains("/api/v1/orders/{id}/payments"));
        assert!(json.contains("/api/v1/ledger/customers/{id}/statement"));
        let components = openapi.components.expect("components");
        assert!(components.security_schemes.contains_key("Bearer"));
        assert!(components.schemas.contains_key("Setting"));
        assert!(json.contains("/api/v1/settings/{key}"));
    }
}
