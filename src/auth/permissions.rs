/*!
 * # Permissions Module
 *
 * Permissions are `module:action` strings. A [`ModuleGrant`] is the row form
 * stored per role and per user; [`merge_grants`] is the one place where role
 * grants and user overrides are combined.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::Validate;

/// Permission actions
pub struct Actions;

impl Actions {
    pub const VIEW: &'static str = "view";
    pub const CREATE: &'static str = "create";
    pub const EDIT: &'static str = "edit";
    pub const DELETE: &'static str = "delete";
    pub const ALL: &'static str = "*";
}

/// Application modules that permissions are granted on
pub struct Modules;

impl Modules {
    pub const DASHBOARD: &'static str = "dashboard";
    pub const ORDERS: &'static str = "orders";
    pub const PRODUCTS: &'static str = "products";
    pub const INVENTORY: &'static str = "inventory";
    pub const PRODUCTION: &'static str = "production";
    pub const CUSTOMERS: &'static str = "customers";
    pub const PARTIES: &'static str = "parties";
    pub const LEDGER: &'static str = "ledger";
    pub const STAFF: &'static str = "staff";
    pub const PAYROLL: &'static str = "payroll";
    pub const SETTINGS: &'static str = "settings";
    pub const USERS: &'static str = "users";
    pub const REPORTS: &'static str = "reports";

    pub const ALL: [&'static str; 13] = [
        Self::DASHBOARD,
        Self::ORDERS,
        Self::PRODUCTS,
        Self::INVENTORY,
        Self::PRODUCTION,
        Self::CUSTOMERS,
        Self::PARTIES,
        Self::LEDGER,
        Self::STAFF,
        Self::PAYROLL,
        Self::SETTINGS,
        Self::USERS,
        Self::REPORTS,
    ];

    pub fn is_known(module: &str) -> bool {
        Self::ALL.contains(&module)
    }
}

/// Common permission string constants for compile-time safety
pub mod consts {
    pub const DASHBOARD_VIEW: &str = "dashboard:view";

    pub const ORDERS_VIEW: &str = "orders:view";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_EDIT: &str = "orders:edit";
    pub const ORDERS_DELETE: &str = "orders:delete";

    pub const PRODUCTS_VIEW: &str = "products:view";
    pub const PRODUCTS_CREATE: &str = "products:create";
    pub const PRODUCTS_EDIT: &str = "products:edit";
    pub const PRODUCTS_DELETE: &str = "products:delete";

    pub const INVENTORY_VIEW: &str = "inventory:view";
    pub const INVENTORY_CREATE: &str = "inventory:create";
    pub const INVENTORY_EDIT: &str = "inventory:edit";
    pub const INVENTORY_DELETE: &str = "inventory:delete";

    pub const PRODUCTION_VIEW: &str = "production:view";
    pub const PRODUCTION_CREATE: &str = "production:create";
    pub const PRODUCTION_EDIT: &str = "production:edit";
    pub const PRODUCTION_DELETE: &str = "production:delete";

    pub const CUSTOMERS_VIEW: &str = "customers:view";
    pub const CUSTOMERS_CREATE: &str = "customers:create";
    pub const CUSTOMERS_EDIT: &str = "customers:edit";
    pub const CUSTOMERS_DELETE: &str = "customers:delete";

    pub const PARTIES_VIEW: &str = "parties:view";
    pub const PARTIES_CREATE: &str = "parties:create";
    pub const PARTIES_EDIT: &str = "parties:edit";
    pub const PARTIES_DELETE: &str = "parties:delete";

    pub const LEDGER_VIEW: &str = "ledger:view";
    pub const LEDGER_CREATE: &str = "ledger:create";
    pub const LEDGER_EDIT: &str = "ledger:edit";
    pub const LEDGER_DELETE: &str = "ledger:delete";

    pub const STAFF_VIEW: &str = "staff:view";
    pub const STAFF_CREATE: &str = "staff:create";
    pub const STAFF_EDIT: &str = "staff:edit";
    pub const STAFF_DELETE: &str = "staff:delete";

    pub const PAYROLL_VIEW: &str = "payroll:view";

    pub const SETTINGS_VIEW: &str = "settings:view";
    pub const SETTINGS_EDIT: &str = "settings:edit";

    pub const USERS_VIEW: &str = "users:view";
    pub const USERS_CREATE: &str = "users:create";
    pub const USERS_EDIT: &str = "users:edit";
    pub const USERS_DELETE: &str = "users:delete";

    pub const REPORTS_VIEW: &str = "reports:view";
}

/// Format a permission string from module and action
pub fn format_permission(module: &str, action: &str) -> String {
    format!("{}:{}", module, action)
}

/// The four flags granted on one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ModuleGrant {
    #[validate(length(min = 1, max = 32))]
    pub module: String,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl ModuleGrant {
    pub fn full(module: &str) -> Self {
        Self {
            module: module.to_string(),
            can_view: true,
            can_create: true,
            can_edit: true,
            can_delete: true,
        }
    }

    pub fn view_only(module: &str) -> Self {
        Self {
            module: module.to_string(),
            can_view: true,
            can_create: false,
            can_edit: false,
            can_delete: false,
        }
    }

    /// View, create and edit but not delete
    pub fn operate(module: &str) -> Self {
        Self {
            can_delete: false,
            ..Self::full(module)
        }
    }

    /// Expands the flags into `module:action` strings
    pub fn permission_strings(&self) -> Vec<String> {
        let flags = [
            (self.can_view, Actions::VIEW),
            (self.can_create, Actions::CREATE),
            (self.can_edit, Actions::EDIT),
            (self.can_delete, Actions::DELETE),
        ];
        flags
            .iter()
            .filter(|(granted, _)| *granted)
            .map(|(_, action)| format_permission(&self.module, action))
            .collect()
    }
}

/// Combine role-level grants with user-level overrides.
///
/// For every module the user's row, when present, replaces the role's row
/// entirely. Modules present on only one side pass through unchanged. The
/// result is sorted by module name.
pub fn merge_grants(role_grants: &[ModuleGrant], user_grants: &[ModuleGrant]) -> Vec<ModuleGrant> {
    let mut merged: BTreeMap<&str, &ModuleGrant> = BTreeMap::new();
    for grant in role_grants {
        merged.insert(grant.module.as_str(), grant);
    }
    for grant in user_grants {
        merged.insert(grant.module.as_str(), grant);
    }
    merged.into_values().cloned().collect()
}

/// Flatten grants into the permission strings carried in a token
pub fn grants_to_permissions(grants: &[ModuleGrant]) -> Vec<String> {
    grants
        .iter()
        .flat_map(ModuleGrant::permission_strings)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(module: &str, v: bool, c: bool, e: bool, d: bool) -> ModuleGrant {
        ModuleGrant {
            module: module.into(),
            can_view: v,
            can_create: c,
            can_edit: e,
            can_delete: d,
        }
    }

    #[test]
    fn user_override_replaces_role_row() {
        let role = vec![grant("orders", true, true, true, false)];
        let user = vec![grant("orders", true, false, false, false)];
        let merged = merge_grants(&role, &user);
        assert_eq!(merged, vec![grant("orders", true, false, false, false)]);
    }

    #[test]
    fn user_override_can_widen() {
        let role = vec![grant("ledger", true, false, false, false)];
        let user = vec![grant("ledger", true, true, true, true)];
        let merged = merge_grants(&role, &user);
        assert!(merged[0].can_delete);
    }

    #[test]
    fn disjoint_modules_pass_through_sorted() {
        let role = vec![grant("staff", true, false, false, false)];
        let user = vec![grant("inventory", true, true, false, false)];
        let merged = merge_grants(&role, &user);
        let modules: Vec<_> = merged.iter().map(|g| g.module.as_str()).collect();
        assert_eq!(modules, vec!["inventory", "staff"]);
    }

    #[test]
    fn permission_strings_follow_flags() {
        let g = grant("orders", true, false, true, false);
        assert_eq!(g.permission_strings(), vec!["orders:view", "orders:edit"]);
        assert_eq!(
            grants_to_permissions(&[g, ModuleGrant::view_only("staff")]),
            vec!["orders:view", "orders:edit", "staff:view"]
        );
    }

    #[test]
    fn known_modules() {
        assert!(Modules::is_known("payroll"));
        assert!(!Modules::is_known("returns"));
    }
}
