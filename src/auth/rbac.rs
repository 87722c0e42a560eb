/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Built-in roles and their default module grants. Rows in the
 * `role_permissions` table replace these defaults module by module.
 */

use lazy_static::lazy_static;
use std::collections::HashMap;

use super::permissions::{Modules as M, ModuleGrant};

pub const ADMIN_ROLE: &str = "admin";

/// Role definition with its default grants
#[derive(Debug, Clone)]
pub struct Role {
    pub name: &'static str,
    pub description: &'static str,
    pub grants: Vec<ModuleGrant>,
}

lazy_static! {
    pub static ref ROLES: HashMap<&'static str, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            ADMIN_ROLE,
            Role {
                name: ADMIN_ROLE,
                description: "Owner or administrator with full access",
                grants: M::ALL.iter().map(|m| ModuleGrant::full(m)).collect(),
            },
        );

        roles.insert(
            "manager",
            Role {
                name: "manager",
                description: "Runs daily operations",
                grants: vec![
                    ModuleGrant::view_only(M::DASHBOARD),
                    ModuleGrant::full(M::ORDERS),
                    ModuleGrant::full(M::PRODUCTS),
                    ModuleGrant::full(M::INVENTORY),
                    ModuleGrant::full(M::PRODUCTION),
                    ModuleGrant::operate(M::CUSTOMERS),
                    ModuleGrant::operate(M::PARTIES),
                    ModuleGrant::operate(M::LEDGER),
                    ModuleGrant::operate(M::STAFF),
                    ModuleGrant::view_only(M::PAYROLL),
                    ModuleGrant::view_only(M::REPORTS),
                    ModuleGrant::view_only(M::SETTINGS),
                    ModuleGrant::view_only(M::USERS),
                ],
            },
        );

        roles.insert(
            "baker",
            Role {
                name: "baker",
                description: "Production floor",
                grants: vec![
                    ModuleGrant::view_only(M::DASHBOARD),
                    ModuleGrant::view_only(M::ORDERS),
                    ModuleGrant::view_only(M::PRODUCTS),
                    ModuleGrant {
                        can_edit: true,
                        ..ModuleGrant::view_only(M::INVENTORY)
                    },
                    ModuleGrant::operate(M::PRODUCTION),
                ],
            },
        );

        roles.insert(
            "cashier",
            Role {
                name: "cashier",
                description: "Front counter: takes orders and payments",
                grants: vec![
                    ModuleGrant::view_only(M::DASHBOARD),
                    ModuleGrant::operate(M::ORDERS),
                    ModuleGrant::view_only(M::PRODUCTS),
                    ModuleGrant::operate(M::CUSTOMERS),
                    ModuleGrant {
                        can_create: true,
                        ..ModuleGrant::view_only(M::LEDGER)
                    },
                ],
            },
        );

        roles.insert(
            "accountant",
            Role {
                name: "accountant",
                description: "Books, balances and payroll",
                grants: vec![
                    ModuleGrant::view_only(M::DASHBOARD),
                    ModuleGrant::view_only(M::ORDERS),
                    ModuleGrant::view_only(M::CUSTOMERS),
                    ModuleGrant::operate(M::PARTIES),
                    ModuleGrant::full(M::LEDGER),
                    ModuleGrant::view_only(M::STAFF),
                    ModuleGrant::view_only(M::PAYROLL),
                    ModuleGrant::view_only(M::REPORTS),
                ],
            },
        );

        roles
    };
}

pub fn is_known_role(role: &str) -> bool {
    ROLES.contains_key(role)
}

/// Built-in grants for a role; empty for unknown roles
pub fn role_defaults(role: &str) -> Vec<ModuleGrant> {
    ROLES
        .get(role)
        .map(|r| r.grants.clone())
        .unwrap_or_default()
}

/// Check if a granted permission covers a required permission.
///
/// Supports exact matches, `module:*` and the global `*`.
pub fn permission_matches(granted: &str, required: &str) -> bool {
    if granted == required || granted == "*" {
        return true;
    }

    if let Some(module) = granted.strip_suffix(":*") {
        return required
            .split_once(':')
            .map_or(false, |(required_module, _)| required_module == module);
    }

    false
}

pub fn has_permission(granted: &[String], required: &str) -> bool {
    granted.iter().any(|p| permission_matches(p, required))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("orders:view", "orders:view", true)]
    #[case("orders:*", "orders:delete", true)]
    #[case("orders:*", "ordersx:view", false)]
    #[case("*", "ledger:edit", true)]
    #[case("orders:view", "orders:edit", false)]
    #[case("ledger:view", "orders:view", false)]
    fn wildcard_matching(#[case] granted: &str, #[case] required: &str, #[case] ok: bool) {
        assert_eq!(permission_matches(granted, required), ok);
    }

    #[test]
    fn admin_defaults_cover_every_module() {
        let grants = role_defaults(ADMIN_ROLE);
        assert_eq!(grants.len(), M::ALL.len());
        assert!(grants.iter().all(|g| g.can_delete));
    }

    #[test]
    fn cashier_cannot_delete_orders() {
        let grants = role_defaults("cashier");
        let orders = grants.iter().find(|g| g.module == M::ORDERS).unwrap();
        assert!(orders.can_create);
        assert!(!orders.can_delete);
    }

    #[test]
    fn unknown_role_has_nothing() {
        assert!(!is_known_role("intern"));
        assert!(role_defaults("intern").is_empty());
    }
}
