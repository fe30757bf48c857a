/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Default roles seeded into the database and the permission matching rules the
 * middleware applies to token claims.
 */

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Role holders bypass every permission check.
pub const ADMIN_ROLE: &str = "admin";

/// Role definition with the permission patterns it is seeded with
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            ADMIN_ROLE.to_string(),
            Role {
                name: ADMIN_ROLE.to_string(),
                description: "Administrator with full access".to_string(),
                permissions: vec!["*".to_string()],
            },
        );

        // Warehouse staff
        roles.insert(
            "stock".to_string(),
            Role {
                name: "stock".to_string(),
                description: "Manages products and sales".to_string(),
                permissions: vec!["products:*".to_string(), "sales:*".to_string()],
            },
        );

        roles.insert(
            "sale".to_string(),
            Role {
                name: "sale".to_string(),
                description: "Sells from the catalog".to_string(),
                permissions: vec!["sales:*".to_string(), "products:read".to_string()],
            },
        );

        roles
    };
}

/// Check if a granted permission (possibly a wildcard) covers a required one.
///
/// `products:*` covers `products:read` but not `productsx:read`.
pub fn check_permission(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    match granted.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => required.starts_with(prefix),
        _ => false,
    }
}

/// Check a permission against a whole grant list.
pub fn grants<S: AsRef<str>>(granted: &[S], required: &str) -> bool {
    granted
        .iter()
        .any(|g| check_permission(g.as_ref(), required))
}

/// Permission names among `available` that a role's patterns expand to.
pub fn expand_patterns<'a>(patterns: &[String], available: &'a [String]) -> Vec<&'a String> {
    available
        .iter()
        .filter(|name| grants(patterns, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{consts, DEFAULT_PERMISSIONS};

    #[test]
    fn wildcard_matches_only_its_resource() {
        assert!(check_permission("products:*", "products:read"));
        assert!(check_permission("products:*", "products:delete"));
        assert!(!check_permission("products:*", "productsx:read"));
        assert!(!check_permission("products:*", "sales:read"));
        assert!(check_permission("*", "roles:manage"));
        assert!(check_permission("brands:read", "brands:read"));
        assert!(!check_permission("brands:read", "brands:manage"));
    }

    #[test]
    fn sale_role_expands_to_sales_and_product_reads() {
        let sale = &ROLES["sale"];
        let mut names: Vec<&str> = expand_patterns(&sale.permissions, &DEFAULT_PERMISSIONS)
            .into_iter()
            .map(String::as_str)
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                consts::PRODUCTS_READ,
                consts::SALES_CREATE,
                consts::SALES_DELETE,
                consts::SALES_READ,
                consts::SALES_UPDATE,
            ]
        );
    }

    #[test]
    fn admin_role_expands_to_everything() {
        let admin = &ROLES[ADMIN_ROLE];
        assert_eq!(
            expand_patterns(&admin.permissions, &DEFAULT_PERMISSIONS).len(),
            DEFAULT_PERMISSIONS.len()
        );
    }

    #[test]
    fn grants_checks_any_entry() {
        let held = vec!["sales:*".to_string(), "products:read".to_string()];
        assert!(grants(&held, "products:read"));
        assert!(!grants(&held, "products:update"));
    }
}
