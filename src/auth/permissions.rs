/*!
 * # Permissions Module
 *
 * Permission names are `resource:action` strings. Route groups require one of
 * the constants in [`consts`]; stored roles grant them through the
 * `permissions` table.
 */

use lazy_static::lazy_static;

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const MANAGE: &'static str = "manage";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const PRODUCTS: &'static str = "products";
    pub const SALES: &'static str = "sales";
    pub const BRANDS: &'static str = "brands";
    pub const CATEGORIES: &'static str = "categories";
    pub const CATALOG: &'static str = "catalog";
    pub const ROLES: &'static str = "roles";
}

/// Builds a `resource:action` permission name.
pub fn permission_name(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Common permission string constants for compile-time safety
pub mod consts {
    // Products
    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_CREATE: &str = "products:create";
    pub const PRODUCTS_UPDATE: &str = "products:update";
    pub const PRODUCTS_DELETE: &str = "products:delete";

    // Sales
    pub const SALES_READ: &str = "sales:read";
    pub const SALES_CREATE: &str = "sales:create";
    pub const SALES_UPDATE: &str = "sales:update";
    pub const SALES_DELETE: &str = "sales:delete";

    // Lookups
    pub const BRANDS_READ: &str = "brands:read";
    pub const BRANDS_MANAGE: &str = "brands:manage";
    pub const CATEGORIES_READ: &str = "categories:read";
    pub const CATEGORIES_MANAGE: &str = "categories:manage";
    pub const CATALOG_READ: &str = "catalog:read";
    pub const CATALOG_MANAGE: &str = "catalog:manage";

    // Access control
    pub const ROLES_MANAGE: &str = "roles:manage";
}

lazy_static! {
    /// Every permission the seeder creates.
    pub static ref DEFAULT_PERMISSIONS: Vec<String> = {
        let mut names = Vec::new();
        for resource in [Resources::PRODUCTS, Resources::SALES] {
            for action in [Actions::CREATE, Actions::READ, Actions::UPDATE, Actions::DELETE] {
                names.push(permission_name(resource, action));
            }
        }
        for resource in [Resources::BRANDS, Resources::CATEGORIES, Resources::CATALOG] {
            names.push(permission_name(resource, Actions::READ));
            names.push(permission_name(resource, Actions::MANAGE));
        }
        names.push(permission_name(Resources::ROLES, Actions::MANAGE));
        names
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_route_permission() {
        for required in [
            consts::PRODUCTS_READ,
            consts::PRODUCTS_CREATE,
            consts::PRODUCTS_UPDATE,
            consts::PRODUCTS_DELETE,
            consts::BRANDS_READ,
            consts::BRANDS_MANAGE,
            consts::CATEGORIES_READ,
            consts::CATEGORIES_MANAGE,
            consts::CATALOG_READ,
            consts::CATALOG_MANAGE,
            consts::ROLES_MANAGE,
        ] {
            assert!(
                DEFAULT_PERMISSIONS.iter().any(|p| p == required),
                "{required} missing"
            );
        }
    }

    #[test]
    fn defaults_are_unique() {
        let mut sorted = DEFAULT_PERMISSIONS.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), DEFAULT_PERMISSIONS.len());
    }
}
