// Catalog
pub mod brand;
pub mod category;
pub mod product;
pub mod product_variant;
pub mod product_variant_value;
pub mod unit;
pub mod variant_attribute;
pub mod variant_value;

// Access control
pub mod permission;
pub mod role;
pub mod role_permission;
pub mod user_role;
