//! Business logic. Handlers stay thin and call into these services.

// Core
pub mod sku;
pub mod variants;
pub mod products;

// Lookups
pub mod brands;
pub mod catalog;
pub mod categories;

// Access control
pub mod access;
