pub mod access;
pub mod brands;
pub mod catalog;
pub mod categories;
pub mod common;
pub mod health;
pub mod products;

use crate::{
    db::{DbPool, PageLimits},
    services::{
        access::AccessService, brands::BrandService, catalog::CatalogService,
        categories::CategoryService, products::ProductService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub brands: Arc<BrandService>,
    pub categories: Arc<CategoryService>,
    pub catalog: Arc<CatalogService>,
    pub access: Arc<AccessService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, limits: PageLimits) -> Self {
        Self {
            products: Arc::new(ProductService::new(db_pool.clone(), limits)),
            brands: Arc::new(BrandService::new(db_pool.clone(), limits)),
            categories: Arc::new(CategoryService::new(db_pool.clone(), limits)),
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            access: Arc::new(AccessService::new(db_pool)),
        }
    }
}
