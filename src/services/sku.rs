//! SKU allocation for products and their variants.
//!
//! Base SKUs look like `SKU-0001`; variant SKUs append a two-digit ordinal to
//! the base (`SKU-0001-03`). Both paddings are minimum widths. Every probe
//! includes soft-deleted rows, so a retired SKU is never handed out again.
//!
//! The check is not atomic with the later insert. The unique indexes on
//! `products.sku` and `product_variants.sku` reject a racing duplicate, which
//! surfaces as [`ServiceError::Conflict`] and is not retried.

use async_trait::async_trait;
use metrics::counter;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::db::SoftDelete;
use crate::entities::{product, product_variant};
use crate::errors::ServiceError;

pub const BASE_SKU_PREFIX: &str = "SKU-";
const BASE_SKU_WIDTH: usize = 4;
const VARIANT_SUFFIX_WIDTH: usize = 2;

pub fn format_base_sku(sequence: u64) -> String {
    format!("{BASE_SKU_PREFIX}{sequence:0width$}", width = BASE_SKU_WIDTH)
}

pub fn format_variant_sku(base_sku: &str, suffix: u64) -> String {
    format!("{base_sku}-{suffix:0width$}", width = VARIANT_SUFFIX_WIDTH)
}

/// Something that can say whether a SKU is already in use.
#[async_trait]
pub trait SkuRegistry: Send + Sync {
    async fn is_taken(&self, sku: &str) -> Result<bool, ServiceError>;
}

/// Product SKUs, soft-deleted rows included.
pub struct ProductSkus<'a, C>(pub &'a C);

/// Variant SKUs, soft-deleted rows included.
pub struct VariantSkus<'a, C>(pub &'a C);

#[async_trait]
impl<'a, C: ConnectionTrait> SkuRegistry for ProductSkus<'a, C> {
    async fn is_taken(&self, sku: &str) -> Result<bool, ServiceError> {
        product_sku_exists(self.0, sku, None).await
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait> SkuRegistry for VariantSkus<'a, C> {
    async fn is_taken(&self, sku: &str) -> Result<bool, ServiceError> {
        variant_sku_exists(self.0, sku, None).await
    }
}

#[async_trait]
impl SkuRegistry for HashSet<String> {
    async fn is_taken(&self, sku: &str) -> Result<bool, ServiceError> {
        Ok(self.contains(sku))
    }
}

/// Whether any product, live or retired, other than `except` uses `sku`.
pub async fn product_sku_exists<C: ConnectionTrait>(
    conn: &C,
    sku: &str,
    except: Option<Uuid>,
) -> Result<bool, ServiceError> {
    let mut query = product::Entity::find_with_trashed().filter(product::Column::Sku.eq(sku));
    if let Some(id) = except {
        query = query.filter(product::Column::Id.ne(id));
    }
    Ok(query.count(conn).await? > 0)
}

/// Whether any variant, live or retired, other than `except` uses `sku`.
pub async fn variant_sku_exists<C: ConnectionTrait>(
    conn: &C,
    sku: &str,
    except: Option<Uuid>,
) -> Result<bool, ServiceError> {
    let mut query =
        product_variant::Entity::find_with_trashed().filter(product_variant::Column::Sku.eq(sku));
    if let Some(id) = except {
        query = query.filter(product_variant::Column::Id.ne(id));
    }
    Ok(query.count(conn).await? > 0)
}

/// Walks `start, start + 1, ...` until `render(n)` is free in `registry`.
pub async fn first_free<R, F>(registry: &R, start: u64, render: F) -> Result<String, ServiceError>
where
    R: SkuRegistry + ?Sized,
    F: Fn(u64) -> String + Send + Sync,
{
    let mut sequence = start;
    loop {
        let candidate = render(sequence);
        if !registry.is_taken(&candidate).await? {
            return Ok(candidate);
        }
        counter!("backoffice_sku.collisions", 1);
        debug!(sku = %candidate, "SKU candidate already taken");
        sequence = sequence
            .checked_add(1)
            .ok_or_else(|| ServiceError::InternalError("SKU sequence exhausted".to_string()))?;
    }
}

/// Lowest free `SKU-NNNN` in `registry`.
pub async fn next_base_sku<R: SkuRegistry + ?Sized>(registry: &R) -> Result<String, ServiceError> {
    first_free(registry, 1, format_base_sku).await
}

/// `base_sku-NN` for the variant at 1-based `ordinal`, bumping the suffix past
/// taken values.
pub async fn next_variant_sku<R: SkuRegistry + ?Sized>(
    registry: &R,
    base_sku: &str,
    ordinal: u64,
) -> Result<String, ServiceError> {
    first_free(registry, ordinal, |n| format_variant_sku(base_sku, n)).await
}

/// Allocates a product SKU against the database behind `conn`.
pub async fn allocate_base_sku<C: ConnectionTrait>(conn: &C) -> Result<String, ServiceError> {
    next_base_sku(&ProductSkus(conn)).await
}

/// Allocates a variant SKU against the database behind `conn`.
pub async fn allocate_variant_sku<C: ConnectionTrait>(
    conn: &C,
    base_sku: &str,
    ordinal: u64,
) -> Result<String, ServiceError> {
    next_variant_sku(&VariantSkus(conn), base_sku, ordinal).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(skus: &[&str]) -> HashSet<String> {
        skus.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn padding_is_a_minimum_width() {
        assert_eq!(format_base_sku(1), "SKU-0001");
        assert_eq!(format_base_sku(10000), "SKU-10000");
        assert_eq!(format_variant_sku("SKU-0001", 3), "SKU-0001-03");
        assert_eq!(format_variant_sku("SKU-0001", 100), "SKU-0001-100");
    }

    #[tokio::test]
    async fn base_sku_starts_at_one() {
        assert_eq!(next_base_sku(&HashSet::new()).await.unwrap(), "SKU-0001");
    }

    #[tokio::test]
    async fn base_sku_skips_taken_values_including_gaps() {
        let registry = taken(&["SKU-0001", "SKU-0002", "SKU-0004"]);
        assert_eq!(next_base_sku(&registry).await.unwrap(), "SKU-0003");
    }

    #[tokio::test]
    async fn variant_sku_uses_ordinal_when_free() {
        let sku = next_variant_sku(&HashSet::new(), "SKU-0007", 2).await.unwrap();
        assert_eq!(sku, "SKU-0007-02");
    }

    #[tokio::test]
    async fn variant_sku_bumps_past_collisions() {
        let registry = taken(&["SKU-0007-02", "SKU-0007-03"]);
        let sku = next_variant_sku(&registry, "SKU-0007", 2).await.unwrap();
        assert_eq!(sku, "SKU-0007-04");
    }

    #[tokio::test]
    async fn explicit_base_sku_feeds_variant_suffix() {
        let sku = next_variant_sku(&HashSet::new(), "TSHIRT", 1).await.unwrap();
        assert_eq!(sku, "TSHIRT-01");
    }
}
