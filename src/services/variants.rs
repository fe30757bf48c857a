//! Variant reconciliation.
//!
//! A product update carries the complete list of variants the caller wants to
//! exist. [`reconcile`] converges the stored rows onto that list: variants the
//! caller left out are retired, variants carrying an id are updated in place and
//! variants without an id are created with a fresh SKU. Value links are synced
//! as a set diff. Everything runs on the connection it is handed, which is
//! always the caller's open transaction.

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::{associations, SoftDelete};
use crate::entities::{product, product_variant, product_variant_value, variant_value};
use crate::errors::ServiceError;
use crate::services::sku::{self, SkuRegistry, VariantSkus};

/// One variant as submitted with a product create or update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct VariantInput {
    /// Existing variant to update; absent for a new variant
    pub id: Option<Uuid>,
    /// Explicit SKU; generated from the product SKU when omitted
    #[validate(length(max = 255))]
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: Decimal,
    pub default_purchase_price: Option<Decimal>,
    pub default_sale_price: Option<Decimal>,
    pub default_margin: Option<Decimal>,
    #[validate(length(max = 255))]
    pub image: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub variant_value_ids: Vec<Uuid>,
}

impl VariantInput {
    /// The explicit SKU, with blank strings treated as absent.
    pub fn explicit_sku(&self) -> Option<&str> {
        self.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn value_ids(&self) -> Vec<Uuid> {
        self.variant_value_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Ids touched by one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: Vec<Uuid>,
    pub updated: Vec<Uuid>,
    pub retired: Vec<Uuid>,
}

/// Variant SKUs in the database plus the explicit SKUs of the pending payload,
/// so a generated SKU never lands on one a later variant asked for.
struct PayloadAwareSkus<'a, C> {
    stored: VariantSkus<'a, C>,
    requested: HashSet<String>,
}

#[async_trait]
impl<'a, C: ConnectionTrait> SkuRegistry for PayloadAwareSkus<'a, C> {
    async fn is_taken(&self, sku: &str) -> Result<bool, ServiceError> {
        if self.requested.contains(sku) {
            return Ok(true);
        }
        self.stored.is_taken(sku).await
    }
}

/// Rejects explicit SKUs that repeat inside the payload or belong to another
/// variant (retired ones included), and value ids that do not exist.
#[instrument(skip(conn, inputs), fields(variants = inputs.len()))]
pub async fn check_inputs<C: ConnectionTrait>(
    conn: &C,
    inputs: &[VariantInput],
) -> Result<(), ServiceError> {
    let mut problems = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (index, input) in inputs.iter().enumerate() {
        let Some(sku) = input.explicit_sku() else {
            continue;
        };
        if let Some(first) = seen.get(sku) {
            problems.push(format!(
                "variants[{index}].sku: duplicates the SKU of variants[{first}]"
            ));
            continue;
        }
        seen.insert(sku, index);
        if sku::variant_sku_exists(conn, sku, input.id).await? {
            problems.push(format!(
                "variants[{index}].sku: The SKU has already been taken."
            ));
        }
    }

    let wanted: BTreeSet<Uuid> = inputs
        .iter()
        .flat_map(|v| v.variant_value_ids.iter().copied())
        .collect();
    if !wanted.is_empty() {
        let known: HashSet<Uuid> = variant_value::Entity::find()
            .filter(variant_value::Column::Id.is_in(wanted.iter().copied()))
            .all(conn)
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect();
        for (index, input) in inputs.iter().enumerate() {
            for value_id in &input.variant_value_ids {
                if !known.contains(value_id) {
                    problems.push(format!(
                        "variants[{index}].variant_value_ids: unknown variant value {value_id}"
                    ));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(problems))
    }
}

/// Live variants of `product_id`, oldest first.
pub async fn live_variants<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<product_variant::Model>, ServiceError> {
    Ok(product_variant::Entity::find_active()
        .filter(product_variant::Column::ProductId.eq(product_id))
        .order_by_asc(product_variant::Column::CreatedAt)
        .order_by_asc(product_variant::Column::Sku)
        .all(conn)
        .await?)
}

/// Creates every variant in `inputs` under `product`. Ids in the payload are
/// ignored.
#[instrument(skip(conn, product, inputs), fields(product_id = %product.id, variants = inputs.len()))]
pub async fn create_all<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    inputs: &[VariantInput],
) -> Result<Vec<product_variant::Model>, ServiceError> {
    let registry = payload_registry(conn, inputs);
    let mut created = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        created.push(create_one(conn, &registry, product, index as u64 + 1, input).await?);
    }
    Ok(created)
}

/// Converges the live variants of `product` onto `inputs`.
#[instrument(skip(conn, product, inputs), fields(product_id = %product.id, variants = inputs.len()))]
pub async fn reconcile<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    inputs: &[VariantInput],
) -> Result<ReconcileOutcome, ServiceError> {
    let mut outcome = ReconcileOutcome::default();
    let keep: HashSet<Uuid> = inputs.iter().filter_map(|v| v.id).collect();

    for stale in live_variants(conn, product.id)
        .await?
        .into_iter()
        .filter(|v| !keep.contains(&v.id))
    {
        outcome.retired.push(retire(conn, stale).await?);
    }

    let registry = payload_registry(conn, inputs);
    for (index, input) in inputs.iter().enumerate() {
        match input.id {
            Some(id) => {
                update_one(conn, product.id, id, input).await?;
                outcome.updated.push(id);
            }
            None => {
                let variant = create_one(conn, &registry, product, index as u64 + 1, input).await?;
                outcome.created.push(variant.id);
            }
        }
    }

    info!(
        created = outcome.created.len(),
        updated = outcome.updated.len(),
        retired = outcome.retired.len(),
        "Variants reconciled"
    );
    Ok(outcome)
}

/// Retires every live variant of `product_id`.
#[instrument(skip(conn))]
pub async fn retire_all<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<Uuid>, ServiceError> {
    let mut retired = Vec::new();
    for variant in live_variants(conn, product_id).await? {
        retired.push(retire(conn, variant).await?);
    }
    Ok(retired)
}

fn payload_registry<'a, C: ConnectionTrait>(
    conn: &'a C,
    inputs: &[VariantInput],
) -> PayloadAwareSkus<'a, C> {
    PayloadAwareSkus {
        stored: VariantSkus(conn),
        requested: inputs
            .iter()
            .filter_map(|v| v.explicit_sku().map(str::to_owned))
            .collect(),
    }
}

async fn create_one<C: ConnectionTrait>(
    conn: &C,
    registry: &PayloadAwareSkus<'_, C>,
    product: &product::Model,
    ordinal: u64,
    input: &VariantInput,
) -> Result<product_variant::Model, ServiceError> {
    let sku = match input.explicit_sku() {
        Some(sku) => sku.to_owned(),
        None => sku::next_variant_sku(registry, &product.sku, ordinal).await?,
    };

    let variant = product_variant::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        sku: Set(sku),
        description: Set(input.description.clone()),
        price: Set(input.price),
        stock: Set(input.stock),
        default_purchase_price: Set(input.default_purchase_price),
        default_sale_price: Set(input.default_sale_price),
        default_margin: Set(input.default_margin),
        image: Set(input.image.clone()),
        is_active: Set(input.is_active.unwrap_or(true)),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    associations::attach::<product_variant_value::Entity, _>(conn, variant.id, &input.value_ids())
        .await?;

    counter!("backoffice_variants.created", 1);
    debug!(variant_id = %variant.id, sku = %variant.sku, "Variant created");
    Ok(variant)
}

async fn update_one<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Uuid,
    input: &VariantInput,
) -> Result<product_variant::Model, ServiceError> {
    let existing = product_variant::Entity::find_active()
        .filter(product_variant::Column::Id.eq(variant_id))
        .filter(product_variant::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Variant {variant_id} not found")))?;

    let sku = input
        .explicit_sku()
        .map(str::to_owned)
        .unwrap_or_else(|| existing.sku.clone());
    let description = input.description.clone().or_else(|| existing.description.clone());
    let purchase = input.default_purchase_price.or(existing.default_purchase_price);
    let sale = input.default_sale_price.or(existing.default_sale_price);
    let margin = input.default_margin.or(existing.default_margin);
    let image = input.image.clone().or_else(|| existing.image.clone());
    let is_active = input.is_active.unwrap_or(existing.is_active);

    let mut active: product_variant::ActiveModel = existing.into();
    active.sku = Set(sku);
    active.description = Set(description);
    active.price = Set(input.price);
    active.stock = Set(input.stock);
    active.default_purchase_price = Set(purchase);
    active.default_sale_price = Set(sale);
    active.default_margin = Set(margin);
    active.image = Set(image);
    active.is_active = Set(is_active);
    let variant = active.update(conn).await?;

    let changes =
        associations::sync::<product_variant_value::Entity, _>(conn, variant_id, &input.variant_value_ids)
            .await?;

    counter!("backoffice_variants.updated", 1);
    debug!(
        variant_id = %variant_id,
        attached = changes.attached.len(),
        detached = changes.detached.len(),
        "Variant updated"
    );
    Ok(variant)
}

async fn retire<C: ConnectionTrait>(
    conn: &C,
    variant: product_variant::Model,
) -> Result<Uuid, ServiceError> {
    let id = variant.id;
    associations::detach_all::<product_variant_value::Entity, _>(conn, id).await?;

    let mut active: product_variant::ActiveModel = variant.into();
    active.deleted_at = Set(Some(Utc::now()));
    active.update(conn).await?;

    counter!("backoffice_variants.retired", 1);
    debug!(variant_id = %id, "Variant retired");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn blank_sku_counts_as_omitted() {
        let mut input = VariantInput {
            sku: Some("   ".into()),
            price: dec!(10),
            stock: dec!(1),
            ..Default::default()
        };
        assert_eq!(input.explicit_sku(), None);
        input.sku = Some(" TEE-RED ".into());
        assert_eq!(input.explicit_sku(), Some("TEE-RED"));
    }

    #[test]
    fn value_ids_are_deduplicated() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let input = VariantInput {
            variant_value_ids: vec![a, b, a],
            ..Default::default()
        };
        let ids = input.value_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }

    #[test]
    fn price_and_stock_are_required_in_json() {
        let missing = serde_json::from_value::<VariantInput>(serde_json::json!({ "price": 5 }));
        assert!(missing.is_err());

        let ok = serde_json::from_value::<VariantInput>(serde_json::json!({
            "price": 5,
            "stock": "2.5"
        }))
        .unwrap();
        assert_eq!(ok.stock, dec!(2.5));
        assert!(ok.variant_value_ids.is_empty());
    }
}
