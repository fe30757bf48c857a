use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, transaction, ListParams, PageLimits, SearchBuilder, SoftDelete, TablePage},
    entities::{
        brand, category, product, product_variant, product_variant_value, unit, variant_attribute,
        variant_value,
    },
    errors::ServiceError,
    services::{
        brands, catalog,
        catalog::{AttributeWithValues, ValueWithAttribute},
        categories::{self, CategoryWithChildren},
        sku,
        variants::{self, VariantInput},
    },
};

/// Columns a product listing may be sorted by.
pub const SORTABLE_COLUMNS: &[&str] = &["name", "description", "created_at", "updated_at"];

/// Body of a product create or update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    /// Base SKU; allocated when omitted. Ignored on update.
    #[validate(length(max = 255))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub has_variants: bool,
    #[validate(length(max = 255))]
    pub barcode: Option<String>,
    pub brand_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub manage_stock: Option<bool>,
    pub alert_qty: Option<Decimal>,
    #[validate(length(max = 255))]
    pub image: Option<String>,
    pub not_sale: Option<bool>,
    pub serial_des: Option<bool>,
    pub tax: Option<Decimal>,
    pub include_tax: Option<i32>,
    pub is_active: Option<bool>,
    #[validate]
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

impl ProductInput {
    fn explicit_sku(&self) -> Option<&str> {
        self.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Writes every mutable product field, applying create-time defaults for
    /// omitted optionals.
    fn apply(&self, model: &mut product::ActiveModel) {
        model.name = Set(self.name.trim().to_owned());
        model.description = Set(self.description.clone());
        model.has_variants = Set(self.has_variants);
        model.barcode = Set(self.barcode.clone());
        model.brand_id = Set(self.brand_id);
        model.category_id = Set(self.category_id);
        model.unit_id = Set(self.unit_id);
        model.manage_stock = Set(self.manage_stock.unwrap_or(true));
        model.alert_qty = Set(self.alert_qty.unwrap_or(Decimal::ZERO));
        model.image = Set(self.image.clone());
        model.not_sale = Set(self.not_sale.unwrap_or(false));
        model.serial_des = Set(self.serial_des.unwrap_or(false));
        model.tax = Set(self.tax.unwrap_or(Decimal::ZERO));
        model.include_tax = Set(self.include_tax.unwrap_or(0));
        model.is_active = Set(self.is_active.unwrap_or(true));
    }
}

/// A variant with its attribute values.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VariantDetail {
    #[serde(flatten)]
    pub variant: product_variant::Model,
    pub values: Vec<ValueWithAttribute>,
}

/// A product with its live variants, as returned by edit/create/update.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub variants: Vec<VariantDetail>,
}

/// Service for managing products and their variants
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    limits: PageLimits,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, limits: PageLimits) -> Self {
        Self { db, limits }
    }

    /// Live products, searched over name and description.
    #[instrument(skip(self))]
    pub async fn list(&self, params: &ListParams) -> Result<TablePage<product::Model>, ServiceError> {
        let search = params.search_term().and_then(|term| {
            SearchBuilder::new()
                .add_like(product::Column::Name, term)
                .add_like(product::Column::Description, term)
                .build()
        });

        let page = db::fetch_page(
            &*self.db,
            product::Entity::find_active(),
            search,
            params,
            SORTABLE_COLUMNS,
            "created_at",
            self.limits,
        )
        .await?;
        Ok(page)
    }

    /// Creates a product and all of its variants in one transaction.
    #[instrument(skip(self, input), fields(name = %input.name, variants = input.variants.len()))]
    pub async fn create(
        &self,
        input: ProductInput,
        actor: Option<String>,
    ) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db;
        self.check_references(db, &input).await?;
        if let Some(sku) = input.explicit_sku() {
            if sku::product_sku_exists(db, sku, None).await? {
                return Err(ServiceError::InvalidFields(vec![
                    "sku: The SKU has already been taken.".to_string(),
                ]));
            }
        }
        variants::check_inputs(db, &input.variants).await?;

        let txn = transaction::begin(db).await?;
        let outcome: Result<product::Model, ServiceError> = async {
            let base_sku = match input.explicit_sku() {
                Some(sku) => sku.to_owned(),
                None => sku::allocate_base_sku(&txn).await?,
            };

            let mut model = product::ActiveModel {
                id: Set(Uuid::new_v4()),
                sku: Set(base_sku),
                created_by: Set(actor.clone()),
                updated_by: Set(None),
                deleted_by: Set(None),
                deleted_at: Set(None),
                ..Default::default()
            };
            input.apply(&mut model);
            let product = model.insert(&txn).await?;

            variants::create_all(&txn, &product, &input.variants).await?;
            Ok(product)
        }
        .await;
        let product = transaction::finish(txn, outcome).await?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        self.edit(product.id).await
    }

    /// The product with its live variants, their values and each value's attribute.
    #[instrument(skip(self))]
    pub async fn edit(&self, id: Uuid) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db;
        let product = self.find_live(db, id).await?;
        let variants = load_variant_details(db, product.id).await?;
        Ok(ProductDetail { product, variants })
    }

    /// Replaces the product's fields and reconciles its variants in one
    /// transaction. The base SKU never changes.
    #[instrument(skip(self, input), fields(variants = input.variants.len()))]
    pub async fn update(
        &self,
        id: Uuid,
        input: ProductInput,
        actor: Option<String>,
    ) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db;
        let existing = self.find_live(db, id).await?;
        self.check_references(db, &input).await?;
        variants::check_inputs(db, &input.variants).await?;

        let txn = transaction::begin(db).await?;
        let outcome: Result<variants::ReconcileOutcome, ServiceError> = async {
            let mut model: product::ActiveModel = existing.into();
            input.apply(&mut model);
            model.updated_by = Set(actor.clone());
            let product = model.update(&txn).await?;

            variants::reconcile(&txn, &product, &input.variants).await
        }
        .await;
        let reconciled = transaction::finish(txn, outcome).await?;

        info!(
            product_id = %id,
            created = reconciled.created.len(),
            updated = reconciled.updated.len(),
            retired = reconciled.retired.len(),
            "Product updated"
        );
        self.edit(id).await
    }

    /// Retires every variant, then the product itself.
    #[instrument(skip(self))]
    pub async fn destroy(&self, id: Uuid, actor: Option<String>) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = self.find_live(db, id).await?;

        let txn = transaction::begin(db).await?;
        let outcome: Result<usize, ServiceError> = async {
            let retired = variants::retire_all(&txn, id).await?;

            let mut model: product::ActiveModel = existing.into();
            model.deleted_at = Set(Some(Utc::now()));
            model.deleted_by = Set(actor.clone());
            model.update(&txn).await?;
            Ok(retired.len())
        }
        .await;
        let retired = transaction::finish(txn, outcome).await?;

        info!(product_id = %id, retired_variants = retired, "Product deleted");
        Ok(())
    }

    pub async fn variant_values(&self) -> Result<Vec<ValueWithAttribute>, ServiceError> {
        catalog::values_with_attributes(&*self.db).await
    }

    pub async fn attributes(&self) -> Result<Vec<AttributeWithValues>, ServiceError> {
        catalog::attributes_with_values(&*self.db).await
    }

    pub async fn brands(&self) -> Result<Vec<brand::Model>, ServiceError> {
        brands::all(&*self.db).await
    }

    pub async fn categories(&self) -> Result<Vec<CategoryWithChildren>, ServiceError> {
        categories::with_children(&*self.db).await
    }

    pub async fn units(&self) -> Result<Vec<unit::Model>, ServiceError> {
        catalog::all_units(&*self.db).await
    }

    async fn find_live<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        product::Entity::find_active()
            .filter(product::Column::Id.eq(id))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {id} not found")))
    }

    /// Brand, category and unit ids must point at existing rows.
    async fn check_references<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: &ProductInput,
    ) -> Result<(), ServiceError> {
        let mut problems = Vec::new();
        if let Some(id) = input.brand_id {
            if brand::Entity::find_by_id(id).count(conn).await? == 0 {
                problems.push(format!("brand_id: unknown brand {id}"));
            }
        }
        if let Some(id) = input.category_id {
            if category::Entity::find_by_id(id).count(conn).await? == 0 {
                problems.push(format!("category_id: unknown category {id}"));
            }
        }
        if let Some(id) = input.unit_id {
            if unit::Entity::find_by_id(id).count(conn).await? == 0 {
                problems.push(format!("unit_id: unknown unit {id}"));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            warn!(?problems, "Product references rejected");
            Err(ServiceError::InvalidFields(problems))
        }
    }
}

/// Live variants of a product, each with its values and their attributes.
pub async fn load_variant_details<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<VariantDetail>, ServiceError> {
    let variants = variants::live_variants(conn, product_id).await?;
    if variants.is_empty() {
        return Ok(Vec::new());
    }

    let links = product_variant_value::Entity::find()
        .filter(
            product_variant_value::Column::ProductVariantId
                .is_in(variants.iter().map(|v| v.id)),
        )
        .all(conn)
        .await?;

    let value_ids: HashSet<Uuid> = links.iter().map(|l| l.variant_value_id).collect();
    let values: HashMap<Uuid, ValueWithAttribute> = if value_ids.is_empty() {
        HashMap::new()
    } else {
        variant_value::Entity::find()
            .filter(variant_value::Column::Id.is_in(value_ids))
            .find_also_related(variant_attribute::Entity)
            .all(conn)
            .await?
            .into_iter()
            .map(|(value, attribute)| (value.id, ValueWithAttribute { value, attribute }))
            .collect()
    };

    let mut by_variant: HashMap<Uuid, Vec<ValueWithAttribute>> = HashMap::new();
    for link in links {
        if let Some(value) = values.get(&link.variant_value_id) {
            by_variant
                .entry(link.product_variant_id)
                .or_default()
                .push(value.clone());
        }
    }

    Ok(variants
        .into_iter()
        .map(|variant| {
            let mut values = by_variant.remove(&variant.id).unwrap_or_default();
            values.sort_by(|a, b| {
                let ord_a = a.attribute.as_ref().map(|x| x.ordinal).unwrap_or_default();
                let ord_b = b.attribute.as_ref().map(|x| x.ordinal).unwrap_or_default();
                ord_a.cmp(&ord_b).then_with(|| a.value.value.cmp(&b.value.value))
            });
            VariantDetail { variant, values }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn apply_fills_create_defaults() {
        let input = ProductInput {
            name: "  Tee ".into(),
            ..Default::default()
        };
        let mut model = <product::ActiveModel as Default>::default();
        input.apply(&mut model);

        assert_eq!(model.name, Set("Tee".to_string()));
        assert_eq!(model.manage_stock, Set(true));
        assert_eq!(model.alert_qty, Set(Decimal::ZERO));
        assert_eq!(model.tax, Set(Decimal::ZERO));
        assert_eq!(model.include_tax, Set(0));
        assert_eq!(model.is_active, Set(true));
        assert_eq!(model.not_sale, Set(false));
    }

    #[test]
    fn apply_keeps_submitted_values() {
        let input = ProductInput {
            name: "Mug".into(),
            manage_stock: Some(false),
            tax: Some(dec!(7.5)),
            include_tax: Some(1),
            ..Default::default()
        };
        let mut model = <product::ActiveModel as Default>::default();
        input.apply(&mut model);

        assert_eq!(model.manage_stock, Set(false));
        assert_eq!(model.tax, Set(dec!(7.5)));
        assert_eq!(model.include_tax, Set(1));
    }

    #[test]
    fn nested_variant_errors_are_reported() {
        let input = ProductInput {
            name: String::new(),
            variants: vec![VariantInput {
                image: Some("x".repeat(300)),
                ..Default::default()
            }],
            ..Default::default()
        };
        let errors = crate::errors::flatten_validation_errors(&input.validate().unwrap_err());
        assert!(errors.iter().any(|e| e.starts_with("name:")));
        assert!(errors.iter().any(|e| e.starts_with("variants[0].image:")));
    }
}
