use std::{collections::HashMap, sync::Arc};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{unit, variant_attribute, variant_value},
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UnitInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub short_name: String,
    #[serde(default)]
    pub allow_decimal: bool,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AttributeInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub ordinal: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ValueInput {
    pub variant_attribute_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub value: String,
}

/// A variant value together with the attribute it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ValueWithAttribute {
    #[serde(flatten)]
    pub value: variant_value::Model,
    pub attribute: Option<variant_attribute::Model>,
}

/// An attribute with its values.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttributeWithValues {
    #[serde(flatten)]
    pub attribute: variant_attribute::Model,
    pub values: Vec<variant_value::Model>,
}

pub async fn all_units<C: ConnectionTrait>(conn: &C) -> Result<Vec<unit::Model>, ServiceError> {
    Ok(unit::Entity::find()
        .order_by_asc(unit::Column::Name)
        .all(conn)
        .await?)
}

/// Every variant value with its attribute.
pub async fn values_with_attributes<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<ValueWithAttribute>, ServiceError> {
    Ok(variant_value::Entity::find()
        .find_also_related(variant_attribute::Entity)
        .order_by_asc(variant_value::Column::Value)
        .all(conn)
        .await?
        .into_iter()
        .map(|(value, attribute)| ValueWithAttribute { value, attribute })
        .collect())
}

/// Attributes in display order, each with its values.
pub async fn attributes_with_values<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<AttributeWithValues>, ServiceError> {
    let attributes = variant_attribute::Entity::find()
        .order_by_asc(variant_attribute::Column::Ordinal)
        .order_by_asc(variant_attribute::Column::Name)
        .all(conn)
        .await?;

    let mut values: HashMap<Uuid, Vec<variant_value::Model>> = HashMap::new();
    for value in variant_value::Entity::find()
        .order_by_asc(variant_value::Column::Value)
        .all(conn)
        .await?
    {
        values
            .entry(value.variant_attribute_id)
            .or_default()
            .push(value);
    }

    Ok(attributes
        .into_iter()
        .map(|attribute| AttributeWithValues {
            values: values.remove(&attribute.id).unwrap_or_default(),
            attribute,
        })
        .collect())
}

/// Units of measure and variant attributes
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_units(&self) -> Result<Vec<unit::Model>, ServiceError> {
        all_units(&*self.db).await
    }

    #[instrument(skip(self))]
    pub async fn create_unit(&self, input: UnitInput) -> Result<unit::Model, ServiceError> {
        let unit = unit::ActiveModel {
            name: Set(input.name.trim().to_owned()),
            short_name: Set(input.short_name.trim().to_owned()),
            allow_decimal: Set(input.allow_decimal),
            is_active: Set(input.is_active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(unit_id = %unit.id, name = %unit.name, "Unit created");
        Ok(unit)
    }

    pub async fn list_attributes(&self) -> Result<Vec<AttributeWithValues>, ServiceError> {
        attributes_with_values(&*self.db).await
    }

    #[instrument(skip(self))]
    pub async fn create_attribute(
        &self,
        input: AttributeInput,
    ) -> Result<variant_attribute::Model, ServiceError> {
        let attribute = variant_attribute::ActiveModel {
            name: Set(input.name.trim().to_owned()),
            ordinal: Set(input.ordinal),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(attribute_id = %attribute.id, name = %attribute.name, "Variant attribute created");
        Ok(attribute)
    }

    #[instrument(skip(self))]
    pub async fn create_value(
        &self,
        input: ValueInput,
    ) -> Result<variant_value::Model, ServiceError> {
        let db = &*self.db;
        let attribute_exists = variant_attribute::Entity::find()
            .filter(variant_attribute::Column::Id.eq(input.variant_attribute_id))
            .count(db)
            .await?
            > 0;
        if !attribute_exists {
            return Err(ServiceError::InvalidFields(vec![format!(
                "variant_attribute_id: unknown attribute {}",
                input.variant_attribute_id
            )]));
        }

        let value = variant_value::ActiveModel {
            variant_attribute_id: Set(input.variant_attribute_id),
            value: Set(input.value.trim().to_owned()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(value_id = %value.id, value = %value.value, "Variant value created");
        Ok(value)
    }
}
