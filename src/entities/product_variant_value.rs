use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Pivot;

/// Join row between a variant and one of its attribute values
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variant_values")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_variant_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub variant_value_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_variant::Entity",
        from = "Column::ProductVariantId",
        to = "super::product_variant::Column::Id",
        on_delete = "Cascade"
    )]
    ProductVariant,
    #[sea_orm(
        belongs_to = "super::variant_value::Entity",
        from = "Column::VariantValueId",
        to = "super::variant_value::Column::Id",
        on_delete = "Cascade"
    )]
    VariantValue,
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariant.def()
    }
}

impl Related<super::variant_value::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VariantValue.def()
    }
}

impl Pivot for Entity {
    fn owner_column() -> Column {
        Column::ProductVariantId
    }

    fn target_column() -> Column {
        Column::VariantValueId
    }

    fn link(owner: Uuid, target: Uuid) -> ActiveModel {
        ActiveModel {
            product_variant_id: Set(owner),
            variant_value_id: Set(target),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
