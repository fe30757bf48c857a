use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, ListParams, PageLimits, SearchBuilder, TablePage},
    entities::{brand, product},
    errors::ServiceError,
};

pub const SORTABLE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "created_at",
    "updated_at",
    "is_active",
    "code",
];

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct BrandInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 50))]
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl BrandInput {
    fn code(&self) -> Option<String> {
        self.code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
    }
}

/// Every brand, for pickers.
pub async fn all<C: ConnectionTrait>(conn: &C) -> Result<Vec<brand::Model>, ServiceError> {
    Ok(brand::Entity::find()
        .order_by_asc(brand::Column::Name)
        .all(conn)
        .await?)
}

#[derive(Clone)]
pub struct BrandService {
    db: Arc<DatabaseConnection>,
    limits: PageLimits,
}

impl BrandService {
    pub fn new(db: Arc<DatabaseConnection>, limits: PageLimits) -> Self {
        Self { db, limits }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, params: &ListParams) -> Result<TablePage<brand::Model>, ServiceError> {
        let search = params.search_term().and_then(|term| {
            SearchBuilder::new()
                .add_like(brand::Column::Name, term)
                .add_like(brand::Column::Description, term)
                .build()
        });
        Ok(db::fetch_page(
            &*self.db,
            brand::Entity::find(),
            search,
            params,
            SORTABLE_COLUMNS,
            "created_at",
            self.limits,
        )
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<brand::Model, ServiceError> {
        brand::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Brand {id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: BrandInput) -> Result<brand::Model, ServiceError> {
        let code = input.code();
        self.ensure_code_free(code.as_deref(), None).await?;

        let brand = brand::ActiveModel {
            name: Set(input.name.trim().to_owned()),
            code: Set(code),
            description: Set(input.description.clone()),
            is_active: Set(input.is_active.unwrap_or(true)),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(brand_id = %brand.id, name = %brand.name, "Brand created");
        Ok(brand)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: Uuid, input: BrandInput) -> Result<brand::Model, ServiceError> {
        let existing = self.get(id).await?;
        let code = input.code();
        self.ensure_code_free(code.as_deref(), Some(id)).await?;

        let mut model: brand::ActiveModel = existing.into();
        model.name = Set(input.name.trim().to_owned());
        model.code = Set(code);
        model.description = Set(input.description.clone());
        model.is_active = Set(input.is_active.unwrap_or(true));
        let brand = model.update(&*self.db).await?;

        info!(brand_id = %brand.id, "Brand updated");
        Ok(brand)
    }

    /// Deletes a brand no product refers to.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = self.get(id).await?;

        let in_use = product::Entity::find()
            .filter(product::Column::BrandId.eq(id))
            .count(db)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Brand is used by {in_use} product(s)"
            )));
        }

        existing.delete(db).await?;
        info!(brand_id = %id, "Brand deleted");
        Ok(())
    }

    async fn ensure_code_free(&self, code: Option<&str>, except: Option<Uuid>) -> Result<(), ServiceError> {
        let Some(code) = code else {
            return Ok(());
        };
        let mut query = brand::Entity::find().filter(brand::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(brand::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Brand code '{code}' has already been taken"
            )));
        }
        Ok(())
    }
}
