use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, ListParams, PageLimits, SearchBuilder, TablePage},
    entities::{category, product},
    errors::ServiceError,
};

pub const SORTABLE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "created_at",
    "updated_at",
    "is_active",
    "sub_taxonomy",
    "parent_id",
];

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub sub_taxonomy: Option<bool>,
    /// `""` and `"null"` are accepted as "no parent"
    #[serde(default, deserialize_with = "optional_parent")]
    pub parent_id: Option<Uuid>,
}

fn optional_parent<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("null") => Ok(None),
        Some(s) => Uuid::parse_str(s).map(Some).map_err(de::Error::custom),
    }
}

/// A category as shown in the table, with its parent's name.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryRow {
    #[serde(flatten)]
    pub category: category::Model,
    pub parent_name: Option<String>,
}

/// A category with its parent.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryWithParent {
    #[serde(flatten)]
    pub category: category::Model,
    pub parent: Option<category::Model>,
}

/// A category with its direct children.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryWithChildren {
    #[serde(flatten)]
    pub category: category::Model,
    pub children: Vec<category::Model>,
}

/// Every category with its direct children, for pickers.
pub async fn with_children<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<CategoryWithChildren>, ServiceError> {
    let all = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(conn)
        .await?;

    let mut children: HashMap<Uuid, Vec<category::Model>> = HashMap::new();
    for c in &all {
        if let Some(parent) = c.parent_id {
            children.entry(parent).or_default().push(c.clone());
        }
    }

    Ok(all
        .into_iter()
        .map(|category| CategoryWithChildren {
            children: children.remove(&category.id).unwrap_or_default(),
            category,
        })
        .collect())
}

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    limits: PageLimits,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, limits: PageLimits) -> Self {
        Self { db, limits }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, params: &ListParams) -> Result<TablePage<CategoryRow>, ServiceError> {
        let conn = &*self.db;
        let search = params.search_term().and_then(|term| {
            SearchBuilder::new()
                .add_like(category::Column::Name, term)
                .add_like(category::Column::Description, term)
                .build()
        });
        let page = db::fetch_page(
            conn,
            category::Entity::find(),
            search,
            params,
            SORTABLE_COLUMNS,
            "created_at",
            self.limits,
        )
        .await?;

        let parent_ids: HashSet<Uuid> = page.data.iter().filter_map(|c| c.parent_id).collect();
        let parent_names: HashMap<Uuid, String> = if parent_ids.is_empty() {
            HashMap::new()
        } else {
            category::Entity::find()
                .filter(category::Column::Id.is_in(parent_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect()
        };

        Ok(page.map(|category| CategoryRow {
            parent_name: category
                .parent_id
                .and_then(|id| parent_names.get(&id).cloned()),
            category,
        }))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<CategoryWithParent, ServiceError> {
        let category = self.find(id).await?;
        let parent = match category.parent_id {
            Some(parent_id) => category::Entity::find_by_id(parent_id).one(&*self.db).await?,
            None => None,
        };
        Ok(CategoryWithParent { category, parent })
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: CategoryInput) -> Result<CategoryWithParent, ServiceError> {
        let code = input.code.trim().to_owned();
        self.ensure_code_free(&code, None).await?;
        self.check_parent(input.parent_id, None).await?;

        let created = category::ActiveModel {
            name: Set(input.name.trim().to_owned()),
            code: Set(code),
            description: Set(input.description.clone()),
            is_active: Set(input.is_active.unwrap_or(true)),
            sub_taxonomy: Set(input.sub_taxonomy.unwrap_or(false)),
            parent_id: Set(input.parent_id),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = %created.id, name = %created.name, "Category created");
        self.get(created.id).await
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<CategoryWithParent, ServiceError> {
        let existing = self.find(id).await?;
        let code = input.code.trim().to_owned();
        self.ensure_code_free(&code, Some(id)).await?;
        self.check_parent(input.parent_id, Some(id)).await?;

        let mut model: category::ActiveModel = existing.into();
        model.name = Set(input.name.trim().to_owned());
        model.code = Set(code);
        model.description = Set(input.description.clone());
        model.is_active = Set(input.is_active.unwrap_or(true));
        model.sub_taxonomy = Set(input.sub_taxonomy.unwrap_or(false));
        model.parent_id = Set(input.parent_id);
        model.update(&*self.db).await?;

        info!(category_id = %id, "Category updated");
        self.get(id).await
    }

    /// Deletes a category no product refers to. Child categories are detached.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = self.find(id).await?;

        let in_use = product::Entity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(db)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category is used by {in_use} product(s)"
            )));
        }

        existing.delete(db).await?;
        info!(category_id = %id, "Category deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {id} not found")))
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = category::Entity::find().filter(category::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category code '{code}' has already been taken"
            )));
        }
        Ok(())
    }

    async fn check_parent(&self, parent: Option<Uuid>, this: Option<Uuid>) -> Result<(), ServiceError> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if Some(parent) == this {
            return Err(ServiceError::InvalidFields(vec![
                "parent_id: a category cannot be its own parent".to_string(),
            ]));
        }
        if category::Entity::find_by_id(parent).count(&*self.db).await? == 0 {
            return Err(ServiceError::InvalidFields(vec![format!(
                "parent_id: unknown category {parent}"
            )]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_null_parent_mean_no_parent() {
        for raw in [
            serde_json::json!({"name": "a", "code": "A", "parent_id": ""}),
            serde_json::json!({"name": "a", "code": "A", "parent_id": "null"}),
            serde_json::json!({"name": "a", "code": "A", "parent_id": null}),
            serde_json::json!({"name": "a", "code": "A"}),
        ] {
            let input: CategoryInput = serde_json::from_value(raw).unwrap();
            assert_eq!(input.parent_id, None);
        }
    }

    #[test]
    fn parent_must_be_a_uuid() {
        let parent = Uuid::new_v4();
        let input: CategoryInput = serde_json::from_value(
            serde_json::json!({"name": "a", "code": "A", "parent_id": parent.to_string()}),
        )
        .unwrap();
        assert_eq!(input.parent_id, Some(parent));

        let bad = serde_json::from_value::<CategoryInput>(
            serde_json::json!({"name": "a", "code": "A", "parent_id": "seven"}),
        );
        assert!(bad.is_err());
    }
}
