use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{rbac, DEFAULT_PERMISSIONS},
    db::{associations, transaction},
    entities::{permission, role, role_permission, user_role},
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PermissionInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RoleInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Permission ids the role should hold. Left untouched on update when omitted.
    pub permissions: Option<Vec<Uuid>>,
}

/// A role with the names of the permissions it grants.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: role::Model,
    pub permissions: Vec<String>,
}

/// What a seeding run added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub links_created: usize,
}

/// Role names held by `user_id`, sorted.
pub async fn roles_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<Vec<String>, ServiceError> {
    let mut names: Vec<String> = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .find_also_related(role::Entity)
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|(_, role)| role.map(|r| r.name))
        .collect();
    names.sort();
    Ok(names)
}

/// Every permission name granted to `user_id` through their roles, sorted and unique.
pub async fn effective_permissions<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<Vec<String>, ServiceError> {
    let role_ids: Vec<Uuid> = user_role::Entity::find()
        .select_only()
        .column(user_role::Column::RoleId)
        .filter(user_role::Column::UserId.eq(user_id))
        .into_tuple()
        .all(conn)
        .await?;
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let permission_ids: Vec<Uuid> = role_permission::Entity::find()
        .select_only()
        .column(role_permission::Column::PermissionId)
        .filter(role_permission::Column::RoleId.is_in(role_ids))
        .into_tuple()
        .all(conn)
        .await?;
    if permission_ids.is_empty() {
        return Ok(Vec::new());
    }

    let names: BTreeSet<String> = permission::Entity::find()
        .filter(permission::Column::Id.is_in(permission_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    Ok(names.into_iter().collect())
}

/// Roles, permissions and who holds what
#[derive(Clone)]
pub struct AccessService {
    db: Arc<DatabaseConnection>,
}

impl AccessService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_permissions(&self) -> Result<Vec<permission::Model>, ServiceError> {
        Ok(permission::Entity::find()
            .order_by_asc(permission::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_permission(
        &self,
        input: PermissionInput,
    ) -> Result<permission::Model, ServiceError> {
        let name = input.name.trim().to_owned();
        self.ensure_permission_free(&name, None).await?;

        let permission = permission::ActiveModel {
            name: Set(name),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(permission_id = %permission.id, name = %permission.name, "Permission created");
        Ok(permission)
    }

    #[instrument(skip(self))]
    pub async fn update_permission(
        &self,
        id: Uuid,
        input: PermissionInput,
    ) -> Result<permission::Model, ServiceError> {
        let existing = self.find_permission(id).await?;
        let name = input.name.trim().to_owned();
        self.ensure_permission_free(&name, Some(id)).await?;

        let mut model: permission::ActiveModel = existing.into();
        model.name = Set(name);
        let permission = model.update(&*self.db).await?;

        info!(permission_id = %id, name = %permission.name, "Permission renamed");
        Ok(permission)
    }

    /// Deletes a permission and removes it from every role.
    #[instrument(skip(self))]
    pub async fn delete_permission(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find_permission(id).await?;

        let txn = transaction::begin(&self.db).await?;
        let outcome: Result<u64, ServiceError> = async {
            let unlinked = role_permission::Entity::delete_many()
                .filter(role_permission::Column::PermissionId.eq(id))
                .exec(&txn)
                .await?
                .rows_affected;
            existing.delete(&txn).await?;
            Ok(unlinked)
        }
        .await;
        let unlinked = transaction::finish(txn, outcome).await?;

        info!(permission_id = %id, roles_unlinked = unlinked, "Permission deleted");
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, ServiceError> {
        let conn = &*self.db;
        let roles = role::Entity::find()
            .order_by_asc(role::Column::Name)
            .all(conn)
            .await?;

        let names: HashMap<Uuid, String> = permission::Entity::find()
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut granted: HashMap<Uuid, Vec<String>> = HashMap::new();
        for link in role_permission::Entity::find().all(conn).await? {
            if let Some(name) = names.get(&link.permission_id) {
                granted.entry(link.role_id).or_default().push(name.clone());
            }
        }

        Ok(roles
            .into_iter()
            .map(|role| {
                let mut permissions = granted.remove(&role.id).unwrap_or_default();
                permissions.sort();
                RoleWithPermissions { role, permissions }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_role(&self, id: Uuid) -> Result<RoleWithPermissions, ServiceError> {
        let role = self.find_role(id).await?;
        let mut permissions: Vec<String> = role
            .find_related(permission::Entity)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        permissions.sort();
        Ok(RoleWithPermissions { role, permissions })
    }

    #[instrument(skip(self))]
    pub async fn create_role(&self, input: RoleInput) -> Result<RoleWithPermissions, ServiceError> {
        let name = input.name.trim().to_owned();
        self.ensure_role_free(&name, None).await?;
        let requested = input.permissions.clone().unwrap_or_default();
        self.check_permission_ids(&requested).await?;

        let txn = transaction::begin(&self.db).await?;
        let outcome: Result<role::Model, ServiceError> = async {
            let role = role::ActiveModel {
                name: Set(name),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            associations::sync::<role_permission::Entity, _>(&txn, role.id, &requested).await?;
            Ok(role)
        }
        .await;
        let role = transaction::finish(txn, outcome).await?;

        info!(role_id = %role.id, name = %role.name, permissions = requested.len(), "Role created");
        self.get_role(role.id).await
    }

    /// Renames a role and, when a permission set is given, makes its grants match it.
    #[instrument(skip(self))]
    pub async fn update_role(
        &self,
        id: Uuid,
        input: RoleInput,
    ) -> Result<RoleWithPermissions, ServiceError> {
        let existing = self.find_role(id).await?;
        let name = input.name.trim().to_owned();
        self.ensure_role_free(&name, Some(id)).await?;
        if let Some(requested) = &input.permissions {
            self.check_permission_ids(requested).await?;
        }

        let txn = transaction::begin(&self.db).await?;
        let outcome: Result<associations::LinkChanges, ServiceError> = async {
            let mut model: role::ActiveModel = existing.into();
            model.name = Set(name);
            model.update(&txn).await?;
            match &input.permissions {
                Some(requested) => Ok(associations::sync::<role_permission::Entity, _>(
                    &txn, id, requested,
                )
                .await?),
                None => Ok(associations::LinkChanges::default()),
            }
        }
        .await;
        let changes = transaction::finish(txn, outcome).await?;

        info!(
            role_id = %id,
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            "Role updated"
        );
        self.get_role(id).await
    }

    /// Deletes a role nobody holds.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find_role(id).await?;

        let holders = user_role::Entity::find()
            .filter(user_role::Column::RoleId.eq(id))
            .count(&*self.db)
            .await?;
        if holders > 0 {
            return Err(ServiceError::Conflict(format!(
                "Role '{}' is still assigned to {holders} user(s)",
                existing.name
            )));
        }

        let txn = transaction::begin(&self.db).await?;
        let outcome: Result<(), ServiceError> = async {
            associations::detach_all::<role_permission::Entity, _>(&txn, id).await?;
            existing.delete(&txn).await?;
            Ok(())
        }
        .await;
        transaction::finish(txn, outcome).await?;

        info!(role_id = %id, "Role deleted");
        Ok(())
    }

    /// Gives `user_id` the named role. Assigning a held role is a no-op.
    #[instrument(skip(self))]
    pub async fn assign_role(&self, user_id: &str, role_name: &str) -> Result<role::Model, ServiceError> {
        let conn = &*self.db;
        let role = role::Entity::find()
            .filter(role::Column::Name.eq(role_name))
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Role '{role_name}' not found")))?;

        let held = user_role::Entity::find_by_id((user_id.to_owned(), role.id))
            .one(conn)
            .await?
            .is_some();
        if !held {
            user_role::ActiveModel {
                user_id: Set(user_id.to_owned()),
                role_id: Set(role.id),
                created_at: Set(chrono::Utc::now()),
            }
            .insert(conn)
            .await?;
            info!(user_id, role = %role.name, "Role assigned");
        }
        Ok(role)
    }

    pub async fn roles_for_user(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        roles_for_user(&*self.db, user_id).await
    }

    pub async fn effective_permissions(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        effective_permissions(&*self.db, user_id).await
    }

    /// Creates the default permissions and roles, adding only what is missing.
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<SeedReport, ServiceError> {
        let txn = transaction::begin(&self.db).await?;
        let outcome: Result<SeedReport, ServiceError> = async {
            let mut report = SeedReport::default();

            let mut ids: HashMap<String, Uuid> = permission::Entity::find()
                .all(&txn)
                .await?
                .into_iter()
                .map(|p| (p.name, p.id))
                .collect();
            for name in DEFAULT_PERMISSIONS.iter() {
                if ids.contains_key(name) {
                    continue;
                }
                let created = permission::ActiveModel {
                    name: Set(name.clone()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                ids.insert(created.name, created.id);
                report.permissions_created += 1;
            }

            let mut templates: Vec<&rbac::Role> = rbac::ROLES.values().collect();
            templates.sort_by(|a, b| a.name.cmp(&b.name));
            for template in templates {
                let role = match role::Entity::find()
                    .filter(role::Column::Name.eq(template.name.as_str()))
                    .one(&txn)
                    .await?
                {
                    Some(role) => role,
                    None => {
                        report.roles_created += 1;
                        role::ActiveModel {
                            name: Set(template.name.clone()),
                            ..Default::default()
                        }
                        .insert(&txn)
                        .await?
                    }
                };

                let current =
                    associations::linked_targets::<role_permission::Entity, _>(&txn, role.id)
                        .await?;
                let missing: Vec<Uuid> =
                    rbac::expand_patterns(&template.permissions, &DEFAULT_PERMISSIONS)
                        .into_iter()
                        .filter_map(|name| ids.get(name).copied())
                        .filter(|id| !current.contains(id))
                        .collect();
                associations::attach::<role_permission::Entity, _>(&txn, role.id, &missing)
                    .await?;
                report.links_created += missing.len();
            }

            Ok(report)
        }
        .await;
        let report = transaction::finish(txn, outcome).await?;

        info!(
            permissions = report.permissions_created,
            roles = report.roles_created,
            links = report.links_created,
            "Access defaults seeded"
        );
        Ok(report)
    }

    async fn find_permission(&self, id: Uuid) -> Result<permission::Model, ServiceError> {
        permission::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Permission {id} not found")))
    }

    async fn find_role(&self, id: Uuid) -> Result<role::Model, ServiceError> {
        role::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Role {id} not found")))
    }

    async fn ensure_permission_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = permission::Entity::find().filter(permission::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(permission::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Permission '{name}' already exists"
            )));
        }
        Ok(())
    }

    async fn ensure_role_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = role::Entity::find().filter(role::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(role::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!("Role '{name}' already exists")));
        }
        Ok(())
    }

    async fn check_permission_ids(&self, ids: &[Uuid]) -> Result<(), ServiceError> {
        let wanted: BTreeSet<Uuid> = ids.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(());
        }
        let found: BTreeSet<Uuid> = permission::Entity::find()
            .select_only()
            .column(permission::Column::Id)
            .filter(permission::Column::Id.is_in(wanted.iter().copied()))
            .into_tuple::<Uuid>()
            .all(&*self.db)
            .await?
            .into_iter()
            .collect();

        let unknown: Vec<String> = wanted
            .difference(&found)
            .map(|id| format!("permissions: unknown permission {id}"))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::InvalidFields(unknown))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::consts;

    async fn service() -> AccessService {
        let db = crate::db::connect_in_memory().await.unwrap();
        AccessService::new(Arc::new(db))
    }

    #[tokio::test]
    async fn seeding_twice_adds_nothing_the_second_time() {
        let access = service().await;
        let first = access.seed_defaults().await.unwrap();
        assert_eq!(first.permissions_created, DEFAULT_PERMISSIONS.len());
        assert_eq!(first.roles_created, 3);

        let second = access.seed_defaults().await.unwrap();
        assert_eq!(second, SeedReport::default());
    }

    #[tokio::test]
    async fn assigned_roles_feed_effective_permissions() {
        let access = service().await;
        access.seed_defaults().await.unwrap();
        access.assign_role("user-1", "sale").await.unwrap();
        access.assign_role("user-1", "sale").await.unwrap();

        assert_eq!(access.roles_for_user("user-1").await.unwrap(), vec!["sale"]);
        let perms = access.effective_permissions("user-1").await.unwrap();
        assert!(perms.contains(&consts::PRODUCTS_READ.to_string()));
        assert!(!perms.contains(&consts::PRODUCTS_UPDATE.to_string()));
        assert!(access.effective_permissions("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn role_in_use_cannot_be_deleted() {
        let access = service().await;
        access.seed_defaults().await.unwrap();
        let stock = access.assign_role("user-2", "stock").await.unwrap();

        let err = access.delete_role(stock.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_syncs_the_permission_set() {
        let access = service().await;
        let read = access
            .create_permission(PermissionInput { name: "reports:read".into() })
            .await
            .unwrap();
        let export = access
            .create_permission(PermissionInput { name: "reports:export".into() })
            .await
            .unwrap();

        let role = access
            .create_role(RoleInput {
                name: "auditor".into(),
                permissions: Some(vec![read.id]),
            })
            .await
            .unwrap();
        assert_eq!(role.permissions, vec!["reports:read"]);

        let updated = access
            .update_role(
                role.role.id,
                RoleInput {
                    name: "auditors".into(),
                    permissions: Some(vec![export.id]),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role.name, "auditors");
        assert_eq!(updated.permissions, vec!["reports:export"]);

        let renamed_only = access
            .update_role(
                role.role.id,
                RoleInput {
                    name: "auditor".into(),
                    permissions: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed_only.permissions, vec!["reports:export"]);
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let access = service().await;
        access
            .create_permission(PermissionInput { name: "x:read".into() })
            .await
            .unwrap();
        let err = access
            .create_permission(PermissionInput { name: "x:read".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_permission_ids_are_field_errors() {
        let access = service().await;
        let err = access
            .create_role(RoleInput {
                name: "ghost".into(),
                permissions: Some(vec![Uuid::new_v4()]),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidFields(_)));
    }
}
