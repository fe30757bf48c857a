//! Many-to-many link tables (variant ↔ attribute value, role ↔ permission).

use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QuerySelect,
};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A join table keyed by `(owner, target)`.
pub trait Pivot: EntityTrait {
    fn owner_column() -> Self::Column;
    fn target_column() -> Self::Column;
    fn link(owner: Uuid, target: Uuid) -> Self::ActiveModel;
}

/// Links that a sync added and removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkChanges {
    pub attached: Vec<Uuid>,
    pub detached: Vec<Uuid>,
}

impl LinkChanges {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

/// Computes which links to add and drop so that `current` becomes `requested`.
pub fn diff_links(current: &BTreeSet<Uuid>, requested: &BTreeSet<Uuid>) -> LinkChanges {
    LinkChanges {
        attached: requested.difference(current).copied().collect(),
        detached: current.difference(requested).copied().collect(),
    }
}

/// Targets currently linked to `owner`.
pub async fn linked_targets<P, C>(conn: &C, owner: Uuid) -> Result<BTreeSet<Uuid>, DbErr>
where
    P: Pivot,
    C: ConnectionTrait,
{
    let rows: Vec<Uuid> = P::find()
        .select_only()
        .column(P::target_column())
        .filter(P::owner_column().eq(owner))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Adds links from `owner` to each of `targets`.
pub async fn attach<P, C>(conn: &C, owner: Uuid, targets: &[Uuid]) -> Result<(), DbErr>
where
    P: Pivot,
    C: ConnectionTrait,
    P::Model: IntoActiveModel<P::ActiveModel>,
{
    if targets.is_empty() {
        return Ok(());
    }
    let links: Vec<P::ActiveModel> = targets.iter().map(|t| P::link(owner, *t)).collect();
    P::insert_many(links).exec_without_returning(conn).await?;
    Ok(())
}

/// Removes the given links from `owner`.
pub async fn detach<P, C>(conn: &C, owner: Uuid, targets: &[Uuid]) -> Result<u64, DbErr>
where
    P: Pivot,
    C: ConnectionTrait,
{
    if targets.is_empty() {
        return Ok(0);
    }
    let res = P::delete_many()
        .filter(P::owner_column().eq(owner))
        .filter(P::target_column().is_in(targets.iter().copied()))
        .exec(conn)
        .await?;
    Ok(res.rows_affected)
}

/// Removes every link held by `owner`.
pub async fn detach_all<P, C>(conn: &C, owner: Uuid) -> Result<u64, DbErr>
where
    P: Pivot,
    C: ConnectionTrait,
{
    let res = P::delete_many()
        .filter(P::owner_column().eq(owner))
        .exec(conn)
        .await?;
    Ok(res.rows_affected)
}

/// Makes `owner`'s links equal to `requested`, touching only the difference.
pub async fn sync<P, C>(conn: &C, owner: Uuid, requested: &[Uuid]) -> Result<LinkChanges, DbErr>
where
    P: Pivot,
    C: ConnectionTrait,
    P::Model: IntoActiveModel<P::ActiveModel>,
{
    let current = linked_targets::<P, C>(conn, owner).await?;
    let requested: BTreeSet<Uuid> = requested.iter().copied().collect();
    let changes = diff_links(&current, &requested);

    detach::<P, C>(conn, owner, &changes.detached).await?;
    attach::<P, C>(conn, owner, &changes.attached).await?;
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        let mut v: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        v.sort();
        v
    }

    #[test]
    fn diff_only_touches_the_difference() {
        let v = ids(4);
        let current: BTreeSet<Uuid> = [v[0], v[1], v[2]].into_iter().collect();
        let requested: BTreeSet<Uuid> = [v[1], v[2], v[3]].into_iter().collect();

        let changes = diff_links(&current, &requested);
        assert_eq!(changes.attached, vec![v[3]]);
        assert_eq!(changes.detached, vec![v[0]]);
    }

    #[test]
    fn identical_sets_produce_no_changes() {
        let v = ids(2);
        let set: BTreeSet<Uuid> = v.into_iter().collect();
        assert!(diff_links(&set, &set).is_empty());
    }
}
