use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};

/// Entities whose rows are retired by stamping `deleted_at` instead of being
/// removed.
///
/// Ordinary reads go through [`SoftDelete::find_active`]. Uniqueness probes
/// (SKU allocation in particular) use [`SoftDelete::find_with_trashed`] so a
/// retired row keeps its identifiers reserved.
pub trait SoftDelete: EntityTrait {
    fn deleted_at_column() -> Self::Column;

    fn find_active() -> Select<Self> {
        Self::find().filter(Self::deleted_at_column().is_null())
    }

    fn find_with_trashed() -> Select<Self> {
        Self::find()
    }

    fn find_trashed() -> Select<Self> {
        Self::find().filter(Self::deleted_at_column().is_not_null())
    }
}
