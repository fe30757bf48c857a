use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::IntoParams;

/// Query-string parameters accepted by every table listing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Free-text filter, matched case-insensitively
    pub search: Option<String>,
    /// Column to sort by; unknown columns fall back to the listing's default
    pub sort: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    /// Page size
    pub limit: Option<u64>,
    /// 1-based page number
    pub page: Option<u64>,
    /// Opaque counter echoed back to the table widget
    pub draw: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Page-size bounds taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_size: u64,
    pub max_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: 10,
            max_size: 100,
        }
    }
}

impl ListParams {
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whitelisted sort column, or `default` when absent or not allowed.
    pub fn sort_column<'a>(&'a self, allowed: &[&str], default: &'a str) -> &'a str {
        match self.sort.as_deref() {
            Some(col) if allowed.contains(&col) => col,
            _ => default,
        }
    }

    pub fn direction(&self) -> SortDirection {
        self.order
            .as_deref()
            .and_then(|o| SortDirection::from_str(o.trim()).ok())
            .unwrap_or(SortDirection::Desc)
    }

    pub fn page_size(&self, limits: PageLimits) -> u64 {
        match self.limit {
            Some(0) | None => limits.default_size,
            Some(n) => n.min(limits.max_size),
        }
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Saturates at `MAX_OFFSET` for absurdly large pages, which then come back
    /// empty.
    pub fn offset(&self, limits: PageLimits) -> u64 {
        (self.page() - 1)
            .saturating_mul(self.page_size(limits))
            .min(MAX_OFFSET)
    }
}

/// Largest offset handed to the database; drivers bind it as a signed 64-bit value.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// The table envelope returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePage<T> {
    pub data: Vec<T>,
    #[serde(rename = "recordsTotal")]
    pub records_total: u64,
    #[serde(rename = "recordsFiltered")]
    pub records_filtered: u64,
    pub draw: i64,
}

impl<T> TablePage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> TablePage<U> {
        TablePage {
            data: self.data.into_iter().map(f).collect(),
            records_total: self.records_total,
            records_filtered: self.records_filtered,
            draw: self.draw,
        }
    }
}

/// Runs a table listing over `base`: counts, filters by `search`, sorts by a
/// whitelisted column and pages.
pub async fn fetch_page<E, C>(
    conn: &C,
    base: Select<E>,
    search: Option<Condition>,
    params: &ListParams,
    sortable: &[&str],
    default_sort: &str,
    limits: PageLimits,
) -> Result<TablePage<E::Model>, DbErr>
where
    E: EntityTrait,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let records_total = base.clone().count(conn).await?;

    let filtered = match search {
        Some(cond) => base.filter(cond),
        None => base,
    };
    let records_filtered = filtered.clone().count(conn).await?;

    let column = E::Column::from_str(params.sort_column(sortable, default_sort))
        .or_else(|_| E::Column::from_str(default_sort))
        .ok();
    let ordered = match (column, params.direction()) {
        (Some(col), SortDirection::Asc) => filtered.order_by_asc(col),
        (Some(col), SortDirection::Desc) => filtered.order_by_desc(col),
        (None, _) => filtered,
    };

    let size = params.page_size(limits);
    let data = ordered
        .limit(size)
        .offset(params.offset(limits))
        .all(conn)
        .await?;

    Ok(TablePage {
        data,
        records_total,
        records_filtered,
        draw: params.draw.unwrap_or(0),
    })
}

/// Helper for building complex search conditions
#[derive(Default)]
pub struct SearchBuilder {
    conditions: Vec<Condition>,
}

impl SearchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring match
    pub fn add_like<C: ColumnTrait>(mut self, column: C, pattern: &str) -> Self {
        if !pattern.is_empty() {
            let needle = format!("%{}%", pattern.to_lowercase());
            let lowered = Func::lower(Expr::col((column.entity_name(), column)));
            self.conditions
                .push(Condition::all().add(Expr::expr(lowered).like(needle)));
        }
        self
    }

    /// Add an exact match condition
    pub fn add_eq<C: ColumnTrait, V>(mut self, column: C, value: V) -> Self
    where
        V: Into<sea_orm::Value>,
    {
        self.conditions.push(Condition::all().add(column.eq(value)));
        self
    }

    /// Matches when any of the added conditions holds
    pub fn build(self) -> Option<Condition> {
        if self.conditions.is_empty() {
            None
        } else {
            Some(
                self.conditions
                    .into_iter()
                    .fold(Condition::any(), |acc, cond| acc.add(cond)),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(sort: Option<&str>, order: Option<&str>, limit: Option<u64>) -> ListParams {
        ListParams {
            sort: sort.map(Into::into),
            order: order.map(Into::into),
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn unknown_sort_column_falls_back() {
        let allowed = ["name", "created_at"];
        assert_eq!(params(Some("name"), None, None).sort_column(&allowed, "created_at"), "name");
        assert_eq!(
            params(Some("password"), None, None).sort_column(&allowed, "created_at"),
            "created_at"
        );
        assert_eq!(params(None, None, None).sort_column(&allowed, "created_at"), "created_at");
    }

    #[test]
    fn direction_defaults_to_desc() {
        assert_eq!(params(None, Some("ASC"), None).direction(), SortDirection::Asc);
        assert_eq!(params(None, Some("sideways"), None).direction(), SortDirection::Desc);
        assert_eq!(params(None, None, None).direction(), SortDirection::Desc);
    }

    #[test]
    fn page_size_is_defaulted_and_capped() {
        let limits = PageLimits {
            default_size: 10,
            max_size: 50,
        };
        assert_eq!(params(None, None, None).page_size(limits), 10);
        assert_eq!(params(None, None, Some(0)).page_size(limits), 10);
        assert_eq!(params(None, None, Some(25)).page_size(limits), 25);
        assert_eq!(params(None, None, Some(500)).page_size(limits), 50);
    }

    #[test]
    fn offset_uses_one_based_pages() {
        let limits = PageLimits::default();
        let mut p = params(None, None, Some(20));
        assert_eq!(p.offset(limits), 0);
        p.page = Some(3);
        assert_eq!(p.offset(limits), 40);
        p.page = Some(0);
        assert_eq!(p.offset(limits), 0);
        p.page = Some(u64::MAX);
        assert_eq!(p.offset(limits), MAX_OFFSET);
    }

    #[test]
    fn blank_search_is_ignored() {
        let p = ListParams {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(p.search_term(), None);
        assert!(SearchBuilder::new().build().is_none());
    }

    #[test]
    fn envelope_uses_table_field_names() {
        let page = TablePage {
            data: vec![1, 2],
            records_total: 5,
            records_filtered: 2,
            draw: 7,
        };
        let json = serde_json::to_value(page.map(|n| n * 10)).unwrap();
        assert_eq!(json["data"], serde_json::json!([10, 20]));
        assert_eq!(json["recordsTotal"], 5);
        assert_eq!(json["recordsFiltered"], 2);
        assert_eq!(json["draw"], 7);
    }
}
