//! Pagination types and query merging

use super::value::Valuable;
use crate::gateway::{Params, RequestError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Zero-based page cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationQuery {
    pub page: u32,
    pub size: u32,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationQuery {
    /// A page size of zero is clamped to one
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.max(1),
        }
    }

    /// Fields set in `patch` replace ours, the rest are kept. Size never
    /// drops below one.
    pub fn apply(self, patch: PaginationPatch) -> Self {
        Self {
            page: patch.page.unwrap_or(self.page),
            size: patch.size.unwrap_or(self.size).max(1),
        }
    }

    pub fn next(&self) -> PaginationPatch {
        PaginationPatch::page(self.page.saturating_add(1))
    }

    pub fn previous(&self) -> PaginationPatch {
        PaginationPatch::page(self.page.saturating_sub(1))
    }
}

/// Partial pagination update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl PaginationPatch {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            size: None,
        }
    }

    pub fn size(size: u32) -> Self {
        Self {
            page: None,
            size: Some(size),
        }
    }
}

impl From<PaginationQuery> for PaginationPatch {
    fn from(query: PaginationQuery) -> Self {
        Self {
            page: Some(query.page),
            size: Some(query.size),
        }
    }
}

impl<P> From<PaginationPatch> for Valuable<PaginationPatch, P> {
    fn from(patch: PaginationPatch) -> Self {
        Valuable::Value(patch)
    }
}

impl<P> From<PaginationQuery> for Valuable<PaginationPatch, P> {
    fn from(query: PaginationQuery) -> Self {
        Valuable::Value(query.into())
    }
}

/// One fetched page. `total` is the server's row count, not `items.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u64,
}

impl<T> Default for PageData<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: 0,
            size: 0,
            total: 0,
        }
    }
}

impl<T> PageData<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of pages the server reports, given `size`
    pub fn page_count(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.size))
    }
}

/// Serialize a query source into a JSON object. `null` counts as empty.
pub fn to_object<T: Serialize>(value: &T) -> Result<Params, RequestError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Params::new()),
        Ok(other) => Err(RequestError::ClientError(format!(
            "Query source must be an object, got {}",
            other
        ))),
        Err(e) => Err(RequestError::ClientError(format!(
            "Failed to serialize query source: {}",
            e
        ))),
    }
}

/// Shallow merge; later sources win on key collision
pub fn shallow_merge<I>(sources: I) -> Params
where
    I: IntoIterator<Item = Params>,
{
    let mut merged = Params::new();
    for source in sources {
        merged.extend(source);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_patch_keeps_unset_fields() {
        let query = PaginationQuery::new(3, 50);
        assert_eq!(query.apply(PaginationPatch::page(4)), PaginationQuery::new(4, 50));
        assert_eq!(query.apply(PaginationPatch::size(10)), PaginationQuery::new(3, 10));
        assert_eq!(query.apply(PaginationPatch::default()), query);
    }

    #[test]
    fn test_next_and_previous() {
        let query = PaginationQuery::new(0, 20);
        assert_eq!(query.next(), PaginationPatch::page(1));
        assert_eq!(query.previous(), PaginationPatch::page(0));
    }

    #[test]
    fn test_page_data_decodes_with_missing_fields() {
        let page: PageData<Value> = serde_json::from_value(json!({"items": [1]})).unwrap();
        assert_eq!(page.items, vec![json!(1)]);
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_page_count() {
        let page = PageData::<u8> {
            items: vec![],
            page: 0,
            size: 20,
            total: 41,
        };
        assert_eq!(page.page_count(), 3);
        assert_eq!(PageData::<u8>::default().page_count(), 0);
    }

    #[test]
    fn test_next_and_previous_saturate() {
        let last = PaginationQuery::new(u32::MAX, 20);
        assert_eq!(last.next(), PaginationPatch::page(u32::MAX));
        assert_eq!(PaginationQuery::new(0, 20).previous(), PaginationPatch::page(0));
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let query = PaginationQuery::new(3, 20).apply(PaginationPatch::size(0));
        assert_eq!(query, PaginationQuery::new(3, 1));
        assert_eq!(PaginationQuery::new(0, 0).size, 1);
    }

    #[test]
    fn test_later_sources_win() {
        let merged = shallow_merge([
            to_object(&json!({"page": 9, "org": 1})).unwrap(),
            to_object(&json!({"name": "jim", "org": 2})).unwrap(),
            to_object(&PaginationQuery::new(0, 20)).unwrap(),
        ]);
        assert_eq!(
            Value::Object(merged),
            json!({"org": 2, "name": "jim", "page": 0, "size": 20})
        );
    }

    #[test]
    fn test_to_object_rejects_scalars() {
        assert!(to_object(&()).unwrap().is_empty());
        assert!(matches!(to_object(&5), Err(RequestError::ClientError(_))));
    }
}
