//! Pagination of composed queries.

use doc_store::{Document, DocumentStore};
use serde::Serialize;

use crate::error::Result;
use crate::query::QueryBuilder;

/// Requested window of results. Always valid once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    limit: usize,
}

impl PageRequest {
    pub const DEFAULT_PAGE: usize = 1;
    pub const DEFAULT_LIMIT: usize = 10;
    pub const MAX_LIMIT: usize = 100;

    /// Zero values fall back to the defaults; `limit` is capped.
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: if page == 0 { Self::DEFAULT_PAGE } else { page },
            limit: match limit {
                0 => Self::DEFAULT_LIMIT,
                n => n.min(Self::MAX_LIMIT),
            },
        }
    }

    /// Parses raw query-string values. Anything that is not a positive
    /// integer falls back to the default.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        let positive = |raw: Option<&str>| {
            raw.and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0)
        };
        Self::new(positive(page), positive(limit))
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of results before this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_LIMIT)
    }
}

/// One page of results with its position in the whole set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let limit = request.limit() as u64;
        let total_pages = total_items.div_ceil(limit);
        let page = request.page() as u64;
        Self {
            items,
            page: request.page(),
            limit: request.limit(),
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// Runs a query one page at a time.
pub struct Pager<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> Pager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Counts the full result once, then fetches and shapes only the
    /// requested window. Pages past the end are empty.
    #[tracing::instrument(skip(self, query), fields(collection = %query.collection()))]
    pub async fn paginate(&self, query: &QueryBuilder, request: PageRequest) -> Result<Page<Document>> {
        let total_items = self.count(query).await?;

        let items = if request.offset() as u64 >= total_items {
            Vec::new()
        } else {
            let docs = self
                .store
                .aggregate(query.collection(), &query.window(request.offset(), request.limit()))
                .await?;
            query.shape_all(docs)
        };

        metrics::counter!("read_model_pages_total", "collection" => query.collection().to_string())
            .increment(1);
        Ok(Page::new(items, request, total_items))
    }

    async fn count(&self, query: &QueryBuilder) -> Result<u64> {
        match query.count_pipeline() {
            None => Ok(self.store.count(query.collection(), query.filter()).await?),
            Some(pipeline) => {
                let counted = self.store.aggregate(query.collection(), &pipeline).await?;
                Ok(counted
                    .first()
                    .and_then(|doc| doc.get("total"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_to_defaults() {
        assert_eq!(PageRequest::parse(None, None), PageRequest::new(1, 10));
        assert_eq!(PageRequest::parse(Some("abc"), Some("-3")), PageRequest::new(1, 10));
        assert_eq!(PageRequest::parse(Some("0"), Some("0")), PageRequest::new(1, 10));
        assert_eq!(PageRequest::parse(Some(" 3 "), Some("5")), PageRequest::new(3, 5));
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(PageRequest::parse(Some("1"), Some("1000")).limit(), 100);
    }

    #[test]
    fn page_metadata() {
        let page: Page<()> = Page::new(vec![], PageRequest::new(2, 10), 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);

        let empty: Page<()> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }
}
