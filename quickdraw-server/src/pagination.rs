use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::serialized::RoomListing;

pub const DEFAULT_PER_PAGE: usize = 100;
pub const MAX_PER_PAGE: usize = 1000;

/// Page selection from the query string. Out of range values are clamped.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number
    page: Option<usize>,
    per_page: Option<usize>,
}

/// A resolved page over `total_count` items
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pages {
    pub page: usize,
    pub per_page: usize,
    pub total_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(RoomPage = Page<RoomListing>)]
pub struct Page<T> {
    page: usize,
    per_page: usize,
    page_count: usize,
    total_count: usize,
    items: Vec<T>,
}

impl Pages {
    pub fn new(query: &PageQuery, total_count: usize) -> Self {
        let per_page = match query.per_page {
            Some(0) | None => DEFAULT_PER_PAGE,
            Some(n) => n.min(MAX_PER_PAGE),
        };

        let page_count = total_count.div_ceil(per_page);
        let page = query.page.unwrap_or(1).clamp(1, page_count.max(1));

        Self {
            page,
            per_page,
            total_count,
        }
    }

    pub fn page_count(&self) -> usize {
        self.total_count.div_ceil(self.per_page)
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> usize {
        self.per_page
    }

    pub fn with_items<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            page: self.page,
            per_page: self.per_page,
            page_count: self.page_count(),
            total_count: self.total_count,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<usize>, per_page: Option<usize>) -> PageQuery {
        PageQuery { page, per_page }
    }

    #[test]
    fn test_defaults() {
        let pages = Pages::new(&PageQuery::default(), 250);

        assert_eq!(pages.page, 1);
        assert_eq!(pages.per_page, DEFAULT_PER_PAGE);
        assert_eq!(pages.page_count(), 3);
        assert_eq!(pages.offset(), 0);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let pages = Pages::new(&query(Some(9), Some(5000)), 2500);
        assert_eq!(pages.per_page, MAX_PER_PAGE);
        assert_eq!(pages.page, 3);
        assert_eq!(pages.offset(), 2000);

        let pages = Pages::new(&query(Some(0), Some(0)), 0);
        assert_eq!(pages.page, 1);
        assert_eq!(pages.per_page, DEFAULT_PER_PAGE);
        assert_eq!(pages.page_count(), 0);
    }

    #[test]
    fn test_huge_page_without_items_starts_at_zero() {
        let pages = Pages::new(&query(Some(usize::MAX), None), 0);

        assert_eq!(pages.page, 1);
        assert_eq!(pages.offset(), 0);
        assert_eq!(pages.limit(), DEFAULT_PER_PAGE);
    }
}
