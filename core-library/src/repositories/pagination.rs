//! Pagination helper types for inventory queries

use serde::{Deserialize, Serialize};

/// Page size used when the caller supplies none (or a non-positive one)
pub const DEFAULT_PER_PAGE: u32 = 100;
/// Upper bound on page size
pub const MAX_PER_PAGE: u32 = 1000;

/// Pagination request parameters (1-indexed pages)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Build a request from raw caller values.
    ///
    /// `page < 1` becomes 1, `per_page < 1` becomes [`DEFAULT_PER_PAGE`] and
    /// anything above [`MAX_PER_PAGE`] is capped.
    ///
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let request = PageRequest::new(0, 5000);
    /// assert_eq!(request.page, 1);
    /// assert_eq!(request.per_page, 1000);
    /// ```
    pub fn new(page: i64, per_page: i64) -> Self {
        let page = page.clamp(1, u32::MAX as i64) as u32;
        let per_page = if per_page < 1 {
            DEFAULT_PER_PAGE
        } else {
            per_page.min(MAX_PER_PAGE as i64) as u32
        };
        Self { page, per_page }
    }

    /// SQL OFFSET
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    /// SQL LIMIT
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Paginated response containing items and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages, counted before LIMIT/OFFSET
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    /// `ceil(total / per_page)`
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// ```
    /// use core_library::repositories::{Page, PageRequest};
    ///
    /// let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(1, 10));
    /// assert_eq!(page.total_pages, 3);
    /// ```
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let per_page = request.per_page.max(1) as u64;
        let total_pages = total.div_ceil(per_page) as u32;

        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages,
        }
    }

    /// Check if there are more pages after the current one
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Check if there are pages before the current one
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Map the items to a different type
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamping() {
        assert_eq!(PageRequest::new(0, 0), PageRequest::new(1, 100));
        assert_eq!(PageRequest::new(-4, -1), PageRequest::default());
        assert_eq!(PageRequest::new(3, 1001).per_page, 1000);
        assert_eq!(PageRequest::new(3, 1000).per_page, 1000);
        assert_eq!(PageRequest::new(3, 1).per_page, 1);
    }

    #[test]
    fn test_page_request_offset() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
        assert_eq!(PageRequest::new(3, 20).limit(), 20);
    }

    #[test]
    fn test_total_pages_is_ceiling() {
        for (total, per_page, expected) in [(0, 10, 0), (1, 10, 1), (10, 10, 1), (11, 10, 2), (25, 10, 3)] {
            let page: Page<()> = Page::new(vec![], total, PageRequest::new(1, per_page));
            assert_eq!(page.total_pages, expected, "total={} per_page={}", total, per_page);
        }
    }

    #[test]
    fn test_page_navigation() {
        let first = Page::new(vec![1, 2, 3], 25, PageRequest::new(1, 10));
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = Page::new(vec![1], 25, PageRequest::new(3, 10));
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(1, 10));
        let mapped = page.map(|x| x * 2);

        assert_eq!(mapped.items, vec![2, 4, 6]);
        assert_eq!(mapped.total, 25);
        assert_eq!(mapped.page, 1);
    }
}
