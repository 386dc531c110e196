use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;
/// Keeps `offset()` within `i64`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

pub const DEFAULT_PROFILE_LIMIT: i64 = 9;
pub const MAX_PROFILE_LIMIT: i64 = 100;

/// Raw `?page=&size=` query. Values stay strings so garbage falls back to defaults.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number (default 1)
    pub page: Option<String>,
    /// Items per page (default 10, max 50)
    pub size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn parse(page: Option<&str>, size: Option<&str>) -> Self {
        Self::new(
            parse_number(page).unwrap_or(1),
            parse_number(size).unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.size
    }

    /// One more than the page size; the extra row only signals `has_next`.
    pub fn fetch_limit(&self) -> i64 {
        self.size + 1
    }
}

impl From<&PageQuery> for PageRequest {
    fn from(query: &PageQuery) -> Self {
        PageRequest::parse(query.page.as_deref(), query.size.as_deref())
    }
}

pub fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Build a page from rows fetched with [`PageRequest::fetch_limit`].
    pub fn from_rows(mut rows: Vec<T>, request: PageRequest) -> Self {
        let has_next = rows.len() as i64 > request.size;
        rows.truncate(request.size as usize);
        Page {
            items: rows,
            page: request.page,
            size: request.size,
            has_next,
        }
    }
}

/// Pagination block for profile post grids, where the total is known.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfilePagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl ProfilePagination {
    /// Requested page past the end is clamped to the last page.
    pub fn new(page: Option<&str>, limit: Option<&str>, total_count: i64) -> Self {
        let limit = parse_number(limit)
            .unwrap_or(DEFAULT_PROFILE_LIMIT)
            .clamp(1, MAX_PROFILE_LIMIT);
        let total_pages = ((total_count + limit - 1) / limit).max(1);
        let page = parse_number(page).unwrap_or(1).clamp(1, total_pages);
        ProfilePagination {
            page,
            limit,
            offset: (page - 1) * limit,
            total_count,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing_or_garbage() {
        assert_eq!(PageRequest::parse(None, None), PageRequest::default());
        assert_eq!(PageRequest::parse(Some("abc"), Some("")), PageRequest::default());
    }

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(PageRequest::parse(Some("0"), Some("500")), PageRequest::new(1, 50));
        assert_eq!(PageRequest::parse(Some("-3"), Some("0")).size, 1);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_the_offset() {
        let req = PageRequest::parse(Some("9223372036854775807"), Some("50"));
        assert_eq!(req.page, MAX_PAGE);
        assert!(req.offset() > 0);

        let req = PageRequest::parse(Some("9223372036854775807"), Some("10"));
        assert_eq!(req.offset(), (MAX_PAGE - 1) * 10);
    }

    #[test]
    fn offset_and_fetch_limit() {
        let req = PageRequest::new(3, 10);
        assert_eq!(req.offset(), 20);
        assert_eq!(req.fetch_limit(), 11);
    }

    #[test]
    fn extra_row_sets_has_next() {
        let req = PageRequest::new(1, 2);
        let page = Page::from_rows(vec![1, 2, 3], req);
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_next);

        let page = Page::from_rows(vec![1, 2], req);
        assert!(!page.has_next);
    }

    #[test]
    fn page_serializes_camel_case() {
        let page = Page::from_rows(vec![1], PageRequest::default());
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["hasNext"], false);
        assert_eq!(json["size"], 10);
    }

    #[test]
    fn profile_pagination_clamps_to_last_page() {
        let p = ProfilePagination::new(Some("7"), Some("9"), 20);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.page, 3);
        assert_eq!(p.offset, 18);
        assert!(!p.has_next);
        assert!(p.has_prev);
    }

    #[test]
    fn profile_pagination_with_no_posts() {
        let p = ProfilePagination::new(None, None, 0);
        assert_eq!(p.limit, 9);
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.page, 1);
        assert!(!p.has_next);
        assert!(!p.has_prev);
    }

    #[test]
    fn profile_limit_is_capped() {
        assert_eq!(ProfilePagination::new(None, Some("1000"), 5).limit, 100);
    }
}
