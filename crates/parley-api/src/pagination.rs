//! Page-number pagination: `?page=N&page_size=M`.

use serde::Deserialize;

use parley_types::api::Page;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageQuery {
    pub fn resolve(self) -> Result<PageRequest, ApiError> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(ApiError::not_found("Invalid page."));
        }
        let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(PageRequest { page, size })
    }
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.size as u64
    }

    /// Pages past the last one are an error; the first page always exists.
    pub fn check_in_range(&self, count: u64) -> Result<(), ApiError> {
        if self.page > 1 && self.offset() >= count {
            return Err(ApiError::not_found("Invalid page."));
        }
        Ok(())
    }

    /// Wraps one page of results with the total count and neighbour links.
    /// Links keep every query parameter of the current request except `page`.
    pub fn wrap<T>(&self, results: Vec<T>, count: u64, path: &str, query: Option<&str>) -> Page<T> {
        let has_next = self.offset() + (results.len() as u64) < count;
        Page {
            count,
            next: has_next.then(|| link(path, query, self.page + 1)),
            previous: (self.page > 1).then(|| link(path, query, self.page - 1)),
            results,
        }
    }
}

fn link(path: &str, query: Option<&str>, page: u32) -> String {
    let page_param = format!("page={}", page);
    let mut params: Vec<&str> = query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty() && *p != "page" && !p.starts_with("page="))
        .collect();
    params.push(&page_param);
    format!("{}?{}", path, params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let req = PageQuery::default().resolve().unwrap();
        assert_eq!(req, PageRequest { page: 1, size: DEFAULT_PAGE_SIZE });

        let big = PageQuery { page: Some(3), page_size: Some(1000) }.resolve().unwrap();
        assert_eq!(big.size, MAX_PAGE_SIZE);
        assert_eq!(big.offset(), 200);

        assert!(PageQuery { page: Some(0), page_size: None }.resolve().is_err());
    }

    #[test]
    fn out_of_range_pages() {
        let first = PageRequest { page: 1, size: 10 };
        assert!(first.check_in_range(0).is_ok());

        let third = PageRequest { page: 3, size: 10 };
        assert!(third.check_in_range(21).is_ok());
        assert!(third.check_in_range(20).is_err());
    }

    #[test]
    fn links_preserve_filters() {
        let req = PageRequest { page: 2, size: 2 };
        let page = req.wrap(vec![3, 4], 5, "/conversations/x/messages", Some("user=bo&page=2&page_size=2"));

        assert_eq!(page.count, 5);
        assert_eq!(page.next.as_deref(), Some("/conversations/x/messages?user=bo&page_size=2&page=3"));
        assert_eq!(page.previous.as_deref(), Some("/conversations/x/messages?user=bo&page_size=2&page=1"));

        let last = PageRequest { page: 3, size: 2 }.wrap(vec![5], 5, "/p", None);
        assert_eq!(last.next, None);
        assert_eq!(last.previous.as_deref(), Some("/p?page=2"));
    }
}
