//! Pagination arithmetic shared by the live buffer, the history reads, and
//! the notification listing.

use serde::Deserialize;

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const DEFAULT_PAGE: u64 = 1;

/// Raw query-string pagination input. Zero means "not provided".
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub per_page: u64,
}

impl PageRequest {
    /// Apply the defaults: pages are 1-indexed, `per_page` falls back to 10.
    pub fn normalize(self) -> PageRequest {
        PageRequest {
            page: if self.page == 0 { DEFAULT_PAGE } else { self.page },
            per_page: if self.per_page == 0 {
                DEFAULT_PER_PAGE
            } else {
                self.per_page
            },
        }
    }

    /// Offset of the first element of this page.
    pub fn offset(&self) -> u64 {
        let norm = self.normalize();
        (norm.page - 1) * norm.per_page
    }
}

/// `ceil(total / per_page)`; an empty collection still has one addressable
/// (empty) page worth of metadata, reported as 0 pages.
pub fn max_page(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_zero() {
        let req = PageRequest { page: 0, per_page: 0 }.normalize();
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, 10);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest { page: 1, per_page: 10 }.offset(), 0);
        assert_eq!(PageRequest { page: 3, per_page: 10 }.offset(), 20);
        assert_eq!(PageRequest { page: 2, per_page: 7 }.offset(), 7);
    }

    #[test]
    fn max_page_rounds_up() {
        assert_eq!(max_page(0, 10), 0);
        assert_eq!(max_page(1, 10), 1);
        assert_eq!(max_page(10, 10), 1);
        assert_eq!(max_page(11, 10), 2);
        assert_eq!(max_page(21, 7), 3);
    }
}
