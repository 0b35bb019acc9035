//! Page windows for list queries.

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Client-requested page window. Pages are numbered from 1; sizes are
/// clamped to 1..=100 rather than rejected.
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Zero-based page index plus effective page size, ready for the
    /// paginator.
    pub fn clamp(self) -> (u64, u64) {
        let page = self.page.max(1);
        let per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        (u64::from(page - 1), u64::from(per_page))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, per_page: DEFAULT_PER_PAGE }
    }
}
