use crate::UserId;

/// A page request: zero-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub size: usize,
}

impl Page {
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    /// Number of orders to skip before this page starts.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

/// Builder for constructing order queries.
///
/// Results are always ordered by creation time, oldest first. Soft-deleted
/// orders are excluded unless [`OrderQuery::including_deleted`] is used.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Include soft-deleted orders.
    pub include_deleted: bool,

    /// Filter by owning user.
    pub user_id: Option<UserId>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a query for every active order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for the active orders of one user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Includes soft-deleted orders.
    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Sets whether soft-deleted orders are included.
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    /// Filters by owning user.
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Limits the number of orders returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many orders before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Restricts the results to one page.
    pub fn page(self, page: Page) -> Self {
        self.offset(page.offset()).limit(page.size)
    }
}
