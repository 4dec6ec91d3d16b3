use schemars::JsonSchema;
use serde::Serialize;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// Page window for list queries. Values below 1 fall back to the defaults
/// and limits above `MAX_LIMIT` are capped, instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE);
        let limit = limit
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Pagination { page, limit }
    }

    // Number of rows to skip before this page; pages past the end saturate
    pub fn skip(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.limit.max(0))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(None, None)
    }
}
