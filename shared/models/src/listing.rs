//! Paginated report listing.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::report::{AnalysisStatus, FileKind, Report};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Query for a user's non-archived reports, newest first.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReportFilter {
    #[validate(range(min = 1, message = "Page numbers start at 1"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
    pub status: Option<AnalysisStatus>,
    #[serde(rename = "type")]
    pub file_kind: Option<FileKind>,
}

impl ReportFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.limit()
    }

    /// Whether a report satisfies the status and kind constraints.
    pub fn matches(&self, report: &Report) -> bool {
        !report.archived
            && self.status.map_or(true, |s| report.status == s)
            && self.file_kind.map_or(true, |k| report.file_kind == k)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub current: u32,
    pub pages: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPage {
    pub data: Vec<Report>,
    pub pagination: Pagination,
}

impl ReportPage {
    pub fn new(data: Vec<Report>, filter: &ReportFilter, total: u64) -> Self {
        let limit = u64::from(filter.limit());
        Self {
            data,
            pagination: Pagination {
                current: filter.page(),
                pages: total.div_ceil(limit) as u32,
                total,
            },
        }
    }
}
