//! Page arithmetic shared by the result model and its presenters.

use std::fmt;

use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// How many documents one page holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSize {
    Limited(u64),
    /// Everything on a single page.
    Unpaged,
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Limited(DEFAULT_PAGE_SIZE)
    }
}

impl PageSize {
    /// Validate a user-supplied size.
    pub fn limited(size: i64) -> Result<Self> {
        match u64::try_from(size) {
            Ok(size) if size > 0 => Ok(PageSize::Limited(size)),
            _ => Err(Error::InvalidArgument(format!("page size must be positive, got {size}"))),
        }
    }

    pub fn is_unpaged(self) -> bool {
        matches!(self, PageSize::Unpaged)
    }

    /// Documents to skip to reach the 1-based `page`.
    pub fn skip(self, page: u64) -> u64 {
        match self {
            PageSize::Limited(size) => page.saturating_sub(1).saturating_mul(size),
            PageSize::Unpaged => 0,
        }
    }

    /// Driver limit for one page.
    pub fn limit(self) -> Option<i64> {
        match self {
            PageSize::Limited(size) => Some(i64::try_from(size).unwrap_or(i64::MAX)),
            PageSize::Unpaged => None,
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSize::Limited(size) => write!(f, "{size}"),
            PageSize::Unpaged => f.write_str("all"),
        }
    }
}

/// Number of pages needed for `total_count` documents. Never less than one.
pub fn compute_page_count(total_count: u64, page_size: PageSize) -> u64 {
    match page_size {
        PageSize::Unpaged => 1,
        PageSize::Limited(_) if total_count == 0 => 1,
        PageSize::Limited(size) => total_count.div_ceil(size.max(1)),
    }
}

/// Clamp a 1-based page into `[1, page_count]`.
pub fn clamp_page(page: u64, page_count: u64) -> u64 {
    page.min(page_count.max(1)).max(1)
}

/// 1-based range of documents shown on a page ("Showing 11-20 of 42").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl PageRange {
    pub fn new(page: u64, page_size: PageSize, shown: usize, total: u64) -> Self {
        if shown == 0 {
            return Self { start: 0, end: 0, total };
        }
        let skip = page_size.skip(page);
        Self { start: skip + 1, end: skip + shown as u64, total }
    }

    pub fn is_empty(&self) -> bool {
        self.start == 0
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "No documents ({} total)", self.total);
        }
        write!(f, "Showing {}-{} of {}", self.start, self.end, self.total)
    }
}
