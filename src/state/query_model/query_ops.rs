//! Filter, sort, projection and page-size operations.
//!
//! None of these fetch. Each one resets or re-clamps the page, marks the
//! cached page stale and supersedes any fetch already in flight.

use mongodb::bson::Document;

use super::model::{ModelState, QueryResultModel};
use super::pagination::{PageSize, clamp_page};
use crate::bson::parse_optional_document;
use crate::error::{Error, Result};

fn parse_criteria(label: &str, text: &str) -> Result<Option<Document>> {
    parse_optional_document(text).map_err(|err| Error::Parse(format!("{label}: {err}")))
}

impl QueryResultModel {
    fn update_criteria(&self, update: impl FnOnce(&mut ModelState)) {
        let mut state = self.lock();
        update(&mut state);
        state.current_page = 1;
        state.invalidate();
    }

    pub fn set_filter(&self, filter: Option<Document>) {
        self.update_criteria(|state| state.filter = filter);
    }

    pub fn set_projection(&self, projection: Option<Document>) {
        self.update_criteria(|state| state.projection = projection);
    }

    pub fn set_sort(&self, sort: Option<Document>) {
        self.update_criteria(|state| state.sort = sort);
    }

    /// Replace filter, projection and sort in one step.
    pub fn set_query(
        &self,
        filter: Option<Document>,
        projection: Option<Document>,
        sort: Option<Document>,
    ) {
        self.update_criteria(|state| {
            state.filter = filter;
            state.projection = projection;
            state.sort = sort;
        });
    }

    pub fn clear_filter(&self) {
        self.set_filter(None);
    }

    /// Parse a filter typed as JSON. Blank text or `{}` clears it.
    pub fn set_filter_json(&self, text: &str) -> Result<()> {
        let filter = parse_criteria("filter", text)?;
        self.set_filter(filter);
        Ok(())
    }

    pub fn set_projection_json(&self, text: &str) -> Result<()> {
        let projection = parse_criteria("projection", text)?;
        self.set_projection(projection);
        Ok(())
    }

    pub fn set_sort_json(&self, text: &str) -> Result<()> {
        let sort = parse_criteria("sort", text)?;
        self.set_sort(sort);
        Ok(())
    }

    /// Change the page size, keeping the current page within the cached count.
    pub fn set_page_size(&self, size: i64) -> Result<()> {
        let page_size = PageSize::limited(size)?;
        self.apply_page_size(page_size);
        Ok(())
    }

    /// Show every match on a single page.
    pub fn set_unpaged(&self) {
        self.apply_page_size(PageSize::Unpaged);
    }

    fn apply_page_size(&self, page_size: PageSize) {
        let mut state = self.lock();
        if state.page_size == page_size {
            return;
        }
        state.page_size = page_size;
        state.reclamp();
        state.invalidate();
    }

    /// Move to `page`, clamped into `[1, page_count]` of the cached count.
    /// Returns the page actually selected.
    pub fn set_page(&self, page: i64) -> u64 {
        let requested = u64::try_from(page).unwrap_or(0);
        let mut state = self.lock();
        let target = clamp_page(requested, state.page_count());
        if target != state.current_page {
            state.current_page = target;
            state.invalidate();
        }
        target
    }
}
