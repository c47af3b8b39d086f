//! Offset pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A validated `(limit, page)` pair. Pages start at 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    limit: u32,
    page: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn new(limit: u32, page: u32) -> DomainResult<Self> {
        if limit == 0 {
            return Err(DomainError::validation("limit must be at least 1"));
        }
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        Ok(Self { limit, page })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Number of records to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            page: 1,
        }
    }
}

/// Page metadata returned alongside the items.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u32,
    pub limit: u32,
}

impl PageMeta {
    pub fn new(total_items: u64, request: PageRequest) -> Self {
        Self {
            total_items,
            total_pages: total_items.div_ceil(u64::from(request.limit)),
            current_page: request.page,
            limit: request.limit,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: u64, request: PageRequest) -> Self {
        Self {
            items,
            meta: PageMeta::new(total_items, request),
        }
    }

    /// Slice an already-materialized, ordered collection.
    pub fn from_slice(all: &[T], request: PageRequest) -> Self
    where
        T: Clone,
    {
        let items = all
            .iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .cloned()
            .collect();
        Self::new(items, all.len() as u64, request)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
