//! Offset pagination shared by every search-style mode.
//!
//! [`Pager`] is the pure bookkeeping (offsets, quota, empty-page streaks);
//! [`paginate`] drives a [`PageSource`] with it and exposes the records as a
//! lazy stream, so a consumer that stops polling stops further requests.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::ScraperError;
use crate::models::Record;

/// Consecutive empty or failed pages that end a loop.
pub const EMPTY_STREAK_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct Pager {
    page_cap: usize,
    target: usize,
    offset: usize,
    emitted: usize,
    empty_streak: u32,
    max_offset: Option<usize>,
    finished: bool,
}

impl Pager {
    pub fn new(page_cap: usize, target: usize) -> Self {
        Self {
            page_cap: page_cap.max(1),
            target,
            offset: 0,
            emitted: 0,
            empty_streak: 0,
            max_offset: None,
            finished: false,
        }
    }

    pub fn starting_at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Stop once the offset reaches `max_offset` (upstream depth limit).
    pub fn with_max_offset(mut self, max_offset: usize) -> Self {
        self.max_offset = Some(max_offset);
        self
    }

    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.emitted)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next page to fetch, or `None` once the loop is over.
    pub fn next_request(&mut self) -> Option<PageRequest> {
        if self.finished || self.remaining() == 0 {
            self.finished = true;
            return None;
        }
        if let Some(max_offset) = self.max_offset {
            if self.offset >= max_offset {
                debug!("Reached upstream depth limit at offset {}", self.offset);
                self.finished = true;
                return None;
            }
        }
        Some(PageRequest {
            offset: self.offset,
            limit: self.page_cap.min(self.remaining()),
        })
    }

    /// The page came back empty or failed.
    pub fn record_empty(&mut self, request: PageRequest) {
        self.empty_streak += 1;
        if self.empty_streak >= EMPTY_STREAK_LIMIT {
            self.finished = true;
        } else {
            self.offset = request.offset + request.limit;
        }
    }

    /// `received` items came back, `emitted` of them survived filtering.
    pub fn record_page(&mut self, request: PageRequest, received: usize, emitted: usize) {
        self.empty_streak = 0;
        self.emitted += emitted;
        if self.remaining() == 0 || received < request.limit {
            self.finished = true;
        } else {
            self.offset = request.offset + received;
        }
    }
}

/// One upstream listing endpoint.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// `None` when the request failed after retries.
    async fn fetch_page(&self, request: PageRequest) -> Option<Vec<Self::Item>>;

    /// Format an item, or `None` when a client-side filter rejects it.
    fn to_record(&self, item: Self::Item) -> Option<Record>;

    fn label(&self) -> &'static str;
}

pub type RecordStream<'a> = BoxStream<'a, Result<Record, ScraperError>>;

/// Lazily page through `source` until the pager says stop.
pub fn paginate<'a, S>(source: S, pager: Pager) -> RecordStream<'a>
where
    S: PageSource + 'a,
{
    stream::unfold((source, pager), |(source, mut pager)| async move {
        let request = pager.next_request()?;
        let records = match source.fetch_page(request).await {
            Some(items) if !items.is_empty() => {
                let received = items.len();
                let records: Vec<Record> = items
                    .into_iter()
                    .filter_map(|item| source.to_record(item))
                    .take(pager.remaining())
                    .collect();
                pager.record_page(request, received, records.len());
                info!(
                    "📄 {}: offset {} returned {} items, {} kept ({} total)",
                    source.label(),
                    request.offset,
                    received,
                    records.len(),
                    pager.emitted()
                );
                records
            }
            _ => {
                pager.record_empty(request);
                warn!(
                    "📭 {}: empty page at offset {}{}",
                    source.label(),
                    request.offset,
                    if pager.is_finished() { ", stopping" } else { "" }
                );
                Vec::new()
            }
        };
        Some((records, (source, pager)))
    })
    .flat_map(|records| stream::iter(records.into_iter().map(Ok)))
    .boxed()
}
