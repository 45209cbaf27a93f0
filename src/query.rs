//! Infinite-scroll and single-entity query state.
//!
//! These types hold no network handles. [`crate::client::QueryClient`] decides
//! when to start a fetch, runs it, and feeds the outcome back through
//! [`InfiniteQuery::complete`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache_key::CacheKey;
use crate::lemmy::{
    CommentId, CommentReplyView, CommentSortType, GetComments, GetPosts, GetReplies, ListingType,
    PostId, Search, SearchType, SortType,
};

pub type RequestId = u64;

/// Where the next page starts. Cursor endpoints hand back opaque strings
/// that must be echoed verbatim; numbered endpoints count from 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContinuationToken {
    Cursor(String),
    Page(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pagination {
    #[default]
    Cursor,
    PageNumber,
}

impl Pagination {
    pub fn first(self) -> Option<ContinuationToken> {
        match self {
            Pagination::Cursor => None,
            Pagination::PageNumber => Some(ContinuationToken::Page(1)),
        }
    }

    /// Token for the page after `current`. Cursor pagination ends when the
    /// server stops returning a cursor; numbered pagination ends on an empty
    /// page.
    pub fn next(
        self,
        current: Option<&ContinuationToken>,
        cursor: Option<String>,
        item_count: usize,
    ) -> Option<ContinuationToken> {
        match self {
            Pagination::Cursor => cursor
                .filter(|cursor| !cursor.is_empty())
                .map(ContinuationToken::Cursor),
            Pagination::PageNumber => {
                if item_count == 0 {
                    return None;
                }
                let page = match current {
                    Some(ContinuationToken::Page(page)) => *page,
                    _ => 1,
                };
                Some(ContinuationToken::Page(page + 1))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    NextPage,
    Refetch,
}

#[derive(Debug)]
struct InFlight {
    request_id: RequestId,
    kind: FetchKind,
    token: Option<ContinuationToken>,
    cancel: Arc<AtomicBool>,
}

/// What a newly started fetch should request.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub token: Option<ContinuationToken>,
    pub cancel: Arc<AtomicBool>,
}

pub struct PageOutcome<P> {
    pub page: P,
    pub cursor: Option<String>,
    pub item_count: usize,
}

#[derive(Debug)]
pub struct InfiniteQuery<P> {
    pagination: Pagination,
    pages: Vec<P>,
    next: Option<ContinuationToken>,
    loaded: bool,
    in_flight: Option<InFlight>,
    error: Option<String>,
    updated_at: Option<Instant>,
}

impl<P> InfiniteQuery<P> {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            pagination,
            pages: Vec::new(),
            next: None,
            loaded: false,
            in_flight: None,
            error: None,
            updated_at: None,
        }
    }

    pub fn data(&self) -> &[P] {
        &self.pages
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn has_next_page(&self) -> bool {
        self.loaded && self.next.is_some()
    }

    pub fn next_token(&self) -> Option<&ContinuationToken> {
        self.next.as_ref()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_fetching_next_page(&self) -> bool {
        self.in_flight_kind() == Some(FetchKind::NextPage)
    }

    pub fn is_refetching(&self) -> bool {
        self.in_flight_kind() == Some(FetchKind::Refetch)
    }

    /// No page has loaded yet.
    pub fn is_pending(&self) -> bool {
        !self.loaded
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    pub fn in_flight_request(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|flight| flight.request_id)
    }

    fn in_flight_kind(&self) -> Option<FetchKind> {
        self.in_flight.as_ref().map(|flight| flight.kind)
    }

    /// Reserves the query for one fetch. Returns `None` when the fetch would
    /// overlap another or there is nothing left to load.
    pub fn begin(&mut self, kind: FetchKind, request_id: RequestId) -> Option<FetchPlan> {
        if self.in_flight.is_some() {
            return None;
        }
        let token = match kind {
            FetchKind::Initial if self.loaded => return None,
            FetchKind::Initial | FetchKind::Refetch => self.pagination.first(),
            FetchKind::NextPage if !self.has_next_page() => return None,
            FetchKind::NextPage => self.next.clone(),
        };
        let cancel = Arc::new(AtomicBool::new(false));
        self.in_flight = Some(InFlight {
            request_id,
            kind,
            token: token.clone(),
            cancel: Arc::clone(&cancel),
        });
        Some(FetchPlan { token, cancel })
    }

    pub fn is_current(&self, request_id: RequestId) -> bool {
        self.in_flight.as_ref().is_some_and(|flight| {
            flight.request_id == request_id && !flight.cancel.load(Ordering::SeqCst)
        })
    }

    /// Applies the outcome of the in-flight fetch. Outcomes for any other
    /// request are ignored and `false` is returned. A failure leaves the
    /// loaded pages untouched.
    pub fn complete(&mut self, request_id: RequestId, outcome: Result<PageOutcome<P>, String>) -> bool {
        if !self.is_current(request_id) {
            return false;
        }
        let Some(flight) = self.in_flight.take() else {
            return false;
        };
        match outcome {
            Ok(PageOutcome {
                page,
                cursor,
                item_count,
            }) => {
                self.next = self
                    .pagination
                    .next(flight.token.as_ref(), cursor, item_count);
                if flight.kind == FetchKind::Refetch {
                    self.pages.clear();
                }
                self.pages.push(page);
                self.loaded = true;
                self.error = None;
                self.updated_at = Some(Instant::now());
            }
            Err(message) => {
                self.error = Some(message);
            }
        }
        true
    }

    /// Abandons the in-flight fetch; its outcome will be discarded.
    pub fn cancel(&mut self) -> Option<RequestId> {
        let flight = self.in_flight.take()?;
        flight.cancel.store(true, Ordering::SeqCst);
        Some(flight.request_id)
    }

    /// Patches already-loaded pages in place.
    pub fn update_pages<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut P),
    {
        for page in &mut self.pages {
            f(page);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostsPage {
    pub posts: Vec<CacheKey>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentsPage {
    pub comments: Vec<CacheKey>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub posts: Vec<CacheKey>,
    pub comments: Vec<CacheKey>,
    pub communities: Vec<CacheKey>,
    pub users: Vec<CacheKey>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepliesPage {
    pub replies: Vec<CommentReplyView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PostsQuery {
    pub type_: Option<ListingType>,
    pub sort: Option<SortType>,
    pub community_name: Option<String>,
    pub saved_only: bool,
}

impl PostsQuery {
    pub fn community(name: impl Into<String>) -> Self {
        Self {
            community_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn to_form(&self, token: Option<&ContinuationToken>, limit: i64) -> GetPosts {
        GetPosts {
            type_: self.type_,
            sort: self.sort,
            community_name: self.community_name.clone(),
            saved_only: self.saved_only.then_some(true),
            limit: Some(limit),
            page_cursor: match token {
                Some(ContinuationToken::Cursor(cursor)) => Some(cursor.clone()),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CommentsQuery {
    pub post_id: Option<PostId>,
    pub parent_id: Option<CommentId>,
    pub sort: Option<CommentSortType>,
    pub max_depth: Option<i32>,
    pub saved_only: bool,
    pub pagination: Pagination,
}

impl CommentsQuery {
    pub fn post(post_id: PostId) -> Self {
        Self {
            post_id: Some(post_id),
            ..Self::default()
        }
    }

    pub fn to_form(&self, token: Option<&ContinuationToken>, limit: i64) -> GetComments {
        let mut form = GetComments {
            type_: Some(ListingType::All),
            sort: self.sort,
            max_depth: self.max_depth,
            limit: Some(limit),
            post_id: self.post_id,
            parent_id: self.parent_id,
            saved_only: self.saved_only.then_some(true),
            ..GetComments::default()
        };
        match token {
            Some(ContinuationToken::Cursor(cursor)) => form.page_cursor = Some(cursor.clone()),
            Some(ContinuationToken::Page(page)) => form.page = Some(*page),
            None => {}
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SearchQuery {
    pub q: String,
    pub type_: Option<SearchType>,
    pub sort: Option<SortType>,
    pub listing_type: Option<ListingType>,
    pub community_name: Option<String>,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Self::default()
        }
    }

    pub fn to_form(&self, token: Option<&ContinuationToken>, limit: i64) -> Search {
        Search {
            q: self.q.clone(),
            type_: self.type_,
            sort: self.sort,
            listing_type: self.listing_type,
            community_name: self.community_name.clone(),
            limit: Some(limit),
            page_cursor: match token {
                Some(ContinuationToken::Cursor(cursor)) => Some(cursor.clone()),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RepliesQuery {
    pub sort: Option<CommentSortType>,
    pub unread_only: bool,
}

impl RepliesQuery {
    pub fn to_form(&self, token: Option<&ContinuationToken>, limit: i64) -> GetReplies {
        GetReplies {
            sort: self.sort,
            page: match token {
                Some(ContinuationToken::Page(page)) => Some(*page),
                _ => Some(1),
            },
            limit: Some(limit),
            unread_only: Some(self.unread_only),
        }
    }
}

/// Snapshot handed to callers of the single-entity lookups: whatever is
/// cached now, plus the state of the background refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleQuery<T> {
    pub data: Option<T>,
    pub is_fetching: bool,
    pub error: Option<String>,
}

impl<T> SingleQuery<T> {
    pub fn is_pending(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub(crate) struct SingleState {
    pub(crate) request_id: Option<RequestId>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) error: Option<String>,
}

impl SingleState {
    /// Failures count as fetches, so a failing lookup is retried at most
    /// once per stale period.
    pub(crate) fn should_fetch(&self, stale_time: Duration) -> bool {
        self.request_id.is_none()
            && self
                .fetched_at
                .map_or(true, |at| at.elapsed() >= stale_time)
    }

    pub(crate) fn finish(&mut self, outcome: &Result<(), String>) {
        self.request_id = None;
        self.fetched_at = Some(Instant::now());
        self.error = outcome.as_ref().err().cloned();
    }
}
