//! The query client ties the stores, the account list and the network
//! together.
//!
//! Every request runs on its own worker thread and reports back over a
//! channel. Nothing a worker produces touches the stores until the owner
//! calls [`QueryClient::process_responses`] or [`QueryClient::wait_for_idle`],
//! so readers never observe a half-applied page.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache_key::{CacheKey, CachePrefixer};
use crate::comment_tree::{build_comment_map, CommentMap, CommentPath};
use crate::config;
use crate::data::{Connector, LemmyApi};
use crate::lemmy::{
    BlockCommunity, BlockPerson, CommentId, CommentReplyView, CommentView, CommunityId,
    CommunityView, CreateComment, CreateCommentLike, CreateCommentReport, CreatePostLike,
    CreatePostReport, DeleteComment, EditComment, GetComments, GetCommentsResponse, GetCommunity,
    GetCommunityResponse, GetPersonDetails, GetPersonDetailsResponse, GetPost, GetPostResponse,
    GetPostsResponse, GetRepliesResponse, Login, LoginResponse, MarkCommentReplyAsRead,
    MarkPersonMentionAsRead, MarkPostAsRead, PersonId, PersonView, PostId, PostView, SaveComment,
    SavePost, Search, SearchResponse,
};
use crate::patch;
use crate::query::{
    CommentsPage, CommentsQuery, FetchKind, InfiniteQuery, PageOutcome, Pagination, PostsPage,
    PostsQuery, RepliesPage, RepliesQuery, RequestId, SearchPage, SearchQuery, SingleQuery,
    SingleState,
};
use crate::session::{normalize_instance, Account, AccountStore, AccountUpdate, SessionError};
use crate::storage;
use crate::store::{self, Stores, Tick};

pub type MutationId = u64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("timed out with {0} request(s) outstanding")]
    Timeout(usize),
    #[error("request cancelled")]
    Cancelled,
    #[error("mutation {0} not found")]
    UnknownMutation(MutationId),
    #[error("response channel closed")]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub page_limit: i64,
    /// Single lookups older than this are refreshed in the background.
    pub stale_time: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&config::CacheConfig::default())
    }
}

impl From<&config::CacheConfig> for ClientOptions {
    fn from(cache: &config::CacheConfig) -> Self {
        Self {
            page_limit: cache.page_limit,
            stale_time: cache.stale_time,
        }
    }
}

/// Identity of a post as mutations need it: the id for the API, the
/// activity id for the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTarget {
    pub id: PostId,
    pub ap_id: String,
}

impl From<&PostView> for PostTarget {
    fn from(view: &PostView) -> Self {
        Self {
            id: view.post.id,
            ap_id: view.post.ap_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTarget {
    pub id: CommentId,
    pub path: String,
}

impl From<&CommentView> for CommentTarget {
    fn from(view: &CommentView) -> Self {
        Self {
            id: view.comment.id,
            path: view.comment.path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    VotePost {
        target: PostTarget,
        previous: Option<i32>,
        score: i32,
    },
    SavePost {
        target: PostTarget,
        save: bool,
    },
    MarkPostRead {
        target: PostTarget,
        read: bool,
    },
    VoteComment {
        target: CommentTarget,
        previous: Option<i32>,
        score: i32,
    },
    SaveComment {
        target: CommentTarget,
        save: bool,
    },
    MarkReplyRead {
        reply_id: i64,
        read: bool,
    },
    MarkMentionRead {
        mention_id: i64,
        read: bool,
    },
    CreateComment {
        post_id: PostId,
        parent_id: Option<CommentId>,
    },
    EditComment {
        comment_id: CommentId,
    },
    DeleteComment {
        comment_id: CommentId,
        deleted: bool,
    },
    BlockPerson {
        person_id: PersonId,
        block: bool,
    },
    BlockCommunity {
        community_id: CommunityId,
        block: bool,
    },
    ReportPost {
        post_id: PostId,
    },
    ReportComment {
        comment_id: CommentId,
    },
    Login {
        instance: String,
        username: String,
    },
    Logout {
        instance: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Success,
    Error(String),
    Reverted,
}

#[derive(Debug, Clone)]
pub struct MutationState {
    pub kind: MutationKind,
    pub status: MutationStatus,
    prefixer: CachePrefixer,
}

impl MutationState {
    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            MutationStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    Posts(PostsQuery),
    Comments(CommentsQuery),
    Search(SearchQuery),
    Replies(RepliesQuery),
    Post(PostId),
    Community(String),
    Person(String),
}

/// What changed while responses were applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    QueryLoaded(QueryKind),
    QueryFailed { query: QueryKind, error: String },
    MutationSettled { id: MutationId, error: Option<String> },
    AccountsChanged,
}

struct Envelope<T> {
    request_id: RequestId,
    issued_at: Tick,
    prefixer: CachePrefixer,
    result: Result<T>,
}

enum MutationOutput {
    Post(PostView),
    Comment(CommentView),
    Person(PersonView),
    Community(CommunityView),
    Reply(CommentReplyView),
    Login(LoginResponse),
    Done,
}

enum Response {
    Posts(PostsQuery, Envelope<GetPostsResponse>),
    Comments(CommentsQuery, Envelope<GetCommentsResponse>),
    Search(SearchQuery, Envelope<SearchResponse>),
    Replies(RepliesQuery, Envelope<GetRepliesResponse>),
    Post(PostId, Envelope<GetPostResponse>),
    Community(String, Envelope<GetCommunityResponse>),
    Person(String, Envelope<GetPersonDetailsResponse>),
    Mutation(Envelope<MutationOutput>),
}

impl Response {
    fn request_id(&self) -> RequestId {
        match self {
            Response::Posts(_, envelope) => envelope.request_id,
            Response::Comments(_, envelope) => envelope.request_id,
            Response::Search(_, envelope) => envelope.request_id,
            Response::Replies(_, envelope) => envelope.request_id,
            Response::Post(_, envelope) => envelope.request_id,
            Response::Community(_, envelope) => envelope.request_id,
            Response::Person(_, envelope) => envelope.request_id,
            Response::Mutation(envelope) => envelope.request_id,
        }
    }
}

type Scoped<Q> = (CachePrefixer, Q);

pub struct QueryClient {
    connector: Box<dyn Connector>,
    api: Arc<dyn LemmyApi>,
    accounts: AccountStore,
    prefixer: CachePrefixer,
    options: ClientOptions,
    storage: Option<storage::Store>,
    stores: Stores,
    posts_queries: HashMap<Scoped<PostsQuery>, InfiniteQuery<PostsPage>>,
    comments_queries: HashMap<Scoped<CommentsQuery>, InfiniteQuery<CommentsPage>>,
    search_queries: HashMap<Scoped<SearchQuery>, InfiniteQuery<SearchPage>>,
    replies_queries: HashMap<Scoped<RepliesQuery>, InfiniteQuery<RepliesPage>>,
    active_search: Option<Scoped<SearchQuery>>,
    post_lookups: HashMap<Scoped<PostId>, SingleState>,
    community_lookups: HashMap<Scoped<String>, SingleState>,
    person_lookups: HashMap<Scoped<String>, SingleState>,
    mutations: BTreeMap<MutationId, MutationState>,
    outstanding: HashSet<RequestId>,
    next_request_id: RequestId,
    response_tx: Sender<Response>,
    response_rx: Receiver<Response>,
}

impl QueryClient {
    pub fn new<C>(connector: C, accounts: AccountStore, options: ClientOptions) -> Result<Self>
    where
        C: Connector + 'static,
    {
        let connector: Box<dyn Connector> = Box::new(connector);
        let api = connector.connect(accounts.selected_account())?;
        let prefixer = accounts.cache_prefixer();
        let (response_tx, response_rx) = unbounded();
        Ok(Self {
            connector,
            api,
            accounts,
            prefixer,
            options,
            storage: None,
            stores: Stores::new(),
            posts_queries: HashMap::new(),
            comments_queries: HashMap::new(),
            search_queries: HashMap::new(),
            replies_queries: HashMap::new(),
            active_search: None,
            post_lookups: HashMap::new(),
            community_lookups: HashMap::new(),
            person_lookups: HashMap::new(),
            mutations: BTreeMap::new(),
            outstanding: HashSet::new(),
            next_request_id: 1,
            response_tx,
            response_rx,
        })
    }

    /// Writes the account list through to `storage` after every change.
    pub fn with_storage(mut self, storage: storage::Store) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn prefixer(&self) -> &CachePrefixer {
        &self.prefixer
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding.is_empty()
    }

    // Accounts

    pub fn select_account(&mut self, index: usize) -> Result<()> {
        self.accounts.select(index)?;
        self.accounts_changed()
    }

    pub fn add_account(&mut self, account: Account) -> Result<usize> {
        let index = self.accounts.add_account(account);
        self.accounts_changed()?;
        Ok(index)
    }

    pub fn update_account(&mut self, index: usize, update: AccountUpdate) -> Result<()> {
        self.accounts.update_account(index, update)?;
        self.accounts_changed()
    }

    pub fn update_selected_account(&mut self, update: AccountUpdate) -> Result<()> {
        self.accounts.update_selected_account(update);
        self.accounts_changed()
    }

    /// Starts a login against `instance`. On success the token lands in the
    /// selected slot when that slot is anonymous, otherwise in a new slot.
    pub fn login(
        &mut self,
        instance: &str,
        username: &str,
        password: &str,
        totp_2fa_token: Option<String>,
    ) -> Result<MutationId> {
        let api = self.connector.connect(&Account::new(instance))?;
        let form = Login {
            username_or_email: username.to_string(),
            password: password.to_string(),
            totp_2fa_token,
        };
        let kind = MutationKind::Login {
            instance: normalize_instance(instance),
            username: username.to_string(),
        };
        Ok(self.start_mutation(kind, api, move |api| {
            Ok(MutationOutput::Login(api.login(&form)?))
        }))
    }

    /// Removes account `index` locally right away. The server-side logout is
    /// best effort and only attempted for accounts holding a token.
    pub fn logout(&mut self, index: usize) -> Result<Option<MutationId>> {
        let account = self
            .accounts
            .accounts()
            .get(index)
            .cloned()
            .ok_or(SessionError::AccountNotFound(index))?;
        let mutation = if account.is_logged_in() {
            let api = self.connector.connect(&account)?;
            let kind = MutationKind::Logout {
                instance: account.instance.clone(),
            };
            Some(self.start_mutation(kind, api, |api| {
                api.logout()?;
                Ok(MutationOutput::Done)
            }))
        } else {
            None
        };
        self.accounts.logout(index)?;
        self.accounts_changed()?;
        Ok(mutation)
    }

    fn accounts_changed(&mut self) -> Result<()> {
        let account = self.accounts.selected_account();
        self.api = self.connector.connect(account)?;
        self.prefixer = self.accounts.cache_prefixer();
        info!(
            instance = %account.instance,
            logged_in = account.is_logged_in(),
            "switched account"
        );
        self.persist_accounts();
        Ok(())
    }

    fn persist_accounts(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(err) = storage.save_accounts(self.accounts.accounts(), self.accounts.selected_index())
        {
            warn!(error = %format!("{err:#}"), "failed to persist accounts");
        }
    }

    // Infinite queries

    /// Returns the feed for `query`, starting its first page if nothing has
    /// loaded yet.
    pub fn posts_query(&mut self, query: &PostsQuery) -> &InfiniteQuery<PostsPage> {
        self.start_posts_fetch(query, FetchKind::Initial);
        self.posts_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(Pagination::Cursor))
    }

    pub fn posts_state(&self, query: &PostsQuery) -> Option<&InfiniteQuery<PostsPage>> {
        self.posts_queries.get(&(self.prefixer.clone(), query.clone()))
    }

    pub fn fetch_next_posts(&mut self, query: &PostsQuery) -> bool {
        self.start_posts_fetch(query, FetchKind::NextPage)
    }

    pub fn refetch_posts(&mut self, query: &PostsQuery) -> bool {
        self.start_posts_fetch(query, FetchKind::Refetch)
    }

    /// Loaded posts of `query` in page order, read through the post store.
    pub fn feed_posts(&self, query: &PostsQuery) -> Vec<&PostView> {
        let Some(state) = self.posts_state(query) else {
            return Vec::new();
        };
        state
            .data()
            .iter()
            .flat_map(|page| &page.posts)
            .filter_map(|key| self.stores.posts.get(key))
            .collect()
    }

    fn start_posts_fetch(&mut self, query: &PostsQuery, kind: FetchKind) -> bool {
        let request_id = self.next_request_id();
        let plan = self
            .posts_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(Pagination::Cursor))
            .begin(kind, request_id);
        let Some(plan) = plan else {
            return false;
        };
        let form = query.to_form(plan.token.as_ref(), self.options.page_limit);
        debug!(request_id, ?kind, community = ?query.community_name, "fetching posts");
        let query = query.clone();
        self.dispatch(
            request_id,
            Arc::clone(&self.api),
            move |api| api.get_posts(&form),
            move |envelope| Response::Posts(query, envelope),
        );
        true
    }

    pub fn comments_query(&mut self, query: &CommentsQuery) -> &InfiniteQuery<CommentsPage> {
        self.start_comments_fetch(query, FetchKind::Initial);
        self.comments_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(query.pagination))
    }

    pub fn comments_state(&self, query: &CommentsQuery) -> Option<&InfiniteQuery<CommentsPage>> {
        self.comments_queries
            .get(&(self.prefixer.clone(), query.clone()))
    }

    pub fn fetch_next_comments(&mut self, query: &CommentsQuery) -> bool {
        self.start_comments_fetch(query, FetchKind::NextPage)
    }

    pub fn refetch_comments(&mut self, query: &CommentsQuery) -> bool {
        self.start_comments_fetch(query, FetchKind::Refetch)
    }

    /// Nested thread built from every loaded page of `query`.
    pub fn comment_tree(
        &self,
        query: &CommentsQuery,
        focus: Option<&CommentPath>,
    ) -> CommentMap<&CommentView> {
        let comments = self
            .comments_state(query)
            .into_iter()
            .flat_map(|state| state.data())
            .flat_map(|page| &page.comments)
            .filter_map(|key| self.stores.comments.get(key));
        build_comment_map(comments, focus)
    }

    fn start_comments_fetch(&mut self, query: &CommentsQuery, kind: FetchKind) -> bool {
        let request_id = self.next_request_id();
        let plan = self
            .comments_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(query.pagination))
            .begin(kind, request_id);
        let Some(plan) = plan else {
            return false;
        };
        let form: GetComments = query.to_form(plan.token.as_ref(), self.options.page_limit);
        debug!(request_id, ?kind, post_id = ?query.post_id, "fetching comments");
        let query = query.clone();
        self.dispatch(
            request_id,
            Arc::clone(&self.api),
            move |api| api.get_comments(&form),
            move |envelope| Response::Comments(query, envelope),
        );
        true
    }

    /// Runs `query`, cancelling whichever different search was active.
    pub fn search(&mut self, query: &SearchQuery) -> &InfiniteQuery<SearchPage> {
        self.activate_search(query);
        self.start_search_fetch(query, FetchKind::Initial);
        self.search_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(Pagination::Cursor))
    }

    pub fn search_state(&self, query: &SearchQuery) -> Option<&InfiniteQuery<SearchPage>> {
        self.search_queries.get(&(self.prefixer.clone(), query.clone()))
    }

    pub fn fetch_next_search(&mut self, query: &SearchQuery) -> bool {
        self.activate_search(query);
        self.start_search_fetch(query, FetchKind::NextPage)
    }

    pub fn refetch_search(&mut self, query: &SearchQuery) -> bool {
        self.activate_search(query);
        self.start_search_fetch(query, FetchKind::Refetch)
    }

    fn activate_search(&mut self, query: &SearchQuery) {
        let key = (self.prefixer.clone(), query.clone());
        let Some(previous) = self.active_search.replace(key.clone()) else {
            return;
        };
        if previous == key {
            return;
        }
        if let Some(state) = self.search_queries.get_mut(&previous) {
            if let Some(request_id) = state.cancel() {
                self.outstanding.remove(&request_id);
                debug!(request_id, q = %previous.1.q, "cancelled superseded search");
            }
        }
    }

    fn start_search_fetch(&mut self, query: &SearchQuery, kind: FetchKind) -> bool {
        let request_id = self.next_request_id();
        let plan = self
            .search_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(Pagination::Cursor))
            .begin(kind, request_id);
        let Some(plan) = plan else {
            return false;
        };
        let form: Search = query.to_form(plan.token.as_ref(), self.options.page_limit);
        debug!(request_id, ?kind, q = %query.q, "searching");
        let cancel = plan.cancel;
        let query = query.clone();
        self.dispatch(
            request_id,
            Arc::clone(&self.api),
            move |api| {
                if cancel.load(Ordering::SeqCst) {
                    return Err(QueryError::Cancelled.into());
                }
                api.search(&form)
            },
            move |envelope| Response::Search(query, envelope),
        );
        true
    }

    pub fn replies_query(&mut self, query: &RepliesQuery) -> &InfiniteQuery<RepliesPage> {
        self.start_replies_fetch(query, FetchKind::Initial);
        self.replies_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(Pagination::PageNumber))
    }

    pub fn replies_state(&self, query: &RepliesQuery) -> Option<&InfiniteQuery<RepliesPage>> {
        self.replies_queries
            .get(&(self.prefixer.clone(), query.clone()))
    }

    pub fn fetch_next_replies(&mut self, query: &RepliesQuery) -> bool {
        self.start_replies_fetch(query, FetchKind::NextPage)
    }

    pub fn refetch_replies(&mut self, query: &RepliesQuery) -> bool {
        self.start_replies_fetch(query, FetchKind::Refetch)
    }

    fn start_replies_fetch(&mut self, query: &RepliesQuery, kind: FetchKind) -> bool {
        let request_id = self.next_request_id();
        let plan = self
            .replies_queries
            .entry((self.prefixer.clone(), query.clone()))
            .or_insert_with(|| InfiniteQuery::new(Pagination::PageNumber))
            .begin(kind, request_id);
        let Some(plan) = plan else {
            return false;
        };
        let form = query.to_form(plan.token.as_ref(), self.options.page_limit);
        debug!(request_id, ?kind, page = ?form.page, "fetching replies");
        let query = query.clone();
        self.dispatch(
            request_id,
            Arc::clone(&self.api),
            move |api| api.get_replies(&form),
            move |envelope| Response::Replies(query, envelope),
        );
        true
    }

    // Single lookups

    /// Cached post `id`, refreshed in the background once stale.
    pub fn post(&mut self, id: PostId) -> SingleQuery<PostView> {
        let key = (self.prefixer.clone(), id);
        let stale_time = self.options.stale_time;
        if self.post_lookups.entry(key.clone()).or_default().should_fetch(stale_time) {
            let request_id = self.next_request_id();
            debug!(request_id, post_id = id, "fetching post");
            let form = GetPost {
                id: Some(id),
                comment_id: None,
            };
            self.dispatch(
                request_id,
                Arc::clone(&self.api),
                move |api| api.get_post(&form),
                move |envelope| Response::Post(id, envelope),
            );
            if let Some(state) = self.post_lookups.get_mut(&key) {
                state.request_id = Some(request_id);
            }
        }
        let data = self
            .stores
            .posts
            .find(&key.0, |view| view.post.id == id)
            .map(|(_, view)| view.clone());
        snapshot(data, self.post_lookups.get(&key))
    }

    /// Cached community by `name` or `name@host`, refreshed once stale.
    pub fn community(&mut self, name: &str) -> SingleQuery<CommunityView> {
        let key = (self.prefixer.clone(), name.to_string());
        let stale_time = self.options.stale_time;
        if self
            .community_lookups
            .entry(key.clone())
            .or_default()
            .should_fetch(stale_time)
        {
            let request_id = self.next_request_id();
            debug!(request_id, community = name, "fetching community");
            let form = GetCommunity {
                id: None,
                name: Some(name.to_string()),
            };
            let name = name.to_string();
            self.dispatch(
                request_id,
                Arc::clone(&self.api),
                move |api| api.get_community(&form),
                move |envelope| Response::Community(name, envelope),
            );
            if let Some(state) = self.community_lookups.get_mut(&key) {
                state.request_id = Some(request_id);
            }
        }
        let wanted = self.qualified_name(name);
        let data = self
            .stores
            .communities
            .find(&key.0, |view| {
                names_match(&wanted, &view.community.slug(), view.community.local)
            })
            .map(|(_, view)| view.clone());
        snapshot(data, self.community_lookups.get(&key))
    }

    /// Cached profile by username; the refresh also loads the person's
    /// recent posts and comments into the stores.
    pub fn person(&mut self, name: &str) -> SingleQuery<PersonView> {
        let key = (self.prefixer.clone(), name.to_string());
        let stale_time = self.options.stale_time;
        if self
            .person_lookups
            .entry(key.clone())
            .or_default()
            .should_fetch(stale_time)
        {
            let request_id = self.next_request_id();
            debug!(request_id, person = name, "fetching person");
            let form = GetPersonDetails {
                username: Some(name.to_string()),
                limit: Some(self.options.page_limit),
                ..GetPersonDetails::default()
            };
            let name = name.to_string();
            self.dispatch(
                request_id,
                Arc::clone(&self.api),
                move |api| api.get_person_details(&form),
                move |envelope| Response::Person(name, envelope),
            );
            if let Some(state) = self.person_lookups.get_mut(&key) {
                state.request_id = Some(request_id);
            }
        }
        let wanted = self.qualified_name(name);
        let data = self
            .stores
            .profiles
            .find(&key.0, |view| {
                names_match(&wanted, &view.person.slug(), view.person.local)
            })
            .map(|(_, view)| view.clone());
        snapshot(data, self.person_lookups.get(&key))
    }

    /// Resolves a bare `name` against the selected account's instance, the
    /// way the server does. Names that already carry a host pass through.
    fn qualified_name(&self, name: &str) -> String {
        if name.contains('@') {
            return name.to_string();
        }
        match Url::parse(&self.accounts.selected_account().instance)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
        {
            Some(host) => format!("{name}@{host}"),
            None => name.to_string(),
        }
    }

    // Mutations

    pub fn mutation(&self, id: MutationId) -> Option<&MutationState> {
        self.mutations.get(&id)
    }

    pub fn vote_post(&mut self, target: &PostTarget, score: i32) -> MutationId {
        let score = score.clamp(-1, 1);
        let key = self.prefixer.key(&target.ap_id);
        let previous = self.stores.posts.get(&key).and_then(|view| view.my_vote);
        let at = self.stores.tick();
        self.stores
            .posts
            .patch(&key, at, |view| patch::vote_post(view, score));
        let form = CreatePostLike {
            post_id: target.id,
            score,
        };
        let kind = MutationKind::VotePost {
            target: target.clone(),
            previous,
            score,
        };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Post(api.like_post(&form)?.post_view))
        })
    }

    pub fn save_post(&mut self, target: &PostTarget, save: bool) -> MutationId {
        let key = self.prefixer.key(&target.ap_id);
        let at = self.stores.tick();
        self.stores.posts.patch(&key, at, |view| view.saved = save);
        let form = SavePost {
            post_id: target.id,
            save,
        };
        let kind = MutationKind::SavePost {
            target: target.clone(),
            save,
        };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Post(api.save_post(&form)?.post_view))
        })
    }

    pub fn mark_post_read(&mut self, target: &PostTarget, read: bool) -> MutationId {
        let key = self.prefixer.key(&target.ap_id);
        let at = self.stores.tick();
        self.stores.posts.patch(&key, at, |view| view.read = read);
        let form = MarkPostAsRead {
            post_ids: vec![target.id],
            read,
        };
        let kind = MutationKind::MarkPostRead {
            target: target.clone(),
            read,
        };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            api.mark_post_as_read(&form)?;
            Ok(MutationOutput::Done)
        })
    }

    pub fn vote_comment(&mut self, target: &CommentTarget, score: i32) -> MutationId {
        let score = score.clamp(-1, 1);
        let key = self.prefixer.key(&target.path);
        let previous = self.stores.comments.get(&key).and_then(|view| view.my_vote);
        let at = self.stores.tick();
        self.stores
            .comments
            .patch(&key, at, |view| patch::vote_comment(view, score));
        let form = CreateCommentLike {
            comment_id: target.id,
            score,
        };
        let kind = MutationKind::VoteComment {
            target: target.clone(),
            previous,
            score,
        };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Comment(api.like_comment(&form)?.comment_view))
        })
    }

    pub fn save_comment(&mut self, target: &CommentTarget, save: bool) -> MutationId {
        let key = self.prefixer.key(&target.path);
        let at = self.stores.tick();
        self.stores.comments.patch(&key, at, |view| view.saved = save);
        let form = SaveComment {
            comment_id: target.id,
            save,
        };
        let kind = MutationKind::SaveComment {
            target: target.clone(),
            save,
        };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Comment(api.save_comment(&form)?.comment_view))
        })
    }

    pub fn mark_reply_read(&mut self, reply_id: i64, read: bool) -> MutationId {
        let prefixer = self.prefixer.clone();
        self.set_reply_read(&prefixer, reply_id, read);
        let form = MarkCommentReplyAsRead {
            comment_reply_id: reply_id,
            read,
        };
        let kind = MutationKind::MarkReplyRead { reply_id, read };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Reply(
                api.mark_reply_as_read(&form)?.comment_reply_view,
            ))
        })
    }

    /// Mentions are not cached, so there is nothing to patch locally.
    pub fn mark_mention_read(&mut self, mention_id: i64, read: bool) -> MutationId {
        let form = MarkPersonMentionAsRead {
            person_mention_id: mention_id,
            read,
        };
        let kind = MutationKind::MarkMentionRead { mention_id, read };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            api.mark_mention_as_read(&form)?;
            Ok(MutationOutput::Done)
        })
    }

    pub fn create_comment(
        &mut self,
        post_id: PostId,
        parent_id: Option<CommentId>,
        content: impl Into<String>,
    ) -> MutationId {
        let form = CreateComment {
            content: content.into(),
            post_id,
            parent_id,
        };
        let kind = MutationKind::CreateComment { post_id, parent_id };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Comment(api.create_comment(&form)?.comment_view))
        })
    }

    pub fn edit_comment(&mut self, comment_id: CommentId, content: impl Into<String>) -> MutationId {
        let form = EditComment {
            comment_id,
            content: content.into(),
        };
        let kind = MutationKind::EditComment { comment_id };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Comment(api.edit_comment(&form)?.comment_view))
        })
    }

    pub fn delete_comment(&mut self, comment_id: CommentId, deleted: bool) -> MutationId {
        let form = DeleteComment {
            comment_id,
            deleted,
        };
        let kind = MutationKind::DeleteComment {
            comment_id,
            deleted,
        };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            Ok(MutationOutput::Comment(api.delete_comment(&form)?.comment_view))
        })
    }

    pub fn block_person(&mut self, person_id: PersonId, block: bool) -> MutationId {
        let form = BlockPerson { person_id, block };
        let kind = MutationKind::BlockPerson { person_id, block };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            let response = api.block_person(&form)?;
            let mut person_view = response.person_view;
            person_view.blocked = response.blocked;
            Ok(MutationOutput::Person(person_view))
        })
    }

    pub fn block_community(&mut self, community_id: CommunityId, block: bool) -> MutationId {
        let form = BlockCommunity {
            community_id,
            block,
        };
        let kind = MutationKind::BlockCommunity {
            community_id,
            block,
        };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            let response = api.block_community(&form)?;
            let mut community_view = response.community_view;
            community_view.blocked = response.blocked;
            Ok(MutationOutput::Community(community_view))
        })
    }

    pub fn report_post(&mut self, post_id: PostId, reason: impl Into<String>) -> MutationId {
        let form = CreatePostReport {
            post_id,
            reason: reason.into(),
        };
        let kind = MutationKind::ReportPost { post_id };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            api.create_post_report(&form)?;
            Ok(MutationOutput::Done)
        })
    }

    pub fn report_comment(&mut self, comment_id: CommentId, reason: impl Into<String>) -> MutationId {
        let form = CreateCommentReport {
            comment_id,
            reason: reason.into(),
        };
        let kind = MutationKind::ReportComment { comment_id };
        self.start_mutation(kind, Arc::clone(&self.api), move |api| {
            api.create_comment_report(&form)?;
            Ok(MutationOutput::Done)
        })
    }

    /// Undoes the local patch of a failed optimistic mutation. Returns
    /// whether anything was reverted; pending, successful and non-optimistic
    /// mutations are left alone.
    pub fn revert(&mut self, id: MutationId) -> Result<bool, QueryError> {
        let state = self
            .mutations
            .get(&id)
            .ok_or(QueryError::UnknownMutation(id))?;
        if !matches!(state.status, MutationStatus::Error(_)) {
            return Ok(false);
        }
        let kind = state.kind.clone();
        let prefixer = state.prefixer.clone();
        let at = self.stores.tick();
        let reverted = match kind {
            MutationKind::VotePost {
                target, previous, ..
            } => {
                let previous = patch::vote_value(previous);
                self.stores.posts.patch(&prefixer.key(&target.ap_id), at, |view| {
                    patch::vote_post(view, previous)
                })
            }
            MutationKind::SavePost { target, save } => self
                .stores
                .posts
                .patch(&prefixer.key(&target.ap_id), at, |view| view.saved = !save),
            MutationKind::MarkPostRead { target, read } => self
                .stores
                .posts
                .patch(&prefixer.key(&target.ap_id), at, |view| view.read = !read),
            MutationKind::VoteComment {
                target, previous, ..
            } => {
                let previous = patch::vote_value(previous);
                self.stores.comments.patch(&prefixer.key(&target.path), at, |view| {
                    patch::vote_comment(view, previous)
                })
            }
            MutationKind::SaveComment { target, save } => self
                .stores
                .comments
                .patch(&prefixer.key(&target.path), at, |view| view.saved = !save),
            MutationKind::MarkReplyRead { reply_id, read } => {
                self.set_reply_read(&prefixer, reply_id, !read) > 0
            }
            _ => false,
        };
        if reverted {
            debug!(mutation_id = id, "reverted optimistic update");
            if let Some(state) = self.mutations.get_mut(&id) {
                state.status = MutationStatus::Reverted;
            }
        }
        Ok(reverted)
    }

    fn start_mutation<J>(&mut self, kind: MutationKind, api: Arc<dyn LemmyApi>, job: J) -> MutationId
    where
        J: FnOnce(&dyn LemmyApi) -> Result<MutationOutput> + Send + 'static,
    {
        let id = self.next_request_id();
        debug!(mutation_id = id, ?kind, "dispatching mutation");
        self.mutations.insert(
            id,
            MutationState {
                kind,
                status: MutationStatus::Pending,
                prefixer: self.prefixer.clone(),
            },
        );
        self.dispatch(id, api, job, Response::Mutation);
        id
    }

    fn set_reply_read(&mut self, prefixer: &CachePrefixer, reply_id: i64, read: bool) -> usize {
        let mut patched = 0;
        for ((scope, _), state) in self.replies_queries.iter_mut() {
            if scope != prefixer {
                continue;
            }
            state.update_pages(|page| {
                for reply in &mut page.replies {
                    if reply.comment_reply.id == reply_id {
                        reply.comment_reply.read = read;
                        patched += 1;
                    }
                }
            });
        }
        patched
    }

    // Response handling

    /// Applies every response that has arrived so far without blocking.
    pub fn process_responses(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(response, &mut events);
        }
        events
    }

    /// Blocks until every outstanding request has been applied.
    pub fn wait_for_idle(&mut self, timeout: Duration) -> Result<Vec<ClientEvent>, QueryError> {
        let deadline = Instant::now() + timeout;
        let mut events = self.process_responses();
        while !self.outstanding.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => self.handle_response(response, &mut events),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(QueryError::Timeout(self.outstanding.len()))
                }
                Err(RecvTimeoutError::Disconnected) => return Err(QueryError::Disconnected),
            }
        }
        Ok(events)
    }

    /// Drops every cached entity and query. In-flight fetches are discarded
    /// when they land; in-flight mutations still settle.
    pub fn clear_cache(&mut self) {
        self.stores.clear();
        self.posts_queries.clear();
        self.comments_queries.clear();
        self.search_queries.clear();
        self.replies_queries.clear();
        self.active_search = None;
        self.post_lookups.clear();
        self.community_lookups.clear();
        self.person_lookups.clear();
        info!("cache cleared");
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn dispatch<T, J, W>(&mut self, request_id: RequestId, api: Arc<dyn LemmyApi>, job: J, wrap: W)
    where
        T: Send + 'static,
        J: FnOnce(&dyn LemmyApi) -> Result<T> + Send + 'static,
        W: FnOnce(Envelope<T>) -> Response + Send + 'static,
    {
        let issued_at = self.stores.tick();
        let prefixer = self.prefixer.clone();
        let tx = self.response_tx.clone();
        self.outstanding.insert(request_id);
        thread::spawn(move || {
            let result = job(api.as_ref());
            let _ = tx.send(wrap(Envelope {
                request_id,
                issued_at,
                prefixer,
                result,
            }));
        });
    }

    fn handle_response(&mut self, response: Response, events: &mut Vec<ClientEvent>) {
        self.outstanding.remove(&response.request_id());
        let event = match response {
            Response::Posts(query, envelope) => self.apply_posts(query, envelope),
            Response::Comments(query, envelope) => self.apply_comments(query, envelope),
            Response::Search(query, envelope) => self.apply_search(query, envelope),
            Response::Replies(query, envelope) => self.apply_replies(query, envelope),
            Response::Post(id, envelope) => self.apply_post(id, envelope),
            Response::Community(name, envelope) => self.apply_community(name, envelope),
            Response::Person(name, envelope) => self.apply_person(name, envelope),
            Response::Mutation(envelope) => {
                self.apply_mutation(envelope, events);
                return;
            }
        };
        events.extend(event);
    }

    fn apply_posts(
        &mut self,
        query: PostsQuery,
        envelope: Envelope<GetPostsResponse>,
    ) -> Option<ClientEvent> {
        let Envelope {
            request_id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let key = (prefixer, query);
        if !self
            .posts_queries
            .get(&key)
            .is_some_and(|state| state.is_current(request_id))
        {
            debug!(request_id, "dropping stale posts response");
            return None;
        }
        let outcome = match result {
            Ok(response) => {
                let posts = self.stores.populate_posts(&key.0, &response.posts, issued_at);
                Ok(PageOutcome {
                    item_count: posts.len(),
                    page: PostsPage { posts },
                    cursor: response.next_page,
                })
            }
            Err(err) => Err(format!("{err:#}")),
        };
        let event = page_event(QueryKind::Posts(key.1.clone()), &outcome);
        if let Some(state) = self.posts_queries.get_mut(&key) {
            state.complete(request_id, outcome);
        }
        Some(event)
    }

    fn apply_comments(
        &mut self,
        query: CommentsQuery,
        envelope: Envelope<GetCommentsResponse>,
    ) -> Option<ClientEvent> {
        let Envelope {
            request_id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let key = (prefixer, query);
        if !self
            .comments_queries
            .get(&key)
            .is_some_and(|state| state.is_current(request_id))
        {
            debug!(request_id, "dropping stale comments response");
            return None;
        }
        let outcome = match result {
            Ok(response) => {
                let comments = self
                    .stores
                    .populate_comments(&key.0, &response.comments, issued_at);
                Ok(PageOutcome {
                    item_count: comments.len(),
                    page: CommentsPage { comments },
                    cursor: response.next_page,
                })
            }
            Err(err) => Err(format!("{err:#}")),
        };
        let event = page_event(QueryKind::Comments(key.1.clone()), &outcome);
        if let Some(state) = self.comments_queries.get_mut(&key) {
            state.complete(request_id, outcome);
        }
        Some(event)
    }

    fn apply_search(
        &mut self,
        query: SearchQuery,
        envelope: Envelope<SearchResponse>,
    ) -> Option<ClientEvent> {
        let Envelope {
            request_id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let key = (prefixer, query);
        if !self
            .search_queries
            .get(&key)
            .is_some_and(|state| state.is_current(request_id))
        {
            debug!(request_id, q = %key.1.q, "dropping superseded search response");
            return None;
        }
        let outcome = match result {
            Ok(response) => {
                let page = SearchPage {
                    posts: self.stores.populate_posts(&key.0, &response.posts, issued_at),
                    comments: self
                        .stores
                        .populate_comments(&key.0, &response.comments, issued_at),
                    communities: self
                        .stores
                        .populate_communities(&key.0, &response.communities, issued_at),
                    users: self
                        .stores
                        .populate_profiles(&key.0, &response.users, issued_at),
                };
                Ok(PageOutcome {
                    item_count: page.posts.len()
                        + page.comments.len()
                        + page.communities.len()
                        + page.users.len(),
                    page,
                    cursor: response.next_page,
                })
            }
            Err(err) => Err(format!("{err:#}")),
        };
        let event = page_event(QueryKind::Search(key.1.clone()), &outcome);
        if let Some(state) = self.search_queries.get_mut(&key) {
            state.complete(request_id, outcome);
        }
        Some(event)
    }

    fn apply_replies(
        &mut self,
        query: RepliesQuery,
        envelope: Envelope<GetRepliesResponse>,
    ) -> Option<ClientEvent> {
        let Envelope {
            request_id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let key = (prefixer, query);
        if !self
            .replies_queries
            .get(&key)
            .is_some_and(|state| state.is_current(request_id))
        {
            debug!(request_id, "dropping stale replies response");
            return None;
        }
        let outcome = match result {
            Ok(response) => {
                let comments: Vec<CommentView> = response
                    .replies
                    .iter()
                    .map(CommentReplyView::to_comment_view)
                    .collect();
                self.stores.populate_comments(&key.0, &comments, issued_at);
                Ok(PageOutcome {
                    item_count: response.replies.len(),
                    page: RepliesPage {
                        replies: response.replies,
                    },
                    cursor: None,
                })
            }
            Err(err) => Err(format!("{err:#}")),
        };
        let event = page_event(QueryKind::Replies(key.1.clone()), &outcome);
        if let Some(state) = self.replies_queries.get_mut(&key) {
            state.complete(request_id, outcome);
        }
        Some(event)
    }

    fn apply_post(&mut self, id: PostId, envelope: Envelope<GetPostResponse>) -> Option<ClientEvent> {
        let Envelope {
            request_id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let key = (prefixer, id);
        if self.post_lookups.get(&key)?.request_id != Some(request_id) {
            return None;
        }
        let outcome = result
            .map(|response| {
                self.stores
                    .populate_posts(&key.0, [&response.post_view], issued_at);
                self.stores
                    .populate_posts(&key.0, &response.cross_posts, issued_at);
                self.stores
                    .populate_communities(&key.0, [&response.community_view], issued_at);
            })
            .map_err(|err| format!("{err:#}"));
        if let Some(state) = self.post_lookups.get_mut(&key) {
            state.finish(&outcome);
        }
        Some(single_event(QueryKind::Post(id), outcome))
    }

    fn apply_community(
        &mut self,
        name: String,
        envelope: Envelope<GetCommunityResponse>,
    ) -> Option<ClientEvent> {
        let Envelope {
            request_id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let key = (prefixer, name);
        if self.community_lookups.get(&key)?.request_id != Some(request_id) {
            return None;
        }
        let outcome = result
            .map(|response| {
                self.stores
                    .populate_communities(&key.0, [&response.community_view], issued_at);
            })
            .map_err(|err| format!("{err:#}"));
        if let Some(state) = self.community_lookups.get_mut(&key) {
            state.finish(&outcome);
        }
        Some(single_event(QueryKind::Community(key.1), outcome))
    }

    fn apply_person(
        &mut self,
        name: String,
        envelope: Envelope<GetPersonDetailsResponse>,
    ) -> Option<ClientEvent> {
        let Envelope {
            request_id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let key = (prefixer, name);
        if self.person_lookups.get(&key)?.request_id != Some(request_id) {
            return None;
        }
        let outcome = result
            .map(|response| {
                self.stores
                    .populate_profiles(&key.0, [&response.person_view], issued_at);
                self.stores.populate_posts(&key.0, &response.posts, issued_at);
                self.stores
                    .populate_comments(&key.0, &response.comments, issued_at);
            })
            .map_err(|err| format!("{err:#}"));
        if let Some(state) = self.person_lookups.get_mut(&key) {
            state.finish(&outcome);
        }
        Some(single_event(QueryKind::Person(key.1), outcome))
    }

    fn apply_mutation(&mut self, envelope: Envelope<MutationOutput>, events: &mut Vec<ClientEvent>) {
        let Envelope {
            request_id: id,
            issued_at,
            prefixer,
            result,
        } = envelope;
        let Some(kind) = self.mutations.get(&id).map(|state| state.kind.clone()) else {
            return;
        };
        let applied = result.and_then(|output| {
            self.apply_mutation_output(&kind, &prefixer, issued_at, output, events)
        });
        let status = match applied {
            Ok(()) => MutationStatus::Success,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(mutation_id = id, ?kind, error = %message, "mutation failed");
                MutationStatus::Error(message)
            }
        };
        events.push(ClientEvent::MutationSettled {
            id,
            error: match &status {
                MutationStatus::Error(message) => Some(message.clone()),
                _ => None,
            },
        });
        if let Some(state) = self.mutations.get_mut(&id) {
            state.status = status;
        }
    }

    fn apply_mutation_output(
        &mut self,
        kind: &MutationKind,
        prefixer: &CachePrefixer,
        issued_at: Tick,
        output: MutationOutput,
        events: &mut Vec<ClientEvent>,
    ) -> Result<()> {
        match output {
            MutationOutput::Post(view) => {
                let key = store::post_key(prefixer, &view);
                self.stores.posts.overwrite(key, view, issued_at);
            }
            MutationOutput::Comment(view) => {
                let key = store::comment_key(prefixer, &view);
                match kind {
                    MutationKind::CreateComment { .. } => {
                        self.attach_new_comment(prefixer, &key, &view);
                        let at = self.stores.tick();
                        self.stores.comments.overwrite(key, view, at);
                    }
                    // Confirmed content wins over any vote or save patched
                    // since dispatch; those fields are left as patched.
                    MutationKind::EditComment { .. } | MutationKind::DeleteComment { .. } => {
                        let at = self.stores.tick();
                        let body = view.comment.clone();
                        if !self
                            .stores
                            .comments
                            .patch(&key, at, |cached| cached.comment = body)
                        {
                            self.stores.comments.overwrite(key, view, at);
                        }
                    }
                    _ => {
                        self.stores.comments.overwrite(key, view, issued_at);
                    }
                }
            }
            MutationOutput::Person(view) => {
                let at = self.stores.tick();
                let person_id = view.person.id;
                let blocked = view.blocked;
                self.stores.posts.patch_where(
                    prefixer,
                    at,
                    |post| post.creator.id == person_id,
                    |post| post.creator_blocked = blocked,
                );
                self.stores.comments.patch_where(
                    prefixer,
                    at,
                    |comment| comment.creator.id == person_id,
                    |comment| comment.creator_blocked = blocked,
                );
                let key = store::profile_key(prefixer, &view);
                self.stores.profiles.overwrite(key, view, at);
            }
            MutationOutput::Community(view) => {
                let key = store::community_key(prefixer, &view);
                self.stores.communities.overwrite(key, view, issued_at);
            }
            MutationOutput::Reply(view) => {
                self.set_reply_read(prefixer, view.comment_reply.id, view.comment_reply.read);
            }
            MutationOutput::Login(response) => {
                self.finish_login(kind, response)?;
                events.push(ClientEvent::AccountsChanged);
            }
            MutationOutput::Done => {
                if let MutationKind::Logout { instance } = kind {
                    info!(%instance, "logged out on server");
                }
            }
        }
        Ok(())
    }

    /// Bumps the parent counters and appends the new comment to the first
    /// page of every loaded comments query for its post.
    fn attach_new_comment(&mut self, prefixer: &CachePrefixer, key: &CacheKey, view: &CommentView) {
        let at = self.stores.tick();
        let post_id = view.comment.post_id;
        self.stores.posts.patch_where(
            prefixer,
            at,
            |post| post.post.id == post_id,
            |post| post.counts.comments += 1,
        );
        if let Some(parent) = CommentPath::parse(&view.comment.path).and_then(|path| path.parent()) {
            self.stores
                .comments
                .patch(&prefixer.key(&parent.to_string()), at, |comment| {
                    comment.counts.child_count += 1
                });
        }
        for ((scope, query), state) in self.comments_queries.iter_mut() {
            if scope != prefixer || query.post_id != Some(post_id) {
                continue;
            }
            if state.data().iter().any(|page| page.comments.contains(key)) {
                continue;
            }
            let mut attached = false;
            state.update_pages(|page| {
                if !attached {
                    page.comments.push(key.clone());
                    attached = true;
                }
            });
        }
    }

    fn finish_login(&mut self, kind: &MutationKind, response: LoginResponse) -> Result<()> {
        let MutationKind::Login { instance, username } = kind else {
            return Ok(());
        };
        let jwt = response.jwt.filter(|jwt| !jwt.is_empty()).ok_or_else(|| {
            if response.verify_email_sent {
                anyhow!("login requires email verification")
            } else {
                anyhow!("login returned no token")
            }
        })?;
        if self.accounts.is_logged_in() {
            self.accounts.add_account(Account {
                jwt: Some(jwt),
                username: Some(username.clone()),
                ..Account::new(instance)
            });
        } else {
            self.accounts.update_selected_account(AccountUpdate {
                instance: Some(instance.clone()),
                jwt: Some(Some(jwt)),
                username: Some(Some(username.clone())),
            });
        }
        info!(%instance, %username, "logged in");
        self.accounts_changed()
    }
}

/// `wanted` is `name@host`, or a bare name when the instance has no host; a
/// bare name only matches local actors.
fn names_match(wanted: &str, slug: &str, local: bool) -> bool {
    if wanted.contains('@') {
        wanted == slug
    } else {
        local && slug.split('@').next() == Some(wanted)
    }
}

fn snapshot<T>(data: Option<T>, state: Option<&SingleState>) -> SingleQuery<T> {
    SingleQuery {
        data,
        is_fetching: state.is_some_and(|state| state.request_id.is_some()),
        error: state.and_then(|state| state.error.clone()),
    }
}

fn page_event<P>(query: QueryKind, outcome: &Result<PageOutcome<P>, String>) -> ClientEvent {
    match outcome {
        Ok(_) => ClientEvent::QueryLoaded(query),
        Err(error) => {
            warn!(?query, %error, "query failed");
            ClientEvent::QueryFailed {
                query,
                error: error.clone(),
            }
        }
    }
}

fn single_event(query: QueryKind, outcome: Result<(), String>) -> ClientEvent {
    match outcome {
        Ok(()) => ClientEvent::QueryLoaded(query),
        Err(error) => {
            warn!(?query, %error, "lookup failed");
            ClientEvent::QueryFailed { query, error }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockApi, MockConnector};
    use crate::fixtures;
    use crate::session::DEFAULT_INSTANCE;

    const WAIT: Duration = Duration::from_secs(5);

    fn client(api: &MockApi) -> QueryClient {
        QueryClient::new(
            MockConnector::new(api.clone()),
            AccountStore::new(DEFAULT_INSTANCE),
            ClientOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn request_ids_are_monotonic() {
        let api = MockApi::new();
        let mut client = client(&api);
        let first = client.report_post(1, "spam");
        let second = client.report_post(2, "spam");
        assert!(second > first);
        client.wait_for_idle(WAIT).unwrap();
        assert_eq!(client.mutation(first).unwrap().status, MutationStatus::Success);
    }

    #[test]
    fn revert_only_applies_to_failed_optimistic_mutations() {
        let api = MockApi::new();
        api.seed_post(fixtures::post_view(1, DEFAULT_INSTANCE));
        let mut client = client(&api);
        let id = client.save_post(&PostTarget::from(&fixtures::post_view(1, DEFAULT_INSTANCE)), true);
        client.wait_for_idle(WAIT).unwrap();
        assert_eq!(client.revert(id), Ok(false));
        assert_eq!(client.revert(999), Err(QueryError::UnknownMutation(999)));
    }

    #[test]
    fn new_comment_already_on_a_later_page_is_not_added_again() {
        let api = MockApi::new();
        let mut client = client(&api);
        let prefixer = client.prefixer.clone();
        let reply = fixtures::comment_view(11, "0.10.11", 1);
        let key = store::comment_key(&prefixer, &reply);

        let mut thread = InfiniteQuery::new(Pagination::Cursor);
        thread.begin(FetchKind::Initial, 1).unwrap();
        thread.complete(
            1,
            Ok(PageOutcome {
                page: CommentsPage {
                    comments: vec![prefixer.key("0.10")],
                },
                cursor: Some("2".into()),
                item_count: 1,
            }),
        );
        thread.begin(FetchKind::NextPage, 2).unwrap();
        thread.complete(
            2,
            Ok(PageOutcome {
                page: CommentsPage {
                    comments: vec![key.clone()],
                },
                cursor: None,
                item_count: 1,
            }),
        );
        client
            .comments_queries
            .insert((prefixer.clone(), CommentsQuery::post(1)), thread);

        client.attach_new_comment(&prefixer, &key, &reply);
        let pages = client.comments_queries[&(prefixer, CommentsQuery::post(1))].data();
        let copies = pages
            .iter()
            .flat_map(|page| &page.comments)
            .filter(|cached| **cached == key)
            .count();
        assert_eq!(copies, 1);
        assert_eq!(pages[0].comments.len(), 1);
    }

    #[test]
    fn logout_of_anonymous_account_skips_server() {
        let api = MockApi::new();
        let mut client = client(&api);
        assert_eq!(client.logout(0).unwrap(), None);
        assert!(api.calls().is_empty());
        assert!(client.logout(4).is_err());
    }

    #[test]
    fn wait_for_idle_with_nothing_outstanding_returns_immediately() {
        let api = MockApi::new();
        let mut client = client(&api);
        assert!(client.is_idle());
        assert_eq!(client.wait_for_idle(Duration::ZERO), Ok(Vec::new()));
    }
}
