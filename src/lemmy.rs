use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const API_PREFIX: &str = "api/v3/";

pub type PostId = i64;
pub type CommentId = i64;
pub type CommunityId = i64;
pub type PersonId = i64;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("lemmy: unauthorized")]
    Unauthorized,
    #[error("lemmy: forbidden: {0}")]
    Forbidden(String),
    #[error("lemmy: rate limited: {0}")]
    RateLimited(String),
    #[error("lemmy: api error {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub instance: String,
    pub jwt: Option<String>,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    jwt: Option<String>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("lemmy client user agent required");
        }
        let instance = config.instance.trim().trim_end_matches('/');
        if instance.is_empty() {
            bail!("lemmy client instance required");
        }
        let base_url = Url::parse(&format!("{instance}/"))
            .with_context(|| format!("lemmy: invalid instance url {instance}"))?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            jwt: config.jwt.filter(|jwt| !jwt.is_empty()),
        })
    }

    pub fn instance(&self) -> &Url {
        &self.base_url
    }

    pub fn get_posts(&self, form: &GetPosts) -> Result<GetPostsResponse> {
        self.get("post/list", form)
    }

    pub fn get_post(&self, form: &GetPost) -> Result<GetPostResponse> {
        self.get("post", form)
    }

    pub fn get_comments(&self, form: &GetComments) -> Result<GetCommentsResponse> {
        self.get("comment/list", form)
    }

    pub fn get_community(&self, form: &GetCommunity) -> Result<GetCommunityResponse> {
        self.get("community", form)
    }

    pub fn get_person_details(&self, form: &GetPersonDetails) -> Result<GetPersonDetailsResponse> {
        self.get("user", form)
    }

    pub fn get_replies(&self, form: &GetReplies) -> Result<GetRepliesResponse> {
        self.get("user/replies", form)
    }

    pub fn search(&self, form: &Search) -> Result<SearchResponse> {
        self.get("search", form)
    }

    pub fn like_post(&self, form: &CreatePostLike) -> Result<PostResponse> {
        if !(-1..=1).contains(&form.score) {
            bail!("lemmy: vote score must be -1, 0, or 1");
        }
        self.send(reqwest::Method::POST, "post/like", form)
    }

    pub fn save_post(&self, form: &SavePost) -> Result<PostResponse> {
        self.send(reqwest::Method::PUT, "post/save", form)
    }

    pub fn mark_post_as_read(&self, form: &MarkPostAsRead) -> Result<SuccessResponse> {
        self.send(reqwest::Method::POST, "post/mark_as_read", form)
    }

    pub fn like_comment(&self, form: &CreateCommentLike) -> Result<CommentResponse> {
        if !(-1..=1).contains(&form.score) {
            bail!("lemmy: vote score must be -1, 0, or 1");
        }
        self.send(reqwest::Method::POST, "comment/like", form)
    }

    pub fn save_comment(&self, form: &SaveComment) -> Result<CommentResponse> {
        self.send(reqwest::Method::PUT, "comment/save", form)
    }

    pub fn create_comment(&self, form: &CreateComment) -> Result<CommentResponse> {
        if form.content.trim().is_empty() {
            bail!("lemmy: comment content is required");
        }
        self.send(reqwest::Method::POST, "comment", form)
    }

    pub fn edit_comment(&self, form: &EditComment) -> Result<CommentResponse> {
        self.send(reqwest::Method::PUT, "comment", form)
    }

    pub fn delete_comment(&self, form: &DeleteComment) -> Result<CommentResponse> {
        self.send(reqwest::Method::POST, "comment/delete", form)
    }

    pub fn block_person(&self, form: &BlockPerson) -> Result<BlockPersonResponse> {
        self.send(reqwest::Method::POST, "user/block", form)
    }

    pub fn block_community(&self, form: &BlockCommunity) -> Result<BlockCommunityResponse> {
        self.send(reqwest::Method::POST, "community/block", form)
    }

    pub fn mark_reply_as_read(&self, form: &MarkCommentReplyAsRead) -> Result<CommentReplyResponse> {
        self.send(reqwest::Method::POST, "comment/mark_as_read", form)
    }

    pub fn mark_mention_as_read(
        &self,
        form: &MarkPersonMentionAsRead,
    ) -> Result<PersonMentionResponse> {
        self.send(reqwest::Method::POST, "user/mention/mark_as_read", form)
    }

    pub fn create_post_report(&self, form: &CreatePostReport) -> Result<serde_json::Value> {
        if form.reason.trim().is_empty() {
            bail!("lemmy: report reason is required");
        }
        self.send(reqwest::Method::POST, "post/report", form)
    }

    pub fn create_comment_report(&self, form: &CreateCommentReport) -> Result<serde_json::Value> {
        if form.reason.trim().is_empty() {
            bail!("lemmy: report reason is required");
        }
        self.send(reqwest::Method::POST, "comment/report", form)
    }

    pub fn login(&self, form: &Login) -> Result<LoginResponse> {
        if form.username_or_email.trim().is_empty() {
            bail!("lemmy: username is required");
        }
        self.send(reqwest::Method::POST, "user/login", form)
    }

    pub fn logout(&self) -> Result<SuccessResponse> {
        self.send(reqwest::Method::POST, "user/logout", &serde_json::json!({}))
    }

    fn get<Q, T>(&self, path: &str, query: &Q) -> Result<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let req = self.http.get(url).query(query);
        let resp = self.execute(req)?;
        resp.json()
            .with_context(|| format!("lemmy: decode response from {path}"))
    }

    fn send<B, T>(&self, method: reqwest::Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let req = self.http.request(method, url).json(body);
        let resp = self.execute(req)?;
        resp.json()
            .with_context(|| format!("lemmy: decode response from {path}"))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let url = self.base_url.join(API_PREFIX)?.join(path)?;
        Ok(url)
    }

    fn execute(&self, mut req: RequestBuilder) -> Result<Response> {
        req = req.header(USER_AGENT, self.user_agent.clone());
        if let Some(jwt) = &self.jwt {
            req = req.header(AUTHORIZATION, format!("Bearer {jwt}"));
        }

        let resp = req.send()?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        let err = match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(body),
            429 => ApiError::RateLimited(body),
            code => ApiError::Status { status: code, body },
        };
        Err(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortType {
    Active,
    #[default]
    Hot,
    New,
    Old,
    TopDay,
    TopWeek,
    TopMonth,
    TopYear,
    TopAll,
    MostComments,
    NewComments,
    Controversial,
    Scaled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CommentSortType {
    #[default]
    Hot,
    Top,
    New,
    Old,
    Controversial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ListingType {
    #[default]
    All,
    Local,
    Subscribed,
    ModeratorView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SearchType {
    #[default]
    All,
    Comments,
    Posts,
    Communities,
    Users,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SubscribedType {
    Subscribed,
    #[default]
    NotSubscribed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub actor_id: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub bot_account: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub actor_id: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

impl Community {
    /// `name@host`, the form used to address a community across instances.
    pub fn slug(&self) -> String {
        actor_slug(&self.name, &self.actor_id)
    }
}

impl Person {
    pub fn slug(&self) -> String {
        actor_slug(&self.name, &self.actor_id)
    }
}

fn actor_slug(name: &str, actor_id: &str) -> String {
    match Url::parse(actor_id)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
    {
        Some(host) => format!("{name}@{host}"),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub creator_id: PersonId,
    pub community_id: CommunityId,
    pub ap_id: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub featured_community: bool,
    #[serde(default)]
    pub featured_local: bool,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostAggregates {
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub post: Post,
    pub creator: Person,
    pub community: Community,
    #[serde(default)]
    pub counts: PostAggregates,
    #[serde(default)]
    pub subscribed: SubscribedType,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub creator_blocked: bool,
    #[serde(default)]
    pub my_vote: Option<i32>,
    #[serde(default)]
    pub unread_comments: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub creator_id: PersonId,
    pub post_id: PostId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub distinguished: bool,
    pub ap_id: String,
    #[serde(default)]
    pub local: bool,
    pub path: String,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentAggregates {
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub child_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentView {
    pub comment: Comment,
    pub creator: Person,
    pub post: Post,
    pub community: Community,
    #[serde(default)]
    pub counts: CommentAggregates,
    #[serde(default)]
    pub creator_banned_from_community: bool,
    #[serde(default)]
    pub subscribed: SubscribedType,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub creator_blocked: bool,
    #[serde(default)]
    pub my_vote: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityAggregates {
    #[serde(default)]
    pub subscribers: i64,
    #[serde(default)]
    pub posts: i64,
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub users_active_month: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityView {
    pub community: Community,
    #[serde(default)]
    pub subscribed: SubscribedType,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub counts: CommunityAggregates,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonAggregates {
    #[serde(default)]
    pub post_count: i64,
    #[serde(default)]
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonView {
    pub person: Person,
    #[serde(default)]
    pub counts: PersonAggregates,
    #[serde(default)]
    pub is_admin: bool,
    /// Client-maintained; Lemmy reports blocks on the block response only.
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentReply {
    pub id: i64,
    pub recipient_id: PersonId,
    pub comment_id: CommentId,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentReplyView {
    pub comment_reply: CommentReply,
    pub comment: Comment,
    pub creator: Person,
    pub post: Post,
    pub community: Community,
    #[serde(default)]
    pub counts: CommentAggregates,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub creator_blocked: bool,
    #[serde(default)]
    pub my_vote: Option<i32>,
}

impl CommentReplyView {
    pub fn to_comment_view(&self) -> CommentView {
        CommentView {
            comment: self.comment.clone(),
            creator: self.creator.clone(),
            post: self.post.clone(),
            community: self.community.clone(),
            counts: self.counts.clone(),
            creator_banned_from_community: false,
            subscribed: SubscribedType::default(),
            saved: self.saved,
            creator_blocked: self.creator_blocked,
            my_vote: self.my_vote,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GetPosts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<ListingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPostsResponse {
    pub posts: Vec<PostView>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetPost {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PostId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<CommentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPostResponse {
    pub post_view: PostView,
    pub community_view: CommunityView,
    #[serde(default)]
    pub cross_posts: Vec<PostView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetComments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<ListingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<CommentSortType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_only: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCommentsResponse {
    pub comments: Vec<CommentView>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetCommunity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CommunityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCommunityResponse {
    pub community_view: CommunityView,
    #[serde(default)]
    pub moderators: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetPersonDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<PersonId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPersonDetailsResponse {
    pub person_view: PersonView,
    #[serde(default)]
    pub comments: Vec<CommentView>,
    #[serde(default)]
    pub posts: Vec<PostView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetReplies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<CommentSortType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_only: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRepliesResponse {
    pub replies: Vec<CommentReplyView>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Search {
    pub q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<SearchType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<ListingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub comments: Vec<CommentView>,
    #[serde(default)]
    pub posts: Vec<PostView>,
    #[serde(default)]
    pub communities: Vec<CommunityView>,
    #[serde(default)]
    pub users: Vec<PersonView>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostLike {
    pub post_id: PostId,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePost {
    pub post_id: PostId,
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPostAsRead {
    pub post_ids: Vec<PostId>,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResponse {
    pub post_view: PostView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommentLike {
    pub comment_id: CommentId,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveComment {
    pub comment_id: CommentId,
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateComment {
    pub content: String,
    pub post_id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditComment {
    pub comment_id: CommentId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteComment {
    pub comment_id: CommentId,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment_view: CommentView,
    #[serde(default)]
    pub recipient_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPerson {
    pub person_id: PersonId,
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPersonResponse {
    pub person_view: PersonView,
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockCommunity {
    pub community_id: CommunityId,
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockCommunityResponse {
    pub community_view: CommunityView,
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkCommentReplyAsRead {
    pub comment_reply_id: i64,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentReplyResponse {
    pub comment_reply_view: CommentReplyView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPersonMentionAsRead {
    pub person_mention_id: i64,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonMentionResponse {
    pub person_mention_view: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostReport {
    pub post_id: PostId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommentReport {
    pub comment_id: CommentId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub username_or_email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_2fa_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub registration_created: bool,
    #[serde(default)]
    pub verify_email_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
