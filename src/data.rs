use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;

use crate::lemmy::{self, *};
use crate::session::Account;

/// Remote operations the cache layer consumes. Implemented over HTTP by
/// [`lemmy::Client`] and in memory by [`MockApi`].
pub trait LemmyApi: Send + Sync {
    fn get_posts(&self, form: &GetPosts) -> Result<GetPostsResponse>;
    fn get_post(&self, form: &GetPost) -> Result<GetPostResponse>;
    fn get_comments(&self, form: &GetComments) -> Result<GetCommentsResponse>;
    fn get_community(&self, form: &GetCommunity) -> Result<GetCommunityResponse>;
    fn get_person_details(&self, form: &GetPersonDetails) -> Result<GetPersonDetailsResponse>;
    fn get_replies(&self, form: &GetReplies) -> Result<GetRepliesResponse>;
    fn search(&self, form: &Search) -> Result<SearchResponse>;

    fn like_post(&self, form: &CreatePostLike) -> Result<PostResponse>;
    fn save_post(&self, form: &SavePost) -> Result<PostResponse>;
    fn mark_post_as_read(&self, form: &MarkPostAsRead) -> Result<SuccessResponse>;
    fn like_comment(&self, form: &CreateCommentLike) -> Result<CommentResponse>;
    fn save_comment(&self, form: &SaveComment) -> Result<CommentResponse>;
    fn create_comment(&self, form: &CreateComment) -> Result<CommentResponse>;
    fn edit_comment(&self, form: &EditComment) -> Result<CommentResponse>;
    fn delete_comment(&self, form: &DeleteComment) -> Result<CommentResponse>;
    fn block_person(&self, form: &BlockPerson) -> Result<BlockPersonResponse>;
    fn block_community(&self, form: &BlockCommunity) -> Result<BlockCommunityResponse>;
    fn mark_reply_as_read(&self, form: &MarkCommentReplyAsRead) -> Result<CommentReplyResponse>;
    fn mark_mention_as_read(&self, form: &MarkPersonMentionAsRead)
        -> Result<PersonMentionResponse>;
    fn create_post_report(&self, form: &CreatePostReport) -> Result<()>;
    fn create_comment_report(&self, form: &CreateCommentReport) -> Result<()>;
    fn login(&self, form: &Login) -> Result<LoginResponse>;
    fn logout(&self) -> Result<()>;
}

/// Builds an API handle bound to one account's instance and credentials.
pub trait Connector: Send + Sync {
    fn connect(&self, account: &Account) -> Result<Arc<dyn LemmyApi>>;
}

pub struct HttpConnector {
    user_agent: String,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, account: &Account) -> Result<Arc<dyn LemmyApi>> {
        let client = lemmy::Client::new(lemmy::ClientConfig {
            instance: account.instance.clone(),
            jwt: account.jwt.clone(),
            user_agent: self.user_agent.clone(),
            timeout: Some(self.timeout),
            http_client: None,
        })
        .with_context(|| format!("connect to {}", account.instance))?;
        Ok(Arc::new(client))
    }
}

impl LemmyApi for lemmy::Client {
    fn get_posts(&self, form: &GetPosts) -> Result<GetPostsResponse> {
        lemmy::Client::get_posts(self, form).context("fetch posts")
    }

    fn get_post(&self, form: &GetPost) -> Result<GetPostResponse> {
        lemmy::Client::get_post(self, form).context("fetch post")
    }

    fn get_comments(&self, form: &GetComments) -> Result<GetCommentsResponse> {
        lemmy::Client::get_comments(self, form).context("fetch comments")
    }

    fn get_community(&self, form: &GetCommunity) -> Result<GetCommunityResponse> {
        lemmy::Client::get_community(self, form).context("fetch community")
    }

    fn get_person_details(&self, form: &GetPersonDetails) -> Result<GetPersonDetailsResponse> {
        lemmy::Client::get_person_details(self, form).context("fetch person")
    }

    fn get_replies(&self, form: &GetReplies) -> Result<GetRepliesResponse> {
        lemmy::Client::get_replies(self, form).context("fetch replies")
    }

    fn search(&self, form: &Search) -> Result<SearchResponse> {
        lemmy::Client::search(self, form).context("search")
    }

    fn like_post(&self, form: &CreatePostLike) -> Result<PostResponse> {
        lemmy::Client::like_post(self, form).context("vote on post")
    }

    fn save_post(&self, form: &SavePost) -> Result<PostResponse> {
        lemmy::Client::save_post(self, form).context("save post")
    }

    fn mark_post_as_read(&self, form: &MarkPostAsRead) -> Result<SuccessResponse> {
        lemmy::Client::mark_post_as_read(self, form).context("mark post read")
    }

    fn like_comment(&self, form: &CreateCommentLike) -> Result<CommentResponse> {
        lemmy::Client::like_comment(self, form).context("vote on comment")
    }

    fn save_comment(&self, form: &SaveComment) -> Result<CommentResponse> {
        lemmy::Client::save_comment(self, form).context("save comment")
    }

    fn create_comment(&self, form: &CreateComment) -> Result<CommentResponse> {
        lemmy::Client::create_comment(self, form).context("create comment")
    }

    fn edit_comment(&self, form: &EditComment) -> Result<CommentResponse> {
        lemmy::Client::edit_comment(self, form).context("edit comment")
    }

    fn delete_comment(&self, form: &DeleteComment) -> Result<CommentResponse> {
        lemmy::Client::delete_comment(self, form).context("delete comment")
    }

    fn block_person(&self, form: &BlockPerson) -> Result<BlockPersonResponse> {
        lemmy::Client::block_person(self, form).context("block person")
    }

    fn block_community(&self, form: &BlockCommunity) -> Result<BlockCommunityResponse> {
        lemmy::Client::block_community(self, form).context("block community")
    }

    fn mark_reply_as_read(&self, form: &MarkCommentReplyAsRead) -> Result<CommentReplyResponse> {
        lemmy::Client::mark_reply_as_read(self, form).context("mark reply read")
    }

    fn mark_mention_as_read(
        &self,
        form: &MarkPersonMentionAsRead,
    ) -> Result<PersonMentionResponse> {
        lemmy::Client::mark_mention_as_read(self, form).context("mark mention read")
    }

    fn create_post_report(&self, form: &CreatePostReport) -> Result<()> {
        lemmy::Client::create_post_report(self, form).context("report post")?;
        Ok(())
    }

    fn create_comment_report(&self, form: &CreateCommentReport) -> Result<()> {
        lemmy::Client::create_comment_report(self, form).context("report comment")?;
        Ok(())
    }

    fn login(&self, form: &Login) -> Result<LoginResponse> {
        lemmy::Client::login(self, form).context("log in")
    }

    fn logout(&self) -> Result<()> {
        lemmy::Client::logout(self).context("log out")?;
        Ok(())
    }
}

/// Every request the mock has served, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    GetPosts(GetPosts),
    GetPost(GetPost),
    GetComments(GetComments),
    GetCommunity(GetCommunity),
    GetPersonDetails(GetPersonDetails),
    GetReplies(GetReplies),
    Search(Search),
    LikePost(CreatePostLike),
    SavePost(SavePost),
    MarkPostAsRead(MarkPostAsRead),
    LikeComment(CreateCommentLike),
    SaveComment(SaveComment),
    CreateComment(CreateComment),
    EditComment(EditComment),
    DeleteComment(DeleteComment),
    BlockPerson(BlockPerson),
    BlockCommunity(BlockCommunity),
    MarkReplyAsRead(MarkCommentReplyAsRead),
    MarkMentionAsRead(MarkPersonMentionAsRead),
    ReportPost(CreatePostReport),
    ReportComment(CreateCommentReport),
    Login(Login),
    Logout,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    post_pages: VecDeque<GetPostsResponse>,
    comment_pages: VecDeque<GetCommentsResponse>,
    search_pages: VecDeque<SearchResponse>,
    reply_pages: VecDeque<GetRepliesResponse>,
    posts: Vec<PostView>,
    comments: Vec<CommentView>,
    communities: Vec<CommunityView>,
    people: Vec<PersonView>,
    replies: Vec<CommentReplyView>,
    fail_next: VecDeque<String>,
    search_delay: Option<Duration>,
}

/// In-memory API used for offline runs and tests. Queued list pages are
/// served first-in first-out; single lookups and mutations answer from the
/// seeded entities.
#[derive(Default, Clone)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_post_page(&self, page: GetPostsResponse) {
        let mut state = self.state.lock();
        state.posts.extend(page.posts.iter().cloned());
        state.post_pages.push_back(page);
    }

    pub fn push_comment_page(&self, page: GetCommentsResponse) {
        let mut state = self.state.lock();
        state.comments.extend(page.comments.iter().cloned());
        state.comment_pages.push_back(page);
    }

    pub fn push_search_page(&self, page: SearchResponse) {
        self.state.lock().search_pages.push_back(page);
    }

    pub fn push_reply_page(&self, page: GetRepliesResponse) {
        let mut state = self.state.lock();
        state.replies.extend(page.replies.iter().cloned());
        state.reply_pages.push_back(page);
    }

    pub fn seed_post(&self, post: PostView) {
        self.state.lock().posts.push(post);
    }

    pub fn seed_comment(&self, comment: CommentView) {
        self.state.lock().comments.push(comment);
    }

    pub fn seed_community(&self, community: CommunityView) {
        self.state.lock().communities.push(community);
    }

    pub fn seed_person(&self, person: PersonView) {
        self.state.lock().people.push(person);
    }

    /// Makes the next request, of any kind, fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next.push_back(message.into());
    }

    pub fn set_search_delay(&self, delay: Option<Duration>) {
        self.state.lock().search_delay = delay;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: MockCall) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.fail_next.pop_front() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }

    fn post_view(&self, id: PostId) -> Result<PostView> {
        self.state
            .lock()
            .posts
            .iter()
            .find(|view| view.post.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("mock: post {id} not found"))
    }

    fn comment_view(&self, id: CommentId) -> Result<CommentView> {
        self.state
            .lock()
            .comments
            .iter()
            .find(|view| view.comment.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("mock: comment {id} not found"))
    }

    fn update_post(&self, id: PostId, f: impl FnOnce(&mut PostView)) -> Result<PostView> {
        let mut state = self.state.lock();
        let view = state
            .posts
            .iter_mut()
            .find(|view| view.post.id == id)
            .ok_or_else(|| anyhow!("mock: post {id} not found"))?;
        f(view);
        Ok(view.clone())
    }

    fn update_comment(&self, id: CommentId, f: impl FnOnce(&mut CommentView)) -> Result<CommentView> {
        let mut state = self.state.lock();
        let view = state
            .comments
            .iter_mut()
            .find(|view| view.comment.id == id)
            .ok_or_else(|| anyhow!("mock: comment {id} not found"))?;
        f(view);
        Ok(view.clone())
    }
}

fn apply_mock_vote(counts: (&mut i64, &mut i64, &mut i64), my_vote: &mut Option<i32>, score: i32) {
    let (total, up, down) = counts;
    let old = my_vote.unwrap_or(0);
    *total += i64::from(score - old);
    *up += i64::from(score == 1) - i64::from(old == 1);
    *down += i64::from(score == -1) - i64::from(old == -1);
    *my_vote = Some(score);
}

impl LemmyApi for MockApi {
    fn get_posts(&self, form: &GetPosts) -> Result<GetPostsResponse> {
        self.record(MockCall::GetPosts(form.clone()))?;
        Ok(self
            .state
            .lock()
            .post_pages
            .pop_front()
            .unwrap_or(GetPostsResponse {
                posts: Vec::new(),
                next_page: None,
            }))
    }

    fn get_post(&self, form: &GetPost) -> Result<GetPostResponse> {
        self.record(MockCall::GetPost(form.clone()))?;
        let id = form.id.ok_or_else(|| anyhow!("mock: post id required"))?;
        let post_view = self.post_view(id)?;
        let community_view = CommunityView {
            community: post_view.community.clone(),
            subscribed: post_view.subscribed,
            blocked: false,
            counts: CommunityAggregates::default(),
        };
        Ok(GetPostResponse {
            post_view,
            community_view,
            cross_posts: Vec::new(),
        })
    }

    fn get_comments(&self, form: &GetComments) -> Result<GetCommentsResponse> {
        self.record(MockCall::GetComments(form.clone()))?;
        Ok(self
            .state
            .lock()
            .comment_pages
            .pop_front()
            .unwrap_or(GetCommentsResponse {
                comments: Vec::new(),
                next_page: None,
            }))
    }

    fn get_community(&self, form: &GetCommunity) -> Result<GetCommunityResponse> {
        self.record(MockCall::GetCommunity(form.clone()))?;
        let state = self.state.lock();
        let community_view = state
            .communities
            .iter()
            .find(|view| {
                form.name.as_deref() == Some(view.community.name.as_str())
                    || form.name.as_deref() == Some(view.community.slug().as_str())
                    || form.id == Some(view.community.id)
            })
            .cloned()
            .ok_or_else(|| anyhow!("mock: community not found"))?;
        Ok(GetCommunityResponse {
            community_view,
            moderators: Vec::new(),
        })
    }

    fn get_person_details(&self, form: &GetPersonDetails) -> Result<GetPersonDetailsResponse> {
        self.record(MockCall::GetPersonDetails(form.clone()))?;
        let state = self.state.lock();
        let person_view = state
            .people
            .iter()
            .find(|view| {
                form.username.as_deref() == Some(view.person.name.as_str())
                    || form.person_id == Some(view.person.id)
            })
            .cloned()
            .ok_or_else(|| anyhow!("mock: person not found"))?;
        let person_id = person_view.person.id;
        Ok(GetPersonDetailsResponse {
            comments: state
                .comments
                .iter()
                .filter(|view| view.creator.id == person_id)
                .cloned()
                .collect(),
            posts: state
                .posts
                .iter()
                .filter(|view| view.creator.id == person_id)
                .cloned()
                .collect(),
            person_view,
        })
    }

    fn get_replies(&self, form: &GetReplies) -> Result<GetRepliesResponse> {
        self.record(MockCall::GetReplies(form.clone()))?;
        Ok(self
            .state
            .lock()
            .reply_pages
            .pop_front()
            .unwrap_or(GetRepliesResponse {
                replies: Vec::new(),
            }))
    }

    fn search(&self, form: &Search) -> Result<SearchResponse> {
        let delay = self.state.lock().search_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.record(MockCall::Search(form.clone()))?;
        Ok(self
            .state
            .lock()
            .search_pages
            .pop_front()
            .unwrap_or_default())
    }

    fn like_post(&self, form: &CreatePostLike) -> Result<PostResponse> {
        self.record(MockCall::LikePost(form.clone()))?;
        let post_view = self.update_post(form.post_id, |view| {
            apply_mock_vote(
                (
                    &mut view.counts.score,
                    &mut view.counts.upvotes,
                    &mut view.counts.downvotes,
                ),
                &mut view.my_vote,
                form.score,
            );
        })?;
        Ok(PostResponse { post_view })
    }

    fn save_post(&self, form: &SavePost) -> Result<PostResponse> {
        self.record(MockCall::SavePost(form.clone()))?;
        let post_view = self.update_post(form.post_id, |view| view.saved = form.save)?;
        Ok(PostResponse { post_view })
    }

    fn mark_post_as_read(&self, form: &MarkPostAsRead) -> Result<SuccessResponse> {
        self.record(MockCall::MarkPostAsRead(form.clone()))?;
        for id in &form.post_ids {
            let _ = self.update_post(*id, |view| view.read = form.read);
        }
        Ok(SuccessResponse { success: true })
    }

    fn like_comment(&self, form: &CreateCommentLike) -> Result<CommentResponse> {
        self.record(MockCall::LikeComment(form.clone()))?;
        let comment_view = self.update_comment(form.comment_id, |view| {
            apply_mock_vote(
                (
                    &mut view.counts.score,
                    &mut view.counts.upvotes,
                    &mut view.counts.downvotes,
                ),
                &mut view.my_vote,
                form.score,
            );
        })?;
        Ok(CommentResponse {
            comment_view,
            recipient_ids: Vec::new(),
        })
    }

    fn save_comment(&self, form: &SaveComment) -> Result<CommentResponse> {
        self.record(MockCall::SaveComment(form.clone()))?;
        let comment_view = self.update_comment(form.comment_id, |view| view.saved = form.save)?;
        Ok(CommentResponse {
            comment_view,
            recipient_ids: Vec::new(),
        })
    }

    fn create_comment(&self, form: &CreateComment) -> Result<CommentResponse> {
        self.record(MockCall::CreateComment(form.clone()))?;
        let post_view = self.post_view(form.post_id)?;
        let parent_path = match form.parent_id {
            Some(parent) => self.comment_view(parent)?.comment.path,
            None => "0".to_string(),
        };
        let mut state = self.state.lock();
        let id = state
            .comments
            .iter()
            .map(|view| view.comment.id)
            .max()
            .unwrap_or(0)
            + 1;
        let comment_view = CommentView {
            comment: Comment {
                id,
                creator_id: post_view.creator.id,
                post_id: form.post_id,
                content: form.content.clone(),
                removed: false,
                deleted: false,
                distinguished: false,
                ap_id: format!("{}/comment/{id}", post_view.community.actor_id),
                local: true,
                path: format!("{parent_path}.{id}"),
                published: None,
                updated: None,
            },
            creator: post_view.creator.clone(),
            post: post_view.post.clone(),
            community: post_view.community.clone(),
            counts: CommentAggregates::default(),
            creator_banned_from_community: false,
            subscribed: post_view.subscribed,
            saved: false,
            creator_blocked: false,
            my_vote: None,
        };
        state.comments.push(comment_view.clone());
        Ok(CommentResponse {
            comment_view,
            recipient_ids: Vec::new(),
        })
    }

    fn edit_comment(&self, form: &EditComment) -> Result<CommentResponse> {
        self.record(MockCall::EditComment(form.clone()))?;
        let comment_view =
            self.update_comment(form.comment_id, |view| view.comment.content = form.content.clone())?;
        Ok(CommentResponse {
            comment_view,
            recipient_ids: Vec::new(),
        })
    }

    fn delete_comment(&self, form: &DeleteComment) -> Result<CommentResponse> {
        self.record(MockCall::DeleteComment(form.clone()))?;
        let comment_view =
            self.update_comment(form.comment_id, |view| view.comment.deleted = form.deleted)?;
        Ok(CommentResponse {
            comment_view,
            recipient_ids: Vec::new(),
        })
    }

    fn block_person(&self, form: &BlockPerson) -> Result<BlockPersonResponse> {
        self.record(MockCall::BlockPerson(form.clone()))?;
        let state = self.state.lock();
        let mut person_view = state
            .people
            .iter()
            .find(|view| view.person.id == form.person_id)
            .cloned()
            .ok_or_else(|| anyhow!("mock: person {} not found", form.person_id))?;
        person_view.blocked = form.block;
        Ok(BlockPersonResponse {
            person_view,
            blocked: form.block,
        })
    }

    fn block_community(&self, form: &BlockCommunity) -> Result<BlockCommunityResponse> {
        self.record(MockCall::BlockCommunity(form.clone()))?;
        let state = self.state.lock();
        let mut community_view = state
            .communities
            .iter()
            .find(|view| view.community.id == form.community_id)
            .cloned()
            .ok_or_else(|| anyhow!("mock: community {} not found", form.community_id))?;
        community_view.blocked = form.block;
        Ok(BlockCommunityResponse {
            community_view,
            blocked: form.block,
        })
    }

    fn mark_reply_as_read(&self, form: &MarkCommentReplyAsRead) -> Result<CommentReplyResponse> {
        self.record(MockCall::MarkReplyAsRead(form.clone()))?;
        let state = self.state.lock();
        let mut comment_reply_view = state
            .replies
            .iter()
            .find(|view| view.comment_reply.id == form.comment_reply_id)
            .cloned()
            .ok_or_else(|| anyhow!("mock: reply {} not found", form.comment_reply_id))?;
        comment_reply_view.comment_reply.read = form.read;
        Ok(CommentReplyResponse { comment_reply_view })
    }

    fn mark_mention_as_read(
        &self,
        form: &MarkPersonMentionAsRead,
    ) -> Result<PersonMentionResponse> {
        self.record(MockCall::MarkMentionAsRead(form.clone()))?;
        Ok(PersonMentionResponse {
            person_mention_view: serde_json::json!({
                "person_mention": { "id": form.person_mention_id, "read": form.read }
            }),
        })
    }

    fn create_post_report(&self, form: &CreatePostReport) -> Result<()> {
        self.record(MockCall::ReportPost(form.clone()))
    }

    fn create_comment_report(&self, form: &CreateCommentReport) -> Result<()> {
        self.record(MockCall::ReportComment(form.clone()))
    }

    fn login(&self, form: &Login) -> Result<LoginResponse> {
        self.record(MockCall::Login(form.clone()))?;
        Ok(LoginResponse {
            jwt: Some(format!("mock-jwt-{}", form.username_or_email)),
            registration_created: false,
            verify_email_sent: false,
        })
    }

    fn logout(&self) -> Result<()> {
        self.record(MockCall::Logout)
    }
}

/// Connector that hands every account the same shared [`MockApi`].
#[derive(Default, Clone)]
pub struct MockConnector {
    api: MockApi,
}

impl MockConnector {
    pub fn new(api: MockApi) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &MockApi {
        &self.api
    }
}

impl Connector for MockConnector {
    fn connect(&self, _account: &Account) -> Result<Arc<dyn LemmyApi>> {
        Ok(Arc::new(self.api.clone()))
    }
}
