use std::time::Duration;

use lemmy_cache::client::{
    ClientEvent, ClientOptions, CommentTarget, MutationStatus, PostTarget, QueryClient, QueryKind,
};
use lemmy_cache::data::{MockApi, MockCall, MockConnector};
use lemmy_cache::fixtures;
use lemmy_cache::lemmy::{GetCommentsResponse, GetPostsResponse, GetRepliesResponse, SearchResponse};
use lemmy_cache::query::{CommentsQuery, PostsQuery, RepliesQuery, SearchQuery};
use lemmy_cache::session::{Account, AccountStore, DEFAULT_INSTANCE};
use lemmy_cache::storage;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(5);

fn client(api: &MockApi) -> QueryClient {
    client_with(api, ClientOptions::default())
}

fn client_with(api: &MockApi, options: ClientOptions) -> QueryClient {
    QueryClient::new(
        MockConnector::new(api.clone()),
        AccountStore::new(DEFAULT_INSTANCE),
        options,
    )
    .unwrap()
}

fn posts_page(ids: &[i64], next: Option<&str>) -> GetPostsResponse {
    GetPostsResponse {
        posts: ids
            .iter()
            .map(|id| fixtures::post_view(*id, DEFAULT_INSTANCE))
            .collect(),
        next_page: next.map(str::to_owned),
    }
}

fn load_feed(client: &mut QueryClient, query: &PostsQuery) {
    client.posts_query(query);
    client.wait_for_idle(WAIT).unwrap();
}

fn cached_post(client: &QueryClient, id: i64) -> lemmy_cache::lemmy::PostView {
    client
        .stores()
        .posts
        .find(client.prefixer(), |view| view.post.id == id)
        .map(|(_, view)| view.clone())
        .unwrap()
}

#[test]
fn feed_pages_append_in_order_until_exhausted() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1, 2], Some("c1")));
    api.push_post_page(posts_page(&[3], None));
    let mut client = client(&api);
    let query = PostsQuery::default();

    assert!(client.posts_query(&query).is_pending());
    let events = client.wait_for_idle(WAIT).unwrap();
    assert_eq!(events, vec![ClientEvent::QueryLoaded(QueryKind::Posts(query.clone()))]);
    assert!(client.posts_state(&query).unwrap().has_next_page());

    assert!(client.fetch_next_posts(&query));
    client.wait_for_idle(WAIT).unwrap();

    let state = client.posts_state(&query).unwrap();
    assert_eq!(state.data().len(), 2);
    assert!(!state.has_next_page());
    let ids: Vec<_> = client.feed_posts(&query).iter().map(|view| view.post.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let calls = api.calls();
    match &calls[1] {
        MockCall::GetPosts(form) => assert_eq!(form.page_cursor.as_deref(), Some("c1")),
        other => panic!("unexpected call {other:?}"),
    }

    assert!(!client.fetch_next_posts(&query));
    assert!(client.is_idle());
    assert_eq!(api.calls().len(), 2);
}

#[test]
fn fetch_next_while_loading_is_a_noop() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1], Some("c1")));
    let mut client = client(&api);
    let query = PostsQuery::community("rust");

    client.posts_query(&query);
    assert!(!client.fetch_next_posts(&query));
    assert!(!client.refetch_posts(&query));
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(api.calls().len(), 1);
}

#[test]
fn failed_page_keeps_error_and_refetch_recovers() {
    let api = MockApi::new();
    api.fail_next("instance down");
    let mut client = client(&api);
    let query = PostsQuery::default();

    client.posts_query(&query);
    let events = client.wait_for_idle(WAIT).unwrap();
    assert!(matches!(&events[0], ClientEvent::QueryFailed { error, .. } if error.contains("instance down")));
    let state = client.posts_state(&query).unwrap();
    assert!(state.is_pending());
    assert!(state.error().unwrap().contains("instance down"));

    api.push_post_page(posts_page(&[4], None));
    assert!(client.refetch_posts(&query));
    client.wait_for_idle(WAIT).unwrap();
    let state = client.posts_state(&query).unwrap();
    assert_eq!(state.error(), None);
    assert_eq!(client.feed_posts(&query).len(), 1);
}

#[test]
fn vote_is_visible_before_the_server_answers() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1], None));
    let mut client = client(&api);
    load_feed(&mut client, &PostsQuery::default());

    let target = PostTarget::from(&cached_post(&client, 1));
    let id = client.vote_post(&target, 1);
    let patched = cached_post(&client, 1);
    assert_eq!(patched.my_vote, Some(1));
    assert_eq!(patched.counts.score, 1);
    assert!(client.mutation(id).unwrap().is_pending());

    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.mutation(id).unwrap().status, MutationStatus::Success);
    let settled = cached_post(&client, 1);
    assert_eq!(settled.my_vote, Some(1));
    assert_eq!(settled.counts.upvotes, 1);
}

#[test]
fn failed_vote_stays_until_reverted() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1], None));
    let mut client = client(&api);
    load_feed(&mut client, &PostsQuery::default());

    api.fail_next("rate limited");
    let target = PostTarget::from(&cached_post(&client, 1));
    let id = client.vote_post(&target, -1);
    let events = client.wait_for_idle(WAIT).unwrap();
    assert_eq!(
        events,
        vec![ClientEvent::MutationSettled {
            id,
            error: Some("rate limited".into())
        }]
    );
    assert_eq!(cached_post(&client, 1).my_vote, Some(-1));

    assert_eq!(client.revert(id), Ok(true));
    let reverted = cached_post(&client, 1);
    assert_eq!(reverted.my_vote, None);
    assert_eq!(reverted.counts.score, 0);
    assert_eq!(reverted.counts.downvotes, 0);
    assert_eq!(client.mutation(id).unwrap().status, MutationStatus::Reverted);
    assert_eq!(client.revert(id), Ok(false));
}

#[test]
fn refetch_issued_before_patch_does_not_undo_it() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1], None));
    let mut client = client(&api);
    let query = PostsQuery::default();
    load_feed(&mut client, &query);

    api.push_post_page(posts_page(&[1], None));
    assert!(client.refetch_posts(&query));
    let target = PostTarget::from(&cached_post(&client, 1));
    client.save_post(&target, true);
    client.wait_for_idle(WAIT).unwrap();

    assert!(cached_post(&client, 1).saved);
    assert_eq!(client.posts_state(&query).unwrap().data().len(), 1);
}

#[test]
fn newer_search_supersedes_older_one() {
    let api = MockApi::new();
    let page = SearchResponse {
        posts: vec![fixtures::post_view(5, DEFAULT_INSTANCE)],
        ..SearchResponse::default()
    };
    api.push_search_page(page.clone());
    api.push_search_page(page);
    api.set_search_delay(Some(Duration::from_millis(100)));
    let mut client = client(&api);
    let first = SearchQuery::new("rus");
    let second = SearchQuery::new("rust");

    client.search(&first);
    client.search(&second);
    let events = client.wait_for_idle(WAIT).unwrap();
    assert_eq!(events, vec![ClientEvent::QueryLoaded(QueryKind::Search(second.clone()))]);

    let abandoned = client.search_state(&first).unwrap();
    assert!(abandoned.is_pending());
    assert!(!abandoned.is_fetching());
    let current = client.search_state(&second).unwrap();
    assert_eq!(current.data().len(), 1);
    assert_eq!(current.data()[0].posts.len(), 1);

    std::thread::sleep(Duration::from_millis(300));
    assert!(client.process_responses().is_empty());
    assert!(client.search_state(&first).unwrap().data().is_empty());
}

#[test]
fn single_post_served_from_cache_and_refreshed_once() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1], None));
    let mut client = client(&api);
    load_feed(&mut client, &PostsQuery::default());

    let snapshot = client.post(1);
    assert_eq!(snapshot.data.as_ref().map(|view| view.post.id), Some(1));
    assert!(snapshot.is_fetching);
    client.wait_for_idle(WAIT).unwrap();

    let fresh = client.post(1);
    assert!(!fresh.is_fetching);
    assert!(fresh.data.is_some());
    let lookups = api
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MockCall::GetPost(_)))
        .count();
    assert_eq!(lookups, 1);
}

#[test]
fn zero_stale_time_refreshes_every_lookup() {
    let api = MockApi::new();
    api.seed_community(fixtures::community_view(10, "rust", DEFAULT_INSTANCE));
    let mut client = client_with(
        &api,
        ClientOptions {
            stale_time: Duration::ZERO,
            ..ClientOptions::default()
        },
    );

    let first = client.community("rust");
    assert!(first.is_pending());
    client.wait_for_idle(WAIT).unwrap();
    let second = client.community("rust@lemmy.world");
    assert!(second.data.is_some());
    client.wait_for_idle(WAIT).unwrap();
    let third = client.community("rust");
    assert!(third.is_fetching);
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(api.calls().len(), 3);
}

#[test]
fn missing_person_reports_error() {
    let api = MockApi::new();
    let mut client = client(&api);
    client.person("nobody");
    let events = client.wait_for_idle(WAIT).unwrap();
    assert!(matches!(
        &events[0],
        ClientEvent::QueryFailed { query: QueryKind::Person(name), .. } if name == "nobody"
    ));
    let snapshot = client.person("nobody");
    assert!(snapshot.data.is_none());
    assert!(!snapshot.is_fetching);
    assert!(snapshot.error.is_some());
}

#[test]
fn person_lookup_populates_profile_and_content() {
    let api = MockApi::new();
    api.seed_person(fixtures::person_view(100, "alice", DEFAULT_INSTANCE));
    api.seed_post(fixtures::post_view(3, DEFAULT_INSTANCE));
    let mut client = client(&api);
    client.person("alice");
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.person("alice").data.unwrap().person.id, 100);
    assert_eq!(cached_post(&client, 3).creator.name, "alice");
}

#[test]
fn bare_community_name_resolves_to_the_local_one() {
    let api = MockApi::new();
    let local = fixtures::community_view(10, "rust", DEFAULT_INSTANCE);
    let mut remote = fixtures::community_view(11, "rust", "https://beehaw.org");
    remote.community.local = false;
    api.seed_community(local.clone());
    api.seed_community(remote.clone());
    api.push_search_page(SearchResponse {
        communities: vec![remote, local],
        ..SearchResponse::default()
    });
    let mut client = client(&api);
    client.search(&SearchQuery::new("rust"));
    client.wait_for_idle(WAIT).unwrap();

    assert_eq!(client.community("rust").data.unwrap().community.id, 10);
    assert_eq!(client.community("rust@beehaw.org").data.unwrap().community.id, 11);
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.community("rust").data.unwrap().community.id, 10);
    assert_eq!(client.community("rust@lemmy.world").data.unwrap().community.id, 10);
}

#[test]
fn bare_person_name_resolves_to_the_local_one() {
    let api = MockApi::new();
    let local = fixtures::person_view(100, "alice", DEFAULT_INSTANCE);
    let mut remote = fixtures::person_view(200, "alice", "https://beehaw.org");
    remote.person.local = false;
    api.seed_person(local.clone());
    api.push_search_page(SearchResponse {
        users: vec![remote, local],
        ..SearchResponse::default()
    });
    let mut client = client(&api);
    client.search(&SearchQuery::new("alice"));
    client.wait_for_idle(WAIT).unwrap();

    assert_eq!(client.person("alice").data.unwrap().person.id, 100);
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.person("alice").data.unwrap().person.id, 100);
}

#[test]
fn switching_accounts_isolates_cached_data() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1], None));
    let mut client = client(&api);
    let query = PostsQuery::default();
    load_feed(&mut client, &query);
    let anonymous = client.prefixer().clone();

    client
        .add_account(Account {
            jwt: Some("token".into()),
            ..Account::new(DEFAULT_INSTANCE)
        })
        .unwrap();
    assert_ne!(client.prefixer(), &anonymous);
    assert!(client.feed_posts(&query).is_empty());
    assert!(client
        .stores()
        .posts
        .find(client.prefixer(), |view| view.post.id == 1)
        .is_none());

    client.select_account(0).unwrap();
    assert_eq!(client.feed_posts(&query).len(), 1);
}

#[test]
fn login_fills_anonymous_slot_then_adds_new_ones() {
    let api = MockApi::new();
    let mut client = client(&api);

    let id = client.login(DEFAULT_INSTANCE, "alice", "hunter2", None).unwrap();
    let events = client.wait_for_idle(WAIT).unwrap();
    assert!(events.contains(&ClientEvent::AccountsChanged));
    assert!(events.contains(&ClientEvent::MutationSettled { id, error: None }));
    assert_eq!(client.accounts().accounts().len(), 1);
    let account = client.accounts().selected_account();
    assert_eq!(account.jwt.as_deref(), Some("mock-jwt-alice"));
    assert_eq!(account.username.as_deref(), Some("alice"));

    client.login("https://beehaw.org/", "bob", "pw", None).unwrap();
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.accounts().accounts().len(), 2);
    assert_eq!(client.accounts().selected_index(), 1);
    assert_eq!(client.accounts().selected_account().instance, "https://beehaw.org");
}

#[test]
fn logout_of_only_account_falls_back_to_default() {
    let api = MockApi::new();
    let mut client = client(&api);
    client
        .update_selected_account(lemmy_cache::session::AccountUpdate {
            instance: Some("https://beehaw.org".into()),
            jwt: Some(Some("token".into())),
            username: Some(Some("alice".into())),
        })
        .unwrap();

    let mutation = client.logout(0).unwrap();
    assert!(mutation.is_some());
    assert_eq!(client.accounts().accounts(), &[Account::new(DEFAULT_INSTANCE)]);
    assert!(!client.accounts().is_logged_in());
    client.wait_for_idle(WAIT).unwrap();
    assert!(api.calls().contains(&MockCall::Logout));
}

#[test]
fn account_changes_are_persisted() {
    let dir = tempdir().unwrap();
    let store = storage::Store::open(storage::Options {
        path: Some(dir.path().join("state.db")),
    })
    .unwrap();
    let api = MockApi::new();
    let mut client = client(&api).with_storage(store.clone());

    client
        .add_account(Account {
            jwt: Some("token".into()),
            username: Some("alice".into()),
            ..Account::new("https://lemmy.ml")
        })
        .unwrap();

    let restored = store.load_account_store(DEFAULT_INSTANCE).unwrap();
    assert_eq!(restored.accounts().len(), 2);
    assert_eq!(restored.selected_index(), 1);
    assert_eq!(restored.selected_account().username.as_deref(), Some("alice"));
}

#[test]
fn new_reply_joins_thread_and_bumps_counts() {
    let api = MockApi::new();
    api.seed_post(fixtures::post_view(1, DEFAULT_INSTANCE));
    api.push_comment_page(GetCommentsResponse {
        comments: vec![fixtures::comment_view(10, "0.10", 1)],
        next_page: None,
    });
    let mut client = client(&api);
    let query = CommentsQuery::post(1);
    client.comments_query(&query);
    client.post(1);
    client.wait_for_idle(WAIT).unwrap();

    let id = client.create_comment(1, Some(10), "agreed");
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.mutation(id).unwrap().status, MutationStatus::Success);

    let tree = client.comment_tree(&query, None);
    let parent = &tree.children[&10];
    let reply = parent.children[&11].comment.unwrap();
    assert_eq!(reply.comment.content, "agreed");
    assert_eq!(parent.comment.unwrap().counts.child_count, 1);
    assert_eq!(cached_post(&client, 1).counts.comments, 1);
}

#[test]
fn edit_and_delete_land_after_success() {
    let api = MockApi::new();
    api.push_comment_page(GetCommentsResponse {
        comments: vec![fixtures::comment_view(10, "0.10", 1)],
        next_page: None,
    });
    let mut client = client(&api);
    let query = CommentsQuery::post(1);
    client.comments_query(&query);
    client.wait_for_idle(WAIT).unwrap();

    client.edit_comment(10, "edited");
    let key = client.prefixer().key("0.10");
    assert_eq!(client.stores().comments.get(&key).unwrap().comment.content, "Comment 10");
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.stores().comments.get(&key).unwrap().comment.content, "edited");

    client.delete_comment(10, true);
    client.wait_for_idle(WAIT).unwrap();
    assert!(client.stores().comments.get(&key).unwrap().comment.deleted);
}

#[test]
fn vote_during_edit_keeps_both() {
    let api = MockApi::new();
    api.push_comment_page(GetCommentsResponse {
        comments: vec![fixtures::comment_view(10, "0.10", 1)],
        next_page: None,
    });
    let mut client = client(&api);
    client.comments_query(&CommentsQuery::post(1));
    client.wait_for_idle(WAIT).unwrap();

    let key = client.prefixer().key("0.10");
    let target = CommentTarget::from(client.stores().comments.get(&key).unwrap());
    let edit = client.edit_comment(10, "edited");
    client.vote_comment(&target, 1);
    client.wait_for_idle(WAIT).unwrap();

    assert_eq!(client.mutation(edit).unwrap().status, MutationStatus::Success);
    let cached = client.stores().comments.get(&key).unwrap();
    assert_eq!(cached.comment.content, "edited");
    assert_eq!(cached.my_vote, Some(1));
}

#[test]
fn comment_vote_and_save_are_optimistic() {
    let api = MockApi::new();
    api.push_comment_page(GetCommentsResponse {
        comments: vec![fixtures::comment_view(10, "0.10", 1)],
        next_page: None,
    });
    let mut client = client(&api);
    client.comments_query(&CommentsQuery::post(1));
    client.wait_for_idle(WAIT).unwrap();

    let key = client.prefixer().key("0.10");
    let target = CommentTarget::from(client.stores().comments.get(&key).unwrap());
    client.vote_comment(&target, 1);
    client.save_comment(&target, true);
    let patched = client.stores().comments.get(&key).unwrap();
    assert_eq!(patched.my_vote, Some(1));
    assert!(patched.saved);
    client.wait_for_idle(WAIT).unwrap();
    let settled = client.stores().comments.get(&key).unwrap();
    assert_eq!(settled.my_vote, Some(1));
    assert!(settled.saved);
}

#[test]
fn blocking_a_person_flags_their_content() {
    let api = MockApi::new();
    api.seed_person(fixtures::person_view(100, "alice", DEFAULT_INSTANCE));
    api.push_post_page(posts_page(&[1, 2], None));
    let mut client = client(&api);
    load_feed(&mut client, &PostsQuery::default());

    client.block_person(100, true);
    assert!(!cached_post(&client, 1).creator_blocked);
    client.wait_for_idle(WAIT).unwrap();
    assert!(cached_post(&client, 1).creator_blocked);
    assert!(cached_post(&client, 2).creator_blocked);
    let profile = client
        .stores()
        .profiles
        .find(client.prefixer(), |view| view.person.id == 100)
        .unwrap()
        .1;
    assert!(profile.blocked);
}

#[test]
fn blocking_a_community_updates_its_record() {
    let api = MockApi::new();
    api.seed_community(fixtures::community_view(10, "rust", DEFAULT_INSTANCE));
    let mut client = client(&api);
    client.block_community(10, true);
    client.wait_for_idle(WAIT).unwrap();
    assert!(client.community("rust").data.unwrap().blocked);
}

#[test]
fn marking_reply_read_patches_inbox_pages() {
    let api = MockApi::new();
    let comment = fixtures::comment_view(20, "0.20", 1);
    api.push_reply_page(GetRepliesResponse {
        replies: vec![fixtures::reply_view(7, &comment)],
    });
    let mut client = client(&api);
    let query = RepliesQuery {
        unread_only: true,
        ..RepliesQuery::default()
    };
    client.replies_query(&query);
    client.wait_for_idle(WAIT).unwrap();
    assert!(client
        .stores()
        .comments
        .contains(&client.prefixer().key("0.20")));

    let id = client.mark_reply_read(7, true);
    let read = |client: &QueryClient| {
        client.replies_state(&query).unwrap().data()[0].replies[0]
            .comment_reply
            .read
    };
    assert!(read(&client));
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.mutation(id).unwrap().status, MutationStatus::Success);
    assert!(read(&client));
}

#[test]
fn reports_and_mentions_go_straight_to_the_server() {
    let api = MockApi::new();
    let mut client = client(&api);
    let report = client.report_comment(9, "spam");
    let mention = client.mark_mention_read(3, true);
    client.wait_for_idle(WAIT).unwrap();
    assert_eq!(client.mutation(report).unwrap().status, MutationStatus::Success);
    assert_eq!(client.mutation(mention).unwrap().status, MutationStatus::Success);
    assert!(client.stores().posts.is_empty());
    assert!(client.stores().comments.is_empty());
}

#[test]
fn clear_cache_drops_entities_and_queries() {
    let api = MockApi::new();
    api.push_post_page(posts_page(&[1], None));
    let mut client = client(&api);
    let query = PostsQuery::default();
    load_feed(&mut client, &query);

    client.clear_cache();
    assert!(client.stores().posts.is_empty());
    assert!(client.posts_state(&query).is_none());
}
