//! Sample entities for offline runs and tests.

use crate::lemmy::*;

pub fn person(id: PersonId, name: &str, instance: &str) -> Person {
    Person {
        id,
        name: name.to_string(),
        display_name: None,
        avatar: None,
        actor_id: format!("{instance}/u/{name}"),
        local: true,
        banned: false,
        bot_account: false,
        deleted: false,
        published: None,
    }
}

pub fn community(id: CommunityId, name: &str, instance: &str) -> Community {
    Community {
        id,
        name: name.to_string(),
        title: name.to_string(),
        description: None,
        actor_id: format!("{instance}/c/{name}"),
        icon: None,
        local: true,
        nsfw: false,
        removed: false,
        deleted: false,
        published: None,
    }
}

pub fn post(id: PostId, instance: &str) -> Post {
    Post {
        id,
        name: format!("Post {id}"),
        url: None,
        body: None,
        creator_id: 100,
        community_id: 10,
        ap_id: format!("{instance}/post/{id}"),
        thumbnail_url: None,
        removed: false,
        deleted: false,
        locked: false,
        nsfw: false,
        featured_community: false,
        featured_local: false,
        published: None,
        updated: None,
    }
}

pub fn post_view(id: PostId, instance: &str) -> PostView {
    PostView {
        post: post(id, instance),
        creator: person(100, "alice", instance),
        community: community(10, "rust", instance),
        counts: PostAggregates::default(),
        subscribed: SubscribedType::NotSubscribed,
        saved: false,
        read: false,
        creator_blocked: false,
        my_vote: None,
        unread_comments: 0,
    }
}

/// A comment on post `post_id` at `path` (wire form, `0.`-rooted); the last
/// path segment should equal `id`.
pub fn comment_view(id: CommentId, path: &str, post_id: PostId) -> CommentView {
    let instance = "https://lemmy.world";
    CommentView {
        comment: Comment {
            id,
            creator_id: 101,
            post_id,
            content: format!("Comment {id}"),
            removed: false,
            deleted: false,
            distinguished: false,
            ap_id: format!("{instance}/comment/{id}"),
            local: true,
            path: path.to_string(),
            published: None,
            updated: None,
        },
        creator: person(101, "bob", instance),
        post: post(post_id, instance),
        community: community(10, "rust", instance),
        counts: CommentAggregates::default(),
        creator_banned_from_community: false,
        subscribed: SubscribedType::NotSubscribed,
        saved: false,
        creator_blocked: false,
        my_vote: None,
    }
}

pub fn community_view(id: CommunityId, name: &str, instance: &str) -> CommunityView {
    CommunityView {
        community: community(id, name, instance),
        subscribed: SubscribedType::NotSubscribed,
        blocked: false,
        counts: CommunityAggregates::default(),
    }
}

pub fn person_view(id: PersonId, name: &str, instance: &str) -> PersonView {
    PersonView {
        person: person(id, name, instance),
        counts: PersonAggregates::default(),
        is_admin: false,
        blocked: false,
    }
}

pub fn reply_view(reply_id: i64, comment: &CommentView) -> CommentReplyView {
    CommentReplyView {
        comment_reply: CommentReply {
            id: reply_id,
            recipient_id: 100,
            comment_id: comment.comment.id,
            read: false,
            published: None,
        },
        comment: comment.comment.clone(),
        creator: comment.creator.clone(),
        post: comment.post.clone(),
        community: comment.community.clone(),
        counts: comment.counts.clone(),
        saved: comment.saved,
        creator_blocked: comment.creator_blocked,
        my_vote: comment.my_vote,
    }
}
