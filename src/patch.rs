//! Targeted, field-level edits applied to cached views ahead of (or after)
//! the matching mutation.

use crate::lemmy::{CommentAggregates, CommentView, PostAggregates, PostView};

/// Lemmy reports "no vote" as either `None` or `Some(0)`.
pub fn vote_value(my_vote: Option<i32>) -> i32 {
    my_vote.unwrap_or(0).clamp(-1, 1)
}

fn vote_field(score: i32) -> Option<i32> {
    match score {
        0 => None,
        score => Some(score),
    }
}

/// Count deltas for moving from vote `old` to vote `new`.
fn vote_deltas(old: i32, new: i32) -> (i64, i64, i64) {
    let score = i64::from(new - old);
    let up = i64::from(new == 1) - i64::from(old == 1);
    let down = i64::from(new == -1) - i64::from(old == -1);
    (score, up, down)
}

fn apply_post_counts(counts: &mut PostAggregates, old: i32, new: i32) {
    let (score, up, down) = vote_deltas(old, new);
    counts.score += score;
    counts.upvotes += up;
    counts.downvotes += down;
}

fn apply_comment_counts(counts: &mut CommentAggregates, old: i32, new: i32) {
    let (score, up, down) = vote_deltas(old, new);
    counts.score += score;
    counts.upvotes += up;
    counts.downvotes += down;
}

pub fn vote_post(view: &mut PostView, score: i32) {
    let new = score.clamp(-1, 1);
    let old = vote_value(view.my_vote);
    if old != new {
        apply_post_counts(&mut view.counts, old, new);
    }
    view.my_vote = vote_field(new);
}

pub fn vote_comment(view: &mut CommentView, score: i32) {
    let new = score.clamp(-1, 1);
    let old = vote_value(view.my_vote);
    if old != new {
        apply_comment_counts(&mut view.counts, old, new);
    }
    view.my_vote = vote_field(new);
}

/// Pressing the same arrow twice clears the vote.
pub fn toggle_vote(current: Option<i32>, requested: i32) -> i32 {
    let requested = requested.clamp(-1, 1);
    if vote_value(current) == requested {
        0
    } else {
        requested
    }
}
