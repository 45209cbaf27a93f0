//! Rebuilds nested comment threads from Lemmy's flat, path-addressed lists.
//!
//! Lemmy returns comments as a flat list where each comment carries a dotted
//! path of ancestor ids rooted at a synthetic `0`, e.g. `0.1234.5678`. The
//! list may be partial: a reply can arrive before (or without) its parent.

use std::collections::BTreeMap;
use std::fmt;

use crate::lemmy::{CommentId, CommentView};

const ROOT_SEGMENT: &str = "0";

/// Ancestor chain of a comment, root segment removed, own id last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CommentPath(Vec<CommentId>);

impl CommentPath {
    /// Parses either the wire form (`0.1.2`) or a rootless focus path (`1.2`).
    /// Returns `None` for empty or non-numeric input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut segments = raw.split('.').peekable();
        if segments.peek() == Some(&ROOT_SEGMENT) {
            segments.next();
        }
        let ids = segments
            .map(|segment| segment.parse::<CommentId>().ok())
            .collect::<Option<Vec<_>>>()?;
        if ids.is_empty() {
            return None;
        }
        Some(Self(ids))
    }

    pub fn segments(&self) -> &[CommentId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn id(&self) -> Option<CommentId> {
        self.0.last().copied()
    }

    pub fn parent(&self) -> Option<Self> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(Self(self.0[..n - 1].to_vec())),
        }
    }

    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    fn contains_run(&self, other: &CommentPath) -> bool {
        if other.0.is_empty() {
            return true;
        }
        self.0.windows(other.0.len()).any(|window| window == other.0)
    }

    /// Drops every segment before the first occurrence of `anchor`.
    fn reroot_at(&mut self, anchor: CommentId) {
        if let Some(pos) = self.0.iter().position(|id| *id == anchor) {
            self.0.drain(..pos);
        }
    }
}

impl fmt::Display for CommentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT_SEGMENT)?;
        for id in &self.0 {
            write!(f, ".{id}")?;
        }
        Ok(())
    }
}

pub trait HasCommentPath {
    fn comment_path(&self) -> &str;
}

impl HasCommentPath for CommentView {
    fn comment_path(&self) -> &str {
        &self.comment.path
    }
}

impl HasCommentPath for str {
    fn comment_path(&self) -> &str {
        self
    }
}

impl HasCommentPath for String {
    fn comment_path(&self) -> &str {
        self
    }
}

impl<T: HasCommentPath + ?Sized> HasCommentPath for &T {
    fn comment_path(&self) -> &str {
        (**self).comment_path()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode<T> {
    /// First-seen order across the whole tree.
    pub sort: usize,
    pub comment: Option<T>,
    pub children: BTreeMap<CommentId, CommentNode<T>>,
}

impl<T> CommentNode<T> {
    fn placeholder(sort: usize) -> Self {
        Self {
            sort,
            comment: None,
            children: BTreeMap::new(),
        }
    }

    pub fn sorted_children(&self) -> Vec<(CommentId, &CommentNode<T>)> {
        sorted(&self.children)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentMap<T> {
    pub children: BTreeMap<CommentId, CommentNode<T>>,
}

impl<T> Default for CommentMap<T> {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
        }
    }
}

impl<T> CommentMap<T> {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, path: &CommentPath) -> Option<&CommentNode<T>> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.children.get(first)?;
        for id in rest {
            node = node.children.get(id)?;
        }
        Some(node)
    }

    pub fn sorted_children(&self) -> Vec<(CommentId, &CommentNode<T>)> {
        sorted(&self.children)
    }
}

fn sorted<T>(children: &BTreeMap<CommentId, CommentNode<T>>) -> Vec<(CommentId, &CommentNode<T>)> {
    let mut out: Vec<_> = children.iter().map(|(id, node)| (*id, node)).collect();
    out.sort_by_key(|(_, node)| node.sort);
    out
}

/// Builds the nested tree. With `focus`, the output is re-rooted so the
/// focused thread renders as top level; items on other branches of the same
/// depth or deeper are skipped, shorter ancestors are kept.
pub fn build_comment_map<I, T>(comments: I, focus: Option<&CommentPath>) -> CommentMap<T>
where
    I: IntoIterator<Item = T>,
    T: HasCommentPath,
{
    let mut map = CommentMap::default();
    let mut next_sort = 0usize;

    for item in comments {
        let Some(mut path) = CommentPath::parse(item.comment_path()) else {
            continue;
        };

        if let Some(focus) = focus.filter(|focus| !focus.is_empty()) {
            path.reroot_at(focus.segments()[0]);
            if path.len() >= focus.len() && !path.contains_run(focus) {
                continue;
            }
        }

        let (first, rest) = match path.segments().split_first() {
            Some(split) => split,
            None => continue,
        };
        let mut node = map.children.entry(*first).or_insert_with(|| {
            let node = CommentNode::placeholder(next_sort);
            next_sort += 1;
            node
        });
        for id in rest {
            node = node.children.entry(*id).or_insert_with(|| {
                let node = CommentNode::placeholder(next_sort);
                next_sort += 1;
                node
            });
        }
        if node.comment.is_none() {
            node.comment = Some(item);
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> CommentPath {
        CommentPath::parse(raw).unwrap()
    }

    #[test]
    fn parse_and_format() {
        assert_eq!(path("0.1234.5678").segments(), &[1234, 5678]);
        assert_eq!(path("1234.5678").segments(), &[1234, 5678]);
        assert_eq!(path("0.1234.5678").to_string(), "0.1234.5678");
        assert_eq!(path("0.1.2").parent(), Some(path("0.1")));
        assert_eq!(path("0.1").parent(), None);
        assert_eq!(path("0.1.2").depth(), 1);
        assert!(CommentPath::parse("").is_none());
        assert!(CommentPath::parse("0").is_none());
        assert!(CommentPath::parse("0.x.2").is_none());
    }

    #[test]
    fn top_level_chain() {
        let input = ["0.1234", "0.1234.5678", "0.1234.5678.9101112"];
        let map = build_comment_map(input, None);

        let top = &map.children[&1234];
        assert_eq!(top.sort, 0);
        assert_eq!(top.comment, Some("0.1234"));
        let mid = &top.children[&5678];
        assert_eq!(mid.sort, 1);
        assert_eq!(mid.comment, Some("0.1234.5678"));
        let leaf = &mid.children[&9101112];
        assert_eq!(leaf.sort, 2);
        assert_eq!(leaf.comment, Some("0.1234.5678.9101112"));
        assert!(leaf.children.is_empty());
    }

    #[test]
    fn focused_subtree_is_rerooted() {
        let input = ["0.1234.5678", "0.1234.5678.9101112"];
        let focus = path("1234.5678");
        let map = build_comment_map(input, Some(&focus));

        let top = &map.children[&1234];
        assert_eq!(top.sort, 0);
        assert_eq!(top.comment, None);
        let mid = &top.children[&5678];
        assert_eq!(mid.sort, 1);
        assert_eq!(mid.comment, Some("0.1234.5678"));
        let leaf = &mid.children[&9101112];
        assert_eq!(leaf.sort, 2);
        assert_eq!(leaf.comment, Some("0.1234.5678.9101112"));
    }

    #[test]
    fn focus_deep_in_thread_drops_ancestors_above_anchor() {
        let input = ["0.1.1234", "0.1.1234.5678", "0.1.1234.5678.9"];
        let focus = path("1234.5678");
        let map = build_comment_map(input, Some(&focus));
        assert_eq!(map.children.len(), 1);
        assert!(map.get(&path("1234.5678.9")).is_some());
        assert_eq!(map.children[&1234].comment, Some("0.1.1234"));
    }

    #[test]
    fn focus_skips_sibling_branches() {
        let input = ["0.1234", "0.1234.9999", "0.1234.5678", "0.1234.9999.1"];
        let focus = path("1234.5678");
        let map = build_comment_map(input, Some(&focus));
        let top = &map.children[&1234];
        assert_eq!(top.comment, Some("0.1234"));
        assert_eq!(top.children.keys().copied().collect::<Vec<_>>(), vec![5678]);
    }

    #[test]
    fn duplicates_do_not_advance_sort() {
        let input = ["0.1", "0.1", "0.2"];
        let map = build_comment_map(input, None);
        assert_eq!(map.children[&1].sort, 0);
        assert_eq!(map.children[&2].sort, 1);
    }

    #[test]
    fn duplicate_attaches_comment_to_placeholder() {
        let input = vec!["0.1.2".to_string(), "0.1".to_string(), "0.1".to_string()];
        let map = build_comment_map(input, None);
        assert_eq!(map.children[&1].comment.as_deref(), Some("0.1"));
        assert_eq!(map.children[&1].sort, 0);
        assert_eq!(map.children[&1].children[&2].sort, 1);
    }

    #[test]
    fn empty_input_is_empty_map() {
        let map = build_comment_map(Vec::<&str>::new(), None);
        assert!(map.is_empty());
    }

    #[test]
    fn missing_parent_becomes_placeholder() {
        let map = build_comment_map(["0.10.20"], None);
        let parent = &map.children[&10];
        assert!(parent.comment.is_none());
        assert_eq!(parent.children[&20].comment, Some("0.10.20"));
    }

    #[test]
    fn malformed_paths_are_dropped() {
        let map = build_comment_map(["", "0", "0.abc", "0.5"], None);
        assert_eq!(map.children.keys().copied().collect::<Vec<_>>(), vec![5]);
        assert_eq!(map.children[&5].sort, 0);
    }

    #[test]
    fn sibling_order_follows_first_appearance() {
        let map = build_comment_map(["0.30", "0.10", "0.20"], None);
        let order: Vec<_> = map.sorted_children().iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![30, 10, 20]);
    }

    #[test]
    fn building_twice_is_identical() {
        let input = ["0.3.4", "0.1", "0.3", "0.1.2", "0.3.4.5"];
        assert_eq!(build_comment_map(input, None), build_comment_map(input, None));
    }

    #[test]
    fn every_comment_is_reachable_by_its_path() {
        let input = ["0.3.4", "0.1", "0.3", "0.1.2", "0.3.4.5", "0.7.8.9"];
        let map = build_comment_map(input, None);
        for raw in input {
            let node = map.get(&path(raw)).unwrap();
            assert_eq!(node.comment, Some(raw));
        }
    }
}
