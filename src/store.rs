//! Normalized per-entity caches.
//!
//! Writes are stamped with ticks from a [`Clock`] shared by all stores.
//! Fetches remember the tick at which they were issued; a record that was
//! optimistically patched after that tick keeps its patched state when the
//! older fetch lands.

use std::collections::HashMap;
use std::hash::Hash;

use crate::cache_key::{CacheKey, CachePrefixer};
use crate::lemmy::{CommentView, CommunityView, PersonView, PostView};

pub type Tick = u64;

#[derive(Debug, Default)]
pub struct Clock {
    now: Tick,
}

impl Clock {
    pub fn tick(&mut self) -> Tick {
        self.now += 1;
        self.now
    }

    pub fn now(&self) -> Tick {
        self.now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record<V> {
    pub data: V,
    pub written_at: Tick,
    pub patched_at: Tick,
}

#[derive(Debug)]
pub struct Store<K, V> {
    records: HashMap<K, Record<V>>,
    revision: u64,
}

impl<K, V> Default for Store<K, V> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            revision: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, V> Store<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.records.get(key).map(|record| &record.data)
    }

    pub fn record(&self, key: &K) -> Option<&Record<V>> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumped on every effective write; cheap change detection for renderers.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn entries(&self) -> impl Iterator<Item = (&K, &Record<V>)> {
        self.records.iter()
    }

    /// Writes one record unless it was patched after `issued_at`. Returns
    /// whether the write took effect.
    pub fn overwrite(&mut self, key: K, data: V, issued_at: Tick) -> bool {
        let patched_at = match self.records.get(&key) {
            Some(existing) if existing.patched_at > issued_at => return false,
            Some(existing) => existing.patched_at,
            None => 0,
        };
        self.records.insert(
            key,
            Record {
                data,
                written_at: issued_at,
                patched_at,
            },
        );
        self.revision += 1;
        true
    }

    /// Bulk variant of [`Store::overwrite`]; the whole batch is applied before
    /// returning. Returns the number of records written.
    pub fn populate<I>(&mut self, items: I, issued_at: Tick) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        items
            .into_iter()
            .map(|(key, data)| self.overwrite(key, data, issued_at))
            .filter(|written| *written)
            .count()
    }

    /// Transforms an existing record in place. Missing keys are left alone.
    pub fn patch<F>(&mut self, key: &K, at: Tick, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        match self.records.get_mut(key) {
            Some(record) => {
                f(&mut record.data);
                record.patched_at = at;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.records.remove(key).map(|record| record.data);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            self.records.clear();
            self.revision += 1;
        }
    }
}

impl<V> Store<CacheKey, V> {
    /// First record under `prefixer`'s namespace matching `pred`.
    pub fn find<P>(&self, prefixer: &CachePrefixer, mut pred: P) -> Option<(&CacheKey, &V)>
    where
        P: FnMut(&V) -> bool,
    {
        self.records
            .iter()
            .filter(|(key, _)| key.has_prefix(prefixer))
            .find(|(_, record)| pred(&record.data))
            .map(|(key, record)| (key, &record.data))
    }

    /// Patches every record under `prefixer`'s namespace matching `pred`.
    pub fn patch_where<P, F>(&mut self, prefixer: &CachePrefixer, at: Tick, mut pred: P, mut f: F) -> usize
    where
        P: FnMut(&V) -> bool,
        F: FnMut(&mut V),
    {
        let mut patched = 0;
        for (key, record) in self.records.iter_mut() {
            if key.has_prefix(prefixer) && pred(&record.data) {
                f(&mut record.data);
                record.patched_at = at;
                patched += 1;
            }
        }
        if patched > 0 {
            self.revision += 1;
        }
        patched
    }
}

pub type PostStore = Store<CacheKey, PostView>;
pub type CommentStore = Store<CacheKey, CommentView>;
pub type CommunityStore = Store<CacheKey, CommunityView>;
pub type ProfileStore = Store<CacheKey, PersonView>;

/// The four entity stores and the clock that stamps their writes.
#[derive(Debug, Default)]
pub struct Stores {
    pub posts: PostStore,
    pub comments: CommentStore,
    pub communities: CommunityStore,
    pub profiles: ProfileStore,
    clock: Clock,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> Tick {
        self.clock.tick()
    }

    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    pub fn populate_posts<'a, I>(&mut self, prefixer: &CachePrefixer, posts: I, issued_at: Tick) -> Vec<CacheKey>
    where
        I: IntoIterator<Item = &'a PostView>,
    {
        let mut keys = Vec::new();
        for view in posts {
            let key = post_key(prefixer, view);
            self.posts.overwrite(key.clone(), view.clone(), issued_at);
            keys.push(key);
        }
        keys
    }

    pub fn populate_comments<'a, I>(
        &mut self,
        prefixer: &CachePrefixer,
        comments: I,
        issued_at: Tick,
    ) -> Vec<CacheKey>
    where
        I: IntoIterator<Item = &'a CommentView>,
    {
        let mut keys = Vec::new();
        for view in comments {
            let key = comment_key(prefixer, view);
            self.comments.overwrite(key.clone(), view.clone(), issued_at);
            keys.push(key);
        }
        keys
    }

    pub fn populate_communities<'a, I>(
        &mut self,
        prefixer: &CachePrefixer,
        communities: I,
        issued_at: Tick,
    ) -> Vec<CacheKey>
    where
        I: IntoIterator<Item = &'a CommunityView>,
    {
        let mut keys = Vec::new();
        for view in communities {
            let key = community_key(prefixer, view);
            self.communities.overwrite(key.clone(), view.clone(), issued_at);
            keys.push(key);
        }
        keys
    }

    pub fn populate_profiles<'a, I>(
        &mut self,
        prefixer: &CachePrefixer,
        profiles: I,
        issued_at: Tick,
    ) -> Vec<CacheKey>
    where
        I: IntoIterator<Item = &'a PersonView>,
    {
        let mut keys = Vec::new();
        for view in profiles {
            let key = profile_key(prefixer, view);
            self.profiles.overwrite(key.clone(), view.clone(), issued_at);
            keys.push(key);
        }
        keys
    }

    pub fn clear(&mut self) {
        self.posts.clear();
        self.comments.clear();
        self.communities.clear();
        self.profiles.clear();
    }
}

pub fn post_key(prefixer: &CachePrefixer, view: &PostView) -> CacheKey {
    prefixer.key(&view.post.ap_id)
}

pub fn comment_key(prefixer: &CachePrefixer, view: &CommentView) -> CacheKey {
    prefixer.key(&view.comment.path)
}

pub fn community_key(prefixer: &CachePrefixer, view: &CommunityView) -> CacheKey {
    prefixer.key(&view.community.slug())
}

pub fn profile_key(prefixer: &CachePrefixer, view: &PersonView) -> CacheKey {
    prefixer.key(&view.person.actor_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::session::Account;

    fn prefixer() -> CachePrefixer {
        CachePrefixer::for_account(&Account::new("https://lemmy.world"))
    }

    #[test]
    fn last_writer_wins() {
        let mut store: Store<String, i32> = Store::new();
        store.overwrite("a".into(), 1, 1);
        store.overwrite("a".into(), 2, 2);
        assert_eq!(store.get(&"a".to_string()), Some(&2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn patch_without_record_is_noop() {
        let mut store: Store<String, i32> = Store::new();
        let revision = store.revision();
        assert!(!store.patch(&"missing".to_string(), 1, |v| *v += 1));
        assert!(store.is_empty());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn patch_keeps_rest_of_record() {
        let mut stores = Stores::new();
        let prefixer = prefixer();
        let view = fixtures::post_view(1, "https://lemmy.world");
        let t = stores.tick();
        let keys = stores.populate_posts(&prefixer, [&view], t);
        let t = stores.tick();
        stores.posts.patch(&keys[0], t, |post| post.saved = true);
        let patched = stores.posts.get(&keys[0]).unwrap();
        assert!(patched.saved);
        assert_eq!(patched.post, view.post);
    }

    #[test]
    fn stale_populate_does_not_revert_newer_patch() {
        let mut store: Store<String, i32> = Store::new();
        store.overwrite("a".into(), 0, 1);
        let issued = 2;
        store.patch(&"a".to_string(), 3, |v| *v = 10);
        assert!(!store.overwrite("a".into(), 0, issued));
        assert_eq!(store.get(&"a".to_string()), Some(&10));
        assert!(store.overwrite("a".into(), 11, 4));
        assert_eq!(store.get(&"a".to_string()), Some(&11));
    }

    #[test]
    fn populate_reports_effective_writes() {
        let mut store: Store<String, i32> = Store::new();
        store.overwrite("a".into(), 0, 1);
        store.patch(&"a".to_string(), 5, |v| *v = 1);
        let written = store.populate(vec![("a".to_string(), 2), ("b".to_string(), 3)], 4);
        assert_eq!(written, 1);
        assert_eq!(store.get(&"a".to_string()), Some(&1));
        assert_eq!(store.get(&"b".to_string()), Some(&3));
    }

    #[test]
    fn find_and_patch_where_respect_prefix() {
        let mut stores = Stores::new();
        let anon = prefixer();
        let authed = CachePrefixer::for_account(&Account {
            jwt: Some("jwt".into()),
            ..Account::new("https://lemmy.world")
        });
        let view = fixtures::post_view(1, "https://lemmy.world");
        let t = stores.tick();
        stores.populate_posts(&anon, [&view], t);
        stores.populate_posts(&authed, [&view], t);

        assert!(stores.posts.find(&anon, |v| v.post.id == 1).is_some());
        let t = stores.tick();
        let n = stores
            .posts
            .patch_where(&authed, t, |v| v.creator.id == view.creator.id, |v| v.creator_blocked = true);
        assert_eq!(n, 1);
        let (_, anon_view) = stores.posts.find(&anon, |v| v.post.id == 1).unwrap();
        assert!(!anon_view.creator_blocked);
    }

    #[test]
    fn clear_empties_every_store() {
        let mut stores = Stores::new();
        let prefixer = prefixer();
        let t = stores.tick();
        stores.populate_posts(&prefixer, [&fixtures::post_view(1, "https://lemmy.world")], t);
        stores.populate_comments(&prefixer, [&fixtures::comment_view(5, "0.5", 1)], t);
        stores.clear();
        assert!(stores.posts.is_empty());
        assert!(stores.comments.is_empty());
    }
}
