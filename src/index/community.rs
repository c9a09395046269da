use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::core::{CommunityId, OrderKind, PostId, RankKey};
use crate::index::ordered::OrderedIndex;

/// 社区成员本身不携带排名信号
pub const MEMBERSHIP_WEIGHT: f64 = 1.0;

/// 派生视图缓存条目：(value, computed_at)
#[derive(Clone, Debug)]
pub struct CachedView {
    pub ids: Arc<Vec<PostId>>,
    pub computed_at_ms: i64,
}

impl CachedView {
    fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.computed_at_ms < ttl_ms
    }
}

/// 社区索引：成员集合 + 按 (community, order) 缓存的有序视图
///
/// 视图 = 成员集合 ∩ 全局索引，键取 max(成员权重, 全局键)；惰性、TTL 门控，
/// 不在写入时失效（调用方接受 ≤ TTL 的陈旧度）。
#[derive(Debug)]
pub struct CommunityIndex {
    members: RwLock<HashMap<CommunityId, HashSet<PostId>>>,
    cache: DashMap<(CommunityId, OrderKind), CachedView>,
    ttl_ms: i64,
}

impl CommunityIndex {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            cache: DashMap::new(),
            ttl_ms: i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
        }
    }

    /// 返回 false 表示已是成员
    pub fn add_member(&self, community: CommunityId, post: PostId) -> bool {
        self.members
            .write()
            .entry(community)
            .or_default()
            .insert(post)
    }

    pub fn is_member(&self, community: CommunityId, post: PostId) -> bool {
        self.members
            .read()
            .get(&community)
            .is_some_and(|s| s.contains(&post))
    }

    /// 有效缓存直接复用（不触碰全局索引）；过期或缺失则同步重建
    pub fn ordered_view(
        &self,
        community: CommunityId,
        order: OrderKind,
        global: &OrderedIndex,
        now_ms: i64,
    ) -> Arc<Vec<PostId>> {
        let key = (community, order);
        if let Some(v) = self.cache.get(&key) {
            if v.is_fresh(now_ms, self.ttl_ms) {
                return v.ids.clone();
            }
        }

        let ids = Arc::new(self.intersect(community, global));
        tracing::debug!(
            "Community view rebuilt: community={}, order={}, size={}",
            community,
            order,
            ids.len()
        );
        self.cache.insert(
            key,
            CachedView {
                ids: ids.clone(),
                computed_at_ms: now_ms,
            },
        );
        ids
    }

    fn intersect(&self, community: CommunityId, global: &OrderedIndex) -> Vec<PostId> {
        let members: Vec<PostId> = match self.members.read().get(&community) {
            Some(set) => set.iter().copied().collect(),
            None => return Vec::new(),
        };
        let mut keyed: Vec<(RankKey, PostId)> = global
            .keys_of(members)
            .into_iter()
            .map(|(id, k)| (RankKey(k.max(MEMBERSHIP_WEIGHT)), id))
            .collect();
        // 与全局索引一致：键倒序，同键 id 倒序
        keyed.sort_unstable_by(|a, b| b.cmp(a));
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    pub fn community_count(&self) -> usize {
        self.members.read().len()
    }

    pub fn cached_views(&self) -> usize {
        self.cache.len()
    }

    pub fn export(&self) -> Vec<(CommunityId, Vec<PostId>)> {
        self.members
            .read()
            .iter()
            .map(|(c, s)| (*c, s.iter().copied().collect()))
            .collect()
    }

    pub fn replace_all(&self, entries: impl IntoIterator<Item = (CommunityId, Vec<PostId>)>) {
        let mut members: HashMap<CommunityId, HashSet<PostId>> = HashMap::new();
        for (c, posts) in entries {
            members.entry(c).or_default().extend(posts);
        }
        *self.members.write() = members;
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> OrderedIndex {
        let g = OrderedIndex::new();
        g.insert(1, 100.0);
        g.insert(2, 300.0);
        g.insert(3, 200.0);
        g.insert(4, 400.0);
        g
    }

    #[test]
    fn view_excludes_non_members() {
        let c = CommunityIndex::new(60);
        c.add_member(7, 1);
        c.add_member(7, 3);
        c.add_member(8, 2);
        let g = global();
        assert_eq!(*c.ordered_view(7, OrderKind::Time, &g, 0), vec![3, 1]);
        assert_eq!(*c.ordered_view(8, OrderKind::Time, &g, 0), vec![2]);
        assert!(c.ordered_view(9, OrderKind::Time, &g, 0).is_empty());
    }

    #[test]
    fn members_missing_from_global_are_dropped() {
        let c = CommunityIndex::new(60);
        c.add_member(1, 42);
        c.add_member(1, 2);
        assert_eq!(*c.ordered_view(1, OrderKind::Score, &global(), 0), vec![2]);
    }

    #[test]
    fn cached_view_survives_global_mutation_until_ttl() {
        let c = CommunityIndex::new(60);
        c.add_member(1, 1);
        c.add_member(1, 2);
        let g = global();
        assert_eq!(*c.ordered_view(1, OrderKind::Score, &g, 0), vec![2, 1]);

        g.adjust(1, 1000.0);
        assert_eq!(*c.ordered_view(1, OrderKind::Score, &g, 59_999), vec![2, 1]);
        assert_eq!(*c.ordered_view(1, OrderKind::Score, &g, 60_000), vec![1, 2]);
    }

    #[test]
    fn cache_key_includes_order_kind() {
        let c = CommunityIndex::new(60);
        c.add_member(1, 1);
        let g = global();
        c.ordered_view(1, OrderKind::Time, &g, 0);
        c.ordered_view(1, OrderKind::Score, &g, 0);
        assert_eq!(c.cached_views(), 2);
    }

    #[test]
    fn aggregated_key_floors_at_membership_weight() {
        let c = CommunityIndex::new(60);
        let g = OrderedIndex::new();
        g.insert(1, -5.0);
        g.insert(2, 0.5);
        c.add_member(1, 1);
        c.add_member(1, 2);
        // 两者都被抬到 1.0，同键按 id 倒序
        assert_eq!(*c.ordered_view(1, OrderKind::Score, &g, 0), vec![2, 1]);
    }
}
