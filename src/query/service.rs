use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{CommunityId, Direction, OrderKind, Page, PostId, UserId};
use crate::index::RankingStore;

/// 列表查询参数：未指定社区时走全局索引
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub order: OrderKind,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_size")]
    pub size: u64,
    #[serde(default)]
    pub community_id: Option<CommunityId>,
}

fn default_page() -> u64 {
    1
}

fn default_size() -> u64 {
    10
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            order: OrderKind::Time,
            page: default_page(),
            size: default_size(),
            community_id: None,
        }
    }
}

impl ListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.size)
    }
}

/// 排名查询服务：分页读取 + 批量计票
#[derive(Clone)]
pub struct RankingQueryService {
    store: Arc<RankingStore>,
}

impl RankingQueryService {
    pub fn new(store: Arc<RankingStore>) -> Self {
        Self { store }
    }

    pub fn list_by_order(&self, order: OrderKind, page: Page) -> Vec<PostId> {
        self.store.list(order, page)
    }

    pub fn list_by_community(&self, community: CommunityId, order: OrderKind, page: Page) -> Vec<PostId> {
        self.store.list_community(community, order, page)
    }

    pub fn list(&self, q: &ListQuery) -> Vec<PostId> {
        match q.community_id {
            Some(c) => self.list_by_community(c, q.order, q.page()),
            None => self.list_by_order(q.order, q.page()),
        }
    }

    pub fn vote_counts(&self, ids: &[PostId]) -> HashMap<PostId, i64> {
        self.store.vote_counts(ids)
    }

    pub fn user_vote_direction(&self, voter: UserId, post: PostId) -> Direction {
        self.store.user_direction(voter, post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ManualClock, RankingEntry};

    fn service_with(posts: u64) -> (RankingQueryService, Arc<RankingStore>) {
        let clock = Arc::new(ManualClock::at_secs(10_000));
        let store = Arc::new(RankingStore::new(60, clock));
        for id in 1..=posts {
            store
                .create_entry(RankingEntry {
                    post_id: id,
                    community_id: id % 2,
                    create_time: 1_000 + id as i64,
                })
                .unwrap();
        }
        (RankingQueryService::new(store.clone()), store)
    }

    #[test]
    fn time_pages_are_recent_first_and_disjoint() {
        let (svc, _) = service_with(25);
        let p1 = svc.list_by_order(OrderKind::Time, Page::new(1, 10));
        let p2 = svc.list_by_order(OrderKind::Time, Page::new(2, 10));
        let p3 = svc.list_by_order(OrderKind::Time, Page::new(3, 10));

        assert_eq!(p1, (16..=25).rev().collect::<Vec<_>>());
        assert_eq!(p2, (6..=15).rev().collect::<Vec<_>>());
        assert_eq!(p3.len(), 5);
        assert!(p1.iter().all(|id| !p2.contains(id)));
        assert!(svc.list_by_order(OrderKind::Time, Page::new(4, 10)).is_empty());
    }

    #[test]
    fn community_listing_only_returns_members() {
        let (svc, store) = service_with(20);
        for order in [OrderKind::Time, OrderKind::Score] {
            let ids = svc.list_by_community(1, order, Page::new(1, 100));
            assert_eq!(ids.len(), 10);
            assert!(ids.iter().all(|id| store.is_member(1, *id) && id % 2 == 1));
        }
    }

    #[test]
    fn list_dispatches_on_community() {
        let (svc, _) = service_with(4);
        let global = ListQuery {
            order: OrderKind::Time,
            page: 1,
            size: 10,
            community_id: None,
        };
        assert_eq!(svc.list(&global), vec![4, 3, 2, 1]);
        let scoped = ListQuery {
            community_id: Some(0),
            ..global
        };
        assert_eq!(svc.list(&scoped), vec![4, 2]);
    }

    #[test]
    fn community_view_is_stable_within_ttl() {
        let clock = Arc::new(ManualClock::at_secs(10_000));
        let store = Arc::new(RankingStore::new(60, clock.clone()));
        let svc = RankingQueryService::new(store.clone());
        let mk = |id, t| RankingEntry {
            post_id: id,
            community_id: 5,
            create_time: t,
        };
        store.create_entry(mk(1, 9_000)).unwrap();
        let before = svc.list_by_community(5, OrderKind::Time, Page::new(1, 10));
        assert_eq!(before, vec![1]);

        store.create_entry(mk(2, 9_500)).unwrap();
        clock.advance_secs(30);
        assert_eq!(svc.list_by_community(5, OrderKind::Time, Page::new(1, 10)), before);

        clock.advance_secs(31);
        assert_eq!(
            svc.list_by_community(5, OrderKind::Time, Page::new(1, 10)),
            vec![2, 1]
        );
    }

    #[test]
    fn list_query_defaults() {
        let q: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.size, 10);
        assert_eq!(q.order, OrderKind::Time);
        assert_eq!(q.community_id, None);
    }
}
