use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::core::{Clock, CommunityId, Direction, OrderKind, Page, PostId, RankingEntry, UserId};
use crate::error::Result;
use crate::index::{RankingStore, VoteApplied};
use crate::query::RankingQueryService;
use crate::stats::IndexReport;
use crate::vote::{VotePolicy, VotingService};

/// 排名核心对外的服务契约
pub struct RankingEngine {
    store: Arc<RankingStore>,
    voting: VotingService,
    query: RankingQueryService,
}

impl RankingEngine {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(RankingStore::new(config.community_cache_ttl_secs, clock));
        let policy = VotePolicy {
            window_secs: config.vote_window_secs,
            score_per_vote: config.score_per_vote,
        };
        Self {
            voting: VotingService::new(store.clone(), policy),
            query: RankingQueryService::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<RankingStore> {
        &self.store
    }

    pub fn query(&self) -> &RankingQueryService {
        &self.query
    }

    /// 帖子持久化成功后调用一次
    pub fn create_ranking_entry(&self, post_id: PostId, community_id: CommunityId, create_time: i64) -> Result<()> {
        self.store.create_entry(RankingEntry {
            post_id,
            community_id,
            create_time,
        })
    }

    pub fn vote(&self, voter: UserId, post: PostId, direction: Direction) -> Result<VoteApplied> {
        self.voting.vote(voter, post, direction)
    }

    pub fn vote_raw(&self, voter: UserId, post: PostId, direction: i64) -> Result<VoteApplied> {
        self.voting.vote_raw(voter, post, direction)
    }

    pub fn list_posts(&self, order: OrderKind, page: u64, size: u64) -> Vec<PostId> {
        self.query.list_by_order(order, Page::new(page, size))
    }

    pub fn list_community_posts(&self, community: CommunityId, order: OrderKind, page: u64, size: u64) -> Vec<PostId> {
        self.query.list_by_community(community, order, Page::new(page, size))
    }

    pub fn vote_counts(&self, ids: &[PostId]) -> HashMap<PostId, i64> {
        self.query.vote_counts(ids)
    }

    pub fn user_vote_direction(&self, voter: UserId, post: PostId) -> Direction {
        self.query.user_vote_direction(voter, post)
    }

    pub fn report(&self) -> IndexReport {
        self.store.report()
    }
}
