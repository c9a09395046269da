use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::{Clock, CommunityId, Direction, OrderKind, Page, PostId, RankingEntry, UserId};
use crate::error::{RankError, Result};
use crate::index::community::CommunityIndex;
use crate::index::ledger::VoteLedger;
use crate::index::ordered::OrderedIndex;
use crate::stats::IndexReport;

// 小批量计票直接串行，避免调度开销
const PAR_TALLY_THRESHOLD: usize = 256;

/// 一次投票在账本与分数索引上落地后的结果
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoteApplied {
    pub old: Direction,
    pub new: Direction,
    pub delta: f64,
    pub score: f64,
}

/// 投票决策的输入：持锁期间读到的当前状态
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoteContext {
    pub old: Direction,
    pub create_time: f64,
}

/// 排名核心的完整可序列化状态
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub time: Vec<(PostId, f64)>,
    pub score: Vec<(PostId, f64)>,
    pub members: Vec<(CommunityId, Vec<PostId>)>,
    pub votes: Vec<(PostId, UserId, Direction)>,
}

/// 共享排名存储：时间索引 + 分数索引 + 社区索引 + 投票账本
///
/// ## 并发契约
/// - 只暴露原子方法；调用方拿不到任何内部结构的可变引用。
/// - 创建帖子持 `apply_gate` 写锁一次写三处索引；投票与社区视图重建持读锁，
///   因此不会观察到"只在部分索引中出现"的帖子。
/// - 投票在账本的帖子分片上独占执行，同一帖子的并发投票串行化，不同帖子互不阻塞。
pub struct RankingStore {
    time: OrderedIndex,
    score: OrderedIndex,
    community: CommunityIndex,
    ledger: VoteLedger,
    apply_gate: RwLock<()>,
    clock: Arc<dyn Clock>,
    pub votes_applied: AtomicU64,
    pub votes_rejected: AtomicU64,
}

impl RankingStore {
    pub fn new(community_ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            time: OrderedIndex::new(),
            score: OrderedIndex::new(),
            community: CommunityIndex::new(community_ttl_secs),
            ledger: VoteLedger::new(),
            apply_gate: RwLock::new(()),
            clock,
            votes_applied: AtomicU64::new(0),
            votes_rejected: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 多索引原子插入：要么三处都写入，要么一处不写
    pub fn create_entry(&self, entry: RankingEntry) -> Result<()> {
        let _g = self.apply_gate.write();

        // 先校验，再写入：失败时索引保持原状
        if self.time.contains(entry.post_id) || self.score.contains(entry.post_id) {
            return Err(RankError::DuplicatePost(entry.post_id));
        }
        let created = entry.create_time as f64;

        self.time.insert(entry.post_id, created);
        // 初始分数 = 创建时间，未投票的帖子仍按新旧排序
        self.score.insert(entry.post_id, created);
        self.community.add_member(entry.community_id, entry.post_id);

        tracing::debug!(
            "Ranking entry created: post={}, community={}, create_time={}",
            entry.post_id,
            entry.community_id,
            entry.create_time
        );
        Ok(())
    }

    /// 在单个帖子的独占区内执行投票：
    /// 读旧方向 → `decide` 计算分数增量 → 分数索引原子累加 → 写账本。
    ///
    /// `decide` 返回 Err 时不做任何修改。
    pub fn apply_vote<F>(&self, post: PostId, voter: UserId, new: Direction, decide: F) -> Result<VoteApplied>
    where
        F: FnOnce(VoteContext) -> Result<f64>,
    {
        let _g = self.apply_gate.read();

        let Some(create_time) = self.time.get_key(post) else {
            self.votes_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(RankError::PostNotFound(post));
        };

        let res = self.ledger.with_post(post, |votes| {
            let old = votes.get(voter);
            let delta = decide(VoteContext { old, create_time })?;
            let score = self.score.adjust(post, delta).ok_or_else(|| {
                RankError::store(format!("post {post} present in time index but not in score index"))
            })?;
            votes.set(voter, new);
            Ok(VoteApplied {
                old,
                new,
                delta,
                score,
            })
        });

        match &res {
            Ok(_) => self.votes_applied.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.votes_rejected.fetch_add(1, Ordering::Relaxed),
        };
        res
    }

    fn global(&self, order: OrderKind) -> &OrderedIndex {
        match order {
            OrderKind::Time => &self.time,
            OrderKind::Score => &self.score,
        }
    }

    pub fn list(&self, order: OrderKind, page: Page) -> Vec<PostId> {
        match page.window() {
            Some((offset, count)) => self.global(order).range_desc(offset, count),
            None => Vec::new(),
        }
    }

    pub fn list_community(&self, community: CommunityId, order: OrderKind, page: Page) -> Vec<PostId> {
        let Some((offset, count)) = page.window() else {
            return Vec::new();
        };
        let view = {
            let _g = self.apply_gate.read();
            self.community.ordered_view(
                community,
                order,
                self.global(order),
                self.clock.now_millis(),
            )
        };
        view.iter().skip(offset).take(count).copied().collect()
    }

    /// 批量净票数：一次遍历完成，未知 id 计为 0
    pub fn vote_counts(&self, ids: &[PostId]) -> HashMap<PostId, i64> {
        if ids.len() < PAR_TALLY_THRESHOLD {
            ids.iter().map(|id| (*id, self.ledger.net_votes(*id))).collect()
        } else {
            ids.par_iter()
                .map(|id| (*id, self.ledger.net_votes(*id)))
                .collect()
        }
    }

    pub fn user_direction(&self, voter: UserId, post: PostId) -> Direction {
        self.ledger.get(post, voter)
    }

    pub fn create_time(&self, post: PostId) -> Option<f64> {
        self.time.get_key(post)
    }

    pub fn score(&self, post: PostId) -> Option<f64> {
        self.score.get_key(post)
    }

    pub fn ledger_entries(&self, post: PostId) -> usize {
        self.ledger.entry_count(post)
    }

    pub fn is_member(&self, community: CommunityId, post: PostId) -> bool {
        self.community.is_member(community, post)
    }

    pub fn post_count(&self) -> usize {
        self.time.len()
    }

    pub fn report(&self) -> IndexReport {
        IndexReport {
            posts: self.time.len(),
            scored_posts: self.score.len(),
            communities: self.community.community_count(),
            cached_views: self.community.cached_views(),
            voted_posts: self.ledger.voted_posts(),
            vote_entries: self.ledger.total_entries(),
            votes_applied: self.votes_applied.load(Ordering::Relaxed),
            votes_rejected: self.votes_rejected.load(Ordering::Relaxed),
        }
    }

    /// 一致性快照：持写锁，期间无创建/投票
    pub fn export_snapshot(&self) -> RankingSnapshot {
        let _g = self.apply_gate.write();
        RankingSnapshot {
            time: self.time.entries(),
            score: self.score.entries(),
            members: self.community.export(),
            votes: self.ledger.export(),
        }
    }

    /// 整体替换全部状态；社区缓存同时清空
    ///
    /// 时间索引与分数索引的 id 集合必须一致；指向未知帖子的成员与投票行被丢弃。
    pub fn import_snapshot(&self, mut snap: RankingSnapshot) -> Result<()> {
        let posts: HashSet<PostId> = snap.time.iter().map(|(id, _)| *id).collect();
        let scored: HashSet<PostId> = snap.score.iter().map(|(id, _)| *id).collect();
        if posts.len() != snap.time.len() || scored.len() != snap.score.len() {
            return Err(RankError::store("snapshot contains duplicate post ids"));
        }
        if posts != scored {
            let stray = posts.symmetric_difference(&scored).count();
            return Err(RankError::store(format!(
                "snapshot index mismatch: {} post ids not in both time and score",
                stray
            )));
        }

        let mut dropped = 0usize;
        for (_, members) in snap.members.iter_mut() {
            let before = members.len();
            members.retain(|id| posts.contains(id));
            dropped += before - members.len();
        }
        snap.members.retain(|(_, members)| !members.is_empty());
        let before = snap.votes.len();
        snap.votes.retain(|(id, _, _)| posts.contains(id));
        dropped += before - snap.votes.len();
        if dropped > 0 {
            tracing::warn!("Snapshot import dropped {} rows for unknown posts", dropped);
        }

        let _g = self.apply_gate.write();
        self.time.replace_all(snap.time);
        self.score.replace_all(snap.score);
        self.community.replace_all(snap.members);
        self.ledger.replace_all(snap.votes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;

    fn store_at(secs: i64) -> (RankingStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_secs(secs));
        (RankingStore::new(60, clock.clone()), clock)
    }

    fn entry(post_id: PostId, community_id: CommunityId, create_time: i64) -> RankingEntry {
        RankingEntry {
            post_id,
            community_id,
            create_time,
        }
    }

    #[test]
    fn created_post_appears_in_every_index() {
        let (s, _) = store_at(2_000);
        s.create_entry(entry(1, 9, 1_000)).unwrap();

        assert_eq!(s.create_time(1), Some(1_000.0));
        assert_eq!(s.score(1), Some(1_000.0));
        assert!(s.is_member(9, 1));
        assert_eq!(s.list(OrderKind::Time, Page::default()), vec![1]);
        assert_eq!(s.list_community(9, OrderKind::Score, Page::default()), vec![1]);
    }

    #[test]
    fn duplicate_create_leaves_indexes_untouched() {
        let (s, _) = store_at(2_000);
        s.create_entry(entry(1, 9, 1_000)).unwrap();
        let err = s.create_entry(entry(1, 3, 1_500)).unwrap_err();

        assert_eq!(err, RankError::DuplicatePost(1));
        assert_eq!(s.create_time(1), Some(1_000.0));
        assert!(!s.is_member(3, 1));
        assert_eq!(s.post_count(), 1);
    }

    #[test]
    fn rejected_decision_changes_nothing() {
        let (s, _) = store_at(2_000);
        s.create_entry(entry(1, 9, 1_000)).unwrap();
        let err = s
            .apply_vote(1, 5, Direction::Up, |_| Err(RankError::VoteRepeated))
            .unwrap_err();

        assert_eq!(err, RankError::VoteRepeated);
        assert_eq!(s.score(1), Some(1_000.0));
        assert_eq!(s.user_direction(5, 1), Direction::Absent);
        assert_eq!(s.report().votes_rejected, 1);
    }

    #[test]
    fn vote_on_unknown_post_is_not_found() {
        let (s, _) = store_at(2_000);
        let err = s.apply_vote(77, 5, Direction::Up, |_| Ok(1.0)).unwrap_err();
        assert_eq!(err, RankError::PostNotFound(77));
        assert_eq!(s.report().voted_posts, 0);
    }

    #[test]
    fn snapshot_round_trip_restores_state() {
        let (s, _) = store_at(2_000);
        s.create_entry(entry(1, 9, 1_000)).unwrap();
        s.create_entry(entry(2, 9, 1_100)).unwrap();
        s.apply_vote(1, 5, Direction::Up, |_| Ok(432.0)).unwrap();

        let snap = s.export_snapshot();
        let (restored, _) = store_at(2_000);
        restored.import_snapshot(snap.clone()).unwrap();

        assert_eq!(restored.score(1), Some(1_432.0));
        assert_eq!(restored.user_direction(5, 1), Direction::Up);
        assert_eq!(
            restored.list(OrderKind::Score, Page::default()),
            vec![1, 2]
        );
        assert_eq!(
            restored.list_community(9, OrderKind::Time, Page::default()),
            vec![2, 1]
        );
    }

    #[test]
    fn vote_counts_batches_known_and_unknown_ids() {
        let (s, _) = store_at(2_000);
        s.create_entry(entry(1, 9, 1_000)).unwrap();
        s.apply_vote(1, 5, Direction::Up, |_| Ok(0.0)).unwrap();

        let counts = s.vote_counts(&[1, 2]);
        assert_eq!(counts.get(&1), Some(&1));
        assert_eq!(counts.get(&2), Some(&0));
    }

    #[test]
    fn large_batch_uses_same_counts() {
        let (s, _) = store_at(2_000);
        let ids: Vec<PostId> = (1..=600).collect();
        for id in &ids {
            s.create_entry(entry(*id, 1, 1_000)).unwrap();
        }
        s.apply_vote(300, 1, Direction::Down, |_| Ok(0.0)).unwrap();

        let counts = s.vote_counts(&ids);
        assert_eq!(counts.len(), 600);
        assert_eq!(counts[&300], -1);
        assert_eq!(counts[&1], 0);
    }
    #[test]
    fn import_rejects_time_and_score_with_different_posts() {
        let (s, _) = store_at(2_000);
        s.create_entry(entry(7, 1, 1_000)).unwrap();
        let snap = RankingSnapshot {
            time: vec![(1, 1_000.0)],
            score: vec![(2, 1_000.0)],
            members: vec![],
            votes: vec![],
        };

        assert!(matches!(s.import_snapshot(snap), Err(RankError::Store(_))));
        // 拒绝后原状态不变
        assert_eq!(s.list(OrderKind::Time, Page::default()), vec![7]);
        assert_eq!(s.list(OrderKind::Score, Page::default()), vec![7]);
    }

    #[test]
    fn import_drops_rows_for_unknown_posts() {
        let (s, _) = store_at(2_000);
        let snap = RankingSnapshot {
            time: vec![(1, 1_000.0)],
            score: vec![(1, 1_432.0)],
            members: vec![(9, vec![1, 3]), (4, vec![3])],
            votes: vec![(1, 5, Direction::Up), (3, 5, Direction::Up)],
        };
        s.import_snapshot(snap).unwrap();

        assert_eq!(s.vote_counts(&[1, 3]), HashMap::from([(1, 1), (3, 0)]));
        assert!(s.is_member(9, 1));
        assert!(!s.is_member(9, 3));
        assert_eq!(s.report().communities, 1);
        assert_eq!(s.report().vote_entries, 1);
        assert!(s.apply_vote(1, 6, Direction::Down, |_| Ok(-432.0)).is_ok());
    }
}
