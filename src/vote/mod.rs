use std::sync::Arc;

use crate::core::{Direction, PostId, UserId};
use crate::error::{RankError, Result};
use crate::index::{RankingStore, VoteApplied, VoteContext};

pub const ONE_WEEK_IN_SECONDS: u64 = 7 * 24 * 3600;
/// 每一票值多少分：需大于时间分数的自然漂移
pub const SCORE_PER_VOTE: f64 = 432.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VotePolicy {
    pub window_secs: u64,
    pub score_per_vote: f64,
}

impl Default for VotePolicy {
    fn default() -> Self {
        Self {
            window_secs: ONE_WEEK_IN_SECONDS,
            score_per_vote: SCORE_PER_VOTE,
        }
    }
}

impl VotePolicy {
    /// delta = sign(new - old) * |new - old| * score_per_vote
    pub fn delta(&self, old: Direction, new: Direction) -> f64 {
        let diff = new.as_i64() - old.as_i64();
        let op = diff.signum() as f64;
        op * diff.unsigned_abs() as f64 * self.score_per_vote
    }

    /// 投票规则：先判窗口（与历史投票无关），再判重复
    pub fn decide(&self, ctx: VoteContext, new: Direction, now_secs: i64) -> Result<f64> {
        if now_secs as f64 - ctx.create_time > self.window_secs as f64 {
            return Err(RankError::VoteTimeExpired);
        }
        if ctx.old == new {
            return Err(RankError::VoteRepeated);
        }
        Ok(self.delta(ctx.old, new))
    }
}

/// 投票服务：校验并在 `RankingStore` 的帖子独占区内落地投票
pub struct VotingService {
    store: Arc<RankingStore>,
    policy: VotePolicy,
}

impl VotingService {
    pub fn new(store: Arc<RankingStore>, policy: VotePolicy) -> Self {
        Self { store, policy }
    }

    pub fn vote(&self, voter: UserId, post: PostId, new: Direction) -> Result<VoteApplied> {
        let policy = self.policy;
        let now = self.store.clock().now_secs();

        let res = self
            .store
            .apply_vote(post, voter, new, |ctx| policy.decide(ctx, new, now));

        match &res {
            Ok(applied) => tracing::debug!(
                op = applied.delta.signum(),
                diff = (applied.new.as_i64() - applied.old.as_i64()).abs(),
                odir = applied.old.as_i64(),
                score = applied.delta,
                "Vote applied: voter={}, post={}",
                voter,
                post
            ),
            Err(e) => tracing::debug!("Vote rejected: voter={}, post={}: {}", voter, post, e),
        }
        res
    }

    /// 数值方向入口（-1 / 0 / 1），越界方向直接拒绝
    pub fn vote_raw(&self, voter: UserId, post: PostId, direction: i64) -> Result<VoteApplied> {
        self.vote(voter, post, Direction::from_i64(direction)?)
    }
}
