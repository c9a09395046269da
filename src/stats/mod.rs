use serde::Serialize;
use std::fmt;

/// 排名核心的规模统计（/status 与周期日志使用）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// 时间索引条目数
    pub posts: usize,
    /// 分数索引条目数（恒等于 posts）
    pub scored_posts: usize,
    pub communities: usize,
    /// 当前仍在缓存中的社区视图（含已过期未重建的）
    pub cached_views: usize,
    /// 至少有一条投票的帖子数
    pub voted_posts: usize,
    pub vote_entries: usize,
    pub votes_applied: u64,
    pub votes_rejected: u64,
}

impl IndexReport {
    /// 时间索引与分数索引条目数必须一致
    pub fn is_consistent(&self) -> bool {
        self.posts == self.scored_posts
    }
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════╗")?;
        writeln!(f, "║           post-rank Index Report                 ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Indexes:                                         ║")?;
        writeln!(f, "║   posts:        {:>10}                       ║", self.posts)?;
        writeln!(f, "║   scored:       {:>10}                       ║", self.scored_posts)?;
        writeln!(f, "║   communities:  {:>10}                       ║", self.communities)?;
        writeln!(f, "║   cached views: {:>10}                       ║", self.cached_views)?;
        writeln!(f, "╠──────────────────────────────────────────────────╣")?;
        writeln!(f, "║ Vote Ledger:                                     ║")?;
        writeln!(f, "║   voted posts:  {:>10}                       ║", self.voted_posts)?;
        writeln!(f, "║   entries:      {:>10}                       ║", self.vote_entries)?;
        writeln!(f, "║   applied:      {:>10}                       ║", self.votes_applied)?;
        writeln!(f, "║   rejected:     {:>10}                       ║", self.votes_rejected)?;
        writeln!(f, "╚══════════════════════════════════════════════════╝")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_counter() {
        let r = IndexReport {
            posts: 3,
            scored_posts: 3,
            votes_applied: 12,
            ..Default::default()
        };
        let out = r.to_string();
        assert!(out.contains(&format!("posts:        {:>10}", 3)));
        assert!(out.contains(&format!("applied:      {:>10}", 12)));
        assert!(r.is_consistent());
    }
}
