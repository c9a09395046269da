use dashmap::DashMap;
use std::collections::HashMap;

use crate::core::{Direction, PostId, UserId};

/// 单个帖子的投票集合；up/down 计数随写入增量维护
#[derive(Clone, Debug, Default)]
pub struct PostVotes {
    votes: HashMap<UserId, Direction>,
    up: u64,
    down: u64,
}

impl PostVotes {
    pub fn get(&self, voter: UserId) -> Direction {
        self.votes.get(&voter).copied().unwrap_or_default()
    }

    /// Absent 删除条目，其余 upsert
    pub fn set(&mut self, voter: UserId, dir: Direction) {
        let old = if dir.is_absent() {
            self.votes.remove(&voter)
        } else {
            self.votes.insert(voter, dir)
        };
        match old {
            Some(Direction::Up) => self.up -= 1,
            Some(Direction::Down) => self.down -= 1,
            _ => {}
        }
        match dir {
            Direction::Up => self.up += 1,
            Direction::Down => self.down += 1,
            Direction::Absent => {}
        }
    }

    pub fn tally(&self) -> (u64, u64) {
        (self.up, self.down)
    }

    pub fn net(&self) -> i64 {
        self.up as i64 - self.down as i64
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserId, Direction)> + '_ {
        self.votes.iter().map(|(u, d)| (*u, *d))
    }
}

/// 投票账本：(post, voter) → Up|Down，缺席即未投票
///
/// 按 post 分片持锁；`with_post` 在整个闭包期间独占该帖子的条目，
/// 投票服务借此把"读旧方向 → 调分 → 写新方向"做成一个原子单元。
#[derive(Debug, Default)]
pub struct VoteLedger {
    posts: DashMap<PostId, PostVotes>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, post: PostId, voter: UserId) -> Direction {
        self.posts
            .get(&post)
            .map(|v| v.get(voter))
            .unwrap_or_default()
    }

    pub fn set(&self, post: PostId, voter: UserId, dir: Direction) {
        self.with_post(post, |votes| votes.set(voter, dir));
    }

    /// 独占某个帖子的投票集合执行 f；结束后空集合被回收
    pub fn with_post<R>(&self, post: PostId, f: impl FnOnce(&mut PostVotes) -> R) -> R {
        let out = {
            let mut entry = self.posts.entry(post).or_default();
            f(entry.value_mut())
        };
        self.posts.remove_if(&post, |_, v| v.is_empty());
        out
    }

    /// (up, down)
    pub fn tally(&self, post: PostId) -> (u64, u64) {
        self.posts.get(&post).map(|v| v.tally()).unwrap_or((0, 0))
    }

    pub fn net_votes(&self, post: PostId) -> i64 {
        self.posts.get(&post).map(|v| v.net()).unwrap_or(0)
    }

    pub fn entry_count(&self, post: PostId) -> usize {
        self.posts.get(&post).map(|v| v.len()).unwrap_or(0)
    }

    pub fn total_entries(&self) -> usize {
        self.posts.iter().map(|e| e.value().len()).sum()
    }

    pub fn voted_posts(&self) -> usize {
        self.posts.len()
    }

    pub fn export(&self) -> Vec<(PostId, UserId, Direction)> {
        let mut out = Vec::new();
        for e in self.posts.iter() {
            let post = *e.key();
            out.extend(e.value().iter().map(|(u, d)| (post, u, d)));
        }
        out
    }

    pub fn replace_all(&self, entries: impl IntoIterator<Item = (PostId, UserId, Direction)>) {
        self.posts.clear();
        for (post, voter, dir) in entries {
            if dir.is_absent() {
                continue;
            }
            self.posts.entry(post).or_default().set(voter, dir);
        }
    }
}
