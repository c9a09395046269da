use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{RankError, Result};

pub type PostId = u64;
pub type UserId = u64;
pub type CommunityId = u64;

/// 投票方向：显式三态，缺席（从未投票/已撤销）不写入账本
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Absent,
    Up,
    Down,
}

impl Direction {
    pub fn as_i64(self) -> i64 {
        match self {
            Direction::Absent => 0,
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    pub fn from_i64(v: i64) -> Result<Self> {
        match v {
            0 => Ok(Direction::Absent),
            1 => Ok(Direction::Up),
            -1 => Ok(Direction::Down),
            other => Err(RankError::InvalidDirection(other)),
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Direction::Absent)
    }
}

/// 排序维度
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    #[default]
    Time,
    Score,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Time => f.write_str("time"),
            OrderKind::Score => f.write_str("score"),
        }
    }
}

/// 有序索引的排序键：f64 + 全序比较（total_cmp），可放进 BTreeSet
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct RankKey(pub f64);

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for RankKey {}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// 1-based 分页窗口
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub size: u64,
}

impl Page {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    /// 返回 (offset, count)；page 或 size 为 0 时窗口为空
    pub fn window(self) -> Option<(usize, usize)> {
        if self.page == 0 || self.size == 0 {
            return None;
        }
        let offset = (self.page - 1).checked_mul(self.size)?;
        Some((
            usize::try_from(offset).ok()?,
            usize::try_from(self.size).unwrap_or(usize::MAX),
        ))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

/// 帖子创建时写入排名核心的最小信息
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub post_id: PostId,
    pub community_id: CommunityId,
    /// unix 秒
    pub create_time: i64,
}
