use thiserror::Error;

use crate::core::PostId;

pub type Result<T> = std::result::Result<T, RankError>;

/// 排名/投票核心的错误分类
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    /// 帖子超过投票窗口（用户可纠正）
    #[error("vote time expired")]
    VoteTimeExpired,

    /// 与当前投票方向相同（用户可纠正）
    #[error("vote repeated")]
    VoteRepeated,

    #[error("post {0} not found")]
    PostNotFound(PostId),

    #[error("post {0} already indexed")]
    DuplicatePost(PostId),

    #[error("invalid vote direction: {0}")]
    InvalidDirection(i64),

    /// 底层索引/账本失败：不可由用户纠正，操作无部分副作用
    #[error("store error: {0}")]
    Store(String),
}

impl RankError {
    pub fn store<T: ToString>(msg: T) -> Self {
        Self::Store(msg.to_string())
    }
}
