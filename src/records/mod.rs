//! 外部协作者契约：帖子/用户/社区的持久记录
//!
//! 排名核心只通过 id 引用这些记录；`MemoryRecords` 是测试与演示用的内存实现。

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{CommunityId, PostId, UserId};
use crate::error::{RankError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub community_id: CommunityId,
    pub title: String,
    pub content: String,
    /// unix 秒
    pub create_time: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    pub introduction: String,
}

/// 持久存储协作者
///
/// ## 契约
/// - `get_posts_by_ids` 按入参顺序返回；不存在的 id 被跳过。
/// - `get_community_list` 按 id 升序返回。
/// - 调用方不得在持有排名核心内部锁时调用这些方法。
pub trait PostStore: Send + Sync {
    fn insert_post(&self, post: Post) -> Result<()>;
    fn remove_post(&self, id: PostId) -> Result<()>;
    fn get_posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>>;
    fn get_user_by_id(&self, id: UserId) -> Result<User>;
    fn get_community_by_id(&self, id: CommunityId) -> Result<Community>;
    fn get_community_list(&self) -> Result<Vec<Community>>;

    fn get_post_by_id(&self, id: PostId) -> Result<Post> {
        self.get_posts_by_ids(&[id])?
            .into_iter()
            .next()
            .ok_or(RankError::PostNotFound(id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecords {
    posts: RwLock<HashMap<PostId, Post>>,
    users: RwLock<HashMap<UserId, User>>,
    communities: RwLock<HashMap<CommunityId, Community>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.users.write().insert(user.id, user);
    }

    pub fn add_community(&self, community: Community) {
        self.communities.write().insert(community.id, community);
    }

    pub fn post_count(&self) -> usize {
        self.posts.read().len()
    }
}

impl PostStore for MemoryRecords {
    fn insert_post(&self, post: Post) -> Result<()> {
        let mut g = self.posts.write();
        if g.contains_key(&post.id) {
            return Err(RankError::DuplicatePost(post.id));
        }
        g.insert(post.id, post);
        Ok(())
    }

    fn remove_post(&self, id: PostId) -> Result<()> {
        self.posts
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(RankError::PostNotFound(id))
    }

    fn get_posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>> {
        let g = self.posts.read();
        Ok(ids.iter().filter_map(|id| g.get(id).cloned()).collect())
    }

    fn get_user_by_id(&self, id: UserId) -> Result<User> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RankError::store(format!("user {id} not found")))
    }

    fn get_community_by_id(&self, id: CommunityId) -> Result<Community> {
        self.communities
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RankError::store(format!("community {id} not found")))
    }

    fn get_community_list(&self) -> Result<Vec<Community>> {
        let mut all: Vec<Community> = self.communities.read().values().cloned().collect();
        all.sort_unstable_by_key(|c| c.id);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: PostId) -> Post {
        Post {
            id,
            author_id: 1,
            community_id: 1,
            title: format!("t{id}"),
            content: String::new(),
            create_time: 0,
        }
    }

    #[test]
    fn get_posts_by_ids_preserves_request_order() {
        let r = MemoryRecords::new();
        for id in 1..=3 {
            r.insert_post(post(id)).unwrap();
        }
        let got: Vec<PostId> = r
            .get_posts_by_ids(&[3, 9, 1, 2])
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(got, vec![3, 1, 2]);
    }

    #[test]
    fn duplicate_insert_and_missing_remove_fail() {
        let r = MemoryRecords::new();
        r.insert_post(post(1)).unwrap();
        assert_eq!(r.insert_post(post(1)), Err(RankError::DuplicatePost(1)));
        assert_eq!(r.remove_post(2), Err(RankError::PostNotFound(2)));
        assert_eq!(r.get_post_by_id(9), Err(RankError::PostNotFound(9)));
    }

    #[test]
    fn community_list_is_sorted_by_id() {
        let r = MemoryRecords::new();
        for id in [3, 1, 2] {
            r.add_community(Community {
                id,
                name: format!("c{id}"),
                introduction: String::new(),
            });
        }
        let ids: Vec<CommunityId> = r
            .get_community_list()
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(matches!(r.get_community_by_id(9), Err(RankError::Store(_))));
    }
}
