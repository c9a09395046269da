use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{CommunityId, Direction, IdGenerator, PostId, UserId};
use crate::engine::RankingEngine;
use crate::error::Result;
use crate::query::service::ListQuery;
use crate::records::{Community, Post, PostStore, User};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PostDetail {
    pub author_name: String,
    pub vote_num: i64,
    /// 当前查看者的投票方向（-1/0/1）；匿名为 0
    pub vote_status: i64,
    #[serde(flatten)]
    pub post: Post,
    pub community: Option<Community>,
}

/// 帖子流程：持久化 + 排名入口 + 详情组装
///
/// 排名决策（取 id、计票）先完成，之后才访问持久存储。
pub struct PostService {
    engine: Arc<RankingEngine>,
    records: Arc<dyn PostStore>,
    ids: IdGenerator,
}

impl PostService {
    pub fn new(engine: Arc<RankingEngine>, records: Arc<dyn PostStore>, ids: IdGenerator) -> Self {
        Self {
            engine,
            records,
            ids,
        }
    }

    pub fn engine(&self) -> &Arc<RankingEngine> {
        &self.engine
    }

    /// 持久化成功后再写排名索引；排名写入失败时回滚持久记录
    pub fn create_post(&self, author: UserId, community: CommunityId, title: String, content: String) -> Result<Post> {
        let post = Post {
            id: self.ids.next_id(),
            author_id: author,
            community_id: community,
            title,
            content,
            create_time: self.engine.store().clock().now_secs(),
        };

        self.records.insert_post(post.clone()).map_err(|e| {
            tracing::error!("insert_post failed: post={}: {}", post.id, e);
            e
        })?;

        if let Err(e) = self
            .engine
            .create_ranking_entry(post.id, post.community_id, post.create_time)
        {
            tracing::error!("create_ranking_entry failed: post={}: {}", post.id, e);
            if let Err(undo) = self.records.remove_post(post.id) {
                tracing::error!("compensating remove_post failed: post={}: {}", post.id, undo);
            }
            return Err(e);
        }

        tracing::info!("Post created: id={}, community={}", post.id, post.community_id);
        Ok(post)
    }

    pub fn post_detail(&self, id: PostId, viewer: Option<UserId>) -> Result<PostDetail> {
        let votes = self.engine.vote_counts(&[id]);
        let status = viewer
            .map(|v| self.engine.user_vote_direction(v, id))
            .unwrap_or_default();

        let post = self.records.get_post_by_id(id)?;
        let author = self.records.get_user_by_id(post.author_id)?;
        let community = self.community_of(post.community_id);
        Ok(PostDetail {
            author_name: author.username,
            vote_num: votes.get(&id).copied().unwrap_or(0),
            vote_status: status.as_i64(),
            post,
            community,
        })
    }

    /// 排名顺序的详情列表；持久存储里已不存在的 id 被跳过
    pub fn list_details(&self, q: &ListQuery, viewer: Option<UserId>) -> Result<Vec<PostDetail>> {
        let ids = self.engine.query().list(q);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let votes = self.engine.vote_counts(&ids);
        let statuses: HashMap<PostId, Direction> = match viewer {
            Some(v) => ids
                .iter()
                .map(|id| (*id, self.engine.user_vote_direction(v, *id)))
                .collect(),
            None => HashMap::new(),
        };

        let posts = self.records.get_posts_by_ids(&ids)?;
        let mut authors: HashMap<UserId, User> = HashMap::new();
        let mut communities: HashMap<CommunityId, Option<Community>> = HashMap::new();
        let mut out = Vec::with_capacity(posts.len());
        for post in posts {
            let author = match authors.get(&post.author_id) {
                Some(u) => u.clone(),
                None => {
                    let u = self.records.get_user_by_id(post.author_id)?;
                    authors.insert(u.id, u.clone());
                    u
                }
            };
            let community = communities
                .entry(post.community_id)
                .or_insert_with(|| self.community_of(post.community_id))
                .clone();
            out.push(PostDetail {
                author_name: author.username,
                vote_num: votes.get(&post.id).copied().unwrap_or(0),
                vote_status: statuses.get(&post.id).copied().unwrap_or_default().as_i64(),
                post,
                community,
            });
        }
        Ok(out)
    }

    pub fn communities(&self) -> Result<Vec<Community>> {
        self.records.get_community_list()
    }

    pub fn community_detail(&self, id: CommunityId) -> Result<Community> {
        self.records.get_community_by_id(id)
    }

    // 社区详情缺失不影响主流程
    fn community_of(&self, id: CommunityId) -> Option<Community> {
        match self.records.get_community_by_id(id) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::debug!("community lookup failed: {}", e);
                None
            }
        }
    }
}
