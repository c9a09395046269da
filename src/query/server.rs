use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::core::{CommunityId, PostId};
use crate::error::RankError;
use crate::query::identity::Identity;
use crate::query::posts::{PostDetail, PostService};
use crate::query::service::ListQuery;
use crate::records::{Community, Post};
use crate::stats::IndexReport;

/// 响应码（与前端约定）
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ResCode {
    Success = 1000,
    InvalidParam = 1001,
    VoteRepeated = 1005,
    ServerBusy = 1006,
    PostNotExist = 1007,
    NeedLogin = 1008,
    VoteTimeExpired = 1010,
}

impl ResCode {
    pub fn msg(self) -> &'static str {
        match self {
            ResCode::Success => "success",
            ResCode::InvalidParam => "invalid param",
            ResCode::VoteRepeated => "vote repeated",
            ResCode::ServerBusy => "server busy",
            ResCode::PostNotExist => "post not exist",
            ResCode::NeedLogin => "need login",
            ResCode::VoteTimeExpired => "vote time expired",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseData<T> {
    pub code: u32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ResponseData<T> {
    fn success(data: T) -> Self {
        Self {
            code: ResCode::Success as u32,
            msg: ResCode::Success.msg().to_string(),
            data: Some(data),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("need login")]
    NeedLogin,

    #[error("invalid param: {0}")]
    InvalidParam(String),

    #[error(transparent)]
    Rank(#[from] RankError),
}

impl ApiError {
    fn code(&self) -> ResCode {
        match self {
            ApiError::NeedLogin => ResCode::NeedLogin,
            ApiError::InvalidParam(_) => ResCode::InvalidParam,
            ApiError::Rank(e) => match e {
                RankError::VoteRepeated => ResCode::VoteRepeated,
                RankError::VoteTimeExpired => ResCode::VoteTimeExpired,
                RankError::PostNotFound(_) => ResCode::PostNotExist,
                RankError::InvalidDirection(_) => ResCode::InvalidParam,
                RankError::DuplicatePost(_) | RankError::Store(_) => ResCode::ServerBusy,
            },
        }
    }
}

// 请求体/查询串/路径解析失败统一走 1001
impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::InvalidParam(r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::InvalidParam(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::InvalidParam(r.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        // 存储错误不向外暴露细节
        let msg = match code {
            ResCode::ServerBusy => {
                tracing::warn!("request failed: {}", self);
                code.msg().to_string()
            }
            _ => self.to_string(),
        };
        let body = ResponseData::<()> {
            code: code as u32,
            msg,
            data: None,
        };
        // 业务结果只看信封 code，HTTP 状态恒为 200
        (StatusCode::OK, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ResponseData<T>>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreatePostParams {
    pub community_id: CommunityId,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteParams {
    pub post_id: PostId,
    /// -1 / 0 / 1
    pub direction: i64,
}

pub struct AppState {
    pub posts: PostService,
    pub identity: Arc<dyn Identity>,
}

pub struct QueryServer {
    pub state: Arc<AppState>,
}

impl QueryServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/v1/posts", get(list_handler))
            .route("/api/v1/post", post(create_handler))
            .route("/api/v1/post/:id", get(detail_handler))
            .route("/api/v1/vote", post(vote_handler))
            .route("/api/v1/community", get(community_list_handler))
            .route("/api/v1/community/:id", get(community_detail_handler))
            .route("/status", get(status_handler))
            .with_state(self.state.clone())
    }

    pub async fn run(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        let app = self.router();
        tracing::info!("HTTP Query Server listening on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<PostDetail>> {
    let Query(q) = query?;
    let viewer = state.identity.current_user_id(&headers);
    let details = state.posts.list_details(&q, viewer)?;
    Ok(Json(ResponseData::success(details)))
}

async fn detail_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    id: Result<Path<PostId>, PathRejection>,
) -> ApiResult<PostDetail> {
    let Path(id) = id?;
    let viewer = state.identity.current_user_id(&headers);
    let detail = state.posts.post_detail(id, viewer)?;
    Ok(Json(ResponseData::success(detail)))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreatePostParams>, JsonRejection>,
) -> ApiResult<Post> {
    let author = state
        .identity
        .current_user_id(&headers)
        .ok_or(ApiError::NeedLogin)?;
    let Json(p) = body?;
    if p.title.trim().is_empty() {
        return Err(ApiError::InvalidParam("title must not be empty".into()));
    }
    let post = state
        .posts
        .create_post(author, p.community_id, p.title, p.content)?;
    Ok(Json(ResponseData::success(post)))
}

async fn vote_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<VoteParams>, JsonRejection>,
) -> ApiResult<()> {
    let voter = state
        .identity
        .current_user_id(&headers)
        .ok_or(ApiError::NeedLogin)?;
    let Json(p) = body?;
    state
        .posts
        .engine()
        .vote_raw(voter, p.post_id, p.direction)?;
    Ok(Json(ResponseData::success(())))
}

async fn community_list_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Community>> {
    let list = state.posts.communities()?;
    Ok(Json(ResponseData::success(list)))
}

async fn community_detail_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<CommunityId>, PathRejection>,
) -> ApiResult<Community> {
    let Path(id) = id?;
    let community = state.posts.community_detail(id)?;
    Ok(Json(ResponseData::success(community)))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<IndexReport> {
    Json(state.posts.engine().report())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_errors_map_to_response_codes() {
        let cases = [
            (RankError::VoteRepeated, ResCode::VoteRepeated),
            (RankError::VoteTimeExpired, ResCode::VoteTimeExpired),
            (RankError::PostNotFound(1), ResCode::PostNotExist),
            (RankError::InvalidDirection(5), ResCode::InvalidParam),
            (RankError::store("disk"), ResCode::ServerBusy),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code(), code);
        }
        assert_eq!(ApiError::NeedLogin.code(), ResCode::NeedLogin);
        assert_eq!(
            ApiError::NeedLogin.into_response().status(),
            StatusCode::OK
        );
    }
}
