use axum::http::HeaderMap;

use crate::core::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";

/// 身份协作者：从请求中解析调用者的用户 id（签发/校验令牌不在本 crate）
pub trait Identity: Send + Sync {
    fn current_user_id(&self, headers: &HeaderMap) -> Option<UserId>;
}

/// 信任上游网关注入的 `x-user-id` 头
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderIdentity;

impl Identity for HeaderIdentity {
    fn current_user_id(&self, headers: &HeaderMap) -> Option<UserId> {
        headers
            .get(USER_ID_HEADER)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
            .filter(|id| *id > 0)
    }
}
