use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    content::{Article, ListRef},
    error::{Error, Result},
    state::AppState,
    storage::Storage,
};

/// 最新已发布版本中引用了该 post 的列表
pub async fn lists<S: Storage>(
    Path(post): Path<i64>,
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<ListRef>>> {
    state.repo().find_lists_by_post(post).await.map(Json)
}

/// 引用该 post 的最新文章，不存在返回 [`Error::NotFound`]
pub async fn latest_article<S: Storage>(
    Path(post): Path<i64>,
    State(state): State<AppState<S>>,
) -> Result<Json<Article>> {
    state
        .repo()
        .latest_article_for_post(post)
        .await?
        .map(Json)
        .ok_or(Error::NotFound)
}

#[derive(Debug, Deserialize)]
pub struct PostPublished {
    pub timestamp: i64,
}

/// 宿主通知 post 发布时间变化
pub async fn published<S: Storage>(
    Path(post): Path<i64>,
    State(state): State<AppState<S>>,
    Json(body): Json<PostPublished>,
) -> Result<StatusCode> {
    let repo = state.repo();
    repo.host().remember_post(post, body.timestamp);
    repo.propagate_post_publish_date_change(body.timestamp, post)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
