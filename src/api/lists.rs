use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    content::{Article, VersionSet},
    error::Result,
    repository::ListArticles,
    state::AppState,
    storage::Storage,
};

/// 列表的版本分类
pub async fn versions<S: Storage>(
    Path(id): Path<i64>,
    State(state): State<AppState<S>>,
) -> Result<Json<VersionSet>> {
    state.repo().list_versions(id).await.map(Json)
}

/// 新建版本的请求体
///
/// 设置了 `schedule` 时创建计划版本，此时忽略 `preview`。
#[derive(Debug, Deserialize)]
pub struct CreateVersion {
    pub articles: Vec<Value>,
    pub user_id: i64,
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub schedule: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub version: i64,
}

pub async fn create_version<S: Storage>(
    Path(id): Path<i64>,
    State(state): State<AppState<S>>,
    Json(body): Json<CreateVersion>,
) -> Result<(StatusCode, Json<Created>)> {
    let repo = state.repo();
    let list = repo.load_list(id).await?;
    let articles = Article::from_values(body.articles)?;

    let version = match body.schedule {
        Some(at) => {
            repo.create_scheduled_version(&list, articles, body.user_id, at)
                .await?
        }
        None => {
            repo.create_version(&list, articles, body.user_id, body.preview)
                .await?
        }
    };

    Ok((StatusCode::CREATED, Json(Created { version })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateVersion {
    pub articles: Vec<Value>,
}

/// 整体替换版本的文章
pub async fn update_version<S: Storage>(
    Path((id, version)): Path<(i64, i64)>,
    State(state): State<AppState<S>>,
    Json(body): Json<UpdateVersion>,
) -> Result<StatusCode> {
    let repo = state.repo();
    let list = repo.load_list(id).await?;
    let articles = Article::from_values(body.articles)?;
    repo.update_version_articles(&list, articles, version)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 文章查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArticlesParams {
    version: Option<i64>,
    future: bool,
}

/// 列表文章，默认取最新已发布版本且不含未来文章
pub async fn articles<S: Storage>(
    Path(id): Path<i64>,
    Query(params): Query<ArticlesParams>,
    State(state): State<AppState<S>>,
) -> Result<Json<ListArticles>> {
    let repo = state.repo();
    let list = repo.load_list(id).await?;
    repo.resolve_list_articles(&list, params.version, params.future)
        .await
        .map(Json)
}

pub async fn preview<S: Storage>(
    Path(id): Path<i64>,
    State(state): State<AppState<S>>,
) -> Result<Json<ListArticles>> {
    let repo = state.repo();
    let list = repo.load_list(id).await?;
    repo.preview_articles(&list).await.map(Json)
}

pub async fn delete_version<S: Storage>(
    Path(version): Path<i64>,
    State(state): State<AppState<S>>,
) -> Result<StatusCode> {
    state.repo().delete_version(version).await?;
    Ok(StatusCode::NO_CONTENT)
}
