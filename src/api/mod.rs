mod lists;
mod posts;

use axum::{
    Router,
    routing::{delete, get, put},
};
use tower_http::trace::TraceLayer;

use crate::{error::Result, state::AppState, storage::Storage};

/// 配置全部路由，统一挂在 `/api` 下
///
/// - `GET|POST /lists/{id}/versions`：版本分类 / 新建版本
/// - `PUT /lists/{id}/versions/{version}`：替换版本文章
/// - `GET /lists/{id}/articles`：列表文章
/// - `GET /lists/{id}/preview`：预览版本文章
/// - `DELETE /versions/{version}`：删除版本
/// - `GET /posts/{id}/lists`、`GET /posts/{id}/latest-article`、`PUT /posts/{id}/published`
pub fn setup_route<S: Storage>(state: AppState<S>) -> Router {
    let api = Router::new()
        .route(
            "/lists/{id}/versions",
            get(lists::versions::<S>).post(lists::create_version::<S>),
        )
        .route(
            "/lists/{id}/versions/{version}",
            put(lists::update_version::<S>),
        )
        .route("/lists/{id}/articles", get(lists::articles::<S>))
        .route("/lists/{id}/preview", get(lists::preview::<S>))
        .route("/versions/{version}", delete(lists::delete_version::<S>))
        .route("/posts/{id}/lists", get(posts::lists::<S>))
        .route("/posts/{id}/latest-article", get(posts::latest_article::<S>))
        .route("/posts/{id}/published", put(posts::published::<S>))
        .with_state(state);

    add_middlewares(Router::new().nest("/api", api))
}

pub async fn run_server(router: Router, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}

fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        _latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, "request failed");
    }

    router.layer(
        TraceLayer::new_for_http()
            .on_failure(log_failure)
            .on_request(|_req: &_, _span: &tracing::Span| {}),
    )
}
