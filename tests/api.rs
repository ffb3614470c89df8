use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::Request,
    http::{Response, StatusCode},
};
use serde_json::{Value, json};
use teaserlist::{
    api,
    cache::MemoryCache,
    content::List,
    host::ServerHost,
    repository::ListVersionRepository,
    state::AppState,
    storage::MemoryStorage,
};
use tokio::sync::mpsc;
use tower::util::ServiceExt;

struct TestApp {
    router: Router,
    // 保持调度通道打开
    _jobs: mpsc::UnboundedReceiver<teaserlist::scheduler::Job>,
}

impl TestApp {
    async fn new() -> Self {
        let storage = MemoryStorage::new();
        for (id, max_length) in [(1, 3), (2, 50)] {
            storage.insert_list(List {
                id,
                title: format!("列表{id}"),
                max_length,
                options: Default::default(),
            })
            .await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let repo = ListVersionRepository::new(storage, MemoryCache::new(), ServerHost::new(tx));
        let router = api::setup_route(AppState::new(Arc::new(repo)));

        Self { router, _jobs: rx }
    }

    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot fail")
    }

    async fn send(&self, req: Request<Body>, code: StatusCode, msg: &str) -> Value {
        let resp = self.request(req).await;
        assert_eq!(resp.status(), code, "{}", msg);
        let data = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("读取数据失败");
        // 错误响应是纯文本
        if !code.is_success() || data.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&data).expect("反序列化失败")
    }

    async fn get(&self, uri: &str, code: StatusCode, msg: &str) -> Value {
        let req = Request::get(uri).body(Body::empty()).expect("请求失败");
        self.send(req, code, msg).await
    }

    async fn json(&self, method: &str, uri: &str, body: Value, code: StatusCode, msg: &str) -> Value {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::new(body.to_string()))
            .expect("请求失败");
        self.send(req, code, msg).await
    }

    async fn create_version(&self, list: i64, body: Value, msg: &str) -> i64 {
        let data = self
            .json(
                "POST",
                &format!("/api/lists/{list}/versions"),
                body,
                StatusCode::CREATED,
                msg,
            )
            .await;
        data["version"].as_i64().expect("缺少版本号")
    }
}

fn titles(data: &Value) -> Vec<&str> {
    data["articles"]
        .as_array()
        .expect("缺少文章")
        .iter()
        .filter_map(|a| a["title"].as_str())
        .collect()
}

#[tokio::test]
async fn test_api() {
    let app = TestApp::new().await;

    // 空列表
    {
        let data = app
            .get("/api/lists/1/articles", StatusCode::OK, "还没有版本")
            .await;
        assert!(data["version"].is_null());
        assert_eq!(titles(&data).len(), 0);

        app.get("/api/lists/1/preview", StatusCode::CONFLICT, "没有预览版本")
            .await;
        app.get("/api/lists/9/articles", StatusCode::NOT_FOUND, "列表不存在")
            .await;
    }

    // 发布版本，超出长度的文章被截断
    let first = {
        let articles: Vec<Value> = (0..5).map(|i| json!({ "title": format!("a{i}") })).collect();
        let version = app
            .create_version(1, json!({ "articles": articles, "user_id": 7 }), "发布版本")
            .await;

        let data = app
            .get("/api/lists/1/articles", StatusCode::OK, "读取最新版本")
            .await;
        assert_eq!(data["version"]["id"], json!(version));
        assert_eq!(data["version"]["status"], json!("published"));
        assert_eq!(titles(&data), ["a0", "a1", "a2"]);
        version
    };

    // 预览版本
    {
        let version = app
            .create_version(
                1,
                json!({ "articles": [{ "title": "draft" }], "user_id": 7, "preview": true }),
                "创建预览",
            )
            .await;

        let data = app
            .get("/api/lists/1/preview", StatusCode::OK, "读取预览")
            .await;
        assert_eq!(data["version"]["id"], json!(version));
        assert_eq!(titles(&data), ["draft"]);

        let versions = app
            .get("/api/lists/1/versions", StatusCode::OK, "版本分类")
            .await;
        assert_eq!(versions["published"].as_array().map(Vec::len), Some(1));
        assert_eq!(versions["preview"].as_array().map(Vec::len), Some(1));
    }

    // 替换版本文章
    {
        app.json(
            "PUT",
            &format!("/api/lists/1/versions/{first}"),
            json!({ "articles": [{ "title": "replaced", "post": 11 }] }),
            StatusCode::NO_CONTENT,
            "替换文章",
        )
        .await;
        app.json(
            "PUT",
            &format!("/api/lists/2/versions/{first}"),
            json!({ "articles": [] }),
            StatusCode::NOT_FOUND,
            "版本不属于列表",
        )
        .await;

        let data = app
            .get(
                &format!("/api/lists/1/articles?version={first}"),
                StatusCode::OK,
                "指定版本",
            )
            .await;
        assert_eq!(titles(&data), ["replaced"]);
    }

    // post 相关
    {
        let lists = app
            .get("/api/posts/11/lists", StatusCode::OK, "引用 post 的列表")
            .await;
        assert_eq!(lists, json!([{ "id": 1, "options": {} }]));

        app.json(
            "PUT",
            "/api/posts/11/published",
            json!({ "timestamp": 1234 }),
            StatusCode::NO_CONTENT,
            "post 发布时间变化",
        )
        .await;

        let article = app
            .get("/api/posts/11/latest-article", StatusCode::OK, "post 的最新文章")
            .await;
        assert_eq!(article["title"], json!("replaced"));
        assert_eq!(article["published"], json!(1234));

        app.get("/api/posts/12/latest-article", StatusCode::NOT_FOUND, "没有文章")
            .await;
    }

    // 计划版本
    {
        let version = app
            .create_version(
                2,
                json!({ "articles": [{ "title": "later" }], "user_id": 7, "schedule": 4_000_000_000_i64 }),
                "创建计划版本",
            )
            .await;
        let versions = app
            .get("/api/lists/2/versions", StatusCode::OK, "版本分类")
            .await;
        assert_eq!(versions["scheduled"][0]["id"], json!(version));

        let data = app
            .get("/api/lists/2/articles", StatusCode::OK, "计划版本不是已发布版本")
            .await;
        assert!(data["version"].is_null());
    }

    // 删除版本
    {
        app.json(
            "DELETE",
            &format!("/api/versions/{first}"),
            Value::Null,
            StatusCode::NO_CONTENT,
            "删除版本",
        )
        .await;
        let data = app
            .get("/api/lists/1/articles", StatusCode::OK, "已发布版本被删除")
            .await;
        assert!(data["version"].is_null());
    }

    // 非法请求体
    app.json(
        "POST",
        "/api/lists/1/versions",
        json!({ "articles": [{ "title": "x" }] }),
        StatusCode::UNPROCESSABLE_ENTITY,
        "缺少 user_id",
    )
    .await;
}
