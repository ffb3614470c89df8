use std::future::Future;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::scheduler::Job;

/// 列表保存后触发，负载为列表 JSON
pub const LIST_SAVED: &str = "list_saved";
/// 计划版本到期时触发，负载为 `[list_id, version_id]`
pub const PUBLISH_SCHEDULED_LIST: &str = "publish_scheduled_list";

/// 宿主系统提供的能力：时间、post 信息、事件与延时任务
pub trait Host: Send + Sync + 'static {
    /// 当前 Unix 时间戳（秒）
    fn now(&self) -> i64;

    /// post 的真实发布时间，post 不存在时返回 `None`
    fn post_timestamp(&self, post: i64) -> impl Future<Output = Option<i64>> + Send;

    fn dispatch_event(&self, event: &'static str, payload: Value);

    /// 在 `at` 时刻触发 `event`
    fn schedule_event(&self, at: i64, event: &'static str, payload: Value);
}

/// 服务进程使用的 [`Host`]
///
/// 延时任务交给 [`crate::scheduler`]；post 发布时间来自
/// `PUT /posts/{id}/published` 的通知。
pub struct ServerHost {
    jobs: mpsc::UnboundedSender<Job>,
    posts: DashMap<i64, i64>,
}

impl ServerHost {
    pub fn new(jobs: mpsc::UnboundedSender<Job>) -> Self {
        Self {
            jobs,
            posts: DashMap::new(),
        }
    }

    /// 记录 post 的发布时间
    pub fn remember_post(&self, post: i64, published: i64) {
        self.posts.insert(post, published);
    }
}

impl Host for ServerHost {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn post_timestamp(&self, post: i64) -> Option<i64> {
        self.posts.get(&post).map(|ts| *ts)
    }

    fn dispatch_event(&self, event: &'static str, payload: Value) {
        tracing::info!(event, %payload, "event dispatched");
    }

    fn schedule_event(&self, at: i64, event: &'static str, payload: Value) {
        if self.jobs.send(Job { at, event, payload }).is_err() {
            tracing::error!(event, at, "scheduler is gone, job dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_schedule_event_sends_job() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = ServerHost::new(tx);

        host.schedule_event(100, PUBLISH_SCHEDULED_LIST, json!([1, 2]));

        let job = rx.recv().await.expect("job not sent");
        assert_eq!(job.at, 100);
        assert_eq!(job.event, PUBLISH_SCHEDULED_LIST);
        assert_eq!(job.payload, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_post_timestamp() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let host = ServerHost::new(tx);
        assert_eq!(host.post_timestamp(5).await, None);

        host.remember_post(5, 1234);
        assert_eq!(host.post_timestamp(5).await, Some(1234));
    }
}
