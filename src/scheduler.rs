//! 进程内的延时任务执行器
//!
//! 任务只保存在内存中，进程重启后未到期的任务会丢失。

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    cache::Cache,
    host::{Host, PUBLISH_SCHEDULED_LIST},
    repository::ListVersionRepository,
    storage::Storage,
};

/// 一个延时任务
#[derive(Debug, Clone)]
pub struct Job {
    /// 触发时间（Unix 秒）
    pub at: i64,
    pub event: &'static str,
    pub payload: Value,
}

/// 启动调度循环，每个任务在独立的 task 中等待到期
pub fn spawn<S, C, H>(
    repo: Arc<ListVersionRepository<S, C, H>>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
) -> JoinHandle<()>
where
    S: Storage,
    C: Cache,
    H: Host,
{
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let repo = repo.clone();
            tokio::spawn(async move { run_job(&repo, job).await });
        }
        tracing::debug!("scheduler stopped");
    })
}

async fn run_job<S, C, H>(repo: &ListVersionRepository<S, C, H>, job: Job)
where
    S: Storage,
    C: Cache,
    H: Host,
{
    let delay = u64::try_from(job.at - repo.host().now()).unwrap_or_default();
    tokio::time::sleep(Duration::from_secs(delay)).await;

    match job.event {
        PUBLISH_SCHEDULED_LIST => {
            let (list_id, version_id) = match serde_json::from_value::<(i64, i64)>(job.payload) {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::error!(%e, "invalid publish job payload");
                    return;
                }
            };
            if let Err(e) = repo.publish_scheduled_version(list_id, version_id).await {
                tracing::error!(%e, list_id, version_id, "scheduled publish failed");
            }
        }
        other => tracing::warn!(event = other, "no handler for scheduled event"),
    }
}
