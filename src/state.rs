use std::sync::Arc;

use crate::{cache::MemoryCache, host::ServerHost, repository::ListVersionRepository};

/// 服务使用的仓储类型
pub type Repository<S> = ListVersionRepository<S, MemoryCache, ServerHost>;

/// 应用程序上下文
///
/// [`AppState`] 封装了列表版本仓储，提供统一访问入口。
pub struct AppState<S> {
    repo: Arc<Repository<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<S> AppState<S> {
    /// 创建一个新的 [`AppState`] 实例
    pub fn new(repo: Arc<Repository<S>>) -> Self {
        Self { repo }
    }

    /// 获取仓储对象
    pub fn repo(&self) -> &Repository<S> {
        &self.repo
    }
}
