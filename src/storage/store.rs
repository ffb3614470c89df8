use std::future::Future;

use crate::{
    content::{List, ListRef, Version, VersionStatus},
    error::Result,
};

use super::{ArticleRow, NewArticle, NewVersion};

/// 列表版本的持久化后端
///
/// 每次 [`Storage::begin`] 开启一个 [`Session`]，对应一个事务；
/// 组合写操作在同一个会话内完成，[`Session::commit`] 之前丢弃会话即回滚。
pub trait Storage: Send + Sync + 'static {
    type Session: Session;

    fn begin(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// 一次事务内可用的读写操作
pub trait Session: Send + Sized {
    /// 读取宿主列表
    fn load_list(&mut self, list_id: i64) -> impl Future<Output = Result<Option<List>>> + Send;

    /// 列表的全部版本，按 id 倒序
    fn versions(&mut self, list_id: i64) -> impl Future<Output = Result<Vec<Version>>> + Send;

    /// 版本所属列表
    fn version_list_id(
        &mut self,
        version_id: i64,
    ) -> impl Future<Output = Result<Option<i64>>> + Send;

    /// 插入版本并返回新 id
    fn insert_version(&mut self, version: &NewVersion)
    -> impl Future<Output = Result<i64>> + Send;

    /// 修改版本状态，返回受影响行数
    fn set_version_status(
        &mut self,
        version_id: i64,
        status: VersionStatus,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// 删除版本行（不含文章）
    fn delete_version(&mut self, version_id: i64) -> impl Future<Output = Result<u64>> + Send;

    /// 删除列表的全部版本行（不含文章）
    fn delete_list_versions(&mut self, list_id: i64) -> impl Future<Output = Result<u64>> + Send;

    /// 插入文章并返回新 id
    fn insert_article(
        &mut self,
        version_id: i64,
        article: &NewArticle,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// 删除版本下的全部文章
    fn delete_articles(&mut self, version_id: i64) -> impl Future<Output = Result<u64>> + Send;

    /// 版本下的全部文章，按 `(parent, sort)` 排序
    fn articles(&mut self, version_id: i64)
    -> impl Future<Output = Result<Vec<ArticleRow>>> + Send;

    fn article(&mut self, article_id: i64)
    -> impl Future<Output = Result<Option<ArticleRow>>> + Send;

    /// 按 id 写回整行
    fn update_article(&mut self, row: &ArticleRow) -> impl Future<Output = Result<u64>> + Send;

    /// 最新已发布版本中包含该 post 的列表
    fn lists_by_post(&mut self, post: i64) -> impl Future<Output = Result<Vec<ListRef>>> + Send;

    /// 引用该 post 的最新一行文章
    fn latest_article_for_post(
        &mut self,
        post: i64,
    ) -> impl Future<Output = Result<Option<ArticleRow>>> + Send;

    /// 更新引用该 post 且发布时间不同的文章，返回受影响行数
    fn update_post_published(
        &mut self,
        post: i64,
        published: i64,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// 最新已发布版本中引用该 post 的列表 id（不要求列表行存在）
    fn lists_with_post(&mut self, post: i64) -> impl Future<Output = Result<Vec<i64>>> + Send;

    fn commit(self) -> impl Future<Output = Result<()>> + Send;
}
