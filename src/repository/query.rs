use serde::{Deserialize, Serialize};

use super::ListVersionRepository;
use crate::{
    cache::{self, Cache},
    content::{Article, List, ListRef, Version, VersionSet, tree},
    error::{Error, Result},
    host::Host,
    storage::{Session, Storage},
};

/// 列表某个版本的文章
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListArticles {
    /// 文章所属版本，列表还没有已发布版本时为空
    pub version: Option<Version>,
    pub articles: Vec<Article>,
}

impl<S, C, H> ListVersionRepository<S, C, H>
where
    S: Storage,
    C: Cache,
    H: Host,
{
    /// 按状态归类的全部版本，优先读缓存，缓存不过期
    pub async fn list_versions(&self, list_id: i64) -> Result<VersionSet> {
        let key = cache::versions_key(list_id);
        if let Some(cached) = self.cache.get(&key).await {
            match serde_json::from_value(cached) {
                Ok(versions) => {
                    tracing::debug!(%key, "cache hit");
                    return Ok(versions);
                }
                Err(e) => tracing::warn!(%key, %e, "malformed cache entry ignored"),
            }
        }

        let mut session = self.storage.begin().await?;
        let versions = VersionSet::classify(session.versions(list_id).await?);
        session.commit().await?;

        self.cache
            .set(&key, serde_json::to_value(&versions)?, 0)
            .await;
        tracing::debug!(%key, "cache filled");
        Ok(versions)
    }

    /// 版本历史：已发布与计划中的版本
    pub async fn version_history(&self, list_id: i64) -> Result<Vec<Version>> {
        Ok(self
            .list_versions(list_id)
            .await?
            .history()
            .cloned()
            .collect())
    }

    /// 读取版本下的文章树，返回文章和被剔除的未来文章数
    ///
    /// 不包含未来文章时，发布时间晚于当前时间的顶层文章会被移除。
    pub async fn articles_for_version(
        &self,
        version_id: i64,
        include_future_posts: bool,
    ) -> Result<(Vec<Article>, usize)> {
        let mut session = self.storage.begin().await?;
        let rows = session.articles(version_id).await?;
        session.commit().await?;

        let mut articles = tree::unflatten(rows.into_iter().map(Article::from));

        let mut future_posts = 0;
        if !include_future_posts {
            let now = self.host.now();
            let before = articles.len();
            articles.retain(|a| !a.is_future(now));
            future_posts = before - articles.len();
        }

        Ok((articles, future_posts))
    }

    /// 读取列表的文章
    ///
    /// 未指定版本时使用最新已发布版本；指定的版本需属于列表的已发布或计划版本。
    /// 只有不含未来文章、且读取的是最新已发布版本时才使用缓存；
    /// 含未来文章的结果只缓存 [`cache::FUTURE_POSTS_TTL`] 秒。
    pub async fn resolve_list_articles(
        &self,
        list: &List,
        version_id: Option<i64>,
        include_future_posts: bool,
    ) -> Result<ListArticles> {
        let versions = self.list_versions(list.id).await?;
        let latest = versions.latest_published();

        let version = match version_id {
            None => match latest {
                Some(v) => v.clone(),
                None => return Ok(ListArticles::default()),
            },
            Some(id) => {
                // 归属校验直接查库，缓存只用于决定是否走文章缓存
                let mut session = self.storage.begin().await?;
                let stored = VersionSet::classify(session.versions(list.id).await?);
                session.commit().await?;
                stored
                    .history()
                    .find(|v| v.id == id)
                    .cloned()
                    .ok_or(Error::InvalidReference {
                        list_id: list.id,
                        version_id: id,
                    })?
            }
        };

        let use_cache = !include_future_posts && latest.is_some_and(|v| v.id == version.id);
        let key = cache::latest_articles_key(list.id);

        if use_cache {
            if let Some(cached) = self.cache.get(&key).await {
                match serde_json::from_value(cached) {
                    Ok(articles) => {
                        tracing::debug!(%key, "cache hit");
                        return Ok(ListArticles {
                            version: Some(version),
                            articles,
                        });
                    }
                    Err(e) => tracing::warn!(%key, %e, "malformed cache entry ignored"),
                }
            }
        }

        let (articles, future_posts) = self
            .articles_for_version(version.id, include_future_posts)
            .await?;

        if use_cache {
            let ttl = cache::latest_articles_ttl(future_posts);
            self.cache
                .set(&key, serde_json::to_value(&articles)?, ttl)
                .await;
            tracing::debug!(%key, ttl, "cache filled");
        }

        Ok(ListArticles {
            version: Some(version),
            articles,
        })
    }

    /// 读取预览版本的文章（包含未来文章，不缓存）
    pub async fn preview_articles(&self, list: &List) -> Result<ListArticles> {
        let versions = self.list_versions(list.id).await?;
        let Some(version) = versions.preview.first().cloned() else {
            return Err(Error::PreconditionNotMet("no preview version of list exists"));
        };

        let (articles, _) = self.articles_for_version(version.id, true).await?;
        Ok(ListArticles {
            version: Some(version),
            articles,
        })
    }

    /// 最新已发布版本中引用了该 post 的列表
    pub async fn find_lists_by_post(&self, post: i64) -> Result<Vec<ListRef>> {
        if post <= 0 {
            return Ok(Vec::new());
        }
        let mut session = self.storage.begin().await?;
        let lists = session.lists_by_post(post).await?;
        session.commit().await?;
        Ok(lists)
    }

    /// 引用该 post 的最新一篇文章（跨所有版本）
    pub async fn latest_article_for_post(&self, post: i64) -> Result<Option<Article>> {
        if post <= 0 {
            return Ok(None);
        }
        let mut session = self.storage.begin().await?;
        let row = session.latest_article_for_post(post).await?;
        session.commit().await?;
        Ok(row.map(Article::from))
    }
}
