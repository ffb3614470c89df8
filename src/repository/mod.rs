mod lifecycle;
mod query;

use crate::{
    cache::{Cache, Invalidations},
    content::{Article, List, Version, VersionSet, VersionStatus, sanitize, tree},
    error::{Error, Result},
    host::Host,
    storage::{NewArticle, NewVersion, Session, Storage},
};

pub use self::query::ListArticles;

/// 保留的已发布版本数（包含新建的那一个）
pub const RETAINED_PUBLISHED_VERSIONS: usize = 9;

/// 列表版本仓储
///
/// 负责版本的创建、计划发布、更新、删除，文章树的读写，以及相关缓存的失效。
/// 每个写操作在一个 [`Session`] 内完成，提交成功后才清理缓存。
pub struct ListVersionRepository<S, C, H> {
    storage: S,
    cache: C,
    host: H,
}

impl<S, C, H> ListVersionRepository<S, C, H>
where
    S: Storage,
    C: Cache,
    H: Host,
{
    pub fn new(storage: S, cache: C, host: H) -> Self {
        Self {
            storage,
            cache,
            host,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// 读取宿主列表，不存在时返回 [`Error::NotFound`]
    pub async fn load_list(&self, list_id: i64) -> Result<List> {
        let mut session = self.storage.begin().await?;
        let list = session.load_list(list_id).await?;
        session.commit().await?;
        list.ok_or(Error::NotFound)
    }

    /// 版本是否属于列表，直接查询数据库
    pub async fn version_belongs_to_list(&self, list: &List, version_id: i64) -> Result<bool> {
        let mut session = self.storage.begin().await?;
        let belongs = Self::belongs(&mut session, list.id, version_id).await?;
        session.commit().await?;
        Ok(belongs)
    }

    async fn belongs(session: &mut S::Session, list_id: i64, version_id: i64) -> Result<bool> {
        let versions = VersionSet::classify(session.versions(list_id).await?);
        Ok(versions.contains(version_id))
    }

    async fn latest_published_id(session: &mut S::Session, list_id: i64) -> Result<Option<i64>> {
        let versions = VersionSet::classify(session.versions(list_id).await?);
        Ok(versions.latest_published().map(|v| v.id))
    }

    /// 删除版本及其文章，登记需要失效的缓存
    ///
    /// 所属列表和最新已发布版本都在删除前确定。版本不存在时什么也不做。
    async fn delete_version_in(
        &self,
        session: &mut S::Session,
        version_id: i64,
        invalidations: &mut Invalidations,
    ) -> Result<()> {
        let Some(list_id) = session.version_list_id(version_id).await? else {
            tracing::debug!(version_id, "version already gone");
            return Ok(());
        };
        let latest = Self::latest_published_id(session, list_id).await?;

        session.delete_articles(version_id).await?;
        session.delete_version(version_id).await?;

        invalidations.versions(list_id);
        if latest == Some(version_id) {
            invalidations.latest_articles(list_id);
        }
        tracing::info!(list_id, version_id, "version deleted");
        Ok(())
    }

    /// 插入版本行并写入文章树
    async fn save_version(
        &self,
        session: &mut S::Session,
        list: &List,
        articles: Vec<Article>,
        user_id: i64,
        status: VersionStatus,
        scheduled: i64,
    ) -> Result<Version> {
        let version = NewVersion {
            created: self.host.now(),
            scheduled,
            list_id: list.id,
            status,
            user_id,
        };
        let id = session.insert_version(&version).await?;
        self.save_articles(session, list, articles, id).await?;

        Ok(Version {
            id,
            created: version.created,
            scheduled,
            list_id: list.id,
            status,
            user_id,
        })
    }

    /// 按列表最大长度截断后扁平化写入，超出的顶层文章直接丢弃
    async fn save_articles(
        &self,
        session: &mut S::Session,
        list: &List,
        mut articles: Vec<Article>,
        version_id: i64,
    ) -> Result<()> {
        if articles.len() > list.max_length {
            tracing::warn!(
                list_id = list.id,
                max_length = list.max_length,
                dropped = articles.len() - list.max_length,
                "articles beyond list max length dropped"
            );
            articles.truncate(list.max_length);
        }

        let now = self.host.now();
        for mut placed in tree::flatten(articles) {
            sanitize::sanitize(&mut placed.article);
            session
                .insert_article(version_id, &NewArticle::new(placed, now))
                .await?;
        }
        Ok(())
    }

    /// 关联了 post 的文章以 post 的真实发布时间为准
    async fn refresh_published(&self, articles: &mut [Article]) {
        for article in articles.iter_mut() {
            self.refresh_one(article).await;
            for child in article.children.iter_mut() {
                self.refresh_one(child).await;
            }
        }
    }

    async fn refresh_one(&self, article: &mut Article) {
        if article.post > 0 {
            if let Some(published) = self.host.post_timestamp(article.post).await {
                article.published = published;
            }
        }
    }
}
