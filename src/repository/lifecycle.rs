use serde_json::{Value, json};

use super::{ListVersionRepository, RETAINED_PUBLISHED_VERSIONS};
use crate::{
    cache::{Cache, Invalidations},
    content::{Article, List, Options, VersionSet, VersionStatus, legacy, sanitize},
    error::{Error, Result},
    host::{Host, LIST_SAVED, PUBLISH_SCHEDULED_LIST},
    storage::{Session, Storage},
};

/// [`ListVersionRepository::update_article`] 允许修改的字段
pub const EDITABLE_FIELDS: [&str; 10] = [
    "created",
    "published",
    "post",
    "title",
    "content",
    "sort",
    "size",
    "options",
    "image",
    "parent",
];

impl<S, C, H> ListVersionRepository<S, C, H>
where
    S: Storage,
    C: Cache,
    H: Host,
{
    /// 新建版本并返回其 id
    ///
    /// 立即发布时只保留最近的 [`RETAINED_PUBLISHED_VERSIONS`] 个已发布版本（含新版本）；
    /// 无论是否预览，已有的预览版本都会被删除。
    pub async fn create_version(
        &self,
        list: &List,
        mut articles: Vec<Article>,
        user_id: i64,
        preview: bool,
    ) -> Result<i64> {
        self.refresh_published(&mut articles).await;
        self.host.dispatch_event(LIST_SAVED, serde_json::to_value(list)?);

        let mut session = self.storage.begin().await?;
        let mut invalidations = Invalidations::new();
        let versions = VersionSet::classify(session.versions(list.id).await?);

        if !preview {
            for old in versions
                .published
                .iter()
                .skip(RETAINED_PUBLISHED_VERSIONS - 1)
            {
                self.delete_version_in(&mut session, old.id, &mut invalidations)
                    .await?;
            }
        }

        // 正常情况下最多只有一个预览版本
        for old in &versions.preview {
            self.delete_version_in(&mut session, old.id, &mut invalidations)
                .await?;
        }

        let status = if preview {
            VersionStatus::Preview
        } else {
            VersionStatus::Published
        };
        let version = self
            .save_version(&mut session, list, articles, user_id, status, 0)
            .await?;
        session.commit().await?;

        invalidations.versions(list.id);
        if !preview {
            invalidations.latest_articles(list.id);
        }
        invalidations.flush(&self.cache).await;

        tracing::info!(list_id = list.id, version_id = version.id, ?status, "version created");
        Ok(version.id)
    }

    /// 新建计划版本，到期后由宿主调度执行 [`Self::publish_scheduled_version`]
    pub async fn create_scheduled_version(
        &self,
        list: &List,
        articles: Vec<Article>,
        user_id: i64,
        schedule_at: i64,
    ) -> Result<i64> {
        if schedule_at <= 0 {
            return Err(Error::PreconditionNotMet("schedule time must be set"));
        }

        let mut session = self.storage.begin().await?;
        let version = self
            .save_version(
                &mut session,
                list,
                articles,
                user_id,
                VersionStatus::Scheduled,
                schedule_at,
            )
            .await?;
        session.commit().await?;

        let mut invalidations = Invalidations::new();
        invalidations.versions(list.id);
        invalidations.flush(&self.cache).await;

        self.host.schedule_event(
            schedule_at,
            PUBLISH_SCHEDULED_LIST,
            json!([list.id, version.id]),
        );

        tracing::info!(list_id = list.id, version_id = version.id, schedule_at, "version scheduled");
        Ok(version.id)
    }

    /// 把计划版本改为已发布
    pub async fn publish_scheduled_version(&self, list_id: i64, version_id: i64) -> Result<()> {
        let mut session = self.storage.begin().await?;
        let versions = VersionSet::classify(session.versions(list_id).await?);

        if !versions.scheduled.iter().any(|v| v.id == version_id) {
            return Err(if versions.contains(version_id) {
                Error::PreconditionNotMet("version is not scheduled")
            } else {
                Error::InvalidReference {
                    list_id,
                    version_id,
                }
            });
        }

        session
            .set_version_status(version_id, VersionStatus::Published)
            .await?;
        session.commit().await?;

        let mut invalidations = Invalidations::new();
        invalidations.versions(list_id).latest_articles(list_id);
        invalidations.flush(&self.cache).await;

        tracing::info!(list_id, version_id, "scheduled version published");
        Ok(())
    }

    /// 整体替换版本下的文章
    pub async fn update_version_articles(
        &self,
        list: &List,
        articles: Vec<Article>,
        version_id: i64,
    ) -> Result<()> {
        let mut session = self.storage.begin().await?;
        let versions = VersionSet::classify(session.versions(list.id).await?);
        if !versions.contains(version_id) {
            return Err(Error::InvalidReference {
                list_id: list.id,
                version_id,
            });
        }

        session.delete_articles(version_id).await?;
        self.save_articles(&mut session, list, articles, version_id)
            .await?;
        session.commit().await?;

        if versions.latest_published().map(|v| v.id) == Some(version_id) {
            let mut invalidations = Invalidations::new();
            invalidations.latest_articles(list.id);
            invalidations.flush(&self.cache).await;
        }

        tracing::info!(list_id = list.id, version_id, "version articles replaced");
        Ok(())
    }

    /// 删除版本及其文章
    pub async fn delete_version(&self, version_id: i64) -> Result<()> {
        let mut session = self.storage.begin().await?;
        let mut invalidations = Invalidations::new();
        self.delete_version_in(&mut session, version_id, &mut invalidations)
            .await?;
        session.commit().await?;
        invalidations.flush(&self.cache).await;
        Ok(())
    }

    /// 删除版本下的全部文章，版本本身保留
    pub async fn clear_version_articles(&self, version_id: i64) -> Result<()> {
        let mut session = self.storage.begin().await?;
        let removed = session.delete_articles(version_id).await?;

        let mut invalidations = Invalidations::new();
        if let Some(list_id) = session.version_list_id(version_id).await? {
            if Self::latest_published_id(&mut session, list_id).await? == Some(version_id) {
                invalidations.latest_articles(list_id);
            }
        }
        session.commit().await?;
        invalidations.flush(&self.cache).await;

        tracing::debug!(version_id, removed, "version articles cleared");
        Ok(())
    }

    /// 删除列表的全部版本和文章
    pub async fn delete_list_versions(&self, list: &List) -> Result<()> {
        let mut session = self.storage.begin().await?;
        for version in session.versions(list.id).await? {
            session.delete_articles(version.id).await?;
        }
        let removed = session.delete_list_versions(list.id).await?;
        session.commit().await?;

        let mut invalidations = Invalidations::new();
        invalidations.latest_articles(list.id).versions(list.id);
        invalidations.flush(&self.cache).await;

        tracing::info!(list_id = list.id, removed, "list versions deleted");
        Ok(())
    }

    /// 按字段名修改一篇已保存的文章
    ///
    /// `options` 与已有配置合并，其余字段直接覆盖。文章不存在时什么也不做。
    pub async fn update_article(&self, article_id: i64, patch: Options) -> Result<()> {
        if let Some(field) = patch
            .keys()
            .find(|k| !EDITABLE_FIELDS.contains(&k.as_str()))
        {
            return Err(Error::UnknownField(field.clone()));
        }

        let mut session = self.storage.begin().await?;
        let Some(mut row) = session.article(article_id).await? else {
            tracing::debug!(article_id, "article to update not found");
            return Ok(());
        };

        let mut value = serde_json::to_value(Article::from(row.clone()))?;
        if let Value::Object(fields) = &mut value {
            for (key, v) in patch {
                match v {
                    Value::Object(new) if key == "options" => {
                        if let Some(Value::Object(stored)) = fields.get_mut("options") {
                            stored.extend(new);
                        }
                    }
                    v => {
                        fields.insert(key, v);
                    }
                }
            }
        }

        let mut article: Article = serde_json::from_value(value)?;
        legacy::fix(&mut article);
        sanitize::sanitize(&mut article);
        row.assign(article);
        session.update_article(&row).await?;

        let list = match session.version_list_id(row.version_id).await? {
            Some(list_id) => {
                let latest = Self::latest_published_id(&mut session, list_id).await?;
                Some((session.load_list(list_id).await?, list_id, latest))
            }
            None => None,
        };
        session.commit().await?;

        if let Some((list, list_id, latest)) = list {
            if let Some(list) = list {
                self.host
                    .dispatch_event(LIST_SAVED, serde_json::to_value(&list)?);
            }
            if latest == Some(row.version_id) {
                let mut invalidations = Invalidations::new();
                invalidations.latest_articles(list_id);
                invalidations.flush(&self.cache).await;
            }
        }

        tracing::info!(article_id, version_id = row.version_id, "article updated");
        Ok(())
    }

    /// post 发布时间变化后同步到引用它的文章
    ///
    /// 只有最新已发布版本引用了该 post 的列表才需要清理最新文章缓存。
    /// `post` 不大于 0 表示没有关联，什么也不做。
    pub async fn propagate_post_publish_date_change(&self, published: i64, post: i64) -> Result<()> {
        if post <= 0 {
            return Ok(());
        }

        let mut session = self.storage.begin().await?;
        let affected = session.update_post_published(post, published).await?;

        let mut invalidations = Invalidations::new();
        if affected > 0 {
            for list_id in session.lists_with_post(post).await? {
                invalidations.latest_articles(list_id);
            }
        }
        session.commit().await?;
        invalidations.flush(&self.cache).await;

        tracing::debug!(post, published, affected, "post publish date propagated");
        Ok(())
    }
}
