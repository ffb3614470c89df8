use std::{collections::BTreeMap, sync::Arc};

use sqlx::types::Json;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{ArticleRow, NewArticle, NewVersion, Session, Storage};
use crate::{
    content::{List, ListRef, Version, VersionStatus},
    error::Result,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    lists: BTreeMap<i64, List>,
    versions: BTreeMap<i64, Version>,
    articles: BTreeMap<i64, ArticleRow>,
    next_version: i64,
    next_article: i64,
}

impl Tables {
    fn latest_published(&self, list_id: i64) -> Option<i64> {
        self.versions
            .values()
            .filter(|v| v.list_id == list_id && v.status == VersionStatus::Published)
            .map(|v| v.id)
            .max()
    }

    /// 每个列表最新已发布版本中引用该 post 的列表 id
    fn latest_lists_with_post(&self, post: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .versions
            .values()
            .map(|v| v.list_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.retain(|&list_id| {
            self.latest_published(list_id).is_some_and(|latest| {
                self.articles
                    .values()
                    .any(|a| a.version_id == latest && a.post == post)
            })
        });
        ids
    }
}

/// 内存中的 [`Storage`] 实现
///
/// 会话在整个生命周期内持有表的独占锁，并发会话依次执行。
/// 修改先写在副本上，提交时写回；未提交的会话不会留下任何修改。
/// 同一个任务内不能同时持有两个会话。
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    shared: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入宿主列表
    pub async fn insert_list(&self, list: List) {
        self.shared.lock().await.lists.insert(list.id, list);
    }
}

impl Storage for MemoryStorage {
    type Session = MemorySession;

    async fn begin(&self) -> Result<MemorySession> {
        let guard = self.shared.clone().lock_owned().await;
        let tables = (*guard).clone();
        Ok(MemorySession { guard, tables })
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<Tables>,
    tables: Tables,
}

impl Session for MemorySession {
    async fn load_list(&mut self, list_id: i64) -> Result<Option<List>> {
        Ok(self.tables.lists.get(&list_id).cloned())
    }

    async fn versions(&mut self, list_id: i64) -> Result<Vec<Version>> {
        Ok(self
            .tables
            .versions
            .values()
            .rev()
            .filter(|v| v.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn version_list_id(&mut self, version_id: i64) -> Result<Option<i64>> {
        Ok(self.tables.versions.get(&version_id).map(|v| v.list_id))
    }

    async fn insert_version(&mut self, version: &NewVersion) -> Result<i64> {
        self.tables.next_version += 1;
        let id = self.tables.next_version;
        self.tables.versions.insert(
            id,
            Version {
                id,
                created: version.created,
                scheduled: version.scheduled,
                list_id: version.list_id,
                status: version.status,
                user_id: version.user_id,
            },
        );
        Ok(id)
    }

    async fn set_version_status(&mut self, version_id: i64, status: VersionStatus) -> Result<u64> {
        Ok(match self.tables.versions.get_mut(&version_id) {
            Some(v) => {
                v.status = status;
                1
            }
            None => 0,
        })
    }

    async fn delete_version(&mut self, version_id: i64) -> Result<u64> {
        Ok(self.tables.versions.remove(&version_id).map_or(0, |_| 1))
    }

    async fn delete_list_versions(&mut self, list_id: i64) -> Result<u64> {
        let before = self.tables.versions.len();
        self.tables.versions.retain(|_, v| v.list_id != list_id);
        Ok((before - self.tables.versions.len()) as u64)
    }

    async fn insert_article(&mut self, version_id: i64, article: &NewArticle) -> Result<i64> {
        self.tables.next_article += 1;
        let id = self.tables.next_article;
        self.tables.articles.insert(
            id,
            ArticleRow {
                id,
                created: article.created,
                published: article.published,
                version_id,
                post: article.post,
                title: Some(article.title.clone()),
                content: Some(article.content.clone()),
                sort: article.sort,
                size: article.size,
                options: Some(Json(article.options.clone())),
                image: Some(Json(article.image.clone())),
                parent: article.parent,
            },
        );
        Ok(id)
    }

    async fn delete_articles(&mut self, version_id: i64) -> Result<u64> {
        let before = self.tables.articles.len();
        self.tables.articles.retain(|_, a| a.version_id != version_id);
        Ok((before - self.tables.articles.len()) as u64)
    }

    async fn articles(&mut self, version_id: i64) -> Result<Vec<ArticleRow>> {
        let mut rows: Vec<ArticleRow> = self
            .tables
            .articles
            .values()
            .filter(|a| a.version_id == version_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.parent, a.sort));
        Ok(rows)
    }

    async fn article(&mut self, article_id: i64) -> Result<Option<ArticleRow>> {
        Ok(self.tables.articles.get(&article_id).cloned())
    }

    async fn update_article(&mut self, row: &ArticleRow) -> Result<u64> {
        Ok(match self.tables.articles.get_mut(&row.id) {
            Some(stored) => {
                *stored = row.clone();
                1
            }
            None => 0,
        })
    }

    async fn lists_by_post(&mut self, post: i64) -> Result<Vec<ListRef>> {
        let ids = self.tables.latest_lists_with_post(post);
        Ok(ids
            .into_iter()
            .filter_map(|id| self.tables.lists.get(&id))
            .map(|list| ListRef {
                id: list.id,
                options: list.options.clone(),
            })
            .collect())
    }

    async fn latest_article_for_post(&mut self, post: i64) -> Result<Option<ArticleRow>> {
        Ok(self
            .tables
            .articles
            .values()
            .rev()
            .find(|a| a.post == post)
            .cloned())
    }

    async fn update_post_published(&mut self, post: i64, published: i64) -> Result<u64> {
        let mut affected = 0;
        for a in self.tables.articles.values_mut() {
            if a.post == post && a.published != published {
                a.published = published;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn lists_with_post(&mut self, post: i64) -> Result<Vec<i64>> {
        Ok(self.tables.latest_lists_with_post(post))
    }

    async fn commit(self) -> Result<()> {
        let Self { mut guard, tables } = self;
        *guard = tables;
        Ok(())
    }
}
