use std::{sync::Arc, time::Duration};

use sqlx::{Postgres, postgres::PgPoolOptions, types::Json};

use super::{ArticleRow, ListRow, NewArticle, NewVersion, Session, Storage, VersionRow};
use crate::{
    content::{List, ListRef, Version, VersionStatus},
    error::Result,
};

/// 数据库连接池类型
pub type Db = sqlx::PgPool;

/// 根据连接 URL 创建新的数据库连接池
///
/// 连接池配置：
///
/// - 最大空闲时间 60 秒
/// - 最大生存时间 1500 秒（约 25 分钟）
/// - 最大连接数 10
/// - 获取连接超时 2 秒
/// - 获取前测试连接
/// - 最小连接数 2
pub async fn new_db_pool(conn_url: &str) -> Result<Db> {
    Ok(PgPoolOptions::new()
        .idle_timeout(Duration::from_secs(60))
        .max_lifetime(Duration::from_secs(1500))
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(2))
        .test_before_acquire(true)
        .min_connections(2)
        .connect(conn_url)
        .await?)
}

/// 带前缀的表名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub list: String,
    pub version: String,
    pub article: String,
}

impl Tables {
    /// 前缀需由调用方保证只含字母、数字和下划线
    pub fn new(prefix: &str) -> Self {
        Self {
            list: format!("{prefix}_lists"),
            version: format!("{prefix}_versions"),
            article: format!("{prefix}_articles"),
        }
    }
}

/// PostgreSQL 的 [`Storage`] 实现
#[derive(Clone)]
pub struct PgStorage {
    db: Db,
    tables: Arc<Tables>,
}

impl PgStorage {
    pub fn new(db: Db, tables: Tables) -> Self {
        Self {
            db,
            tables: Arc::new(tables),
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }
}

impl Storage for PgStorage {
    type Session = PgSession;

    async fn begin(&self) -> Result<PgSession> {
        Ok(PgSession {
            tx: self.db.begin().await?,
            tables: self.tables.clone(),
        })
    }
}

/// 一个 PostgreSQL 事务
pub struct PgSession {
    tx: sqlx::Transaction<'static, Postgres>,
    tables: Arc<Tables>,
}

const ARTICLE_COLUMNS: &str = "id, created, published, version_id, post, title, content, \
                               sort, size, options, image, parent";

impl Session for PgSession {
    async fn load_list(&mut self, list_id: i64) -> Result<Option<List>> {
        let sql = format!(
            "SELECT id, title, max_length, options FROM {} WHERE id = $1",
            self.tables.list
        );
        let row = sqlx::query_as::<_, ListRow>(&sql)
            .bind(list_id)
            .fetch_optional(self.tx.as_mut())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn versions(&mut self, list_id: i64) -> Result<Vec<Version>> {
        let sql = format!(
            "SELECT id, created, scheduled, list_id, status, user_id
             FROM {} WHERE list_id = $1 ORDER BY id DESC",
            self.tables.version
        );
        sqlx::query_as::<_, VersionRow>(&sql)
            .bind(list_id)
            .fetch_all(self.tx.as_mut())
            .await?
            .into_iter()
            .map(Version::try_from)
            .collect()
    }

    async fn version_list_id(&mut self, version_id: i64) -> Result<Option<i64>> {
        let sql = format!("SELECT list_id FROM {} WHERE id = $1", self.tables.version);
        Ok(sqlx::query_scalar(&sql)
            .bind(version_id)
            .fetch_optional(self.tx.as_mut())
            .await?)
    }

    async fn insert_version(&mut self, version: &NewVersion) -> Result<i64> {
        let sql = format!(
            "INSERT INTO {} (created, scheduled, list_id, status, user_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
            self.tables.version
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(version.created)
            .bind(version.scheduled)
            .bind(version.list_id)
            .bind(version.status.as_i16())
            .bind(version.user_id)
            .fetch_one(self.tx.as_mut())
            .await?)
    }

    async fn set_version_status(&mut self, version_id: i64, status: VersionStatus) -> Result<u64> {
        let sql = format!("UPDATE {} SET status = $1 WHERE id = $2", self.tables.version);
        Ok(sqlx::query(&sql)
            .bind(status.as_i16())
            .bind(version_id)
            .execute(self.tx.as_mut())
            .await?
            .rows_affected())
    }

    async fn delete_version(&mut self, version_id: i64) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.tables.version);
        Ok(sqlx::query(&sql)
            .bind(version_id)
            .execute(self.tx.as_mut())
            .await?
            .rows_affected())
    }

    async fn delete_list_versions(&mut self, list_id: i64) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE list_id = $1", self.tables.version);
        Ok(sqlx::query(&sql)
            .bind(list_id)
            .execute(self.tx.as_mut())
            .await?
            .rows_affected())
    }

    async fn insert_article(&mut self, version_id: i64, article: &NewArticle) -> Result<i64> {
        let sql = format!(
            "INSERT INTO {}
                (created, published, version_id, post, title, content,
                 sort, size, options, image, parent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id",
            self.tables.article
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(article.created)
            .bind(article.published)
            .bind(version_id)
            .bind(article.post)
            .bind(&article.title)
            .bind(&article.content)
            .bind(article.sort)
            .bind(article.size)
            .bind(Json(&article.options))
            .bind(Json(&article.image))
            .bind(article.parent)
            .fetch_one(self.tx.as_mut())
            .await?)
    }

    async fn delete_articles(&mut self, version_id: i64) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE version_id = $1", self.tables.article);
        Ok(sqlx::query(&sql)
            .bind(version_id)
            .execute(self.tx.as_mut())
            .await?
            .rows_affected())
    }

    async fn articles(&mut self, version_id: i64) -> Result<Vec<ArticleRow>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM {} WHERE version_id = $1 ORDER BY parent, sort",
            self.tables.article
        );
        Ok(sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(version_id)
            .fetch_all(self.tx.as_mut())
            .await?)
    }

    async fn article(&mut self, article_id: i64) -> Result<Option<ArticleRow>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM {} WHERE id = $1",
            self.tables.article
        );
        Ok(sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(article_id)
            .fetch_optional(self.tx.as_mut())
            .await?)
    }

    async fn update_article(&mut self, row: &ArticleRow) -> Result<u64> {
        let sql = format!(
            "UPDATE {}
             SET created = $1, published = $2, post = $3, title = $4, content = $5,
                 sort = $6, size = $7, options = $8, image = $9, parent = $10
             WHERE id = $11",
            self.tables.article
        );
        Ok(sqlx::query(&sql)
            .bind(row.created)
            .bind(row.published)
            .bind(row.post)
            .bind(&row.title)
            .bind(&row.content)
            .bind(row.sort)
            .bind(row.size)
            .bind(&row.options)
            .bind(&row.image)
            .bind(row.parent)
            .bind(row.id)
            .execute(self.tx.as_mut())
            .await?
            .rows_affected())
    }

    async fn lists_by_post(&mut self, post: i64) -> Result<Vec<ListRef>> {
        let sql = format!(
            "SELECT DISTINCT l.id, l.options
             FROM {list} l
             INNER JOIN (
                 SELECT MAX(id) AS latest, list_id
                 FROM {version}
                 WHERE status = $1
                 GROUP BY list_id
             ) lv ON l.id = lv.list_id
             INNER JOIN {article} a ON a.version_id = lv.latest
             WHERE a.post = $2
             ORDER BY l.id",
            list = self.tables.list,
            version = self.tables.version,
            article = self.tables.article,
        );
        let rows: Vec<(i64, Json<crate::content::Options>)> = sqlx::query_as(&sql)
            .bind(VersionStatus::Published.as_i16())
            .bind(post)
            .fetch_all(self.tx.as_mut())
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, options)| ListRef {
                id,
                options: options.0,
            })
            .collect())
    }

    async fn latest_article_for_post(&mut self, post: i64) -> Result<Option<ArticleRow>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM {} WHERE post = $1 ORDER BY id DESC LIMIT 1",
            self.tables.article
        );
        Ok(sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(post)
            .fetch_optional(self.tx.as_mut())
            .await?)
    }

    async fn update_post_published(&mut self, post: i64, published: i64) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET published = $1 WHERE post = $2 AND published <> $1",
            self.tables.article
        );
        Ok(sqlx::query(&sql)
            .bind(published)
            .bind(post)
            .execute(self.tx.as_mut())
            .await?
            .rows_affected())
    }

    async fn lists_with_post(&mut self, post: i64) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT DISTINCT lv.list_id
             FROM (
                 SELECT MAX(id) AS latest, list_id
                 FROM {version}
                 WHERE status = $1
                 GROUP BY list_id
             ) lv
             INNER JOIN {article} a ON a.version_id = lv.latest
             WHERE a.post = $2",
            version = self.tables.version,
            article = self.tables.article,
        );
        Ok(sqlx::query_scalar(&sql)
            .bind(VersionStatus::Published.as_i16())
            .bind(post)
            .fetch_all(self.tx.as_mut())
            .await?)
    }

    async fn commit(self) -> Result<()> {
        Ok(self.tx.commit().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_use_prefix() {
        let tables = Tables::new("wp_teaser");
        assert_eq!(tables.list, "wp_teaser_lists");
        assert_eq!(tables.version, "wp_teaser_versions");
        assert_eq!(tables.article, "wp_teaser_articles");
    }
}
