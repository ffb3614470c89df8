use sqlx::types::Json;

use crate::{
    content::{Article, List, Options, Version, VersionStatus, legacy, tree::PlacedArticle},
    error::{Error, Result},
};

/// 版本表中的一行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VersionRow {
    pub id: i64,
    pub created: i64,
    pub scheduled: i64,
    pub list_id: i64,
    pub status: i16,
    pub user_id: i64,
}

impl TryFrom<VersionRow> for Version {
    type Error = Error;

    fn try_from(row: VersionRow) -> Result<Self> {
        let status = VersionStatus::try_from(row.status)
            .map_err(|_| Error::InvalidResult("unknown version status"))?;
        Ok(Version {
            id: row.id,
            created: row.created,
            scheduled: row.scheduled,
            list_id: row.list_id,
            status,
            user_id: row.user_id,
        })
    }
}

/// 待插入的版本
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub created: i64,
    pub scheduled: i64,
    pub list_id: i64,
    pub status: VersionStatus,
    pub user_id: i64,
}

/// 文章表中的一行
///
/// `options` / `image` 早期可能为空，读出时按空配置处理。
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ArticleRow {
    pub id: i64,
    pub created: i64,
    pub published: i64,
    pub version_id: i64,
    pub post: i64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub sort: i64,
    pub size: i32,
    pub options: Option<Json<Options>>,
    pub image: Option<Json<Options>>,
    pub parent: i64,
}

impl ArticleRow {
    /// 用文章内容覆盖可编辑的列，id 与所属版本不变
    pub fn assign(&mut self, article: Article) {
        self.created = article.created;
        self.published = article.published;
        self.post = article.post;
        self.title = Some(article.title);
        self.content = Some(article.content);
        self.sort = article.sort;
        self.size = article.size;
        self.options = Some(Json(article.options));
        self.image = Some(Json(article.image));
        self.parent = article.parent;
    }
}

/// 读出的行统一做旧字段迁移
impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        let mut article = Article {
            id: row.id,
            created: row.created,
            published: row.published,
            post: row.post.max(0),
            title: row.title.unwrap_or_default(),
            content: row.content.unwrap_or_default(),
            sort: row.sort,
            size: row.size,
            options: row.options.map(|j| j.0).unwrap_or_default(),
            image: row.image.map(|j| j.0).unwrap_or_default(),
            parent: row.parent,
            children: Vec::new(),
        };
        legacy::fix(&mut article);
        article
    }
}

/// 待插入的文章
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub created: i64,
    pub published: i64,
    pub post: i64,
    pub title: String,
    pub content: String,
    pub sort: i64,
    pub size: i32,
    pub options: Options,
    pub image: Options,
    pub parent: i64,
}

impl NewArticle {
    /// 未设置的创建时间和发布时间取 `now`
    pub fn new(placed: PlacedArticle, now: i64) -> Self {
        let PlacedArticle {
            article,
            sort,
            parent,
        } = placed;
        Self {
            created: if article.created == 0 { now } else { article.created },
            published: if article.published == 0 { now } else { article.published },
            post: article.post.max(0),
            title: article.title,
            content: article.content,
            sort,
            size: article.size,
            options: article.options,
            image: article.image,
            parent,
        }
    }
}

/// 列表表中的一行
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListRow {
    pub id: i64,
    pub title: String,
    pub max_length: i32,
    pub options: Json<Options>,
}

impl From<ListRow> for List {
    fn from(row: ListRow) -> Self {
        List {
            id: row.id,
            title: row.title,
            max_length: usize::try_from(row.max_length).unwrap_or_default(),
            options: row.options.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_article_from_row_applies_legacy_fix() {
        let row = ArticleRow {
            id: 9,
            created: 1,
            published: 2,
            version_id: 3,
            post: -1,
            title: None,
            content: Some("body".into()),
            sort: 0,
            size: 24,
            options: Some(Json(
                json!({ "pre_title": "pre" }).as_object().cloned().unwrap_or_default(),
            )),
            image: None,
            parent: -1,
        };

        let article = Article::from(row);

        assert_eq!(article.id, 9);
        assert_eq!(article.post, 0);
        assert_eq!(article.title, "");
        assert_eq!(article.option_str("preTitle"), "pre");
        assert!(article.image.is_empty());
    }

    #[test]
    fn test_new_article_defaults_timestamps() {
        let placed = PlacedArticle {
            article: Article {
                created: 0,
                published: 500,
                ..Default::default()
            },
            sort: 2,
            parent: 1,
        };

        let new = NewArticle::new(placed, 1000);

        assert_eq!(new.created, 1000);
        assert_eq!(new.published, 500);
        assert_eq!((new.sort, new.parent), (2, 1));
    }

    #[test]
    fn test_unknown_status_is_invalid() {
        let row = VersionRow {
            id: 1,
            created: 0,
            scheduled: 0,
            list_id: 1,
            status: 7,
            user_id: 1,
        };

        assert!(matches!(
            Version::try_from(row),
            Err(Error::InvalidResult(_))
        ));
    }
}
