//! 表结构安装与升级
//!
//! 升级按“上次安装的版本号”决定需要执行的步骤，每一步都先检查列是否存在，
//! 重复执行不会再次修改表结构。

use std::{fmt, str::FromStr};

use super::{Db, Tables};
use crate::error::{Error, Result};

/// 已安装的版本号，形如 `3.1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid schema version: {s}"));
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(Self::new(major, minor))
    }
}

/// 一个升级步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// 3.0：文章表旧列名改为新列名
    RenameLegacyColumns,
    /// 3.1：版本表新增 `scheduled`
    AddVersionSchedule,
}

impl Migration {
    pub const ALL: [Migration; 2] = [Self::RenameLegacyColumns, Self::AddVersionSchedule];

    /// 引入该步骤的版本
    pub fn target(self) -> SchemaVersion {
        match self {
            Self::RenameLegacyColumns => SchemaVersion::new(3, 0),
            Self::AddVersionSchedule => SchemaVersion::new(3, 1),
        }
    }
}

/// 从 `installed` 升级需要执行的步骤，按顺序排列
pub fn pending(installed: SchemaVersion) -> Vec<Migration> {
    Migration::ALL
        .into_iter()
        .filter(|m| installed < m.target())
        .collect()
}

/// 旧列 → 新列；`image` 先让位给由 `image_options` 改名而来的新列
const LEGACY_COLUMN_RENAMES: [(&str, &str); 6] = [
    ("image", "image_depr"),
    ("publish_date", "published"),
    ("post_id", "post"),
    ("title_fontsize", "size"),
    ("image_options", "image"),
    ("text", "content"),
];

fn install_sql(tables: &Tables) -> String {
    let Tables {
        list,
        version,
        article,
    } = tables;

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {list} (
            id BIGSERIAL PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            max_length INTEGER NOT NULL DEFAULT 50,
            options JSONB NOT NULL DEFAULT '{{}}'::jsonb
        );

        CREATE TABLE IF NOT EXISTS {version} (
            id BIGSERIAL PRIMARY KEY,
            created BIGINT NOT NULL DEFAULT 0,
            scheduled BIGINT NOT NULL DEFAULT 0,
            list_id BIGINT NOT NULL,
            status SMALLINT NOT NULL DEFAULT 1,
            user_id BIGINT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {version}_created ON {version} (created);
        CREATE INDEX IF NOT EXISTS {version}_list ON {version} (list_id);
        CREATE INDEX IF NOT EXISTS {version}_list_created ON {version} (list_id, created);

        CREATE TABLE IF NOT EXISTS {article} (
            id BIGSERIAL PRIMARY KEY,
            created BIGINT NOT NULL DEFAULT 0,
            published BIGINT NOT NULL DEFAULT 0,
            version_id BIGINT NOT NULL REFERENCES {version} (id) ON DELETE CASCADE,
            post BIGINT NOT NULL DEFAULT -1,
            title VARCHAR(255),
            content TEXT,
            sort BIGINT NOT NULL DEFAULT 100,
            size INTEGER NOT NULL DEFAULT 24,
            options JSONB,
            image JSONB,
            parent BIGINT NOT NULL DEFAULT -1
        );
        CREATE INDEX IF NOT EXISTS {article}_created ON {article} (created);
        CREATE INDEX IF NOT EXISTS {article}_version ON {article} (version_id);
        CREATE INDEX IF NOT EXISTS {article}_version_created ON {article} (version_id, created);
        CREATE INDEX IF NOT EXISTS {article}_version_sort ON {article} (version_id, sort);
        CREATE INDEX IF NOT EXISTS {article}_version_sort_created ON {article} (version_id, sort, created);
        CREATE INDEX IF NOT EXISTS {article}_post ON {article} (post);
        CREATE INDEX IF NOT EXISTS {article}_published ON {article} (published)
        "#
    )
}

/// 执行以 `;` 分隔的多条语句
async fn execute_batch(db: &Db, content: &str) -> Result<()> {
    for sql in content.split(';') {
        if sql.trim().is_empty() {
            continue;
        }
        sqlx::query(sql).execute(db).await?;
    }
    Ok(())
}

/// 创建不存在的表和索引
pub async fn install(db: &Db, tables: &Tables) -> Result<()> {
    execute_batch(db, &install_sql(tables)).await?;
    tracing::info!(tables = ?tables, "schema installed");
    Ok(())
}

async fn column_exists(db: &Db, table: &str, column: &str) -> Result<bool> {
    Ok(sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.columns
            WHERE table_schema = current_schema()
            AND table_name = $1
            AND column_name = $2
        )
        "#,
    )
    .bind(table)
    .bind(column)
    .fetch_one(db)
    .await?)
}

/// 从 `installed` 升级，返回实际执行过的步骤
///
/// 需在 [`install`] 之前执行：旧表的列名不同，建索引会失败。表不存在时跳过。
pub async fn upgrade(db: &Db, tables: &Tables, installed: SchemaVersion) -> Result<Vec<Migration>> {
    let mut applied = Vec::new();

    for migration in pending(installed) {
        let changed = match migration {
            Migration::RenameLegacyColumns => {
                if column_exists(db, &tables.article, "image_options").await? {
                    for (old, new) in LEGACY_COLUMN_RENAMES {
                        if column_exists(db, &tables.article, old).await? {
                            let sql = format!(
                                "ALTER TABLE {} RENAME COLUMN {old} TO {new}",
                                tables.article
                            );
                            sqlx::query(&sql).execute(db).await?;
                        }
                    }
                    true
                } else {
                    false
                }
            }
            Migration::AddVersionSchedule => {
                if !column_exists(db, &tables.version, "id").await?
                    || column_exists(db, &tables.version, "scheduled").await?
                {
                    false
                } else {
                    let sql = format!(
                        "ALTER TABLE {} ADD COLUMN scheduled BIGINT NOT NULL DEFAULT 0",
                        tables.version
                    );
                    sqlx::query(&sql).execute(db).await?;
                    true
                }
            }
        };

        if changed {
            tracing::info!(%installed, target = %migration.target(), ?migration, "schema migrated");
            applied.push(migration);
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_version() {
        assert_eq!("3.1".parse::<SchemaVersion>().ok(), Some(SchemaVersion::new(3, 1)));
        assert_eq!("2".parse::<SchemaVersion>().ok(), Some(SchemaVersion::new(2, 0)));
        assert!("x.1".parse::<SchemaVersion>().is_err());
        assert!("3.y".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_pending_migrations() {
        assert_eq!(
            pending(SchemaVersion::new(2, 9)),
            vec![Migration::RenameLegacyColumns, Migration::AddVersionSchedule]
        );
        assert_eq!(
            pending(SchemaVersion::new(3, 0)),
            vec![Migration::AddVersionSchedule]
        );
        assert!(pending(SchemaVersion::new(3, 1)).is_empty());
    }

    #[test]
    fn test_install_sql_uses_prefixed_tables() {
        let sql = install_sql(&Tables::new("t"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS t_versions"));
        assert!(sql.contains("REFERENCES t_versions (id) ON DELETE CASCADE"));
        assert!(sql.contains("'{}'::jsonb"));
        assert_eq!(sql.matches("CREATE TABLE").count(), 3);
    }
}
