use std::env;

use crate::{
    error::{Error, Result},
    storage::schema::SchemaVersion,
};

const DEFAULT_TABLE_PREFIX: &str = "teaserlist";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// 服务配置，从环境变量读取
///
/// - `DATABASE_URL`：数据库连接（必填）
/// - `TEASERLIST_TABLE_PREFIX`：表名前缀，默认 `teaserlist`
/// - `TEASERLIST_ADDR`：监听地址，默认 `0.0.0.0:3000`
/// - `TEASERLIST_INSTALLED_VERSION`：上次安装的版本，设置后启动时执行升级
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub table_prefix: String,
    pub addr: String,
    pub installed_version: Option<SchemaVersion>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 用给定的查找函数代替环境变量
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("`DATABASE_URL` not set".to_string()))?;

        let table_prefix =
            lookup("TEASERLIST_TABLE_PREFIX").unwrap_or_else(|| DEFAULT_TABLE_PREFIX.to_string());
        if table_prefix.is_empty()
            || !table_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(format!(
                "invalid table prefix `{table_prefix}`"
            )));
        }

        let addr = lookup("TEASERLIST_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let installed_version = lookup("TEASERLIST_INSTALLED_VERSION")
            .filter(|s| !s.is_empty())
            .map(|s| s.parse())
            .transpose()?;

        Ok(Self {
            database_url,
            table_prefix,
            addr,
            installed_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/teaser")]).expect("config");

        assert_eq!(config.table_prefix, "teaserlist");
        assert_eq!(config.addr, "0.0.0.0:3000");
        assert_eq!(config.installed_version, None);
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(config(&[]), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_unsafe_prefix() {
        let result = config(&[
            ("DATABASE_URL", "postgres://localhost/teaser"),
            ("TEASERLIST_TABLE_PREFIX", "x; DROP TABLE y"),
        ]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_installed_version() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/teaser"),
            ("TEASERLIST_INSTALLED_VERSION", "3.0"),
        ])
        .expect("config");

        assert_eq!(config.installed_version, Some(SchemaVersion::new(3, 0)));
    }
}
