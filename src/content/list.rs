use serde::{Deserialize, Serialize};

use super::Options;

/// 文章列表
///
/// 列表本身由宿主系统管理，这里只用到它的标识和最大文章数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: i64,
    pub title: String,
    /// 每个版本最多保存的顶层文章数
    pub max_length: usize,
    #[serde(default)]
    pub options: Options,
}

/// 包含某篇 post 的列表，见 `find_lists_by_post`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRef {
    pub id: i64,
    pub options: Options,
}

/// 版本状态，数值与已有数据保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Published = 1,
    Preview = 2,
    Scheduled = 3,
}

impl VersionStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl TryFrom<i16> for VersionStatus {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Published),
            2 => Ok(Self::Preview),
            3 => Ok(Self::Scheduled),
            other => Err(other),
        }
    }
}

/// 列表的一个版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: i64,
    pub created: i64,
    /// 计划发布时间，`0` 表示没有
    pub scheduled: i64,
    pub list_id: i64,
    pub status: VersionStatus,
    pub user_id: i64,
}

/// 按状态归类的版本，每类都按 id 倒序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionSet {
    pub published: Vec<Version>,
    pub preview: Vec<Version>,
    pub scheduled: Vec<Version>,
}

impl VersionSet {
    /// 归类版本，输入需按 id 倒序
    pub fn classify(versions: impl IntoIterator<Item = Version>) -> Self {
        let mut set = Self::default();
        for v in versions {
            match v.status {
                VersionStatus::Published => set.published.push(v),
                VersionStatus::Preview => set.preview.push(v),
                VersionStatus::Scheduled => set.scheduled.push(v),
            }
        }
        set
    }

    /// 最新的已发布版本
    pub fn latest_published(&self) -> Option<&Version> {
        self.published.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.published
            .iter()
            .chain(&self.preview)
            .chain(&self.scheduled)
    }

    pub fn contains(&self, version_id: i64) -> bool {
        self.iter().any(|v| v.id == version_id)
    }

    /// 已发布与计划中的版本，即版本历史
    pub fn history(&self) -> impl Iterator<Item = &Version> {
        self.published.iter().chain(&self.scheduled)
    }
}
