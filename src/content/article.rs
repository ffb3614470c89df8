use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::legacy;
use crate::error::Result;

/// 文章的开放式键值配置（`options` 与 `image` 共用）
///
/// 保持插入顺序，未知键原样保留以兼容后续新增的配置项。
pub type Options = Map<String, Value>;

/// 列表中的一个预告块
///
/// 顶层文章的 `parent` 为 `-1`，子文章挂在 `children` 中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub created: i64,
    /// 发布时间，`0` 表示未设置；可能位于未来
    #[serde(deserialize_with = "lenient_i64")]
    pub published: i64,
    /// 关联的文章（post），`0` 表示无
    #[serde(deserialize_with = "lenient_i64")]
    pub post: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub sort: i64,
    #[serde(deserialize_with = "lenient_i32")]
    pub size: i32,
    #[serde(deserialize_with = "lenient_map")]
    pub options: Options,
    #[serde(deserialize_with = "lenient_map")]
    pub image: Options,
    #[serde(deserialize_with = "lenient_i64")]
    pub parent: i64,
    #[serde(deserialize_with = "lenient_children")]
    pub children: Vec<Article>,
}

impl Default for Article {
    fn default() -> Self {
        Self {
            id: 0,
            created: 0,
            published: 0,
            post: 0,
            title: String::new(),
            content: String::new(),
            sort: 0,
            size: 24,
            options: Options::new(),
            image: Options::new(),
            parent: -1,
            children: Vec::new(),
        }
    }
}

/// 前端新建文章时携带的默认配置项
const DEFAULT_OPTIONS: [(&str, Value); 11] = [
    ("preTitle", Value::String(String::new())),
    ("streamerColor", Value::String(String::new())),
    ("streamerContent", Value::String(String::new())),
    ("streamerImage", Value::String(String::new())),
    ("streamerType", Value::String(String::new())),
    ("template", Value::String(String::new())),
    ("format", Value::String(String::new())),
    ("sectionDivider", Value::String(String::new())),
    ("overridingURL", Value::String(String::new())),
    ("target", Value::String(String::new())),
    ("floating", Value::Bool(false)),
];

impl Article {
    /// 从外部输入（可能带有旧字段名）解析文章树
    ///
    /// 解析前先做一次 [`legacy::fix_value`]，子文章同样处理。
    pub fn from_value(mut value: Value) -> Result<Self> {
        legacy::fix_value(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    /// 解析一组文章
    pub fn from_values(values: Vec<Value>) -> Result<Vec<Self>> {
        values.into_iter().map(Self::from_value).collect()
    }

    /// 按前端默认值构造文章，再用 `overrides` 覆盖
    ///
    /// `options` 会与默认配置合并，而不是整体替换。
    pub fn create(overrides: Value) -> Result<Self> {
        let mut article = Self::from_value(overrides)?;
        article.apply_defaults();
        Ok(article)
    }

    fn apply_defaults(&mut self) {
        if self.title.is_empty() {
            self.title = "Unknown".to_string();
        }

        let mut options: Options = DEFAULT_OPTIONS
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        options.extend(std::mem::take(&mut self.options));
        self.options = options;

        for child in &mut self.children {
            child.apply_defaults();
        }
    }

    /// 字符串形式的配置项，不存在或非字符串时返回空串
    pub fn option_str(&self, key: &str) -> &str {
        self.options.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// 是否为未来发布（相对 `now`）
    pub fn is_future(&self, now: i64) -> bool {
        self.published != 0 && self.published > now
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid integer: {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer: {s}"))),
        Value::Bool(b) => Ok(b as i64),
        Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, found {other}"
        ))),
    }
}

fn lenient_i32<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = lenient_i64(deserializer)?;
    i32::try_from(n).map_err(|_| serde::de::Error::custom(format!("integer out of range: {n}")))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// 非数组的 `children`（`null`、`""` 等）视为没有子文章
fn lenient_children<'de, D>(deserializer: D) -> std::result::Result<Vec<Article>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

/// 旧数据里空配置可能被存成 `""` 或 `[]`
fn lenient_map<'de, D>(deserializer: D) -> std::result::Result<Options, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Options::new(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_value_accepts_loose_types() {
        let article = Article::from_value(json!({
            "title": "Breaking",
            "post": "42",
            "size": 30,
            "published": null,
            "image": [],
            "children": [{ "title": "child", "parent": "0" }]
        }))
        .expect("parse failed");

        assert_eq!(article.post, 42);
        assert_eq!(article.size, 30);
        assert_eq!(article.published, 0);
        assert_eq!(article.parent, -1);
        assert!(article.image.is_empty());
        assert_eq!(article.children.len(), 1);
        assert_eq!(article.children[0].parent, 0);
        assert_eq!(article.children[0].size, 24);
    }

    #[test]
    fn test_from_value_renames_legacy_fields() {
        let article = Article::from_value(json!({
            "title_fontsize": 18,
            "post_id": 7,
            "publish_date": 1000,
            "text": "body",
            "image_options": { "attach_id": 3, "html": "<img>", "alignment": "aligncenter" }
        }))
        .expect("parse failed");

        assert_eq!(article.size, 18);
        assert_eq!(article.post, 7);
        assert_eq!(article.published, 1000);
        assert_eq!(article.content, "body");
        assert_eq!(article.image.get("attachment"), Some(&json!(3)));
        assert_eq!(article.image.get("alignment"), Some(&json!("alignleft")));
        assert!(!article.image.contains_key("html"));
    }

    #[test]
    fn test_create_merges_default_options() {
        let article = Article::create(json!({
            "options": { "template": "big" },
            "children": [{}]
        }))
        .expect("create failed");

        assert_eq!(article.title, "Unknown");
        assert_eq!(article.option_str("template"), "big");
        assert_eq!(article.options.get("floating"), Some(&json!(false)));
        assert_eq!(article.options.len(), DEFAULT_OPTIONS.len());
        assert_eq!(article.children[0].title, "Unknown");
    }

    #[test]
    fn test_from_value_tolerates_non_array_children() {
        for children in [json!(null), json!(""), json!({ "title": "x" })] {
            let article = Article::from_value(json!({ "title": "t", "children": children }))
                .expect("parse failed");
            assert!(article.children.is_empty());
        }
    }

    #[test]
    fn test_is_future() {
        let mut article = Article::default();
        assert!(!article.is_future(100));
        article.published = 101;
        assert!(article.is_future(100));
        article.published = 100;
        assert!(!article.is_future(100));
    }
}
