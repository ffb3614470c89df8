//! 写入前的文章清理

use serde_json::Value;

use super::{Article, Options, legacy};

/// 角标类型为 `extra` 时统一显示的文字
pub const EXTRA_STREAMER_LABEL: &str = "Extra";

/// 标题列的最大字符数
pub const TITLE_MAX_CHARS: usize = 255;

const STREAMER_KEYS: [&str; 3] = ["streamerType", "streamerContent", "streamerColor"];

/// 清理一篇文章（不含子文章）
///
/// - 去掉上游转义遗留的反斜杠
/// - 标题截断到 [`TITLE_MAX_CHARS`] 个字符
/// - 丢弃值为空串的 `options` / `image` 键
/// - 没有有效角标时移除全部角标配置
pub fn sanitize(article: &mut Article) {
    article.title = strip_slashes(&article.title);
    if let Some((end, _)) = article.title.char_indices().nth(TITLE_MAX_CHARS) {
        article.title.truncate(end);
    }
    article.content = strip_slashes(&article.content);
    sanitize_options(&mut article.options);
    sanitize_image(&mut article.image);
}

/// 递归清理整棵文章树
pub fn sanitize_tree(article: &mut Article) {
    sanitize(article);
    article.children.iter_mut().for_each(sanitize_tree);
}

pub fn sanitize_options(options: &mut Options) {
    let has_streamer = !options.get("streamerType").is_none_or(is_empty);

    if has_streamer && options.get("streamerType").and_then(Value::as_str) == Some("extra") {
        options.insert(
            "streamerContent".to_string(),
            Value::from(EXTRA_STREAMER_LABEL),
        );
    }

    let streamer_empty = options.get("streamerContent").is_none_or(is_empty)
        && options.get("streamerColor").is_none_or(is_empty);
    if !has_streamer || streamer_empty {
        for key in STREAMER_KEYS {
            options.shift_remove(key);
        }
    }

    if options.get("scheduled").is_none_or(is_empty) {
        options.shift_remove("scheduledInterval");
    }

    clean_values(options);
}

pub fn sanitize_image(image: &mut Options) {
    legacy::fix_image(image);
    clean_values(image);
}

/// 丢弃空串值，并去掉字符串里的反斜杠
fn clean_values(map: &mut Options) {
    map.retain(|_, v| v.as_str() != Some(""));
    for value in map.values_mut() {
        if let Value::String(s) = value {
            *s = strip_slashes(s);
        }
    }
}

fn strip_slashes(s: &str) -> String {
    s.replace('\\', "")
}

/// 宽松的“空值”判断：`null`、`false`、`0`、`""`、`"0"`、空数组与空对象
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
