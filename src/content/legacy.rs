//! 旧版字段迁移
//!
//! 早期版本的文章使用下划线风格的字段名，配置项与图片信息也有过几次改名。
//! 这里的迁移是纯函数，读写两端统一调用。

use serde_json::Value;

use super::{Article, Options};

/// 顶层字段改名表：旧名 → 新名
pub const FIELD_RENAMES: [(&str, &str); 5] = [
    ("title_fontsize", "size"),
    ("post_id", "post"),
    ("publish_date", "published"),
    ("image_options", "image"),
    ("text", "content"),
];

/// 配置项改名表：旧名 → 新名
pub const OPTION_RENAMES: [(&str, &str); 12] = [
    ("hiderelated", "hideRelated"),
    ("pre_title", "preTitle"),
    ("overriding_url", "overridingURL"),
    ("streamer_content", "streamerContent"),
    ("streamer_color", "streamerColor"),
    ("streamer_type", "streamerType"),
    ("streamer_image", "streamerImage"),
    ("sticky_interval", "scheduledInterval"),
    ("sticky", "scheduled"),
    ("section_divider", "sectionDivider"),
    ("file_include", "fileInclude"),
    ("file_args", "fileArgs"),
];

/// 对未解析的文章 JSON 做迁移，递归处理 `children`
///
/// 顶层字段只有在出现 `title_fontsize` 时才改名，其余字段名在新版中仍可能合法。
pub fn fix_value(value: &mut Value) {
    let Some(map) = value.as_object_mut() else {
        return;
    };

    if map.contains_key("title_fontsize") {
        for (old, new) in FIELD_RENAMES {
            if let Some(v) = map.shift_remove(old) {
                map.insert(new.to_string(), v);
            }
        }
    }

    if let Some(Value::Object(options)) = map.get_mut("options") {
        fix_options(options);
    }
    if let Some(Value::Object(image)) = map.get_mut("image") {
        fix_image(image);
    }

    if let Some(Value::Array(children)) = map.get_mut("children") {
        children.iter_mut().for_each(fix_value);
    }
}

/// 对已解析的文章做迁移，子文章同样处理
pub fn fix(article: &mut Article) {
    fix_options(&mut article.options);
    fix_image(&mut article.image);
    article.children.iter_mut().for_each(fix);
}

/// 配置项改名
///
/// 旧版图片角标存在 `streamer_image` 中，新版统一放进 `streamerContent`。
pub fn fix_options(options: &mut Options) {
    let legacy_streamer_image = options.contains_key("streamer_image");

    for (old, new) in OPTION_RENAMES {
        if let Some(v) = options.shift_remove(old) {
            options.insert(new.to_string(), v);
        }
    }

    if legacy_streamer_image && options.get("streamerType").and_then(Value::as_str) == Some("image")
    {
        if let Some(image) = options.shift_remove("streamerImage") {
            options.insert("streamerContent".to_string(), image);
        }
    }
}

/// 图片信息迁移：`attach_id` → `attachment`，废弃的 `html` 片段直接丢弃，
/// 居中对齐改为左对齐
pub fn fix_image(image: &mut Options) {
    if let Some(attach_id) = image.shift_remove("attach_id") {
        if !super::sanitize::is_empty(&attach_id) {
            image.insert("attachment".to_string(), attach_id);
            image.shift_remove("html");
        }
    }

    if image.get("alignment").and_then(Value::as_str) == Some("aligncenter") {
        image.insert("alignment".to_string(), Value::from("alignleft"));
    }
}
