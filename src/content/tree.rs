//! 文章树与扁平行之间的转换
//!
//! 存储中每篇文章一行，`sort` 为同级排序，`parent` 为 `-1` 表示顶层；
//! 子文章的 `parent` 记录的是所属顶层文章在本版本中的序号，而非其行 id。

use super::Article;

/// 扁平化后待写入的一篇文章
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedArticle {
    /// 文章本身，`children` 已清空
    pub article: Article,
    pub sort: i64,
    pub parent: i64,
}

/// 深度优先展开文章树
///
/// 每一层按输入顺序分配 `sort`；顶层文章按出现顺序编号，编号即其子文章的 `parent`。
/// 只支持两层，更深的后代无法用序号关联，会被丢弃。
pub fn flatten(articles: Vec<Article>) -> Vec<PlacedArticle> {
    let mut placed = Vec::with_capacity(articles.len());

    for (offset, mut article) in articles.into_iter().enumerate() {
        let children = std::mem::take(&mut article.children);
        placed.push(PlacedArticle {
            article,
            sort: offset as i64,
            parent: -1,
        });

        for (sort, mut child) in children.into_iter().enumerate() {
            if !child.children.is_empty() {
                tracing::warn!(
                    dropped = child.children.len(),
                    "nested children below second level are not stored"
                );
                child.children.clear();
            }
            placed.push(PlacedArticle {
                article: child,
                sort: sort as i64,
                parent: offset as i64,
            });
        }
    }

    placed
}

/// 把扁平的文章行还原为树
///
/// 行按 `(parent, sort)` 排序后处理：顶层文章依次追加，子文章追加到序号等于其
/// `parent` 的顶层文章下。找不到所属顶层文章的子文章会被忽略。
pub fn unflatten(rows: impl IntoIterator<Item = Article>) -> Vec<Article> {
    let mut rows: Vec<Article> = rows.into_iter().collect();
    rows.sort_by_key(|a| (a.parent, a.sort));

    let mut tree: Vec<Article> = Vec::new();
    for row in rows {
        if row.parent == -1 {
            tree.push(row);
            continue;
        }

        match usize::try_from(row.parent)
            .ok()
            .and_then(|i| tree.get_mut(i))
        {
            Some(parent) => parent.children.push(row),
            None => tracing::warn!(
                article = row.id,
                parent = row.parent,
                "orphan child article ignored"
            ),
        }
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, children: Vec<Article>) -> Article {
        Article {
            title: title.to_string(),
            children,
            ..Default::default()
        }
    }

    /// 模拟写入再读出：行的 `sort` / `parent` 来自扁平化结果
    fn round_trip(tree: Vec<Article>) -> Vec<Article> {
        let rows = flatten(tree).into_iter().map(|p| Article {
            sort: p.sort,
            parent: p.parent,
            ..p.article
        });
        unflatten(rows)
    }

    fn shape(tree: &[Article]) -> Vec<(String, Vec<String>)> {
        tree.iter()
            .map(|a| {
                (
                    a.title.clone(),
                    a.children.iter().map(|c| c.title.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_flatten_assigns_sort_and_parent() {
        let placed = flatten(vec![
            article("a", vec![article("a1", vec![]), article("a2", vec![])]),
            article("b", vec![]),
            article("c", vec![article("c1", vec![])]),
        ]);

        let got: Vec<_> = placed
            .iter()
            .map(|p| (p.article.title.as_str(), p.sort, p.parent))
            .collect();
        assert_eq!(
            got,
            vec![
                ("a", 0, -1),
                ("a1", 0, 0),
                ("a2", 1, 0),
                ("b", 1, -1),
                ("c", 2, -1),
                ("c1", 0, 2),
            ]
        );
        assert!(placed.iter().all(|p| p.article.children.is_empty()));
    }

    #[test]
    fn test_round_trip_keeps_shape() {
        let cases = vec![
            vec![],
            vec![article("solo", vec![])],
            vec![article("one", vec![article("one.1", vec![])])],
            vec![
                article("x", vec![]),
                article(
                    "y",
                    vec![
                        article("y.1", vec![]),
                        article("y.2", vec![]),
                        article("y.3", vec![]),
                    ],
                ),
                article("z", vec![article("z.1", vec![])]),
            ],
        ];

        for tree in cases {
            let expected = shape(&tree);
            let got = round_trip(tree);
            assert_eq!(shape(&got), expected);
        }
    }

    #[test]
    fn test_unflatten_sorts_rows() {
        let rows = vec![
            Article { title: "b1".into(), parent: 1, sort: 0, ..Default::default() },
            Article { title: "b".into(), parent: -1, sort: 1, ..Default::default() },
            Article { title: "a".into(), parent: -1, sort: 0, ..Default::default() },
        ];

        let tree = unflatten(rows);

        assert_eq!(
            shape(&tree),
            vec![("a".into(), vec![]), ("b".into(), vec!["b1".into()])]
        );
    }

    #[test]
    fn test_unflatten_ignores_orphans() {
        let rows = vec![
            Article { title: "a".into(), parent: -1, ..Default::default() },
            Article { title: "lost".into(), parent: 5, ..Default::default() },
        ];

        let tree = unflatten(rows);

        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_flatten_drops_third_level() {
        let placed = flatten(vec![article(
            "a",
            vec![article("a1", vec![article("deep", vec![])])],
        )]);

        assert_eq!(placed.len(), 2);
    }
}
