//! 序列目录页解析

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::decode_entities;
use crate::task::SEQUENCE_EXTENSION;

/// 匹配 `<a ... href="...">` 中的链接
pub(super) static HREF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("href 正则表达式无效")
});

/// 提取片段中所有链接，保持文档顺序
pub(super) fn extract_hrefs(html: &str) -> Vec<String> {
    HREF_REGEX
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| decode_entities(m.as_str().trim()))
        .collect()
}

/// 提取目录页中所有以 `.fasta` 结尾的链接
///
/// 按文档顺序返回，重复的链接只保留第一次出现
pub fn extract_sequence_links(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_hrefs(html)
        .into_iter()
        .filter(|href| href.ends_with(SEQUENCE_EXTENSION))
        .filter(|href| seen.insert(href.clone()))
        .collect()
}
