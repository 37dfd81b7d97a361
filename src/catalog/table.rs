//! 分类表格解析与 CSV 导出
//!
//! 每个分类页面包含一个或多个 `<table>`，只有含序列链接的 `<tr>` 是数据行。
//! 每个 `<td>` 展开为两列：文本和逗号连接的链接。

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use log::warn;
use regex::Regex;

use super::decode_entities;
use super::listing::extract_hrefs;
use crate::task::SEQUENCE_EXTENSION;

/// 基础列
pub const BASE_COLUMNS: [&str; 13] = [
    "Ambler class",
    "Protein name",
    "Alternative protein names",
    "Subfamily",
    "GenPeptID",
    "GenBankID",
    "PubMedID (DOI)",
    "Sequence",
    "Number of PDB structures",
    "Mutants",
    "Phenotype",
    "Functional information",
    "Natural (N) or Acquired (A)",
];

/// 不导出的链接列
pub const DROPPED_COLUMNS: [&str; 5] = [
    "Ambler class_link",
    "Protein name_link",
    "Alternative protein names_link",
    "Phenotype_link",
    "Natural (N) or Acquired (A)_link",
];

static ROW_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<tr\b[^>]*>").expect("tr 正则表达式无效"));

static ROW_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:tr|table)\b").expect("tr 结束正则表达式无效"));

static CELL_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<td\b[^>]*>").expect("td 正则表达式无效"));

static CELL_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:td|tr|table)\b").expect("td 结束正则表达式无效"));

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("标签正则表达式无效"));

/// 表格中的一个单元格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCell {
    /// 去掉标签后的文本
    pub text: String,
    /// 单元格内的链接
    pub links: Vec<String>,
}

impl CatalogCell {
    fn parse(fragment: &str) -> Self {
        let text = decode_entities(&TAG_REGEX.replace_all(fragment, ""));
        Self {
            text: text.trim().to_string(),
            links: extract_hrefs(fragment),
        }
    }
}

/// 一行数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub cells: Vec<CatalogCell>,
}

impl CatalogRow {
    /// 行键：蛋白质名称单元格
    pub fn key(&self) -> &str {
        self.cells.get(1).map(|c| c.text.as_str()).unwrap_or_default()
    }

    /// 展开为 `文本, 链接` 交替的平铺值
    fn flatten(&self) -> Vec<String> {
        self.cells
            .iter()
            .flat_map(|cell| [cell.text.clone(), cell.links.join(",")])
            .collect()
    }
}

/// 按开始标签切分元素
///
/// HTML 允许省略 `</td>` 和 `</tr>`，元素在下一个同名开始标签或外层结束标签处结束
fn split_elements<'a>(
    html: &'a str,
    open: &'static Regex,
    end: &'static Regex,
) -> impl Iterator<Item = &'a str> {
    open.split(html)
        .skip(1)
        .map(move |piece| end.find(piece).map_or(piece, |m| &piece[..m.start()]))
}

/// 从一个分类页面中提取数据行
///
/// 同一页面内蛋白质名称重复时，后出现的行在原位置替换先出现的行。
///
/// 不处理嵌套表格。
pub fn extract_rows(html: &str) -> Vec<CatalogRow> {
    let mut rows: Vec<CatalogRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for body in split_elements(html, &ROW_OPEN, &ROW_END) {
        if !extract_hrefs(body)
            .iter()
            .any(|href| href.ends_with(SEQUENCE_EXTENSION))
        {
            continue;
        }

        let row = CatalogRow {
            cells: split_elements(body, &CELL_OPEN, &CELL_END)
                .map(CatalogCell::parse)
                .collect(),
        };

        match index.get(row.key()) {
            Some(&pos) => rows[pos] = row,
            None => {
                index.insert(row.key().to_string(), rows.len());
                rows.push(row);
            }
        }
    }

    rows
}

/// 全部分类的合并表格
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Default for CatalogTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogTable {
    pub fn new() -> Self {
        let columns = full_columns()
            .into_iter()
            .filter(|c| !DROPPED_COLUMNS.contains(&c.as_str()))
            .collect();
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// 由解析出的行构建表格
    pub fn from_rows(rows: &[CatalogRow]) -> Self {
        let mut table = Self::new();
        table.extend_rows(rows);
        table
    }

    /// 追加行
    ///
    /// 单元格数与列数不一致时记录警告，并补空或截断
    pub fn extend_rows(&mut self, rows: &[CatalogRow]) {
        let full = full_columns();
        let keep: Vec<usize> = full
            .iter()
            .enumerate()
            .filter(|(_, c)| !DROPPED_COLUMNS.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();

        for row in rows {
            let mut values = row.flatten();
            if values.len() != full.len() {
                warn!(
                    "行 {:?} 有 {} 个值，期望 {} 个",
                    row.key(),
                    values.len(),
                    full.len()
                );
                values.resize(full.len(), String::new());
            }
            self.rows
                .push(keep.iter().map(|&i| std::mem::take(&mut values[i])).collect());
        }
    }

    /// 合并另一个表格
    pub fn append(&mut self, other: CatalogTable) {
        self.rows.extend(other.rows);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 序列化为 CSV
    pub fn to_csv(&self) -> csv::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.into_inner().map_err(|e| e.into_error().into())
    }

    /// 写入 CSV 文件
    pub async fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        let bytes = self.to_csv().map_err(std::io::Error::from)?;
        tokio::fs::write(path, bytes).await
    }
}

fn full_columns() -> Vec<String> {
    BASE_COLUMNS
        .iter()
        .flat_map(|c| [c.to_string(), format!("{}_link", c)])
        .collect()
}
