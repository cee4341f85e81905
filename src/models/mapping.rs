//! 区域映射与数据文件后缀

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 区域映射：把表格中的一个 工作表/区域 绑定到文档中的一个标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionMapping {
    /// 工作表名称
    pub sheet: String,
    /// 区域地址（如 `B27:I31`）
    pub range: String,
    /// 标记前缀，与后缀拼接后得到文档中的标记
    #[serde(rename = "marker")]
    pub marker_prefix: String,
    /// 分类（仅用于展示和分组）
    #[serde(default)]
    pub category: String,
}

impl RegionMapping {
    pub fn new(
        sheet: impl Into<String>,
        range: impl Into<String>,
        marker_prefix: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            range: range.into(),
            marker_prefix: marker_prefix.into(),
            category: category.into(),
        }
    }

    /// 文档中实际查找的标记：`<标记前缀>_<后缀>`
    pub fn marker_for(&self, suffix: &DataFileSuffix) -> String {
        format!("{}_{}", self.marker_prefix, suffix)
    }

    /// 工作表、区域、标记前缀都不为空
    pub fn is_complete(&self) -> bool {
        !self.sheet.trim().is_empty()
            && !self.range.trim().is_empty()
            && !self.marker_prefix.trim().is_empty()
    }
}

/// 数据文件后缀（`#1`、`#2` …）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataFileSuffix(String);

fn suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"_#(\d+)\.[A-Za-z0-9]+$").expect("后缀正则表达式无效")
    })
}

impl DataFileSuffix {
    /// 从文件名中提取后缀，模式为 `..._#<数字>.<扩展名>`
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        suffix_pattern()
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .map(|digits| DataFileSuffix(format!("#{}", digits.as_str())))
    }

    /// 从路径的文件名部分提取后缀
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::from_file_name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataFileSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 按后缀分组的区域映射配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionConfig {
    sets: BTreeMap<String, Vec<RegionMapping>>,
}

impl RegionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加（或替换）某个后缀的映射集合
    pub fn insert(&mut self, suffix: impl Into<String>, mappings: Vec<RegionMapping>) {
        self.sets.insert(suffix.into(), mappings);
    }

    pub fn with_set(mut self, suffix: impl Into<String>, mappings: Vec<RegionMapping>) -> Self {
        self.insert(suffix, mappings);
        self
    }

    /// 获取后缀对应的映射集合
    pub fn mappings_for(&self, suffix: &DataFileSuffix) -> Option<&[RegionMapping]> {
        self.sets.get(suffix.as_str()).map(Vec::as_slice)
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RegionMapping])> {
        self.sets.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// 去掉不完整的映射行以及不以 `#` 开头的分组
    pub fn sanitized(self) -> Self {
        let sets = self
            .sets
            .into_iter()
            .filter(|(suffix, _)| suffix.starts_with('#'))
            .map(|(suffix, mappings)| {
                let mappings = mappings.into_iter().filter(RegionMapping::is_complete).collect();
                (suffix, mappings)
            })
            .collect();
        Self { sets }
    }
}
