//! 视图条件模型：过滤、排序、分组条件以及视图本身

use serde::{Deserialize, Serialize};
use std::fmt;

/// 过滤运算符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    /// 无法识别的运算符名称，原样保留以便保存的视图可以写回
    Other(String),
}

impl FilterOperator {
    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::IsEmpty => "is_empty",
            FilterOperator::IsNotEmpty => "is_not_empty",
            FilterOperator::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FilterOperator::Other(_))
    }
}

impl From<&str> for FilterOperator {
    fn from(s: &str) -> Self {
        match s {
            "equals" => FilterOperator::Equals,
            "not_equals" => FilterOperator::NotEquals,
            "contains" => FilterOperator::Contains,
            "not_contains" => FilterOperator::NotContains,
            "starts_with" => FilterOperator::StartsWith,
            "ends_with" => FilterOperator::EndsWith,
            "is_empty" => FilterOperator::IsEmpty,
            "is_not_empty" => FilterOperator::IsNotEmpty,
            other => FilterOperator::Other(other.to_string()),
        }
    }
}

impl From<String> for FilterOperator {
    fn from(s: String) -> Self {
        FilterOperator::from(s.as_str())
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 排序方向，排序条件和分组条件共用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// 解析方向文本，未知文本返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// 多选值的分隔符
pub const MULTI_SEPARATOR: char = '.';

/// 拆分多选值 `a.b.c`，丢弃空片段
pub fn split_multi_value(value: &str) -> Vec<&str> {
    value.split(MULTI_SEPARATOR).filter(|v| !v.is_empty()).collect()
}

/// 单个字段的过滤条件, 例如：`status not_equals "done"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
    /// 值为多选集合（URL 中带 `~multi` 标记）
    #[serde(default, skip_serializing_if = "is_false")]
    pub multi: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            multi: false,
        }
    }

    /// 标记为多选过滤
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// 参与比较的目标值。多选时按 `.` 拆分（字段本身为多选或条件带标记）
    pub fn targets(&self, field_is_multi: bool) -> Vec<&str> {
        if self.multi || field_is_multi {
            split_multi_value(&self.value)
        } else {
            vec![self.value.as_str()]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCondition {
    pub field: String,
    pub direction: SortDirection,
}

impl SortCondition {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupCondition {
    pub field: String,
    pub direction: SortDirection,
}

impl GroupCondition {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// 视图的条件集合。数组顺序有意义：
/// 过滤条件全部取 AND，排序和分组条件按顺序决定优先级
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ViewConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorts: Option<Vec<SortCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupCondition>>,
}

impl ViewConditions {
    pub fn filters(&self) -> &[FilterCondition] {
        self.filters.as_deref().unwrap_or(&[])
    }

    pub fn sorts(&self) -> &[SortCondition] {
        self.sorts.as_deref().unwrap_or(&[])
    }

    pub fn groups(&self) -> &[GroupCondition] {
        self.groups.as_deref().unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.filters().is_empty() && self.sorts().is_empty() && self.groups().is_empty()
    }
}

/// 由视图 CRUD 接口保存的视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ViewConditions>,
}

impl View {
    /// 视图的条件；没有条件时返回空集合
    pub fn conditions(&self) -> ViewConditions {
        self.conditions.clone().unwrap_or_default()
    }
}
