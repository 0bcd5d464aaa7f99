//! 视图与 URL 查询参数之间的编解码
//!
//! ## 参数格式
//!
//! ```text
//! <field>=value[.value2...]~operator[~multi]
//! operator=and|or
//! sort=field.asc,field2.desc
//! group=field.asc
//! page=1&per_page=10&viewId=7
//! ```
//!
//! 解码从不失败：缺失或格式错误的部分使用默认值。

use crate::condition::{
    split_multi_value, FilterCondition, FilterOperator, GroupCondition, SortCondition, SortDirection, View,
    ViewConditions,
};
use crate::schema::ViewSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 10;

const MULTI_MARKER: &str = "multi";

/// 有序的查询参数集合，同名参数后写覆盖先写
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    entries: Vec<(String, String)>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析查询字符串，允许带前导 `?`
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params.set(key.into_owned(), value.into_owned());
        }
        params
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.entries.iter())
            .finish()
    }
}

/// 多个过滤条件之间的连接方式。求值始终为 AND，这里只保存界面状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinOperator {
    #[default]
    And,
    Or,
}

impl JoinOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinOperator::And => "and",
            JoinOperator::Or => "or",
        }
    }

    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("or") {
            JoinOperator::Or
        } else {
            JoinOperator::And
        }
    }
}

/// 从 URL 解码出的单个字段过滤状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFilter {
    pub field: String,
    pub values: Vec<String>,
    /// URL 中未给出运算符时为 None
    pub operator: Option<FilterOperator>,
    pub multi: bool,
}

impl DecodedFilter {
    /// 转换为过滤条件；未给出运算符时按 equals 处理，多选标记随条件带走
    pub fn to_condition(&self) -> FilterCondition {
        FilterCondition {
            field: self.field.clone(),
            operator: self.operator.clone().unwrap_or(FilterOperator::Equals),
            value: self.values.join("."),
            multi: self.multi,
        }
    }
}

/// 表格状态：URL 查询参数的内存表示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    pub filters: Vec<DecodedFilter>,
    pub join_operator: JoinOperator,
    pub sorts: Vec<SortCondition>,
    pub groups: Vec<GroupCondition>,
    pub page: u32,
    pub per_page: u32,
    pub view_id: Option<i64>,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            join_operator: JoinOperator::And,
            sorts: Vec::new(),
            groups: Vec::new(),
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            view_id: None,
        }
    }
}

impl TableState {
    /// 切换到某个视图时的初始状态：分页重置到第一页
    pub fn from_view(view: &View, schema: &ViewSchema) -> Self {
        let conditions = view.conditions();
        let filters = conditions
            .filters()
            .iter()
            .map(|f| {
                let multi = f.multi || schema.is_multi(&f.field);
                DecodedFilter {
                    field: f.field.clone(),
                    values: split_values(&f.value, multi),
                    operator: Some(f.operator.clone()),
                    multi,
                }
            })
            .collect();

        Self {
            filters,
            sorts: conditions.sorts().to_vec(),
            groups: conditions.groups().to_vec(),
            view_id: Some(view.id),
            ..Default::default()
        }
    }

    pub fn to_conditions(&self) -> ViewConditions {
        ViewConditions {
            filters: non_empty(self.filters.iter().map(DecodedFilter::to_condition).collect()),
            sorts: non_empty(self.sorts.clone()),
            groups: non_empty(self.groups.clone()),
        }
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// 将视图编码为查询参数。schema 未登记为可过滤的字段会被跳过
pub fn view_to_search_params(view: &View, schema: &ViewSchema) -> SearchParams {
    state_to_search_params(&TableState::from_view(view, schema), schema)
}

pub fn state_to_search_params(state: &TableState, schema: &ViewSchema) -> SearchParams {
    let mut params = SearchParams::new();

    for filter in &state.filters {
        if !schema.is_filterable(&filter.field) {
            debug!(field = %filter.field, "skipping filter on unrecognised field");
            continue;
        }
        let operator = filter.operator.clone().unwrap_or(FilterOperator::Equals);
        let mut value = format!("{}~{}", filter.values.join("."), operator);
        if filter.multi || schema.is_multi(&filter.field) {
            value.push('~');
            value.push_str(MULTI_MARKER);
        }
        params.set(filter.field.clone(), value);
    }

    params.set("operator", state.join_operator.as_str());
    if !state.sorts.is_empty() {
        params.set("sort", encode_order(state.sorts.iter().map(|s| (s.field.as_str(), s.direction))));
    }
    if !state.groups.is_empty() {
        params.set("group", encode_order(state.groups.iter().map(|g| (g.field.as_str(), g.direction))));
    }
    params.set("page", state.page.to_string());
    params.set("per_page", state.per_page.to_string());
    if let Some(id) = state.view_id {
        params.set("viewId", id.to_string());
    }
    params
}

/// 从查询参数恢复表格状态，永不失败
pub fn search_params_to_state(params: &SearchParams, schema: &ViewSchema) -> TableState {
    let mut state = TableState::default();

    for (key, raw) in params.iter() {
        if schema.is_filterable(key) {
            state.filters.push(decode_filter(key, raw, schema.is_multi(key)));
        }
    }

    if let Some(op) = params.get("operator") {
        state.join_operator = JoinOperator::parse(op);
    }
    if let Some(sort) = params.get("sort") {
        state.sorts = decode_order(sort)
            .into_iter()
            .map(|(field, direction)| SortCondition { field, direction })
            .collect();
    }
    if let Some(group) = params.get("group") {
        state.groups = decode_order(group)
            .into_iter()
            .map(|(field, direction)| GroupCondition { field, direction })
            .collect();
    }
    state.page = parse_positive(params.get("page")).unwrap_or(DEFAULT_PAGE);
    state.per_page = parse_positive(params.get("per_page")).unwrap_or(DEFAULT_PER_PAGE);
    state.view_id = params.get("viewId").and_then(|v| v.trim().parse().ok());
    state
}

/// 解析 `value[.value2]~operator[~multi]`
fn decode_filter(field: &str, raw: &str, field_is_multi: bool) -> DecodedFilter {
    let mut parts = raw.splitn(3, '~');
    let value = parts.next().unwrap_or_default();
    let mut operator = parts.next().unwrap_or_default();
    let mut marker = parts.next().unwrap_or_default();

    // 旧格式 `value~multi` 没有运算符
    if operator == MULTI_MARKER && marker.is_empty() {
        marker = operator;
        operator = "";
    }

    let multi = field_is_multi || marker == MULTI_MARKER;
    DecodedFilter {
        field: field.to_string(),
        values: split_values(value, multi),
        operator: (!operator.is_empty()).then(|| FilterOperator::from(operator)),
        multi,
    }
}

fn split_values(value: &str, multi: bool) -> Vec<String> {
    if multi {
        split_multi_value(value).into_iter().map(str::to_string).collect()
    } else {
        vec![value.to_string()]
    }
}

fn encode_order<'a>(items: impl Iterator<Item = (&'a str, SortDirection)>) -> String {
    items
        .map(|(field, direction)| format!("{}.{}", field, direction.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

/// 解析 `field.dir,field2.dir`；方向缺失或无法识别时为 asc，
/// 最后一段始终视为方向
fn decode_order(raw: &str) -> Vec<(String, SortDirection)> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|item| {
            let (field, direction) = match item.rsplit_once('.') {
                Some((field, dir)) => (field, SortDirection::parse(dir).unwrap_or_default()),
                None => (item, SortDirection::Asc),
            };
            (!field.is_empty()).then(|| (field.to_string(), direction))
        })
        .collect()
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw?.trim().parse::<u32>().ok().filter(|n| *n > 0)
}
