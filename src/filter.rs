//! 过滤求值器：所有过滤条件取 AND
//!
//! 未知运算符一律视为满足（放行），避免隐藏数据。

use crate::condition::{FilterCondition, FilterOperator};
use crate::record::{coerce_to_string, is_blank, Record};
use crate::schema::ViewSchema;
use tracing::warn;

/// 保留所有满足每一个过滤条件的记录，顺序不变。
/// 没有过滤条件时原样返回全部记录。
pub fn filter_records<R, I>(records: I, filters: &[FilterCondition], schema: &ViewSchema) -> Vec<R>
where
    R: Record,
    I: IntoIterator<Item = R>,
{
    if filters.is_empty() {
        return records.into_iter().collect();
    }

    warn_unknown_operators(filters);

    records
        .into_iter()
        .filter(|record| filters.iter().all(|f| matches_filter(record, f, schema)))
        .collect()
}

/// 对单条记录求值单个过滤条件
pub fn matches_filter<R: Record>(record: &R, filter: &FilterCondition, schema: &ViewSchema) -> bool {
    let raw = record.field(&filter.field);

    // 空值检查使用原始值，其余运算符使用字符串化后的值
    match &filter.operator {
        FilterOperator::IsEmpty => return is_blank(raw),
        FilterOperator::IsNotEmpty => return !is_blank(raw),
        FilterOperator::Other(_) => return true,
        _ => {}
    }

    let value = coerce_to_string(raw);
    let targets = filter.targets(schema.is_multi(&filter.field));

    match &filter.operator {
        FilterOperator::Equals => targets.iter().any(|t| value == *t),
        FilterOperator::NotEquals => !targets.iter().any(|t| value == *t),
        FilterOperator::Contains => targets.iter().any(|t| value.contains(t)),
        FilterOperator::NotContains => !targets.iter().any(|t| value.contains(t)),
        FilterOperator::StartsWith => targets.iter().any(|t| value.starts_with(t)),
        FilterOperator::EndsWith => targets.iter().any(|t| value.ends_with(t)),
        FilterOperator::IsEmpty | FilterOperator::IsNotEmpty | FilterOperator::Other(_) => true,
    }
}

fn warn_unknown_operators(filters: &[FilterCondition]) {
    let mut seen: Vec<&str> = Vec::new();
    for filter in filters {
        if let FilterOperator::Other(name) = &filter.operator {
            if !seen.contains(&name.as_str()) {
                seen.push(name);
                warn!(operator = %name, field = %filter.field, "unknown filter operator, condition passes every record");
            }
        }
    }
}
