//! Field registry for views: how each field is compared, whether it can be
//! filtered, and which operators it accepts.

use crate::condition::{FilterOperator, ViewConditions};
use crate::record::{coerce_to_string, is_blank};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

/// Query parameter keys owned by the codec; no field may use them.
pub const RESERVED_KEYS: [&str; 6] = ["operator", "sort", "group", "page", "per_page", "viewId"];

/// Value type of a field, used to pick its comparer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Date,
    /// Enumerated values ordered by their position in the list.
    Rank(Vec<String>),
}

fn default_filterable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub kind: Option<FieldKind>,
    #[serde(default = "default_filterable")]
    pub filterable: bool,
    /// Multi-select filter: the filter value is a `.` separated list.
    #[serde(default)]
    pub multi: bool,
    /// Allowed operators; `None` allows every known operator.
    #[serde(default)]
    pub operators: Option<Vec<FilterOperator>>,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            kind: None,
            filterable: true,
            multi: false,
            operators: None,
        }
    }
}

impl FieldSpec {
    pub fn of_kind(kind: FieldKind) -> Self {
        Self { kind: Some(kind), ..Default::default() }
    }

    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn with_operators(mut self, operators: Vec<FilterOperator>) -> Self {
        self.operators = Some(operators);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("field '{field}' is not filterable")]
    NotFilterable { field: String },

    #[error("operator '{operator}' is not allowed on field '{field}'")]
    OperatorNotAllowed { field: String, operator: String },

    #[error("unknown operator '{operator}' on field '{field}'")]
    UnknownOperator { field: String, operator: String },

    #[error("field name '{field}' is reserved for query parameters")]
    ReservedField { field: String },
}

/// The set of fields a table knows about. An empty schema imposes nothing:
/// every field compares raw and every filter passes through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSchema {
    fields: HashMap<String, FieldSpec>,
}

impl ViewSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: HashMap<String, FieldSpec>) -> Result<Self, SchemaError> {
        if let Some(field) = fields.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(SchemaError::ReservedField { field: field.clone() });
        }
        Ok(Self { fields })
    }

    /// Builder-style insertion. Reserved names are rejected like in `from_fields`.
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Result<Self, SchemaError> {
        let name = name.into();
        if RESERVED_KEYS.contains(&name.as_str()) {
            return Err(SchemaError::ReservedField { field: name });
        }
        self.fields.insert(name, spec);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &HashMap<String, FieldSpec> {
        &self.fields
    }

    pub fn is_filterable(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|spec| spec.filterable)
    }

    pub fn is_multi(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|spec| spec.multi)
    }

    pub fn comparer(&self, name: &str) -> FieldComparer<'_> {
        match self.fields.get(name).and_then(|spec| spec.kind.as_ref()) {
            None => FieldComparer::Raw,
            Some(FieldKind::Text) => FieldComparer::Text,
            Some(FieldKind::Number) => FieldComparer::Number,
            Some(FieldKind::Date) => FieldComparer::Date,
            Some(FieldKind::Rank(ranks)) => FieldComparer::Rank(ranks),
        }
    }

    /// Checks condition fields and operators against the schema, returning
    /// the first violation. Callers opt in; processing never calls this.
    pub fn validate(&self, conditions: &ViewConditions) -> Result<(), SchemaError> {
        for filter in conditions.filters() {
            if let FilterOperator::Other(name) = &filter.operator {
                return Err(SchemaError::UnknownOperator {
                    field: filter.field.clone(),
                    operator: name.clone(),
                });
            }
            if self.is_empty() {
                continue;
            }
            let spec = self.known(&filter.field)?;
            if !spec.filterable {
                return Err(SchemaError::NotFilterable { field: filter.field.clone() });
            }
            if let Some(allowed) = &spec.operators {
                if !allowed.contains(&filter.operator) {
                    return Err(SchemaError::OperatorNotAllowed {
                        field: filter.field.clone(),
                        operator: filter.operator.to_string(),
                    });
                }
            }
        }

        if !self.is_empty() {
            for field in conditions
                .sorts()
                .iter()
                .map(|s| &s.field)
                .chain(conditions.groups().iter().map(|g| &g.field))
            {
                self.known(field)?;
            }
        }
        Ok(())
    }

    fn known(&self, field: &str) -> Result<&FieldSpec, SchemaError> {
        self.fields
            .get(field)
            .ok_or_else(|| SchemaError::UnknownField { field: field.to_string() })
    }
}

/// Per-field ordering. Every variant is a total order with absent values
/// (missing or `null`) first, so it is safe to hand to a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldComparer<'a> {
    Raw,
    Text,
    Number,
    Date,
    Rank(&'a [String]),
}

impl FieldComparer<'_> {
    pub fn compare(&self, a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match self {
            FieldComparer::Raw => compare_raw(a, b),
            FieldComparer::Text => compare_optional(text_key(a), text_key(b), |x, y| x.cmp(y)),
            FieldComparer::Number => compare_optional(number_key(a), number_key(b), |x, y| x.total_cmp(y)),
            FieldComparer::Date => compare_optional(date_key(a), date_key(b), |x, y| x.cmp(y)),
            FieldComparer::Rank(ranks) => rank_key(ranks, a).cmp(&rank_key(ranks, b)),
        }
    }
}

fn compare_optional<K>(a: Option<K>, b: Option<K>, cmp: impl Fn(&K, &K) -> Ordering) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => cmp(&x, &y),
    }
}

fn type_class(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_raw(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_class = type_class(a).cmp(&type_class(b));
    if by_class != Ordering::Equal {
        return by_class;
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null), _) | (None, _) => Ordering::Equal,
        // arrays and objects
        (x, y) => coerce_to_string(x).cmp(&coerce_to_string(y)),
    }
}

fn text_key(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        other => Some(coerce_to_string(other)),
    }
}

fn number_key(value: Option<&Value>) -> Option<f64> {
    if is_blank(value) {
        return None;
    }
    let n = match value {
        Some(Value::Number(n)) => n.as_f64()?,
        other => coerce_to_string(other).trim().parse::<f64>().ok()?,
    };
    n.is_finite().then_some(n)
}

/// Milliseconds since the epoch. Numbers are taken as epoch milliseconds.
fn date_key(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.timestamp_millis());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp_millis())
        }
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum RankKey {
    Absent,
    Ranked(usize),
    Unranked(String),
}

fn rank_key(ranks: &[String], value: Option<&Value>) -> RankKey {
    if is_blank(value) {
        return RankKey::Absent;
    }
    let text = coerce_to_string(value);
    match ranks.iter().position(|r| *r == text) {
        Some(idx) => RankKey::Ranked(idx),
        None => RankKey::Unranked(text),
    }
}
