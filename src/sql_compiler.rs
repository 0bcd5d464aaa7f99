//! SQL compiler that turns view conditions into a Postgres query using sea-query,
//! so the backend can run the same view the table renders.

use crate::condition::{FilterCondition, FilterOperator, SortDirection, ViewConditions};
use crate::config::ViewConfig;
use crate::schema::ViewSchema;
use sea_query::{Asterisk, Expr, Order, PostgresQueryBuilder, SelectStatement, SimpleExpr, Iden, Value};
use thiserror::Error;

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        // Writing into a String never fails
        let _ = write!(s, "{}", self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = write!(s, "{}", self.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("entity name must not be empty")]
    EmptyEntity,

    #[error("column '{field}' is not part of the view schema")]
    UnknownColumn { field: String },
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    MultiValueToIn { field: String, value_count: usize },
    RedundantConditionRemoval { removed_condition: String },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
    /// Filters that produced no predicate because their operator is unknown.
    pub skipped: Vec<FilterCondition>,
}

/// SQL Compiler that converts view conditions to SQL queries
pub struct SqlCompiler {
    config: ViewConfig,
    schema: ViewSchema,
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self {
            config: ViewConfig {
                tables: Default::default(),
                fields: Default::default(),
            },
            schema: ViewSchema::new(),
        }
    }

    pub fn from_config(config: ViewConfig, schema: ViewSchema) -> Self {
        Self { config, schema }
    }

    /// Compile view conditions into a `SELECT * FROM <table>` statement
    pub fn compile(&self, conditions: &ViewConditions, entity: &str) -> Result<CompileResult, CompileError> {
        if entity.trim().is_empty() {
            return Err(CompileError::EmptyEntity);
        }

        let mut optimizations = Vec::new();
        let mut skipped = Vec::new();

        let mut select = SelectStatement::new();
        select.column(Asterisk);
        select.from(TableName(self.config.get_table_name(entity)));

        let mut seen: Vec<&FilterCondition> = Vec::new();
        for filter in conditions.filters() {
            self.check_column(&filter.field)?;
            if seen.contains(&filter) {
                optimizations.push(Optimization::RedundantConditionRemoval {
                    removed_condition: format!("{} {} {:?}", filter.field, filter.operator, filter.value),
                });
                continue;
            }
            seen.push(filter);

            match self.compile_filter(filter, &mut optimizations) {
                Some(expr) => {
                    select.and_where(expr);
                }
                None => skipped.push(filter.clone()),
            }
        }

        // Group keys lead the ordering so each bucket comes back contiguous
        for group in conditions.groups() {
            self.check_column(&group.field)?;
            select.order_by(ColumnName(group.field.clone()), order_of(group.direction));
        }
        for sort in conditions.sorts() {
            self.check_column(&sort.field)?;
            select.order_by(ColumnName(sort.field.clone()), order_of(sort.direction));
        }

        Ok(CompileResult {
            sql: select.to_string(PostgresQueryBuilder),
            optimizations,
            skipped,
        })
    }

    fn check_column(&self, field: &str) -> Result<(), CompileError> {
        if self.schema.is_empty() || self.schema.field(field).is_some() {
            Ok(())
        } else {
            Err(CompileError::UnknownColumn { field: field.to_string() })
        }
    }

    /// Compile a single filter; `None` for operators with no SQL form.
    /// Negated operators keep NULL rows, matching the in-memory evaluator.
    fn compile_filter(&self, filter: &FilterCondition, optimizations: &mut Vec<Optimization>) -> Option<SimpleExpr> {
        let col = || Expr::col(ColumnName(filter.field.clone()));
        let values = filter.targets(self.schema.is_multi(&filter.field));

        let expr = match &filter.operator {
            FilterOperator::Equals => match values.as_slice() {
                [single] => col().eq(to_value(single)),
                _ => col().is_in(in_values(filter, &values, optimizations)),
            },
            FilterOperator::NotEquals => or_null(
                match values.as_slice() {
                    [single] => col().ne(to_value(single)),
                    _ => col().is_not_in(in_values(filter, &values, optimizations)),
                },
                col(),
            ),
            FilterOperator::Contains => any_of(&values, |v| col().like(format!("%{}%", escape_like(v)))),
            FilterOperator::NotContains => or_null(
                any_of(&values, |v| col().like(format!("%{}%", escape_like(v)))).not(),
                col(),
            ),
            FilterOperator::StartsWith => any_of(&values, |v| col().like(format!("{}%", escape_like(v)))),
            FilterOperator::EndsWith => any_of(&values, |v| col().like(format!("%{}", escape_like(v)))),
            FilterOperator::IsEmpty => col().is_null().or(col().eq("")),
            FilterOperator::IsNotEmpty => col().is_not_null().and(col().ne("")),
            FilterOperator::Other(_) => return None,
        };
        Some(expr)
    }
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn in_values(filter: &FilterCondition, values: &[&str], optimizations: &mut Vec<Optimization>) -> Vec<Value> {
    if values.len() > 1 {
        optimizations.push(Optimization::MultiValueToIn {
            field: filter.field.clone(),
            value_count: values.len(),
        });
    }
    values.iter().map(|v| to_value(v)).collect()
}

fn or_null(expr: SimpleExpr, col: Expr) -> SimpleExpr {
    expr.or(col.is_null())
}

/// Combine per-value predicates with OR
fn any_of(values: &[&str], build: impl Fn(&str) -> SimpleExpr) -> SimpleExpr {
    values
        .iter()
        .map(|v| build(v))
        .reduce(|acc, expr| acc.or(expr))
        .unwrap_or_else(|| Expr::val(false).into())
}

fn order_of(direction: SortDirection) -> Order {
    match direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    }
}

fn to_value(v: &str) -> Value {
    Value::String(Some(Box::new(v.to_string())))
}

fn escape_like(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{GroupCondition, SortCondition};

    fn create_test_compiler() -> SqlCompiler {
        let config = ViewConfig::default();
        let schema = config.schema().unwrap();
        SqlCompiler::from_config(config, schema)
    }

    fn with_filters(filters: Vec<FilterCondition>) -> ViewConditions {
        ViewConditions { filters: Some(filters), ..Default::default() }
    }

    #[test]
    fn test_simple_filter_compilation() {
        let compiler = create_test_compiler();
        let conditions = with_filters(vec![FilterCondition::new("assignee", FilterOperator::Equals, "alice")]);

        let result = compiler.compile(&conditions, "Issue").unwrap();
        assert!(result.sql.contains(r#"FROM "issues""#));
        assert!(result.sql.contains(r#""assignee" = 'alice'"#));
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_multi_value_to_in() {
        let compiler = create_test_compiler();
        let conditions = with_filters(vec![FilterCondition::new("status", FilterOperator::NotEquals, "done.canceled")]);

        let result = compiler.compile(&conditions, "Issue").unwrap();
        assert!(result.sql.contains("NOT IN ('done', 'canceled')"), "{}", result.sql);
        assert!(result.sql.contains(r#""status" IS NULL"#), "{}", result.sql);
        assert_eq!(
            result.optimizations,
            vec![Optimization::MultiValueToIn { field: "status".to_string(), value_count: 2 }]
        );
    }

    #[test]
    fn test_like_operators_escape_wildcards() {
        let compiler = create_test_compiler();
        let conditions = with_filters(vec![
            FilterCondition::new("title", FilterOperator::StartsWith, "50%"),
            FilterCondition::new("title", FilterOperator::NotContains, "wip"),
        ]);

        let result = compiler.compile(&conditions, "Issue").unwrap();
        assert!(result.sql.contains("LIKE"));
        assert!(result.sql.contains(r"50\"), "{}", result.sql);
        assert!(result.sql.contains("NOT"));
        assert!(result.sql.contains("'%wip%'"));
    }

    #[test]
    fn test_negated_operators_keep_null_rows() {
        let compiler = create_test_compiler();
        let result = compiler
            .compile(&with_filters(vec![FilterCondition::new("assignee", FilterOperator::NotEquals, "bob")]), "Issue")
            .unwrap();
        assert!(result.sql.contains(r#""assignee" <> 'bob'"#), "{}", result.sql);
        assert!(result.sql.contains(r#"OR "assignee" IS NULL"#), "{}", result.sql);

        let result = compiler
            .compile(&with_filters(vec![FilterCondition::new("title", FilterOperator::NotContains, "wip")]), "Issue")
            .unwrap();
        assert!(result.sql.contains(r#"OR "title" IS NULL"#), "{}", result.sql);
    }

    #[test]
    fn test_multi_flag_and_stray_separator() {
        let compiler = create_test_compiler();
        let conditions = with_filters(vec![
            FilterCondition::new("assignee", FilterOperator::Equals, "alice.bob").multi(),
            FilterCondition::new("status", FilterOperator::Equals, "todo."),
        ]);
        let result = compiler.compile(&conditions, "Issue").unwrap();
        assert!(result.sql.contains(r#""assignee" IN ('alice', 'bob')"#), "{}", result.sql);
        assert!(result.sql.contains(r#""status" = 'todo'"#), "{}", result.sql);
        assert_eq!(result.optimizations.len(), 1);
    }

    #[test]
    fn test_unknown_operator_is_skipped() {
        let compiler = create_test_compiler();
        let conditions = with_filters(vec![FilterCondition::new("assignee", FilterOperator::from("sounds_like"), "bob")]);

        let result = compiler.compile(&conditions, "Issue").unwrap();
        assert!(!result.sql.contains("WHERE"));
        assert_eq!(result.skipped.len(), 1);
    }

    #[test]
    fn test_redundant_condition_removal() {
        let compiler = create_test_compiler();
        let filter = FilterCondition::new("assignee", FilterOperator::Equals, "alice");
        let result = compiler.compile(&with_filters(vec![filter.clone(), filter]), "Issue").unwrap();

        assert_eq!(result.optimizations.len(), 1);
        assert!(matches!(result.optimizations[0], Optimization::RedundantConditionRemoval { .. }));
        assert_eq!(result.sql.matches("assignee").count(), 1);
    }

    #[test]
    fn test_order_by_groups_then_sorts() {
        let compiler = create_test_compiler();
        let conditions = ViewConditions {
            filters: None,
            sorts: Some(vec![SortCondition::new("priority", SortDirection::Desc)]),
            groups: Some(vec![GroupCondition::new("status", SortDirection::Asc)]),
        };

        let result = compiler.compile(&conditions, "Sprint").unwrap();
        assert!(result.sql.contains(r#"FROM "sprints""#));
        assert!(result.sql.contains(r#"ORDER BY "status" ASC, "priority" DESC"#));
    }

    #[test]
    fn test_unknown_column_and_empty_entity() {
        let compiler = create_test_compiler();
        let conditions = with_filters(vec![FilterCondition::new("secret", FilterOperator::Equals, "x")]);
        assert_eq!(
            compiler.compile(&conditions, "Issue").unwrap_err(),
            CompileError::UnknownColumn { field: "secret".to_string() }
        );
        assert_eq!(compiler.compile(&ViewConditions::default(), " ").unwrap_err(), CompileError::EmptyEntity);
    }

    #[test]
    fn test_empty_schema_accepts_any_column() {
        let compiler = SqlCompiler::new();
        let conditions = with_filters(vec![FilterCondition::new("anything", FilterOperator::IsEmpty, "")]);
        let result = compiler.compile(&conditions, "Widget").unwrap();
        assert!(result.sql.contains(r#"FROM "widget""#));
        assert!(result.sql.contains("IS NULL"));
    }
}
