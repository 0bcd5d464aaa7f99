//! 配置模块，负责加载JSON配置文件
//!
//! ```json
//! {
//!   "tables": { "Issue": "issues" },
//!   "fields": { "status": { "kind": "text", "multi": true } }
//! }
//! ```

use crate::schema::{FieldKind, FieldSpec, SchemaError, ViewSchema};
use crate::condition::FilterOperator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 视图配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("字段配置无效: {0}")]
    Schema(#[from] SchemaError),
}

/// 视图配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// 实体名到数据库表名的映射
    #[serde(default)]
    pub tables: HashMap<String, String>,
    /// 字段名到字段定义的映射
    #[serde(default)]
    pub fields: HashMap<String, FieldSpec>,
}

impl ViewConfig {
    /// 从JSON文件加载视图配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;

        // 解析JSON
        let config: ViewConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_ref.to_path_buf(),
            source,
        })?;

        // 提前校验字段名，避免与保留查询参数冲突
        config.schema()?;
        Ok(config)
    }

    /// 获取实体对应的表名，如果不存在则返回小写的实体名
    pub fn get_table_name(&self, entity: &str) -> String {
        self.tables
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }

    /// 获取所有表映射
    pub fn get_tables(&self) -> &HashMap<String, String> {
        &self.tables
    }

    /// 根据字段配置构建视图 schema
    pub fn schema(&self) -> Result<ViewSchema, ConfigError> {
        Ok(ViewSchema::from_fields(self.fields.clone())?)
    }
}

/// 默认配置（用于测试或fallback），覆盖问题跟踪表格的常用字段
impl Default for ViewConfig {
    fn default() -> Self {
        let mut tables = HashMap::new();
        tables.insert("Issue".to_string(), "issues".to_string());
        tables.insert("Sprint".to_string(), "sprints".to_string());
        tables.insert("Release".to_string(), "releases".to_string());
        tables.insert("Backlog".to_string(), "backlog_items".to_string());

        let mut fields = HashMap::new();
        fields.insert(
            "status".to_string(),
            FieldSpec::of_kind(FieldKind::Rank(
                ["backlog", "todo", "in_progress", "done", "canceled"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ))
            .multi(),
        );
        fields.insert(
            "priority".to_string(),
            FieldSpec::of_kind(FieldKind::Rank(
                ["low", "medium", "high"].iter().map(|s| s.to_string()).collect(),
            ))
            .multi(),
        );
        fields.insert("assignee".to_string(), FieldSpec::of_kind(FieldKind::Text));
        fields.insert(
            "title".to_string(),
            FieldSpec::of_kind(FieldKind::Text).with_operators(vec![
                FilterOperator::Contains,
                FilterOperator::NotContains,
                FilterOperator::StartsWith,
                FilterOperator::EndsWith,
                FilterOperator::IsEmpty,
                FilterOperator::IsNotEmpty,
            ]),
        );
        fields.insert("created_at".to_string(), FieldSpec::of_kind(FieldKind::Date).not_filterable());

        Self { tables, fields }
    }
}
