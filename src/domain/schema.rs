// ==========================================
// 表格批量导入系统 - 目标 Schema 元数据
// ==========================================
// 职责: 描述导入目标的可写字段、可写关联、主键字段
// 用途: 列映射分类、记录校验
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
}

/// 字段元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
}

impl FieldMetadata {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            read_only: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// 关联元数据（值为目标 schema 记录的主键）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationMetadata {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

impl AssociationMetadata {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

// ==========================================
// SchemaMetadata - 目标 schema
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub name: String,
    /// 目标记录类型
    pub record_type: String,
    /// 主键字段名
    #[serde(default = "default_identifier")]
    pub identifier: String,
    #[serde(default)]
    pub fields: Vec<FieldMetadata>,
    #[serde(default)]
    pub associations: Vec<AssociationMetadata>,
}

fn default_identifier() -> String {
    "id".to_string()
}

impl SchemaMetadata {
    pub fn new(name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            identifier: default_identifier(),
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_field(mut self, field: FieldMetadata) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_association(mut self, association: AssociationMetadata) -> Self {
        self.associations.push(association);
        self
    }

    pub fn field_identifier(&self) -> &str {
        &self.identifier
    }

    pub fn has_field_by_name(&self, name: &str) -> bool {
        self.field_by_name(name).is_some()
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_association_by_name(&self, name: &str) -> bool {
        self.association_by_name(name).is_some()
    }

    pub fn association_by_name(&self, name: &str) -> Option<&AssociationMetadata> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// 可写字段（存在且非只读）
    pub fn is_writable_field(&self, name: &str) -> bool {
        self.field_by_name(name).map(|f| !f.read_only).unwrap_or(false)
    }

    /// 可写关联（存在且非只读）
    pub fn is_writable_association(&self, name: &str) -> bool {
        self.association_by_name(name)
            .map(|a| !a.read_only)
            .unwrap_or(false)
    }
}

// ==========================================
// SchemaRegistry - schema 注册表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SchemaMetadata>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: SchemaMetadata) {
        self.schemas.insert(schema.name.clone(), Arc::new(schema));
    }

    pub fn with_schema(mut self, schema: SchemaMetadata) -> Self {
        self.register(schema);
        self
    }

    /// 从 JSON 文件加载（数组形式: `[{"name": ..., "record_type": ...}, ...]`）
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, Box<dyn Error>> {
        let schemas: Vec<SchemaMetadata> = serde_json::from_str(raw)?;
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema);
        }
        Ok(registry)
    }

    pub fn has_by_name(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<SchemaMetadata>> {
        self.schemas.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }
}
