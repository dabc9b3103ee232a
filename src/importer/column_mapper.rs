// ==========================================
// 表格批量导入系统 - 列映射
// ==========================================
// 职责: 由表头行推导 列名 → 列位置（1 起始）的三张映射表
// - columns: 全部识别列 + 注入的保留列
// - fields: 可写字段
// - associations: 可写关联
// 保留列: <主键字段>, @import_status, @import_message
// ==========================================

use crate::domain::{SchemaMetadata, UnknownColumnPolicy};
use crate::importer::sheet_io::Worksheet;
use tracing::debug;

pub const IMPORT_STATUS_COLUMN: &str = "@import_status";
pub const IMPORT_MESSAGE_COLUMN: &str = "@import_message";

// ==========================================
// ColumnMap - 有序映射（保持表头顺序）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    entries: Vec<(String, u32)>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或更新（已存在的列保留原顺序，仅更新位置）
    pub fn insert(&mut self, name: impl Into<String>, position: u32) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = position,
            None => self.entries.push((name, position)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| *p)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.entries.iter().map(|(n, p)| (n.as_str(), *p))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// 已占用的最大位置
    pub fn max_position(&self) -> u32 {
        self.entries.iter().map(|(_, p)| *p).max().unwrap_or(0)
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for ColumnMap {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        let mut map = ColumnMap::new();
        for (name, position) in iter {
            map.insert(name, position);
        }
        map
    }
}

/// 三张映射表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub columns: ColumnMap,
    pub fields: ColumnMap,
    pub associations: ColumnMap,
}

/// 列映射选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingOptions {
    pub unknown_columns: UnknownColumnPolicy,
    /// 注入的主键列若为 schema 字段，是否同时登记到 fields
    pub register_identifier_field: bool,
}

/// 读取表头行（第 1 行），跳过空单元格
pub fn find_columns(sheet: &Worksheet) -> ColumnMap {
    let mut columns = ColumnMap::new();
    for position in 1..=sheet.highest_column() {
        let cell = sheet.cell(position, 1);
        if cell.is_empty() {
            continue;
        }
        columns.insert(cell.as_text().trim(), position);
    }
    columns
}

// ==========================================
// ColumnMapper
// ==========================================
pub struct ColumnMapper<'a> {
    schema: &'a SchemaMetadata,
    options: MappingOptions,
}

impl<'a> ColumnMapper<'a> {
    pub fn new(schema: &'a SchemaMetadata, options: MappingOptions) -> Self {
        Self { schema, options }
    }

    /// 按 schema 对表头列分类
    ///
    /// 规则:
    /// 1. 可写字段 → fields + columns
    /// 2. 可写关联 → associations + columns
    /// 3. 其他（未知或只读）→ 仅 columns（Drop 策略下未知列不登记）
    pub fn classify(&self, header: &ColumnMap) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();

        for (name, position) in header.iter() {
            if self.schema.is_writable_field(name) {
                mapping.fields.insert(name, position);
                mapping.columns.insert(name, position);
            } else if self.schema.is_writable_association(name) {
                mapping.associations.insert(name, position);
                mapping.columns.insert(name, position);
            } else {
                let known = self.schema.has_field_by_name(name)
                    || self.schema.has_association_by_name(name)
                    || is_reserved(self.schema, name);
                if known || self.options.unknown_columns == UnknownColumnPolicy::Keep {
                    mapping.columns.insert(name, position);
                }
            }
        }

        debug!(
            schema = %self.schema.name,
            columns = mapping.columns.len(),
            fields = mapping.fields.len(),
            associations = mapping.associations.len(),
            "列映射完成"
        );
        mapping
    }

    /// 注入缺失的保留列，返回新增的 (列名, 位置)
    ///
    /// # 参数
    /// - first_free: 可用的最小位置（通常为 表格最大列 + 1）
    pub fn inject_reserved(&self, mapping: &mut ColumnMapping, first_free: u32) -> Vec<(String, u32)> {
        let mut next = first_free.max(mapping.columns.max_position() + 1);
        let mut added = Vec::new();

        for name in reserved_columns(self.schema) {
            if mapping.columns.contains(&name) {
                continue;
            }
            mapping.columns.insert(name.as_str(), next);
            if self.options.register_identifier_field
                && self.schema.has_field_by_name(&name)
                && !mapping.fields.contains(&name)
            {
                mapping.fields.insert(name.as_str(), next);
            }
            added.push((name, next));
            next += 1;
        }

        added
    }
}

/// 保留列（按注入顺序）
pub fn reserved_columns(schema: &SchemaMetadata) -> [String; 3] {
    [
        schema.field_identifier().to_string(),
        IMPORT_STATUS_COLUMN.to_string(),
        IMPORT_MESSAGE_COLUMN.to_string(),
    ]
}

fn is_reserved(schema: &SchemaMetadata, name: &str) -> bool {
    name == schema.field_identifier() || name == IMPORT_STATUS_COLUMN || name == IMPORT_MESSAGE_COLUMN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssociationMetadata, FieldKind, FieldMetadata};

    fn schema() -> SchemaMetadata {
        SchemaMetadata::new("product", "Product")
            .with_field(FieldMetadata::new("id", FieldKind::Text))
            .with_field(FieldMetadata::new("name", FieldKind::Text))
            .with_field(FieldMetadata::new("code", FieldKind::Text).read_only())
            .with_association(AssociationMetadata::new("category", "category"))
    }

    #[test]
    fn test_header_with_reserved_status_column() {
        let schema = schema();
        let mapper = ColumnMapper::new(&schema, MappingOptions::default());
        let header: ColumnMap = vec![("name", 1), (IMPORT_STATUS_COLUMN, 2)].into_iter().collect();

        let mut mapping = mapper.classify(&header);
        assert_eq!(mapping.fields, vec![("name", 1)].into_iter().collect::<ColumnMap>());

        let added = mapper.inject_reserved(&mut mapping, 3);
        assert_eq!(
            added,
            vec![("id".to_string(), 3), (IMPORT_MESSAGE_COLUMN.to_string(), 4)]
        );
        assert_eq!(mapping.columns.get("id"), Some(3));
        assert_eq!(mapping.columns.get(IMPORT_STATUS_COLUMN), Some(2));
        assert_eq!(mapping.columns.get(IMPORT_MESSAGE_COLUMN), Some(4));
        // 默认不把注入的主键登记为字段
        assert!(!mapping.fields.contains("id"));
    }

    #[test]
    fn test_reserved_columns_appended_in_order() {
        let schema = schema();
        let mapper = ColumnMapper::new(&schema, MappingOptions::default());
        let header: ColumnMap = vec![("name", 1), ("category", 2)].into_iter().collect();

        let mut mapping = mapper.classify(&header);
        mapper.inject_reserved(&mut mapping, 3);
        assert_eq!(
            mapping.columns.names(),
            vec!["name", "category", "id", IMPORT_STATUS_COLUMN, IMPORT_MESSAGE_COLUMN]
        );
        assert_eq!(mapping.columns.get(IMPORT_MESSAGE_COLUMN), Some(5));
        assert_eq!(mapping.associations.get("category"), Some(2));
    }

    #[test]
    fn test_read_only_and_unknown_columns() {
        let schema = schema();
        let header: ColumnMap = vec![("code", 1), ("color", 2), ("name", 3)].into_iter().collect();

        let keep = ColumnMapper::new(&schema, MappingOptions::default()).classify(&header);
        assert!(keep.columns.contains("code"));
        assert!(keep.columns.contains("color"));
        assert!(!keep.fields.contains("code"));

        let options = MappingOptions {
            unknown_columns: UnknownColumnPolicy::Drop,
            register_identifier_field: false,
        };
        let drop = ColumnMapper::new(&schema, options).classify(&header);
        assert!(drop.columns.contains("code"));
        assert!(!drop.columns.contains("color"));
    }

    #[test]
    fn test_injection_never_overlaps_existing_positions() {
        let schema = schema();
        let options = MappingOptions {
            unknown_columns: UnknownColumnPolicy::Keep,
            register_identifier_field: true,
        };
        let mapper = ColumnMapper::new(&schema, options);
        // 表头第 2 列为空
        let header: ColumnMap = vec![("name", 1), ("category", 3)].into_iter().collect();
        let mut mapping = mapper.classify(&header);
        mapper.inject_reserved(&mut mapping, 1);

        assert_eq!(mapping.columns.get("id"), Some(4));
        assert_eq!(mapping.fields.get("id"), Some(4));
        assert_eq!(mapping.columns.get(IMPORT_MESSAGE_COLUMN), Some(6));
    }

    #[test]
    fn test_find_columns_skips_empty_cells() {
        let mut sheet = Worksheet::new("s");
        sheet.set_cell(1, 1, "name");
        sheet.set_cell(3, 1, " stock ");
        sheet.set_cell(1, 2, "Chair");

        let columns = find_columns(&sheet);
        assert_eq!(columns.names(), vec!["name", "stock"]);
        assert_eq!(columns.get("stock"), Some(3));
    }
}
