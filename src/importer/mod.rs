// ==========================================
// 表格批量导入系统 - 导入层
// ==========================================
// 职责: 表格读写、文件存储、列映射、导入上下文、逐行适配器
// 支持: Excel (.xlsx), CSV
// ==========================================

// 模块声明
pub mod adapter;
pub mod column_mapper;
pub mod content_storage;
pub mod error;
pub mod error_codes;
pub mod import_context;
pub mod sheet_io;

// 重导出核心类型
pub use adapter::{
    default_adapters, ImportAdapter, RowPostProcessor, StandardImportAdapter, TrimmedImportAdapter,
};
pub use column_mapper::{
    find_columns, ColumnMap, ColumnMapper, ColumnMapping, MappingOptions, IMPORT_MESSAGE_COLUMN,
    IMPORT_STATUS_COLUMN,
};
pub use content_storage::{ContentStorage, LocalContentStorage, IMPORT_NAMESPACE};
pub use error::{ImportError, ImportResult};
pub use error_codes::ImportErrorCode;
pub use import_context::ImportContext;
pub use sheet_io::{
    CellValue, CsvSheetIo, SheetFormat, SheetIo, UniversalSheetIo, Workbook, Worksheet,
    XlsxSheetIo,
};
