// ==========================================
// 表格批量导入系统 - 表格读写
// ==========================================
// 支持: Excel (.xlsx) / CSV (.csv)
// 读取: calamine (xlsx) / csv (csv)
// 写入: rust_xlsxwriter (xlsx) / csv (csv)
// 格式识别: 按文件内容（zip 魔数 → xlsx，UTF-8 文本 → csv）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use chrono::{NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, WriterBuilder};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const SNIFF_LEN: usize = 8 * 1024;
/// 默认行高（磅）
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;
/// 结果文件中日期/时长单元格的数字格式
const DATE_FORMAT: &str = "yyyy-mm-dd";
const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";
const DURATION_FORMAT: &str = "[h]:mm:ss";
const MS_PER_DAY: f64 = 86_400_000.0;
const AUTOFIT_CHAR_PIXELS: usize = 7;
const AUTOFIT_PADDING_PIXELS: usize = 10;
const AUTOFIT_MAX_PIXELS: usize = 1790;

// ==========================================
// SheetFormat - 表格格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SheetFormat::Csv => "csv",
            SheetFormat::Xlsx => "xlsx",
        }
    }
}

// ==========================================
// CellValue - 单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel 日期/时间单元格
    DateTime(NaiveDateTime),
    /// Excel 时长单元格
    Duration(chrono::Duration),
}

impl CellValue {
    /// 空单元格或仅含空白的文本
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 转换为载荷值（空 → null）
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::Null,
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::DateTime(_) | CellValue::Duration(_) => Value::String(self.as_text()),
        }
    }

    /// 从载荷值转换（对象/数组按 JSON 文本写入）
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::String(s) if s.is_empty() => CellValue::Empty,
            Value::String(s) => CellValue::Text(s.clone()),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
            Value::Bool(b) => CellValue::Bool(*b),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// 文本形式（整数值的数字不带小数位）
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            // ISO-8601: 纯日期不带时间部分
            CellValue::DateTime(dt) if dt.time() == NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            CellValue::Duration(d) => d.to_string(),
        }
    }

    fn from_text(raw: &str) -> Self {
        if raw.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::from_text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from_text(&value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

/// calamine 单元格 → CellValue（日期保留为日期）
fn cell_from_calamine(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from_text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => dt
            .as_duration()
            .map(CellValue::Duration)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DurationIso(s) => cell
            .as_duration()
            .map(CellValue::Duration)
            .unwrap_or_else(|| CellValue::from_text(s)),
        Data::DateTimeIso(s) => cell
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::from_text(s)),
        Data::Error(e) => CellValue::from_text(&e.to_string()),
    }
}

// ==========================================
// Worksheet - 稀疏单元格网格
// ==========================================
// 坐标: (列, 行)，均从 1 开始
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    title: String,
    cells: BTreeMap<(u32, u32), CellValue>, // key = (row, col)
    highest_row: u32,
    highest_column: u32,
    auto_size: BTreeSet<u32>,
    row_heights: BTreeMap<u32, f64>,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl Worksheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cell(&self, column: u32, row: u32) -> &CellValue {
        self.cells.get(&(row, column)).unwrap_or(&EMPTY_CELL)
    }

    /// 写入单元格（空值会清除该单元格，但仍扩展表格范围）
    pub fn set_cell(&mut self, column: u32, row: u32, value: impl Into<CellValue>) {
        if column == 0 || row == 0 {
            return;
        }
        let value = value.into();
        self.highest_row = self.highest_row.max(row);
        self.highest_column = self.highest_column.max(column);
        if matches!(value, CellValue::Empty) {
            self.cells.remove(&(row, column));
        } else {
            self.cells.insert((row, column), value);
        }
    }

    pub fn highest_row(&self) -> u32 {
        self.highest_row
    }

    pub fn highest_column(&self) -> u32 {
        self.highest_column
    }

    /// 某一行是否全空（忽略 excluded 中的列）
    pub fn is_row_empty(&self, row: u32, excluded: &[u32]) -> bool {
        self.cells
            .range((row, 0)..=(row, u32::MAX))
            .filter(|((_, col), _)| !excluded.contains(col))
            .all(|(_, v)| v.is_empty())
    }

    pub fn set_auto_size(&mut self, column: u32, enabled: bool) {
        if enabled {
            self.auto_size.insert(column);
        } else {
            self.auto_size.remove(&column);
        }
    }

    pub fn is_auto_size(&self, column: u32) -> bool {
        self.auto_size.contains(&column)
    }

    pub fn auto_size_columns(&self) -> impl Iterator<Item = u32> + '_ {
        self.auto_size.iter().copied()
    }

    /// 某列最长一行文本的字符数
    pub fn column_text_width(&self, column: u32) -> usize {
        self.cells
            .iter()
            .filter(|((_, col), _)| *col == column)
            .filter_map(|(_, v)| v.as_text().lines().map(|line| line.chars().count()).max())
            .max()
            .unwrap_or(0)
    }

    /// 行高（未设置返回默认行高）
    pub fn row_height(&self, row: u32) -> f64 {
        self.row_heights
            .get(&row)
            .copied()
            .unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.row_heights.insert(row, height);
    }

    fn row_heights(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.row_heights.iter().map(|(r, h)| (*r, *h))
    }

    fn populated_cells(&self) -> impl Iterator<Item = (u32, u32, &CellValue)> + '_ {
        self.cells.iter().map(|((row, col), v)| (*col, *row, v))
    }
}

// ==========================================
// Workbook - 已打开的表格文件
// ==========================================
#[derive(Debug, Clone)]
pub struct Workbook {
    pub format: SheetFormat,
    /// 导入数据所在的工作表
    pub sheet: Worksheet,
    /// 其余工作表（仅 xlsx），写回时原样保留
    pub extra_sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new(format: SheetFormat, sheet: Worksheet) -> Self {
        Self {
            format,
            sheet,
            extra_sheets: Vec::new(),
        }
    }

    pub fn with_extra_sheets(mut self, sheets: Vec<Worksheet>) -> Self {
        self.extra_sheets = sheets;
        self
    }
}

// ==========================================
// SheetIo Trait
// ==========================================
// 实现者: CsvSheetIo / XlsxSheetIo / UniversalSheetIo
pub trait SheetIo: Send + Sync {
    /// 识别文件格式
    fn identify(&self, path: &Path) -> ImportResult<SheetFormat>;

    /// 读取文件（首个工作表为导入数据）
    fn load(&self, path: &Path) -> ImportResult<Workbook>;

    /// 写回文件（格式与 workbook.format 一致）
    fn save(&self, workbook: &Workbook, path: &Path) -> ImportResult<()>;
}

// ==========================================
// CSV 实现
// ==========================================
pub struct CsvSheetIo;

impl SheetIo for CsvSheetIo {
    fn identify(&self, path: &Path) -> ImportResult<SheetFormat> {
        match sniff(path)? {
            SheetFormat::Csv => Ok(SheetFormat::Csv),
            other => Err(ImportError::UnsupportedFormat(other.extension().to_string())),
        }
    }

    fn load(&self, path: &Path) -> ImportResult<Workbook> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Sheet1".to_string());
        let mut sheet = Worksheet::new(title);

        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            let row = row_idx as u32 + 1;
            for (col_idx, value) in record.iter().enumerate() {
                // 去除 UTF-8 BOM
                let value = if row == 1 && col_idx == 0 {
                    value.trim_start_matches('\u{feff}')
                } else {
                    value
                };
                sheet.set_cell(col_idx as u32 + 1, row, value);
            }
        }

        debug!(
            path = %path.display(),
            rows = sheet.highest_row(),
            columns = sheet.highest_column(),
            "CSV 文件已读取"
        );
        Ok(Workbook::new(SheetFormat::Csv, sheet))
    }

    fn save(&self, workbook: &Workbook, path: &Path) -> ImportResult<()> {
        let sheet = &workbook.sheet;
        let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;

        for row in 1..=sheet.highest_row() {
            let record: Vec<String> = (1..=sheet.highest_column())
                .map(|col| sheet.cell(col, row).as_text())
                .collect();
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

// ==========================================
// Excel 实现
// ==========================================
pub struct XlsxSheetIo;

impl SheetIo for XlsxSheetIo {
    fn identify(&self, path: &Path) -> ImportResult<SheetFormat> {
        match sniff(path)? {
            SheetFormat::Xlsx => Ok(SheetFormat::Xlsx),
            other => Err(ImportError::UnsupportedFormat(other.extension().to_string())),
        }
    }

    fn load(&self, path: &Path) -> ImportResult<Workbook> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let mut workbook: Xlsx<_> = open_workbook(path)?;
        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(ImportError::ExcelParseError("Excel 文件无工作表".to_string()));
        }

        // 第一个 sheet 为导入数据，其余原样保留到结果文件
        let mut sheets = Vec::with_capacity(sheet_names.len());
        for name in sheet_names {
            let range = workbook.worksheet_range(&name)?;
            sheets.push(sheet_from_range(name, &range));
        }
        let sheet = sheets.remove(0);

        debug!(
            path = %path.display(),
            rows = sheet.highest_row(),
            columns = sheet.highest_column(),
            extra_sheets = sheets.len(),
            "Excel 文件已读取"
        );
        Ok(Workbook::new(SheetFormat::Xlsx, sheet).with_extra_sheets(sheets))
    }

    fn save(&self, workbook: &Workbook, path: &Path) -> ImportResult<()> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let formats = CellFormats::new();

        for sheet in std::iter::once(&workbook.sheet).chain(workbook.extra_sheets.iter()) {
            let target = book.add_worksheet();
            write_sheet(target, sheet, &formats)?;
        }

        book.save(path)?;
        Ok(())
    }
}

fn sheet_from_range(name: String, range: &calamine::Range<Data>) -> Worksheet {
    let mut sheet = Worksheet::new(name);
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    for (row_off, col_off, cell) in range.used_cells() {
        let row = start_row + row_off as u32 + 1;
        let column = start_col + col_off as u32 + 1;
        sheet.set_cell(column, row, cell_from_calamine(cell));
    }

    // 表格范围以声明的区域为准（包含尾部空行）
    if let Some((end_row, end_col)) = range.end() {
        if !range.is_empty() {
            sheet.highest_row = sheet.highest_row.max(end_row + 1);
            sheet.highest_column = sheet.highest_column.max(end_col + 1);
        }
    }
    sheet
}

struct CellFormats {
    wrap: rust_xlsxwriter::Format,
    date: rust_xlsxwriter::Format,
    datetime: rust_xlsxwriter::Format,
    duration: rust_xlsxwriter::Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            wrap: rust_xlsxwriter::Format::new().set_text_wrap(),
            date: rust_xlsxwriter::Format::new().set_num_format(DATE_FORMAT),
            datetime: rust_xlsxwriter::Format::new().set_num_format(DATETIME_FORMAT),
            duration: rust_xlsxwriter::Format::new().set_num_format(DURATION_FORMAT),
        }
    }
}

fn write_sheet(
    target: &mut rust_xlsxwriter::Worksheet,
    sheet: &Worksheet,
    formats: &CellFormats,
) -> ImportResult<()> {
    if !sheet.title().is_empty() {
        target.set_name(sheet.title())?;
    }

    for (column, row, value) in sheet.populated_cells() {
        let (r, c) = (row - 1, (column - 1) as u16);
        match value {
            CellValue::Empty => {}
            CellValue::Text(s) if s.contains('\n') => {
                target.write_string_with_format(r, c, s, &formats.wrap)?;
            }
            CellValue::Text(s) => {
                target.write_string(r, c, s)?;
            }
            CellValue::Number(n) => {
                target.write_number(r, c, *n)?;
            }
            CellValue::Bool(b) => {
                target.write_boolean(r, c, *b)?;
            }
            CellValue::DateTime(dt) if dt.time() == NaiveTime::MIN => {
                target.write_datetime_with_format(r, c, dt, &formats.date)?;
            }
            CellValue::DateTime(dt) => {
                target.write_datetime_with_format(r, c, dt, &formats.datetime)?;
            }
            CellValue::Duration(d) => {
                let days = d.num_milliseconds() as f64 / MS_PER_DAY;
                target.write_number_with_format(r, c, days, &formats.duration)?;
            }
        }
    }

    for (row, height) in sheet.row_heights() {
        target.set_row_height(row - 1, height)?;
    }

    // 仅调整标记的列，其余列保持默认宽度
    for column in sheet.auto_size_columns() {
        let width = sheet.column_text_width(column);
        if width > 0 {
            target.set_column_autofit_width((column - 1) as u16, autofit_pixels(width))?;
        }
    }
    Ok(())
}

/// 按字符数估算列宽（像素）
fn autofit_pixels(chars: usize) -> u16 {
    let pixels = chars.saturating_mul(AUTOFIT_CHAR_PIXELS) + AUTOFIT_PADDING_PIXELS;
    pixels.min(AUTOFIT_MAX_PIXELS) as u16
}

// ==========================================
// 通用读写器（按文件内容自动选择）
// ==========================================
pub struct UniversalSheetIo;

impl SheetIo for UniversalSheetIo {
    fn identify(&self, path: &Path) -> ImportResult<SheetFormat> {
        sniff(path)
    }

    fn load(&self, path: &Path) -> ImportResult<Workbook> {
        match sniff(path)? {
            SheetFormat::Csv => CsvSheetIo.load(path),
            SheetFormat::Xlsx => XlsxSheetIo.load(path),
        }
    }

    fn save(&self, workbook: &Workbook, path: &Path) -> ImportResult<()> {
        match workbook.format {
            SheetFormat::Csv => CsvSheetIo.save(workbook, path),
            SheetFormat::Xlsx => XlsxSheetIo.save(workbook, path),
        }
    }
}

/// 按文件头识别格式
fn sniff(path: &Path) -> ImportResult<SheetFormat> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let mut buf = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buf)?;

    if buf.starts_with(ZIP_MAGIC) {
        return Ok(SheetFormat::Xlsx);
    }
    if buf.starts_with(OLE_MAGIC) {
        return Err(ImportError::UnsupportedFormat("xls".to_string()));
    }

    match std::str::from_utf8(&buf) {
        Ok(_) => Ok(SheetFormat::Csv),
        // 截断在多字节字符中间
        Err(e) if e.error_len().is_none() => Ok(SheetFormat::Csv),
        Err(_) => Err(ImportError::UnsupportedFormat(
            path.extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        )),
    }
}
