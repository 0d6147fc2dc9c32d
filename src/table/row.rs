use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::keypath::{display_scalar, is_truthy};
use crate::schema::{ColumnDescription, SettingType};

/// 分类输入行校验失败后的提示持续时间
pub const INVALID_FLASH: Duration = Duration::from_millis(400);

/// 表格行的稳定标识
///
/// 与行的位置无关，排序后依然有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 单元格的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// 文本输入（包括下拉框对应的隐藏输入）
    Text(String),
    /// 复选框
    Flag(bool),
}

impl CellValue {
    /// 按列类型把 JSON 值转成单元格
    pub fn from_json(column: &ColumnDescription, value: &Value) -> Self {
        if column.column_type == SettingType::Checkbox {
            CellValue::Flag(is_truthy(value))
        } else {
            CellValue::Text(display_scalar(value))
        }
    }

    /// 新行模板中的默认值
    pub fn template(column: &ColumnDescription) -> Self {
        match &column.default {
            Some(default) => Self::from_json(column, default),
            None if column.column_type == SettingType::Checkbox => CellValue::Flag(false),
            None => CellValue::Text(String::new()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Text(text) => Value::String(text.clone()),
            CellValue::Flag(flag) => Value::Bool(*flag),
        }
    }

    /// 文本形式（用于分类值、非删除标记的比较）
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(text) => text.clone(),
            CellValue::Flag(flag) => flag.to_string(),
        }
    }
}

/// 表格中的一行数据
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub id: RowId,
    /// 数组模式下的位置，每次增删和排序后重新编号
    pub index: usize,
    /// 哈希模式下的键；新行在填写前可以为 `None`
    pub key: Option<String>,
    /// 按列顺序排列的单元格
    pub cells: Vec<CellValue>,
    pub category: Option<String>,
    pub is_new: bool,
    pub non_deletable: bool,
    /// 保存时是否提交该行
    pub dirty: bool,
    /// 最近一次校验是否失败
    pub invalid: bool,
}

/// 分类标题
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub expanded: bool,
    pub is_new: bool,
    pub removable: bool,
    pub message: String,
}

impl Category {
    pub(crate) fn existing(name: &str, removable: bool) -> Self {
        Self {
            name: name.to_string(),
            expanded: true,
            is_new: false,
            removable,
            message: String::new(),
        }
    }
}

/// 最后一行被删除后留下的空值占位输入
///
/// 保证表格仍以空集合的形式提交。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderInput {
    pub name: String,
    pub value: String,
    pub changed: bool,
}

/// 新行草稿（对应表格底部的输入行）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowDraft {
    pub key: Option<String>,
    pub values: Vec<(String, Value)>,
    pub category: Option<String>,
}

impl RowDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn with_value(mut self, column: &str, value: Value) -> Self {
        self.values.push((column.to_string(), value));
        self
    }

    pub fn in_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub(crate) fn value_for(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .rev()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// 新分类输入行的状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryInput {
    warning_until: Option<Instant>,
}

impl CategoryInput {
    /// 标记为无效，`INVALID_FLASH` 之后自动恢复
    pub fn flag(&mut self, now: Instant) {
        self.warning_until = Some(now + INVALID_FLASH);
    }

    pub fn is_flagged_at(&self, now: Instant) -> bool {
        self.warning_until.map_or(false, |until| now < until)
    }

    pub fn is_flagged(&self) -> bool {
        self.is_flagged_at(Instant::now())
    }
}

/// 表格的展示顺序条目
#[derive(Debug, Clone, PartialEq)]
pub enum TableEntry<'a> {
    CategoryHeader(&'a Category),
    Row { row: &'a TableRow, visible: bool },
    Placeholder(PlaceholderInput),
}
