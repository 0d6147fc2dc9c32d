use thiserror::Error;
use std::path::Path;

use crate::table::RowId;

/// 保存失败时展示给用户的通用提示
pub const SETTINGS_ERROR_MESSAGE: &str =
    "There was a problem saving domain settings. Please try again!";

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Invalid key path: {0}")]
    InvalidKeyPath(String),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Row not found: {0}")]
    RowNotFound(RowId),

    #[error("Row {0} cannot be deleted")]
    RowNotDeletable(RowId),

    #[error("Table is read-only: {0}")]
    ReadOnlyTable(String),

    #[error("Table does not accept new rows: {0}")]
    RowsLocked(String),

    #[error("Table does not accept new categories: {0}")]
    NotCategorized(String),

    #[error("Category is empty or already exists: {0:?}")]
    CategoryConflict(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Cell is not editable: {0}")]
    CellNotEditable(String),

    #[error("Row key is not editable: {0}")]
    KeyNotEditable(RowId),

    #[error("Value is not one of the options of {0}")]
    UnknownOption(String),

    #[error("Value type mismatch for {0}")]
    TypeMismatch(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("There was a problem saving domain settings. Please try again! ({0})")]
    Transport(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 表格键校验错误
///
/// `Display` 文本即为展示给用户的阻断提示。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Key contains spaces")]
    KeyContainsSpaces,

    #[error("Empty field(s)")]
    EmptyField,

    #[error("Two keys cannot be identical")]
    DuplicateKey,
}

/// 检查单个键值（不含重复检查）
///
/// 先检查空白字符，再检查是否为空。
pub fn check_key(key: &str) -> Result<(), ValidationError> {
    if key.chars().any(char::is_whitespace) {
        return Err(ValidationError::KeyContainsSpaces);
    }

    if key.is_empty() {
        return Err(ValidationError::EmptyField);
    }

    Ok(())
}

/// 大小写不敏感的键比较
pub fn keys_collide(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<std::path::PathBuf, FormError> {
    if !file_path.exists() {
        return Err(FormError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "settings file does not exist",
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let backup_path = file_path.with_extension(format!("{}.bak", timestamp));

    std::fs::copy(file_path, &backup_path)
        .map_err(FormError::IoError)?;

    Ok(backup_path)
}
