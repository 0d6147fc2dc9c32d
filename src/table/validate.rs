/// 保存前的表格键校验

use tracing::debug;

use crate::utils::{check_key, keys_collide, ValidationError};

use super::editor::{TableEditor, TableMode};
use super::row::RowId;

impl TableEditor {
    /// 检查一个新键：不含空白、非空、不与其他行的键重复（大小写不敏感）
    ///
    /// # 参数
    /// * `key` - 待检查的键
    /// * `exclude` - 比较重复时跳过的行（即键所属的行本身）
    pub(crate) fn check_new_key(&self, key: &str, exclude: Option<RowId>) -> Result<(), ValidationError> {
        check_key(key)?;

        let duplicate = self
            .rows()
            .iter()
            .filter(|row| Some(row.id) != exclude)
            .filter_map(|row| row.key.as_deref())
            .any(|other| keys_collide(other, key));

        if duplicate {
            return Err(ValidationError::DuplicateKey);
        }
        Ok(())
    }

    /// 清除所有行的无效标记
    pub fn clear_invalid(&mut self) {
        for row in self.rows_mut() {
            row.invalid = false;
        }
    }

    /// 校验所有新行的键
    ///
    /// 每个出错的行都会被标记为无效。表格内同时存在多种错误时，
    /// 按“含空白 > 为空 > 重复”的优先级报告一种。
    pub fn validate_keys(&mut self) -> Result<(), ValidationError> {
        if self.mode() != TableMode::Hash {
            return Ok(());
        }

        let failures: Vec<(RowId, ValidationError)> = self
            .rows()
            .iter()
            .filter(|row| row.is_new)
            .filter_map(|row| {
                let key = row.key.as_deref().unwrap_or("");
                self.check_new_key(key, Some(row.id)).err().map(|err| (row.id, err))
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }

        for row in self.rows_mut() {
            if failures.iter().any(|(id, _)| *id == row.id) {
                row.invalid = true;
            }
        }

        let reported = [
            ValidationError::KeyContainsSpaces,
            ValidationError::EmptyField,
            ValidationError::DuplicateKey,
        ]
        .into_iter()
        .find(|kind| failures.iter().any(|(_, err)| err == kind))
        .unwrap_or(ValidationError::DuplicateKey);

        debug!(table = %self.keypath(), error = %reported, rows = failures.len(), "table keys rejected");
        Err(reported)
    }
}
