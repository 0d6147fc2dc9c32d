use serde_json::Value;

use crate::keypath::{self, KeyPath};
use crate::render::FormModel;
use crate::table::SerializeMode;

/// 加载完成后的完整表单值
///
/// 只在渲染之后、任何编辑之前捕获一次；之后只能通过重新加载刷新。
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Value,
}

impl Snapshot {
    pub(crate) fn capture(form: &FormModel) -> Self {
        Self {
            values: form.serialize(SerializeMode::Full),
        }
    }

    pub fn values(&self) -> &Value {
        &self.values
    }

    /// 快照中某个键路径的值
    pub fn get(&self, keypath: &KeyPath) -> Option<&Value> {
        keypath::get(&self.values, keypath)
    }
}
