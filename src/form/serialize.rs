/// 表单序列化
///
/// 把表单控件转换为值树。完整模式用于快照和差异比较；
/// 仅修改模式只包含带修改标记的输入，用于提交。

use serde_json::{Map, Value};

use crate::keypath;
use crate::render::{FormControl, FormGroup, FormModel, PanelForm};
use crate::table::SerializeMode;

impl FormGroup {
    /// 单个设置项的值；按钮和没有可提交输入的表格返回 `None`
    pub fn serialize(&self, mode: SerializeMode) -> Option<Value> {
        let include = |changed: bool| mode == SerializeMode::Full || changed;

        match &self.control {
            FormControl::Checkbox(checkbox) => {
                include(checkbox.changed).then(|| Value::Bool(checkbox.checked))
            }
            FormControl::Select(select) => {
                include(select.changed).then(|| Value::String(select.value.clone()))
            }
            FormControl::Input(input) => {
                include(input.changed).then(|| Value::String(input.value.clone()))
            }
            FormControl::Table(table) => table.serialize(mode),
            FormControl::Button(_) => None,
        }
    }
}

impl PanelForm {
    /// 面板中各设置项的值，以短名为键
    pub fn serialize(&self, mode: SerializeMode) -> Map<String, Value> {
        self.groups
            .iter()
            .filter_map(|group| {
                group
                    .serialize(mode)
                    .map(|value| (group.short_name.clone(), value))
            })
            .collect()
    }
}

impl FormModel {
    /// 整个表单的值树
    ///
    /// 分组面板的值位于面板名之下，非分组面板的值位于顶层。
    /// 没有任何值的面板不会出现。
    pub fn serialize(&self, mode: SerializeMode) -> Value {
        let mut tree = Value::Object(Map::new());

        for panel in &self.panels {
            for group in &panel.groups {
                if let Some(value) = group.serialize(mode) {
                    keypath::set(&mut tree, &group.keypath, value);
                }
            }
        }

        tree
    }
}
