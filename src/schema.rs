use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keypath::{is_truthy, KeyPath};
use crate::utils::FormError;

/// 设置项类型
///
/// 未知类型按普通文本输入处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    #[default]
    Text,
    Password,
    Checkbox,
    Select,
    Table,
    Button,
    Integer,
    /// 服务端保存时转换为整数
    Int,
    /// 服务端保存时转换为浮点数
    Double,
    Time,
    #[serde(other)]
    Other,
}

/// 下拉选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    #[serde(default)]
    pub label: String,
}

/// 表格列描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDescription {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: SettingType,
    pub default: Option<Value>,
    pub options: Vec<SelectOption>,
    pub placeholder: Option<String>,
    pub hidden: bool,
    /// 已有行的复选框/时间单元格是否可直接编辑
    pub editable: bool,
    pub readonly: bool,
}

/// 哈希表格的键列描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDescription {
    pub name: String,
    pub label: String,
    pub placeholder: Option<String>,
}

/// 单个设置项的声明式描述
///
/// 加载后不再修改。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub label: Option<String>,
    pub help: Option<String>,
    pub default: Option<Value>,
    pub placeholder: Option<String>,
    pub password_placeholder: Option<String>,
    pub options: Vec<SelectOption>,

    // === 表格 ===
    pub columns: Vec<ColumnDescription>,
    pub key: Option<KeyDescription>,
    pub can_order: bool,
    pub can_add_new_rows: bool,
    pub can_add_new_categories: bool,
    pub categorize_by_key: Option<String>,
    pub read_only: bool,
    pub numbered: bool,
    pub caption: Option<String>,
    #[serde(rename = "non-deletable-row-key")]
    pub non_deletable_row_key: Option<String>,
    #[serde(rename = "non-deletable-row-values")]
    pub non_deletable_row_values: Vec<Value>,
    pub new_category_placeholder: Option<String>,
    pub new_category_message: Option<String>,

    // === 按钮 ===
    pub href: Option<String>,
    pub button_label: Option<String>,
    pub classes: Option<String>,

    // === 展示 ===
    pub html_id: Option<String>,
    pub hidden: bool,
    pub advanced: bool,
    pub deprecated: bool,

    /// 修改后是否需要重启；未设置时继承面板的设置
    pub restart: Option<bool>,
}

impl SettingDescription {
    pub fn new(name: &str, setting_type: SettingType) -> Self {
        Self {
            name: name.to_string(),
            setting_type,
            ..Default::default()
        }
    }

    /// 查找表格列
    pub fn column(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|col| col.name == name)
    }
}

/// 面板（一组相关设置）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelDescription {
    pub name: String,
    pub label: Option<String>,
    pub settings: Vec<SettingDescription>,
    pub restart: Option<bool>,
    pub hidden: bool,
    /// 为真时，仅当 `values[name].enable` 为真才显示
    pub show_on_enable: bool,
    /// 为真时设置值位于 `values[name]` 下，否则位于顶层
    pub grouped: bool,
    pub html_id: Option<String>,
}

impl Default for PanelDescription {
    fn default() -> Self {
        Self {
            name: String::new(),
            label: None,
            settings: Vec::new(),
            restart: None,
            hidden: false,
            show_on_enable: false,
            grouped: true,
            html_id: None,
        }
    }
}

impl PanelDescription {
    pub fn new(name: &str, settings: Vec<SettingDescription>) -> Self {
        Self {
            name: name.to_string(),
            settings,
            ..Default::default()
        }
    }

    /// 按短名查找设置项
    pub fn setting(&self, name: &str) -> Option<&SettingDescription> {
        self.settings.iter().find(|setting| setting.name == name)
    }

    /// 设置项在值树中的键路径
    pub fn setting_keypath(&self, setting: &SettingDescription) -> KeyPath {
        if self.grouped {
            KeyPath::root(&self.name).child(&setting.name)
        } else {
            KeyPath::root(&setting.name)
        }
    }

    /// 修改该设置项是否需要重启
    ///
    /// 设置项自身的 `restart` 优先，其次是面板的 `restart`，默认需要重启。
    pub fn requires_restart(&self, setting_name: &str) -> bool {
        self.setting(setting_name)
            .and_then(|setting| setting.restart)
            .or(self.restart)
            .unwrap_or(true)
    }
}

/// 设置文档（GET 端点的返回内容）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default)]
    pub descriptions: Vec<PanelDescription>,
    #[serde(default = "empty_object")]
    pub values: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub locked: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl SettingsDocument {
    pub fn new(descriptions: Vec<PanelDescription>, values: Value) -> Self {
        Self {
            descriptions,
            values,
            locked: Value::Null,
        }
    }

    /// 从 JSON 文本解析
    pub fn from_json_str(text: &str) -> Result<Self, FormError> {
        let document: Self = serde_json::from_str(text)?;
        Ok(document)
    }

    pub fn panel(&self, name: &str) -> Option<&PanelDescription> {
        self.descriptions.iter().find(|panel| panel.name == name)
    }

    /// 应用 `show_on_enable` 门控
    ///
    /// 面板存在值对象且其 `enable` 不为真时，面板被隐藏。
    pub fn apply_visibility(&mut self) {
        let values = &self.values;
        for panel in &mut self.descriptions {
            if panel.show_on_enable {
                if let Some(panel_values) = values.get(&panel.name).filter(|v| is_truthy(v)) {
                    let enabled = panel_values.get("enable").map_or(false, is_truthy);
                    panel.hidden = panel.hidden || !enabled;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document() {
        let document = SettingsDocument::from_json_str(
            r#"{
                "descriptions": [
                    {
                        "name": "metaverse",
                        "label": "Metaverse",
                        "restart": false,
                        "settings": [
                            { "name": "automatic_networking", "type": "select",
                              "options": [ { "value": "disabled", "label": "None" } ] },
                            { "name": "id", "default": "" },
                            { "name": "weird", "type": "color" }
                        ]
                    },
                    {
                        "name": "security",
                        "settings": [
                            { "name": "permissions", "type": "table",
                              "key": { "name": "permissions_id", "label": "Name" },
                              "non-deletable-row-key": "permissions_id",
                              "non-deletable-row-values": ["localhost"],
                              "columns": [ { "name": "id_can_adjust_locks", "type": "checkbox" } ] }
                        ]
                    }
                ],
                "values": { "metaverse": { "id": "abc" } }
            }"#,
        )
        .unwrap();

        let metaverse = document.panel("metaverse").unwrap();
        assert!(metaverse.grouped);
        assert_eq!(metaverse.settings[0].setting_type, SettingType::Select);
        assert_eq!(metaverse.settings[1].setting_type, SettingType::Text);
        assert_eq!(metaverse.settings[2].setting_type, SettingType::Other);
        assert!(!metaverse.requires_restart("id"));

        let permissions = document.panel("security").unwrap().setting("permissions").unwrap();
        assert_eq!(permissions.key.as_ref().unwrap().name, "permissions_id");
        assert_eq!(permissions.non_deletable_row_values, vec![json!("localhost")]);
        assert_eq!(permissions.columns[0].column_type, SettingType::Checkbox);
        assert!(document.locked.is_null());
    }

    #[test]
    fn test_requires_restart() {
        let mut panel = PanelDescription::new(
            "audio",
            vec![
                SettingDescription::new("codec", SettingType::Text),
                SettingDescription {
                    restart: Some(false),
                    ..SettingDescription::new("gain", SettingType::Text)
                },
            ],
        );
        assert!(panel.requires_restart("codec"));
        assert!(!panel.requires_restart("gain"));

        panel.restart = Some(false);
        assert!(!panel.requires_restart("codec"));
    }

    #[test]
    fn test_setting_keypath() {
        let setting = SettingDescription::new("port", SettingType::Integer);
        let mut panel = PanelDescription::new("network", vec![setting.clone()]);
        assert_eq!(panel.setting_keypath(&setting).to_string(), "network.port");

        panel.grouped = false;
        assert_eq!(panel.setting_keypath(&setting).to_string(), "port");
    }

    #[test]
    fn test_show_on_enable() {
        let mut enabled = PanelDescription::new("broadcasting", Vec::new());
        enabled.show_on_enable = true;
        let mut disabled = enabled.clone();
        disabled.name = "wizard".to_string();
        let mut no_values = enabled.clone();
        no_values.name = "backups".to_string();

        let mut document = SettingsDocument::new(
            vec![enabled, disabled, no_values],
            json!({
                "broadcasting": { "enable": true },
                "wizard": { "enable": false }
            }),
        );
        document.apply_visibility();

        assert!(!document.panel("broadcasting").unwrap().hidden);
        assert!(document.panel("wizard").unwrap().hidden);
        assert!(!document.panel("backups").unwrap().hidden);
    }
}
