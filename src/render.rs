/// 设置表单渲染
///
/// 把设置描述和当前值转换为强类型的表单视图模型，不生成任何 HTML。
/// 缺失的值依次回退到描述中的默认值、空字符串。

use serde_json::Value;
use tracing::debug;

use crate::keypath::{self, display_scalar, is_truthy, loose_eq, KeyPath};
use crate::schema::{PanelDescription, SelectOption, SettingDescription, SettingType, SettingsDocument};
use crate::table::TableEditor;

/// 整个表单
#[derive(Debug, Clone, PartialEq)]
pub struct FormModel {
    pub panels: Vec<PanelForm>,
}

/// 一个面板
#[derive(Debug, Clone, PartialEq)]
pub struct PanelForm {
    pub name: String,
    pub label: Option<String>,
    pub grouped: bool,
    pub hidden: bool,
    pub groups: Vec<FormGroup>,
}

/// 一个设置项（标签 + 控件）
#[derive(Debug, Clone, PartialEq)]
pub struct FormGroup {
    pub keypath: KeyPath,
    pub short_name: String,
    pub id: String,
    pub label: Option<String>,
    pub help: Option<String>,
    pub advanced: bool,
    pub deprecated: bool,
    pub control: FormControl,
}

/// 按设置类型区分的控件
#[derive(Debug, Clone, PartialEq)]
pub enum FormControl {
    Checkbox(CheckboxControl),
    Select(SelectControl),
    Table(TableEditor),
    Button(ButtonControl),
    Input(InputControl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckboxControl {
    pub checked: bool,
    pub changed: bool,
}

/// 下拉框；选中项会同步到用于提交的隐藏值
#[derive(Debug, Clone, PartialEq)]
pub struct SelectControl {
    pub options: Vec<SelectOption>,
    pub selected: Option<usize>,
    pub value: String,
    pub changed: bool,
}

impl SelectControl {
    /// 选中第 `index` 个选项
    ///
    /// # 返回
    /// 下标越界时返回 `false`
    pub fn select(&mut self, index: usize) -> bool {
        match self.options.get(index) {
            Some(option) => {
                self.value = display_scalar(&option.value);
                self.selected = Some(index);
                self.changed = true;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    /// 直接跳转的链接
    Link(String),
    /// 由宿主处理的动作
    Action,
}

/// 按钮不携带任何提交值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonControl {
    pub label: String,
    pub classes: String,
    pub target: ButtonTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Password,
    Time,
}

/// 标量输入框（整数也使用普通文本框）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputControl {
    pub kind: InputKind,
    pub value: String,
    pub placeholder: String,
    pub changed: bool,
}

impl FormModel {
    pub fn panel(&self, name: &str) -> Option<&PanelForm> {
        self.panels.iter().find(|panel| panel.name == name)
    }

    /// 按键路径查找设置项
    pub fn group(&self, keypath: &KeyPath) -> Option<&FormGroup> {
        self.panels
            .iter()
            .flat_map(|panel| panel.groups.iter())
            .find(|group| &group.keypath == keypath)
    }

    /// 按键路径查找设置项及其所在面板的名称
    pub(crate) fn group_mut(&mut self, keypath: &KeyPath) -> Option<(&str, &mut FormGroup)> {
        self.panels.iter_mut().find_map(|panel| {
            let name = panel.name.as_str();
            panel
                .groups
                .iter_mut()
                .find(|group| &group.keypath == keypath)
                .map(|group| (name, group))
        })
    }

    /// 所有表格
    pub fn tables(&self) -> impl Iterator<Item = &TableEditor> {
        self.panels
            .iter()
            .flat_map(|panel| panel.groups.iter())
            .filter_map(|group| match &group.control {
                FormControl::Table(table) => Some(table),
                _ => None,
            })
    }

    pub(crate) fn tables_mut(&mut self) -> impl Iterator<Item = &mut TableEditor> {
        self.panels
            .iter_mut()
            .flat_map(|panel| panel.groups.iter_mut())
            .filter_map(|group| match &mut group.control {
                FormControl::Table(table) => Some(table),
                _ => None,
            })
    }
}

/// 渲染整个表单
///
/// 调用前应已应用 `show_on_enable` 门控（见 [`SettingsDocument::apply_visibility`]）。
pub fn render_form(document: &SettingsDocument) -> FormModel {
    let panels = document
        .descriptions
        .iter()
        .map(|panel| render_panel(panel, &document.values))
        .collect();

    FormModel { panels }
}

/// 渲染一个面板；隐藏面板不渲染任何设置项
pub fn render_panel(panel: &PanelDescription, values: &Value) -> PanelForm {
    let groups = if panel.hidden {
        debug!(panel = %panel.name, "panel hidden");
        Vec::new()
    } else {
        panel
            .settings
            .iter()
            .filter_map(|setting| render_setting(panel, setting, values))
            .collect()
    };

    PanelForm {
        name: panel.name.clone(),
        label: panel.label.clone(),
        grouped: panel.grouped,
        hidden: panel.hidden,
        groups,
    }
}

/// 渲染单个设置项
///
/// # 返回
/// 隐藏的设置项返回 `None`
pub fn render_setting(
    panel: &PanelDescription,
    setting: &SettingDescription,
    values: &Value,
) -> Option<FormGroup> {
    if setting.hidden {
        return None;
    }

    let keypath = panel.setting_keypath(setting);
    let value = resolve_value(setting, values, &keypath);

    let control = match setting.setting_type {
        SettingType::Checkbox => FormControl::Checkbox(CheckboxControl {
            checked: is_truthy(&value),
            changed: false,
        }),
        SettingType::Select => FormControl::Select(SelectControl {
            options: setting.options.clone(),
            selected: setting
                .options
                .iter()
                .position(|option| loose_eq(&option.value, &value)),
            value: display_scalar(&value),
            changed: false,
        }),
        SettingType::Table => {
            FormControl::Table(TableEditor::from_setting(setting, keypath.clone(), &value))
        }
        SettingType::Button => FormControl::Button(ButtonControl {
            label: setting.button_label.clone().unwrap_or_default(),
            classes: setting.classes.clone().unwrap_or_default(),
            target: match &setting.href {
                Some(href) => ButtonTarget::Link(href.clone()),
                None => ButtonTarget::Action,
            },
        }),
        other => FormControl::Input(InputControl {
            kind: match other {
                SettingType::Password => InputKind::Password,
                SettingType::Time => InputKind::Time,
                _ => InputKind::Text,
            },
            value: match &setting.password_placeholder {
                Some(placeholder) => placeholder.clone(),
                None => display_scalar(&value),
            },
            placeholder: setting.placeholder.clone().unwrap_or_default(),
            changed: false,
        }),
    };

    Some(FormGroup {
        id: setting.html_id.clone().unwrap_or_else(|| keypath.to_string()),
        keypath,
        short_name: setting.name.clone(),
        label: setting.label.clone(),
        help: setting.help.clone(),
        advanced: setting.advanced,
        deprecated: setting.deprecated,
        control,
    })
}

/// 确定设置项的当前值
///
/// 值缺失或为 `null` 时使用描述中的默认值，否则为空字符串。
pub fn resolve_value(setting: &SettingDescription, values: &Value, keypath: &KeyPath) -> Value {
    match keypath::get(values, keypath) {
        Some(value) if !value.is_null() => value.clone(),
        _ => setting
            .default
            .clone()
            .unwrap_or_else(|| Value::String(String::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn panel_with(settings: Vec<SettingDescription>) -> PanelDescription {
        PanelDescription::new("metaverse", settings)
    }

    fn render_one(setting: SettingDescription, values: Value) -> FormGroup {
        let panel = panel_with(vec![setting.clone()]);
        render_setting(&panel, &setting, &values).unwrap()
    }

    #[test]
    fn test_checkbox_defaults() {
        let setting = SettingDescription {
            default: Some(json!(true)),
            ..SettingDescription::new("enable", SettingType::Checkbox)
        };

        let group = render_one(setting.clone(), json!({}));
        assert_eq!(
            group.control,
            FormControl::Checkbox(CheckboxControl { checked: true, changed: false })
        );

        let group = render_one(setting.clone(), json!({ "metaverse": { "enable": null } }));
        assert!(matches!(group.control, FormControl::Checkbox(CheckboxControl { checked: true, .. })));

        let group = render_one(setting, json!({ "metaverse": { "enable": false } }));
        assert!(matches!(group.control, FormControl::Checkbox(CheckboxControl { checked: false, .. })));
    }

    #[test]
    fn test_select_mirrors_hidden_value() {
        let setting = SettingDescription {
            options: vec![
                SelectOption { value: json!("disabled"), label: "None".to_string() },
                SelectOption { value: json!("full"), label: "Full".to_string() },
            ],
            default: Some(json!("disabled")),
            ..SettingDescription::new("automatic_networking", SettingType::Select)
        };

        let mut group = render_one(setting, json!({}));
        let FormControl::Select(select) = &mut group.control else {
            panic!("expected select");
        };
        assert_eq!(select.selected, Some(0));
        assert_eq!(select.value, "disabled");

        assert!(select.select(1));
        assert_eq!(select.value, "full");
        assert!(select.changed);
        assert!(!select.select(5));
    }

    #[test]
    fn test_scalar_inputs() {
        let port = SettingDescription {
            placeholder: Some("40102".to_string()),
            ..SettingDescription::new("port", SettingType::Integer)
        };
        let group = render_one(port, json!({ "metaverse": { "port": 40102 } }));
        assert_eq!(group.keypath.to_string(), "metaverse.port");
        assert_eq!(group.id, "metaverse.port");
        assert_eq!(
            group.control,
            FormControl::Input(InputControl {
                kind: InputKind::Text,
                value: "40102".to_string(),
                placeholder: "40102".to_string(),
                changed: false,
            })
        );

        // 缺失且无默认值时为空字符串
        let group = render_one(SettingDescription::new("id", SettingType::Text), json!({}));
        assert!(matches!(&group.control, FormControl::Input(input) if input.value.is_empty()));

        let password = SettingDescription {
            password_placeholder: Some("******".to_string()),
            ..SettingDescription::new("http_password", SettingType::Password)
        };
        let group = render_one(password, json!({ "metaverse": { "http_password": "hash" } }));
        assert!(matches!(
            &group.control,
            FormControl::Input(InputControl { kind: InputKind::Password, value, .. }) if value == "******"
        ));
    }

    #[test]
    fn test_buttons() {
        let link = SettingDescription {
            href: Some("https://example.com/tokens".to_string()),
            button_label: Some("Get token".to_string()),
            ..SettingDescription::new("token_button", SettingType::Button)
        };
        let group = render_one(link, json!({}));
        assert!(matches!(
            &group.control,
            FormControl::Button(ButtonControl { target: ButtonTarget::Link(href), .. }) if href.ends_with("/tokens")
        ));

        let action = SettingDescription::new("connect", SettingType::Button);
        let group = render_one(action, json!({}));
        assert!(matches!(
            &group.control,
            FormControl::Button(ButtonControl { target: ButtonTarget::Action, .. })
        ));
    }

    #[test]
    fn test_hidden_settings_and_panels() {
        let hidden = SettingDescription {
            hidden: true,
            ..SettingDescription::new("secret", SettingType::Text)
        };
        let visible = SettingDescription::new("label", SettingType::Text);
        let mut panel = panel_with(vec![hidden, visible]);

        let form = render_panel(&panel, &json!({}));
        assert_eq!(form.groups.len(), 1);
        assert_eq!(form.groups[0].short_name, "label");

        panel.hidden = true;
        let form = render_panel(&panel, &json!({}));
        assert!(form.hidden);
        assert!(form.groups.is_empty());
    }

    #[test]
    fn test_render_form_lookup() {
        let table = SettingDescription {
            columns: vec![Default::default()],
            ..SettingDescription::new("places", SettingType::Table)
        };
        let document = SettingsDocument::new(
            vec![panel_with(vec![
                SettingDescription::new("id", SettingType::Text),
                table,
            ])],
            json!({ "metaverse": { "id": "abc" } }),
        );

        let form = render_form(&document);
        let keypath = KeyPath::parse("metaverse.id").unwrap();
        assert_eq!(form.group(&keypath).unwrap().short_name, "id");
        assert_eq!(form.tables().count(), 1);
        assert!(form.panel("metaverse").is_some());
    }
}
