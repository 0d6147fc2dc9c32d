/// 设置表单状态
///
/// 持有设置文档、渲染后的表单、快照、徽标和订阅者。
/// 加载时创建，由各个修改操作更新，重新加载时整体重建。

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::io::SettingsEndpoint;
use crate::keypath::{display_scalar, loose_eq, KeyPath};
use crate::render::{render_form, FormControl, FormModel};
use crate::schema::SettingsDocument;
use crate::table::{Direction, RowDraft, RowId, SerializeMode, TableEditor};
use crate::utils::{FormError, ValidationError, SETTINGS_ERROR_MESSAGE};

use super::badge::{diff_panel, BadgeState};
use super::events::{FormEvent, FormObserver};
use super::snapshot::Snapshot;

/// 一次成功保存的结果
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// 提交的值树（仅包含修改过的输入）
    pub posted: Value,
    /// 提交的修改中是否有需要重启的设置
    pub restart_required: bool,
}

/// 设置表单状态
///
/// # 核心特性
/// - **修改-保存分离**: 所有修改只作用于内存中的表单，`save` 时才提交
/// - **派生徽标**: 每次修改后重新比较所在面板并通知订阅者
///
/// # 使用示例
///
/// ```rust,ignore
/// use settings_form::{FileSettingsEndpoint, KeyPath, SettingsFormState};
///
/// let endpoint = FileSettingsEndpoint::new("settings.json");
/// let mut state = SettingsFormState::load(&endpoint)?;
///
/// state.set_value(&KeyPath::parse("metaverse.id")?, &"abc".into())?;
/// println!("{} change(s), {}", state.badges().total(), state.save_label());
///
/// state.save(&endpoint)?;
/// ```
pub struct SettingsFormState {
    document: SettingsDocument,
    form: FormModel,
    snapshot: Snapshot,
    badges: BadgeState,
    observers: Vec<Box<dyn FormObserver>>,
}

impl SettingsFormState {
    /// 从设置文档创建表单状态
    ///
    /// 应用 `show_on_enable` 门控后渲染表单并立即捕获快照。
    pub fn new(mut document: SettingsDocument) -> Self {
        document.apply_visibility();
        let form = render_form(&document);
        let snapshot = Snapshot::capture(&form);

        let mut state = Self {
            document,
            form,
            snapshot,
            badges: BadgeState::default(),
            observers: Vec::new(),
        };
        state.recompute_all();
        state
    }

    /// 从端点读取设置并创建表单状态
    pub fn load(endpoint: &dyn SettingsEndpoint) -> Result<Self, FormError> {
        let document = endpoint.fetch()?;
        info!(panels = document.descriptions.len(), "settings form loaded");
        Ok(Self::new(document))
    }

    /// 丢弃所有修改，从端点重新加载
    ///
    /// 订阅者保留，并收到 `Reloaded` 和新的徽标。
    pub fn reload(&mut self, endpoint: &dyn SettingsEndpoint) -> Result<(), FormError> {
        let document = endpoint.fetch()?;
        let observers = std::mem::take(&mut self.observers);

        *self = Self::new(document);
        self.observers = observers;

        debug!("settings form reloaded");
        self.publish(FormEvent::Reloaded);
        self.publish_badges();
        Ok(())
    }

    /// 添加订阅者
    pub fn subscribe<O>(&mut self, observer: O)
    where
        O: FormObserver + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    // === 查询 ===

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    pub fn form(&self) -> &FormModel {
        &self.form
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn badges(&self) -> &BadgeState {
        &self.badges
    }

    /// 当前完整的值树
    pub fn current_values(&self) -> Value {
        self.form.serialize(SerializeMode::Full)
    }

    /// 仅包含修改过的输入的值树（保存时提交的内容）
    pub fn changed_values(&self) -> Value {
        self.form.serialize(SerializeMode::ChangedOnly)
    }

    pub fn is_save_enabled(&self) -> bool {
        self.badges.has_changes()
    }

    pub fn save_label(&self) -> &'static str {
        self.badges.save_label()
    }

    pub fn table(&self, keypath: &KeyPath) -> Option<&TableEditor> {
        self.form.tables().find(|table| table.keypath() == keypath)
    }

    // === 标量设置 ===

    /// 修改复选框、输入框或下拉框的值
    ///
    /// # 行为
    /// - 复选框只接受布尔值
    /// - 输入框接受任意标量，按文本保存
    /// - 下拉框的值必须与某个选项相等（数字与字符串可互相比较）
    pub fn set_value(&mut self, keypath: &KeyPath, value: &Value) -> Result<(), FormError> {
        let (panel, group) = self
            .form
            .group_mut(keypath)
            .ok_or_else(|| FormError::UnknownSetting(keypath.to_string()))?;
        let panel = panel.to_string();

        match &mut group.control {
            FormControl::Checkbox(checkbox) => {
                let Value::Bool(checked) = value else {
                    return Err(FormError::TypeMismatch(keypath.to_string()));
                };
                checkbox.checked = *checked;
                checkbox.changed = true;
            }
            FormControl::Input(input) => {
                if value.is_object() || value.is_array() {
                    return Err(FormError::TypeMismatch(keypath.to_string()));
                }
                input.value = display_scalar(value);
                input.changed = true;
            }
            FormControl::Select(select) => {
                let index = select
                    .options
                    .iter()
                    .position(|option| loose_eq(&option.value, value))
                    .ok_or_else(|| FormError::UnknownOption(keypath.to_string()))?;
                select.select(index);
            }
            FormControl::Table(_) | FormControl::Button(_) => {
                return Err(FormError::TypeMismatch(keypath.to_string()));
            }
        }

        debug!(setting = %keypath, "setting changed");
        self.badge_for_panel(&panel);
        Ok(())
    }

    /// 按下标选择下拉框选项
    pub fn select_option(&mut self, keypath: &KeyPath, index: usize) -> Result<(), FormError> {
        let (panel, group) = self
            .form
            .group_mut(keypath)
            .ok_or_else(|| FormError::UnknownSetting(keypath.to_string()))?;
        let panel = panel.to_string();

        let FormControl::Select(select) = &mut group.control else {
            return Err(FormError::TypeMismatch(keypath.to_string()));
        };
        if !select.select(index) {
            return Err(FormError::UnknownOption(keypath.to_string()));
        }

        self.badge_for_panel(&panel);
        Ok(())
    }

    // === 表格 ===

    /// 查找表格及其所在面板，并取出快照中该表格的值
    fn table_target(
        &mut self,
        keypath: &KeyPath,
    ) -> Result<(String, Option<Value>, &mut TableEditor), FormError> {
        let initial = self.snapshot.get(keypath).cloned();
        let (panel, group) = self
            .form
            .group_mut(keypath)
            .ok_or_else(|| FormError::UnknownTable(keypath.to_string()))?;

        match &mut group.control {
            FormControl::Table(table) => Ok((panel.to_string(), initial, table)),
            _ => Err(FormError::UnknownTable(keypath.to_string())),
        }
    }

    /// 表格修改的收尾：成功时重新比较面板，校验失败时通知订阅者
    fn finish_table_edit<T>(
        &mut self,
        keypath: &KeyPath,
        panel: &str,
        result: Result<T, FormError>,
    ) -> Result<T, FormError> {
        match &result {
            Ok(_) => self.badge_for_panel(panel),
            Err(FormError::Validation(err)) => {
                warn!(table = %keypath, error = %err, "table edit rejected");
                self.publish(FormEvent::ValidationFailed {
                    message: err.to_string(),
                });
            }
            Err(err) => warn!(table = %keypath, error = %err, "table edit rejected"),
        }
        result
    }

    pub fn add_table_row(&mut self, keypath: &KeyPath, draft: RowDraft) -> Result<RowId, FormError> {
        let (panel, _, table) = self.table_target(keypath)?;
        let result = table.add_row(draft);
        self.finish_table_edit(keypath, &panel, result)
    }

    pub fn delete_table_row(&mut self, keypath: &KeyPath, id: RowId) -> Result<(), FormError> {
        let (panel, initial, table) = self.table_target(keypath)?;
        let result = table.delete_row(id, initial.as_ref());
        self.finish_table_edit(keypath, &panel, result)
    }

    /// 修改新行的键
    pub fn set_table_row_key(&mut self, keypath: &KeyPath, id: RowId, key: &str) -> Result<(), FormError> {
        let (panel, _, table) = self.table_target(keypath)?;
        let result = table.set_row_key(id, key);
        self.finish_table_edit(keypath, &panel, result)
    }

    pub fn set_table_cell(
        &mut self,
        keypath: &KeyPath,
        id: RowId,
        column: &str,
        value: &Value,
    ) -> Result<(), FormError> {
        let (panel, _, table) = self.table_target(keypath)?;
        let result = table.set_cell(id, column, value);
        self.finish_table_edit(keypath, &panel, result)
    }

    /// 上下移动一行
    ///
    /// # 返回
    /// 是否实际发生了移动
    pub fn move_table_row(
        &mut self,
        keypath: &KeyPath,
        id: RowId,
        direction: Direction,
    ) -> Result<bool, FormError> {
        let (panel, initial, table) = self.table_target(keypath)?;
        let result = table.move_row(id, direction, initial.as_ref());
        self.finish_table_edit(keypath, &panel, result)
    }

    /// 添加分类；名称冲突时通知订阅者
    pub fn add_table_category(&mut self, keypath: &KeyPath, name: &str) -> Result<Option<RowId>, FormError> {
        let (panel, _, table) = self.table_target(keypath)?;
        let result = table.add_category(name);

        if let Err(FormError::CategoryConflict(category)) = &result {
            self.publish(FormEvent::CategoryRejected {
                table: keypath.to_string(),
                category: category.clone(),
            });
        }
        self.finish_table_edit(keypath, &panel, result)
    }

    pub fn delete_table_category(&mut self, keypath: &KeyPath, name: &str) -> Result<(), FormError> {
        let (panel, initial, table) = self.table_target(keypath)?;
        let result = table.delete_category(name, initial.as_ref());
        self.finish_table_edit(keypath, &panel, result)
    }

    /// 展开/折叠分类；不影响徽标
    pub fn toggle_table_category(&mut self, keypath: &KeyPath, name: &str) -> Result<bool, FormError> {
        let (_, _, table) = self.table_target(keypath)?;
        table.toggle_category(name)
    }

    // === 徽标 ===

    /// 重新比较一个面板并发布徽标；未知面板什么也不做
    pub fn badge_for_panel(&mut self, panel: &str) {
        let Some(count) = self.recompute_panel(panel) else {
            return;
        };

        self.publish(FormEvent::PanelBadge {
            panel: panel.to_string(),
            count,
        });
        self.publish_totals();
    }

    /// 重新比较所有面板并发布徽标
    pub fn refresh_badges(&mut self) {
        self.recompute_all();
        self.publish_badges();
    }

    fn recompute_panel(&mut self, name: &str) -> Option<usize> {
        let panel = self.form.panel(name)?;
        let description = self.document.panel(name)?;
        let diffs = diff_panel(panel, description, &self.snapshot);

        let count = self.badges.apply(name, &diffs);
        debug!(panel = name, count, "panel badge updated");
        Some(count)
    }

    fn recompute_all(&mut self) {
        let names: Vec<String> = self.form.panels.iter().map(|panel| panel.name.clone()).collect();
        for name in names {
            self.recompute_panel(&name);
        }
    }

    fn publish_badges(&mut self) {
        let panels: Vec<(String, usize)> = self
            .badges
            .panels()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        for (panel, count) in panels {
            self.publish(FormEvent::PanelBadge { panel, count });
        }
        self.publish_totals();
    }

    fn publish_totals(&mut self) {
        let total = FormEvent::TotalBadge {
            count: self.badges.total(),
        };
        let save = FormEvent::SaveButton {
            enabled: self.badges.has_changes(),
            label: self.badges.save_label(),
        };
        self.publish(total);
        self.publish(save);
    }

    fn publish(&mut self, event: FormEvent) {
        for observer in &mut self.observers {
            observer.notify(&event);
        }
    }

    // === 校验与保存 ===

    /// 校验所有表格的新行
    ///
    /// 先清除所有无效标记，再逐个表格校验；出错的行都会被标记，
    /// 报告第一个出错表格的错误。
    pub fn validate_inputs(&mut self) -> Result<(), ValidationError> {
        for table in self.form.tables_mut() {
            table.clear_invalid();
        }

        let mut first_error = None;
        for table in self.form.tables_mut() {
            if let Err(err) = table.validate_keys() {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => {
                warn!(error = %err, "settings validation failed");
                self.publish(FormEvent::ValidationFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// 校验并提交修改过的输入
    ///
    /// # 行为
    /// - 校验失败：不提交，返回 `Validation` 错误
    /// - 提交成功：从端点重新加载
    /// - 非成功状态或传输失败：通知订阅者，重新加载，返回 `Transport` 错误
    pub fn save(&mut self, endpoint: &dyn SettingsEndpoint) -> Result<SaveOutcome, FormError> {
        self.validate_inputs()?;

        let posted = self.changed_values();
        let restart_required = self.badges.restart_required();
        debug!(changes = self.badges.total(), restart_required, "posting settings");

        let failure = match endpoint.post(&posted) {
            Ok(response) if response.is_success() => {
                info!(restart_required, "settings saved");
                self.reload(endpoint)?;
                return Ok(SaveOutcome {
                    posted,
                    restart_required,
                });
            }
            Ok(response) => response.status,
            Err(FormError::Transport(message)) => message,
            Err(err) => err.to_string(),
        };

        warn!(reason = %failure, "saving settings failed, reloading");
        self.publish(FormEvent::SaveFailed {
            message: SETTINGS_ERROR_MESSAGE.to_string(),
        });
        self.reload(endpoint)?;
        Err(FormError::Transport(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PanelDescription, SelectOption, SettingDescription, SettingType};
    use serde_json::json;

    fn document() -> SettingsDocument {
        SettingsDocument::new(
            vec![PanelDescription::new(
                "metaverse",
                vec![
                    SettingDescription::new("id", SettingType::Text),
                    SettingDescription::new("enable", SettingType::Checkbox),
                    SettingDescription {
                        options: vec![
                            SelectOption { value: json!(0), label: "Off".to_string() },
                            SelectOption { value: json!(1), label: "On".to_string() },
                        ],
                        ..SettingDescription::new("mode", SettingType::Select)
                    },
                    SettingDescription::new("connect", SettingType::Button),
                ],
            )],
            json!({ "metaverse": { "id": "abc", "enable": false, "mode": 0 } }),
        )
    }

    fn keypath(text: &str) -> KeyPath {
        KeyPath::parse(text).unwrap()
    }

    #[test]
    fn test_fresh_state_is_clean() {
        let state = SettingsFormState::new(document());
        assert_eq!(state.badges().total(), 0);
        assert!(!state.is_save_enabled());
        assert_eq!(state.changed_values(), json!({}));
        assert_eq!(state.current_values(), *state.snapshot().values());
    }

    #[test]
    fn test_set_value_type_checks() {
        let mut state = SettingsFormState::new(document());

        assert!(matches!(
            state.set_value(&keypath("metaverse.enable"), &json!("yes")),
            Err(FormError::TypeMismatch(_))
        ));
        assert!(matches!(
            state.set_value(&keypath("metaverse.mode"), &json!(7)),
            Err(FormError::UnknownOption(_))
        ));
        assert!(matches!(
            state.set_value(&keypath("metaverse.connect"), &json!(true)),
            Err(FormError::TypeMismatch(_))
        ));
        assert!(matches!(
            state.set_value(&keypath("metaverse.missing"), &json!("x")),
            Err(FormError::UnknownSetting(_))
        ));
        assert_eq!(state.badges().total(), 0);
    }

    #[test]
    fn test_select_accepts_loose_values() {
        let mut state = SettingsFormState::new(document());

        // 快照中的值是数字 0，下拉框以文本 "0" 提交
        assert_eq!(state.snapshot().values()["metaverse"]["mode"], json!("0"));

        state.set_value(&keypath("metaverse.mode"), &json!("1")).unwrap();
        assert_eq!(state.badges().panel("metaverse"), 1);

        state.select_option(&keypath("metaverse.mode"), 0).unwrap();
        assert_eq!(state.badges().panel("metaverse"), 0);
        assert!(matches!(
            state.select_option(&keypath("metaverse.mode"), 9),
            Err(FormError::UnknownOption(_))
        ));
    }

    #[test]
    fn test_unknown_panel_badge_is_noop() {
        let mut state = SettingsFormState::new(document());
        let events = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = events.clone();
        state.subscribe(move |event: &FormEvent| sink.borrow_mut().push(event.clone()));

        state.badge_for_panel("nowhere");
        assert!(events.borrow().is_empty());

        state.badge_for_panel("metaverse");
        assert_eq!(
            events.borrow().first(),
            Some(&FormEvent::PanelBadge { panel: "metaverse".to_string(), count: 0 })
        );
    }

    #[test]
    fn test_emptied_table_clears_restart_label() {
        let document = SettingsDocument::new(
            vec![PanelDescription::new(
                "security",
                vec![SettingDescription {
                    key: Some(Default::default()),
                    columns: vec![crate::schema::ColumnDescription {
                        name: "note".to_string(),
                        ..Default::default()
                    }],
                    can_add_new_rows: true,
                    ..SettingDescription::new("permissions", SettingType::Table)
                }],
            )],
            json!({ "security": { "permissions": {} } }),
        );
        let mut state = SettingsFormState::new(document);
        let permissions = keypath("security.permissions");

        let guest = state
            .add_table_row(&permissions, RowDraft::new().with_key("guest"))
            .unwrap();
        assert_eq!(state.save_label(), "Save and restart");

        state.delete_table_row(&permissions, guest).unwrap();
        assert_eq!(state.badges().total(), 0);
        assert!(!state.badges().restart_required());
        assert_eq!(state.save_label(), "Save");
        assert!(!state.is_save_enabled());
    }
}
