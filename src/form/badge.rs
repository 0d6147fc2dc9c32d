/// 修改徽标与重启提示
///
/// 面板徽标是该面板中与快照不同的设置项数量。修改了需要重启的设置项时，
/// 保存按钮的文字变为 "Save and restart"。

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::keypath::KeyPath;
use crate::render::PanelForm;
use crate::schema::PanelDescription;
use crate::table::SerializeMode;

use super::snapshot::Snapshot;

pub const SAVE_BUTTON_LABEL_SAVE: &str = "Save";
pub const SAVE_BUTTON_LABEL_RESTART: &str = "Save and restart";

/// 单个设置项的比较结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingDiff {
    pub keypath: KeyPath,
    pub changed: bool,
    pub restart: bool,
}

/// 设置项是否与快照不同
///
/// 快照中不存在的设置项只要当前值不是空字符串就算修改。
pub fn setting_changed(current: &Value, initial: Option<&Value>) -> bool {
    match initial {
        None => current.as_str() != Some(""),
        Some(initial) => current != initial,
    }
}

/// 比较一个面板与快照
///
/// 只比较有值的设置项；当前表单中不存在的键不计入。
pub fn diff_panel(
    panel: &PanelForm,
    description: &PanelDescription,
    snapshot: &Snapshot,
) -> Vec<SettingDiff> {
    panel
        .groups
        .iter()
        .filter_map(|group| {
            let current = group.serialize(SerializeMode::Full)?;
            Some(SettingDiff {
                changed: setting_changed(&current, snapshot.get(&group.keypath)),
                restart: description.requires_restart(&group.short_name),
                keypath: group.keypath.clone(),
            })
        })
        .collect()
}

/// 所有面板的徽标和重启原因（派生状态）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeState {
    by_panel: BTreeMap<String, usize>,
    /// 按面板记录，每次更新整体替换
    restart_reasons: BTreeMap<String, BTreeSet<String>>,
}

impl BadgeState {
    /// 用一个面板的比较结果更新徽标
    ///
    /// 该面板的重启原因整体替换，不再出现在比较结果中的设置项
    /// （例如变为空的表格）随之移除。
    ///
    /// # 返回
    /// 该面板的新徽标值
    pub fn apply(&mut self, panel: &str, diffs: &[SettingDiff]) -> usize {
        let count = diffs.iter().filter(|diff| diff.changed).count();
        let reasons: BTreeSet<String> = diffs
            .iter()
            .filter(|diff| diff.changed && diff.restart)
            .map(|diff| diff.keypath.to_string())
            .collect();

        if reasons.is_empty() {
            self.restart_reasons.remove(panel);
        } else {
            self.restart_reasons.insert(panel.to_string(), reasons);
        }
        self.by_panel.insert(panel.to_string(), count);
        count
    }

    /// 面板徽标；未知面板为 0
    pub fn panel(&self, name: &str) -> usize {
        self.by_panel.get(name).copied().unwrap_or(0)
    }

    pub fn panels(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_panel.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn total(&self) -> usize {
        self.by_panel.values().sum()
    }

    pub fn has_changes(&self) -> bool {
        self.by_panel.values().any(|count| *count > 0)
    }

    pub fn restart_required(&self) -> bool {
        !self.restart_reasons.is_empty()
    }

    /// 需要重启的已修改设置项（键路径）
    pub fn restart_reasons(&self) -> impl Iterator<Item = &str> {
        self.restart_reasons.values().flatten().map(String::as_str)
    }

    pub fn save_label(&self) -> &'static str {
        if self.restart_required() {
            SAVE_BUTTON_LABEL_RESTART
        } else {
            SAVE_BUTTON_LABEL_SAVE
        }
    }
}
