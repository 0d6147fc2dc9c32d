/// 服务端合并规则
///
/// 把提交的值树写入已保存的值：
/// - 空字符串删除该键（恢复默认值）
/// - 布尔值、数字直接设置
/// - 对象逐键递归合并，合并后为空则删除
/// - 数组整体替换
/// - `int`/`integer`/`double` 类型的字符串转换为数字
///
/// 描述中不存在的设置会被忽略。

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::schema::{ColumnDescription, PanelDescription, SettingDescription, SettingType};

/// 值需要以 `/` 开头的设置
const VIEWPOINT_KEY: &str = "viewpoint";
/// 键需要以 `/` 开头的表格
const PATHS_KEY: &str = "paths";

/// 合并过程中当前层级对应的描述
#[derive(Clone, Copy)]
enum Described<'a> {
    Setting(&'a SettingDescription),
    Column(&'a ColumnDescription),
}

impl<'a> Described<'a> {
    fn name(&self) -> &str {
        match self {
            Described::Setting(setting) => &setting.name,
            Described::Column(column) => &column.name,
        }
    }

    fn setting_type(&self) -> SettingType {
        match self {
            Described::Setting(setting) => setting.setting_type,
            Described::Column(column) => column.column_type,
        }
    }

    /// 子键的描述：设置本身这一层沿用自身，更深的层按列名查找
    fn child(&self, key: &str, child_key: &str) -> Described<'a> {
        if key == self.name() {
            return *self;
        }
        match *self {
            Described::Setting(setting) => setting
                .column(child_key)
                .map_or(*self, Described::Column),
            Described::Column(_) => *self,
        }
    }
}

/// 把提交的值树合并到已保存的值
///
/// # 参数
/// * `values` - 已保存的值（非对象时会被替换为空对象）
/// * `posted` - 提交的值树
/// * `descriptions` - 面板描述，用于查找设置类型
pub fn merge_posted_values(values: &mut Value, posted: &Value, descriptions: &[PanelDescription]) {
    let Some(posted) = posted.as_object() else {
        debug!("posted settings are not an object, ignoring");
        return;
    };
    if !values.is_object() {
        *values = Value::Object(Map::new());
    }
    let Value::Object(root) = values else {
        return;
    };

    for (root_key, root_value) in posted {
        let group = descriptions
            .iter()
            .find(|panel| panel.grouped && &panel.name == root_key);

        match group {
            Some(panel) => {
                let group_map = object_entry(root, root_key);
                if let Some(settings) = root_value.as_object() {
                    for (setting_key, setting_value) in settings {
                        match panel.setting(setting_key) {
                            Some(setting) => update_setting(
                                setting_key,
                                setting_value,
                                group_map,
                                Described::Setting(setting),
                            ),
                            None => debug!(
                                panel = %root_key,
                                setting = %setting_key,
                                "no description for posted setting, ignoring"
                            ),
                        }
                    }
                }
                if group_map.is_empty() {
                    root.remove(root_key);
                }
            }
            None => {
                let setting = descriptions
                    .iter()
                    .filter(|panel| !panel.grouped)
                    .find_map(|panel| panel.setting(root_key));
                match setting {
                    Some(setting) => {
                        update_setting(root_key, root_value, root, Described::Setting(setting))
                    }
                    None => debug!(setting = %root_key, "no description for posted root setting, ignoring"),
                }
            }
        }
    }
}

fn update_setting(key: &str, new_value: &Value, map: &mut Map<String, Value>, described: Described<'_>) {
    match new_value {
        Value::String(text) if text.is_empty() => {
            map.remove(key);
        }
        Value::String(text) => {
            let value = match described.setting_type() {
                SettingType::Double => Number::from_f64(text.trim().parse::<f64>().unwrap_or(0.0))
                    .map_or(Value::from(0), Value::Number),
                SettingType::Int | SettingType::Integer => Value::from(text.trim().parse::<i64>().unwrap_or(0)),
                _ if key == VIEWPOINT_KEY && !text.starts_with('/') => Value::String(format!("/{}", text)),
                _ => Value::String(text.clone()),
            };
            map.insert(key.to_string(), value);
        }
        Value::Bool(_) | Value::Number(_) => {
            map.insert(key.to_string(), new_value.clone());
        }
        Value::Object(children) => {
            let child_map = object_entry(map, key);
            for (child_key, child_value) in children {
                let child_key_sanitized = if key == PATHS_KEY && !child_key.starts_with('/') {
                    format!("/{}", child_key)
                } else {
                    child_key.clone()
                };
                update_setting(
                    &child_key_sanitized,
                    child_value,
                    child_map,
                    described.child(key, child_key),
                );
            }
            if child_map.is_empty() {
                map.remove(key);
            }
        }
        Value::Array(_) => {
            map.insert(key.to_string(), new_value.clone());
        }
        Value::Null => {}
    }
}

/// 取出 `map[key]` 处的对象，不存在或类型不符时替换为空对象
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        debug!(key, "replacing non-object value while merging settings");
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(inner) => inner,
        _ => unreachable!("entry was just made an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptions() -> Vec<PanelDescription> {
        let mut root_panel = PanelDescription::new(
            "",
            vec![SettingDescription {
                columns: vec![ColumnDescription {
                    name: "viewpoint".to_string(),
                    ..Default::default()
                }],
                key: Some(Default::default()),
                ..SettingDescription::new("paths", SettingType::Table)
            }],
        );
        root_panel.grouped = false;

        vec![
            PanelDescription::new(
                "audio",
                vec![
                    SettingDescription::new("codec", SettingType::Text),
                    SettingDescription::new("gain", SettingType::Double),
                    SettingDescription::new("buffer", SettingType::Int),
                    SettingDescription::new("enabled", SettingType::Checkbox),
                    SettingDescription::new("zones", SettingType::Table),
                ],
            ),
            root_panel,
        ]
    }

    #[test]
    fn test_scalars_and_removal() {
        let mut values = json!({ "audio": { "codec": "opus", "gain": 1.5 } });
        merge_posted_values(
            &mut values,
            &json!({ "audio": { "codec": "", "gain": "2.5", "buffer": "64", "enabled": true } }),
            &descriptions(),
        );

        assert_eq!(values, json!({ "audio": { "gain": 2.5, "buffer": 64, "enabled": true } }));
    }

    #[test]
    fn test_bad_numbers_become_zero() {
        let mut values = json!({});
        merge_posted_values(&mut values, &json!({ "audio": { "buffer": "lots" } }), &descriptions());
        assert_eq!(values, json!({ "audio": { "buffer": 0 } }));
    }

    #[test]
    fn test_empty_group_is_removed() {
        let mut values = json!({ "audio": { "codec": "opus" } });
        merge_posted_values(&mut values, &json!({ "audio": { "codec": "" } }), &descriptions());
        assert_eq!(values, json!({}));
    }

    #[test]
    fn test_arrays_replace_and_unknown_ignored() {
        let mut values = json!({ "audio": { "zones": [{ "name": "a" }, { "name": "b" }] } });
        merge_posted_values(
            &mut values,
            &json!({ "audio": { "zones": [{ "name": "c" }], "mystery": "x" }, "nowhere": 1 }),
            &descriptions(),
        );
        assert_eq!(values, json!({ "audio": { "zones": [{ "name": "c" }] } }));
    }

    #[test]
    fn test_hash_rows_merge_and_tombstones() {
        let mut values = json!({
            "paths": {
                "/": { "viewpoint": "/0,0,0" },
                "/old": { "viewpoint": "/1,1,1" }
            }
        });
        merge_posted_values(
            &mut values,
            &json!({ "paths": { "/old": "", "new": { "viewpoint": "2,2,2" } } }),
            &descriptions(),
        );

        assert_eq!(
            values,
            json!({
                "paths": {
                    "/": { "viewpoint": "/0,0,0" },
                    "/new": { "viewpoint": "/2,2,2" }
                }
            })
        );
    }
}
