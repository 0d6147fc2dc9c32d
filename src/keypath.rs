/// 键路径与值树
///
/// 键路径形如 `network.ports[0].value`，用点分隔对象键、用方括号表示数组下标。
/// 值树即 `serde_json::Value`，本模块提供按键路径读写的辅助函数。

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::utils::FormError;

/// 键路径中的一段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// 对象键
    Key(String),
    /// 数组下标
    Index(usize),
}

/// 解析后的键路径
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    /// 解析键路径字符串
    ///
    /// # 参数
    /// * `text` - 例如 `"panel.setting[2].field"`
    ///
    /// # 返回
    /// 空段、未闭合的方括号或非数字下标都会返回 `InvalidKeyPath`
    pub fn parse(text: &str) -> Result<Self, FormError> {
        let invalid = || FormError::InvalidKeyPath(text.to_string());

        if text.is_empty() {
            return Err(invalid());
        }

        let mut segments = Vec::new();

        for part in text.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            if name.is_empty() {
                return Err(invalid());
            }
            segments.push(Segment::Key(name.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                if !rest.starts_with('[') {
                    return Err(invalid());
                }
                let index = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
            }
        }

        Ok(Self { segments })
    }

    /// 以单个对象键创建
    pub fn root(name: &str) -> Self {
        Self {
            segments: vec![Segment::Key(name.to_string())],
        }
    }

    /// 追加对象键
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        Self { segments }
    }

    /// 追加数组下标
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 第一段对象键（通常是面板名或顶层设置名）
    pub fn first_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// 最后一段对象键（设置的短名）
    pub fn last_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            Segment::Key(key) => Some(key.as_str()),
            Segment::Index(_) => None,
        })
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 按键路径读取值
pub fn get<'a>(tree: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    path.segments().iter().try_fold(tree, |node, segment| match segment {
        Segment::Key(key) => node.as_object()?.get(key),
        Segment::Index(index) => node.as_array()?.get(*index),
    })
}

/// 按键路径写入值
///
/// 缺失的中间节点会被创建；类型不符的中间节点会被替换。
/// 数组下标越界时用 `null` 填充。
pub fn set(tree: &mut Value, path: &KeyPath, value: Value) {
    let mut node = tree;

    for segment in path.segments() {
        match segment {
            Segment::Key(_) if !node.is_object() => *node = Value::Object(Map::new()),
            Segment::Index(_) if !node.is_array() => *node = Value::Array(Vec::new()),
            _ => {}
        }

        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => {
                map.entry(key.clone()).or_insert(Value::Null)
            }
            (Segment::Index(index), Value::Array(items)) => {
                if items.len() <= *index {
                    items.resize(*index + 1, Value::Null);
                }
                &mut items[*index]
            }
            _ => unreachable!("container shape fixed above"),
        };
    }

    *node = value;
}

/// 值的“真值”判断（与设置文档中开关字段的语义一致）
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 标量在输入框中的文本形式
pub fn display_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 宽松相等：按文本形式比较（下拉选项值可能是数字或字符串）
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    a == b || display_scalar(a) == display_scalar(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_display() {
        let path = KeyPath::parse("network.ports[0].value").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("network".to_string()),
                Segment::Key("ports".to_string()),
                Segment::Index(0),
                Segment::Key("value".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "network.ports[0].value");
        assert_eq!(path.first_key(), Some("network"));
        assert_eq!(path.last_key(), Some("value"));

        let nested = KeyPath::parse("grid[1][2]").unwrap();
        assert_eq!(nested.to_string(), "grid[1][2]");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(KeyPath::parse("").is_err());
        assert!(KeyPath::parse("a..b").is_err());
        assert!(KeyPath::parse("a[x]").is_err());
        assert!(KeyPath::parse("a[1").is_err());
        assert!(KeyPath::parse("[1]").is_err());
    }

    #[test]
    fn test_builders() {
        let path = KeyPath::root("security").child("permissions").index(3);
        assert_eq!(path.to_string(), "security.permissions[3]");
    }

    #[test]
    fn test_get_and_set() {
        let mut tree = json!({});
        set(&mut tree, &KeyPath::parse("a.b[2].c").unwrap(), json!("x"));
        assert_eq!(tree, json!({"a": {"b": [null, null, {"c": "x"}]}}));

        assert_eq!(get(&tree, &KeyPath::parse("a.b[2].c").unwrap()), Some(&json!("x")));
        assert_eq!(get(&tree, &KeyPath::parse("a.b[5]").unwrap()), None);
        assert_eq!(get(&tree, &KeyPath::parse("a.missing").unwrap()), None);

        // 覆盖类型不符的中间节点
        set(&mut tree, &KeyPath::parse("a.b.d").unwrap(), json!(1));
        assert_eq!(tree, json!({"a": {"b": {"d": 1}}}));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!(1.5)));
    }

    #[test]
    fn test_display_scalar() {
        assert_eq!(display_scalar(&json!(null)), "");
        assert_eq!(display_scalar(&json!("abc")), "abc");
        assert_eq!(display_scalar(&json!(40102)), "40102");
        assert_eq!(display_scalar(&json!(true)), "true");
        assert!(loose_eq(&json!(2), &json!("2")));
        assert!(!loose_eq(&json!(2), &json!("3")));
    }
}
