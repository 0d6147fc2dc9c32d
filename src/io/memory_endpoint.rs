/// 内存设置端点
///
/// 与文件端点使用相同的合并规则，可以指定下一次提交的结果，
/// 用于测试保存失败后的重新加载。
use std::cell::RefCell;

use serde_json::Value;

use super::merge::merge_posted_values;
use super::traits::{PostResponse, SettingsEndpoint};
use crate::schema::SettingsDocument;
use crate::utils::FormError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PostBehavior {
    Accept,
    /// 返回非成功状态，不修改文档
    Status(String),
    /// 传输层失败
    Fail(String),
}

#[derive(Debug)]
pub struct InMemoryEndpoint {
    document: RefCell<SettingsDocument>,
    behavior: RefCell<PostBehavior>,
    posted: RefCell<Vec<Value>>,
    fetches: RefCell<usize>,
}

impl InMemoryEndpoint {
    pub fn new(document: SettingsDocument) -> Self {
        Self {
            document: RefCell::new(document),
            behavior: RefCell::new(PostBehavior::Accept),
            posted: RefCell::new(Vec::new()),
            fetches: RefCell::new(0),
        }
    }

    /// 之后的提交都返回给定状态
    pub fn respond_with_status(&self, status: &str) {
        *self.behavior.borrow_mut() = PostBehavior::Status(status.to_string());
    }

    /// 之后的提交都以传输错误失败
    pub fn fail_posts(&self, message: &str) {
        *self.behavior.borrow_mut() = PostBehavior::Fail(message.to_string());
    }

    /// 恢复正常提交
    pub fn accept_posts(&self) {
        *self.behavior.borrow_mut() = PostBehavior::Accept;
    }

    /// 当前保存的文档
    pub fn document(&self) -> SettingsDocument {
        self.document.borrow().clone()
    }

    /// 收到的所有提交内容
    pub fn posted(&self) -> Vec<Value> {
        self.posted.borrow().clone()
    }

    /// `fetch` 被调用的次数
    pub fn fetch_count(&self) -> usize {
        *self.fetches.borrow()
    }
}

impl SettingsEndpoint for InMemoryEndpoint {
    fn fetch(&self) -> Result<SettingsDocument, FormError> {
        *self.fetches.borrow_mut() += 1;
        Ok(self.document())
    }

    fn post(&self, values: &Value) -> Result<PostResponse, FormError> {
        self.posted.borrow_mut().push(values.clone());

        match &*self.behavior.borrow() {
            PostBehavior::Accept => {
                let mut document = self.document.borrow_mut();
                let descriptions = document.descriptions.clone();
                merge_posted_values(&mut document.values, values, &descriptions);
                Ok(PostResponse::success())
            }
            PostBehavior::Status(status) => Ok(PostResponse {
                status: status.clone(),
            }),
            PostBehavior::Fail(message) => Err(FormError::Transport(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PanelDescription, SettingDescription, SettingType};
    use serde_json::json;

    fn endpoint() -> InMemoryEndpoint {
        InMemoryEndpoint::new(SettingsDocument::new(
            vec![PanelDescription::new(
                "metaverse",
                vec![SettingDescription::new("id", SettingType::Text)],
            )],
            json!({}),
        ))
    }

    #[test]
    fn test_accepting_merges() {
        let endpoint = endpoint();
        let response = endpoint.post(&json!({ "metaverse": { "id": "abc" } })).unwrap();

        assert!(response.is_success());
        assert_eq!(endpoint.document().values, json!({ "metaverse": { "id": "abc" } }));
        assert_eq!(endpoint.posted().len(), 1);
    }

    #[test]
    fn test_rejections_leave_document() {
        let endpoint = endpoint();

        endpoint.respond_with_status("error");
        let response = endpoint.post(&json!({ "metaverse": { "id": "abc" } })).unwrap();
        assert!(!response.is_success());

        endpoint.fail_posts("connection reset");
        let result = endpoint.post(&json!({ "metaverse": { "id": "abc" } }));
        assert!(matches!(result, Err(FormError::Transport(message)) if message == "connection reset"));

        assert_eq!(endpoint.document().values, json!({}));
        assert_eq!(endpoint.posted().len(), 2);

        endpoint.accept_posts();
        endpoint.fetch().unwrap();
        assert_eq!(endpoint.fetch_count(), 1);
    }
}
