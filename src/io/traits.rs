/// IO 抽象层 - trait 定义
///
/// 设置端点对应服务端的两个接口：读取设置文档、提交修改后的值。
/// 表单状态只依赖该 trait，便于替换为内存实现做测试。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::SettingsDocument;
use crate::utils::FormError;

/// 提交成功时的状态值
pub const STATUS_SUCCESS: &str = "success";

/// 提交接口的响应 `{ "status": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResponse {
    pub status: String,
}

impl PostResponse {
    pub fn success() -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// 设置端点 trait
///
/// # 职责
/// - `fetch`: 返回 `{ descriptions, values }`
/// - `post`: 接收完整或部分的值树，按服务端规则合并
pub trait SettingsEndpoint {
    /// 读取设置文档
    fn fetch(&self) -> Result<SettingsDocument, FormError>;

    /// 提交值树
    ///
    /// # 返回
    /// 服务端响应；传输层失败返回 `Err`
    fn post(&self, values: &Value) -> Result<PostResponse, FormError>;
}
