/// IO 抽象层模块
///
/// 该模块提供了设置端点的抽象接口，表单状态通过它读取和提交设置。
/// 支持依赖注入、测试 mock 和替换 IO 实现（如内存 IO、网络 IO 等）。
///
/// # 架构设计
///
/// - **traits**: 定义 `SettingsEndpoint` trait 和提交响应
/// - **merge**: 服务端的值合并规则
/// - **file_endpoint**: 基于 JSON 文件的默认实现
/// - **memory_endpoint**: 内存实现
///
/// # 使用示例
///
/// ```rust,ignore
/// use settings_form::io::{FileSettingsEndpoint, SettingsEndpoint};
///
/// let endpoint = FileSettingsEndpoint::new("settings.json");
/// let document = endpoint.fetch()?;
/// ```
pub mod traits;
pub mod merge;
pub mod file_endpoint;
pub mod memory_endpoint;

// === 导出 trait 定义 ===
pub use traits::{PostResponse, SettingsEndpoint, STATUS_SUCCESS};

// === 导出默认实现 ===
pub use file_endpoint::FileSettingsEndpoint;
pub use memory_endpoint::InMemoryEndpoint;
pub use merge::merge_posted_values;
