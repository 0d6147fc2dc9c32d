/// 表单状态层模块
///
/// 该模块提供有状态的表单编辑接口：快照、差异比较、修改徽标、事件订阅和保存。
/// 遵循"修改-保存分离"原则，所有修改操作仅在内存中进行，需要显式调用保存。
///
/// # 架构设计
///
/// - **snapshot**: 加载后捕获的初始值
/// - **serialize**: 表单到值树的转换
/// - **badge**: 面板差异、徽标和重启提示
/// - **events**: 事件与订阅者
/// - **state**: 表单状态，串起以上所有部分
///
/// # 使用示例
///
/// ```rust,ignore
/// use settings_form::{FormEvent, InMemoryEndpoint, SettingsFormState};
///
/// let endpoint = InMemoryEndpoint::new(document);
/// let mut state = SettingsFormState::load(&endpoint)?;
/// state.subscribe(|event: &FormEvent| println!("{:?}", event));
///
/// state.add_table_row(&keypath, RowDraft::new().with_key("alpha"))?;
/// state.save(&endpoint)?;
/// ```
pub mod snapshot;
pub mod serialize;
pub mod badge;
pub mod events;
pub mod state;

// === 导出公共接口 ===
pub use badge::{
    diff_panel, setting_changed, BadgeState, SettingDiff, SAVE_BUTTON_LABEL_RESTART,
    SAVE_BUTTON_LABEL_SAVE,
};
pub use events::{FormEvent, FormObserver};
pub use snapshot::Snapshot;
pub use state::{SaveOutcome, SettingsFormState};
