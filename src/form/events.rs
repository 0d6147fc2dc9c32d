/// 表单事件
///
/// 每次修改按“修改 → 重新编号 → 重新比较 → 发布”的顺序处理，
/// 订阅者在最后一步收到事件。

/// 发布给订阅者的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// 面板徽标更新
    PanelBadge { panel: String, count: usize },
    /// 徽标总数更新
    TotalBadge { count: usize },
    /// 保存按钮状态
    SaveButton { enabled: bool, label: &'static str },
    /// 校验失败，保存被阻止
    ValidationFailed { message: String },
    /// 新分类名为空或已存在
    CategoryRejected { table: String, category: String },
    /// 提交失败，随后会重新加载
    SaveFailed { message: String },
    /// 表单已从端点重新加载
    Reloaded,
}

/// 表单事件订阅者
pub trait FormObserver {
    fn notify(&mut self, event: &FormEvent);
}

impl<F> FormObserver for F
where
    F: FnMut(&FormEvent),
{
    fn notify(&mut self, event: &FormEvent) {
        self(event)
    }
}
