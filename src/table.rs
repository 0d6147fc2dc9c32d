/// 表格编辑模块
///
/// 将数组/对象类型的设置作为可编辑表格管理：增删行、分类、排序和键校验。
/// 行的位置、修改标记、无效标记都是显式字段，不依赖展示层的属性。
///
/// # 架构设计
///
/// - **row**: 行、单元格、分类等数据结构
/// - **editor**: 表格编辑器，实现所有修改操作
/// - **validate**: 保存前的键校验
///
/// # 使用示例
///
/// ```rust,ignore
/// use settings_form::table::{RowDraft, TableEditor};
///
/// let mut table = TableEditor::from_setting(&setting, keypath, &value);
/// let id = table.add_row(RowDraft::new().with_key("alpha"))?;
/// table.delete_row(id, snapshot_value)?;
/// ```
pub mod row;
pub mod editor;
pub mod validate;


// === 导出公共接口 ===
pub use editor::{Direction, SerializeMode, TableEditor, TableMode};
pub use row::{
    CategoryInput, Category, CellValue, PlaceholderInput, RowDraft, RowId, TableEntry, TableRow,
    INVALID_FLASH,
};
