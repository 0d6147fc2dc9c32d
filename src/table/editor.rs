/// 表格编辑器
///
/// 将数组或对象类型的设置渲染为可编辑表格，并实现增删行、分类、排序。
/// 编辑器本身不知道快照，需要快照比较的操作由调用方传入该表格的初始值。

use std::time::Instant;

use serde_json::{Map, Value};
use tracing::debug;

use crate::keypath::{display_scalar, KeyPath};
use crate::schema::{ColumnDescription, KeyDescription, SettingDescription, SettingType};
use crate::utils::FormError;

use super::row::{
    CategoryInput, Category, CellValue, PlaceholderInput, RowDraft, RowId, TableEntry, TableRow,
};

static NULL: Value = Value::Null;

/// 表格模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    /// 无键列：有序列表，可排序
    Array,
    /// 有键列：按键映射，不可排序
    Hash,
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// 序列化范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeMode {
    /// 所有输入（用于快照和差异比较）
    Full,
    /// 仅已修改的输入（用于保存）
    ChangedOnly,
}

/// 单个表格设置的编辑状态
#[derive(Debug, Clone, PartialEq)]
pub struct TableEditor {
    keypath: KeyPath,
    short_name: String,
    mode: TableMode,
    columns: Vec<ColumnDescription>,
    key: Option<KeyDescription>,
    can_order: bool,
    can_add_new_rows: bool,
    can_add_new_categories: bool,
    categorize_by_key: Option<String>,
    read_only: bool,
    numbered: bool,
    new_category_message: String,
    rows: Vec<TableRow>,
    categories: Vec<Category>,
    tombstones: Vec<String>,
    empty_placeholder: bool,
    category_input: CategoryInput,
    next_id: u64,
}

impl TableEditor {
    /// 根据设置描述和当前值构建表格
    ///
    /// # 参数
    /// * `setting` - 表格设置的描述
    /// * `keypath` - 表格在值树中的键路径
    /// * `value` - 当前值（数组或对象；其他类型视为空表）
    pub fn from_setting(setting: &SettingDescription, keypath: KeyPath, value: &Value) -> Self {
        let mode = if setting.key.is_some() {
            TableMode::Hash
        } else {
            TableMode::Array
        };

        let mut editor = Self {
            keypath,
            short_name: setting.name.clone(),
            mode,
            columns: setting.columns.clone(),
            key: setting.key.clone(),
            // 哈希表格不支持排序
            can_order: setting.can_order && mode == TableMode::Array,
            can_add_new_rows: setting.can_add_new_rows,
            can_add_new_categories: setting.can_add_new_categories,
            categorize_by_key: setting
                .categorize_by_key
                .clone()
                .filter(|_| mode == TableMode::Array),
            read_only: setting.read_only,
            numbered: setting.numbered,
            new_category_message: setting.new_category_message.clone().unwrap_or_default(),
            rows: Vec::new(),
            categories: Vec::new(),
            tombstones: Vec::new(),
            empty_placeholder: false,
            category_input: CategoryInput::default(),
            next_id: 0,
        };

        editor.populate(setting, value);
        editor
    }

    fn populate(&mut self, setting: &SettingDescription, value: &Value) {
        let row_is_object = self.columns.len() > 1;

        let entries: Vec<(Option<String>, &Value)> = match (self.mode, value) {
            (TableMode::Array, Value::Array(items)) => items.iter().map(|row| (None, row)).collect(),
            (TableMode::Hash, Value::Object(map)) => {
                map.iter().map(|(key, row)| (Some(key.clone()), row)).collect()
            }
            _ => Vec::new(),
        };

        for (key, row_value) in entries {
            let mut non_deletable = !setting.can_add_new_rows;
            let mut cells = Vec::with_capacity(self.columns.len());

            for column in &self.columns {
                let column_value = if self.mode == TableMode::Array && !row_is_object {
                    row_value
                } else {
                    row_value.get(&column.name).unwrap_or(&NULL)
                };

                non_deletable = non_deletable
                    || (setting.non_deletable_row_key.as_deref() == Some(column.name.as_str())
                        && setting
                            .non_deletable_row_values
                            .iter()
                            .any(|sentinel| sentinel == column_value));

                cells.push(existing_cell(column, column_value));
            }

            let category = self.categorize_by_key.as_ref().map(|category_key| {
                let category_value = if row_is_object {
                    row_value.get(category_key).unwrap_or(&NULL)
                } else {
                    row_value
                };
                display_scalar(category_value)
            });

            if let Some(name) = &category {
                if !self.categories.iter().any(|c| &c.name == name) {
                    self.categories
                        .push(Category::existing(name, self.can_add_new_categories));
                }
            }

            let id = self.allocate_id();
            self.rows.push(TableRow {
                id,
                index: self.rows.len(),
                key,
                cells,
                category,
                is_new: false,
                non_deletable,
                dirty: false,
                invalid: false,
            });
        }
    }

    fn allocate_id(&mut self) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        id
    }

    // === 查询 ===

    pub fn keypath(&self) -> &KeyPath {
        &self.keypath
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn mode(&self) -> TableMode {
        self.mode
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    pub fn key_description(&self) -> Option<&KeyDescription> {
        self.key.as_ref()
    }

    pub fn can_order(&self) -> bool {
        self.can_order
    }

    pub fn is_categorized(&self) -> bool {
        self.categorize_by_key.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [TableRow] {
        &mut self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&TableRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.name == name)
    }

    pub fn category_input(&self) -> &CategoryInput {
        &self.category_input
    }

    /// 已删除的哈希键；重新添加同名行后不再以空值提交
    pub fn tombstones(&self) -> &[String] {
        &self.tombstones
    }

    /// 表格为空时的占位输入，名称为去掉 `[]` 的表格键路径
    pub fn placeholder(&self) -> Option<PlaceholderInput> {
        self.empty_placeholder.then(|| PlaceholderInput {
            name: self.keypath.to_string().replace("[]", ""),
            value: String::new(),
            changed: true,
        })
    }

    /// 行号（从 1 开始），仅 `numbered` 表格有意义
    pub fn row_number(&self, id: RowId) -> Option<usize> {
        if !self.numbered {
            return None;
        }
        self.position(id).map(|pos| pos + 1)
    }

    /// 单元格输入的名称
    ///
    /// 数组模式为 `table[index]` 或 `table[index].column`，
    /// 哈希模式为 `table.key.column`；未填写键的新行没有名称。
    pub fn cell_name(&self, id: RowId, column: &str) -> Option<String> {
        let row = self.row(id)?;
        self.column_index(column)?;

        match self.mode {
            TableMode::Array => {
                let base = self.keypath.index(row.index);
                let path = if self.columns.len() > 1 {
                    base.child(column)
                } else {
                    base
                };
                Some(path.to_string())
            }
            TableMode::Hash => row
                .key
                .as_deref()
                .filter(|key| !key.is_empty())
                .map(|key| format!("{}.{}.{}", self.keypath, key, column)),
        }
    }

    /// 按展示顺序列出分类标题、数据行和占位输入
    pub fn entries(&self) -> Vec<TableEntry<'_>> {
        let mut entries = Vec::new();

        if self.is_categorized() {
            for category in &self.categories {
                entries.push(TableEntry::CategoryHeader(category));
                for row in self.rows.iter().filter(|row| row.category.as_ref() == Some(&category.name)) {
                    entries.push(TableEntry::Row { row, visible: category.expanded });
                }
            }
            for row in self.rows.iter().filter(|row| !self.has_category_header(row)) {
                entries.push(TableEntry::Row { row, visible: true });
            }
        } else {
            entries.extend(self.rows.iter().map(|row| TableEntry::Row { row, visible: true }));
        }

        if let Some(placeholder) = self.placeholder() {
            entries.push(TableEntry::Placeholder(placeholder));
        }

        entries
    }

    fn has_category_header(&self, row: &TableRow) -> bool {
        row.category
            .as_ref()
            .map_or(false, |name| self.categories.iter().any(|c| &c.name == name))
    }

    fn has_live_key(&self, key: &str) -> bool {
        self.rows.iter().any(|row| row.key.as_deref() == Some(key))
    }

    fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == column)
    }

    fn category_position(&self, category: Option<&String>) -> usize {
        category
            .and_then(|name| self.categories.iter().position(|c| &c.name == name))
            .unwrap_or(self.categories.len())
    }

    fn name(&self) -> String {
        self.keypath.to_string()
    }

    // === 序列化 ===

    /// 当前表格值
    ///
    /// 没有任何可提交的输入时返回 `None`（键不会出现在值树中）。
    /// 只剩占位输入时返回空字符串。
    pub fn serialize(&self, mode: SerializeMode) -> Option<Value> {
        let include = |row: &TableRow| mode == SerializeMode::Full || row.dirty;
        let row_is_object = self.columns.len() > 1;

        match self.mode {
            TableMode::Array => {
                let items: Vec<Value> = self
                    .rows
                    .iter()
                    .filter(|row| include(row))
                    .map(|row| {
                        if row_is_object {
                            Value::Object(self.row_object(row))
                        } else {
                            row.cells.first().map_or(Value::Null, CellValue::to_json)
                        }
                    })
                    .collect();

                if !items.is_empty() {
                    Some(Value::Array(items))
                } else if self.empty_placeholder {
                    Some(Value::String(String::new()))
                } else {
                    None
                }
            }
            TableMode::Hash => {
                let mut map = Map::new();

                for row in self.rows.iter().filter(|row| include(row)) {
                    if let Some(key) = row.key.as_deref().filter(|key| !key.is_empty()) {
                        map.insert(key.to_string(), Value::Object(self.row_object(row)));
                    }
                }

                // 同名的新行覆盖墓碑
                for key in self.tombstones.iter().filter(|key| !self.has_live_key(key)) {
                    map.insert(key.clone(), Value::String(String::new()));
                }

                (!map.is_empty()).then(|| Value::Object(map))
            }
        }
    }

    fn row_object(&self, row: &TableRow) -> Map<String, Value> {
        self.columns
            .iter()
            .zip(&row.cells)
            .map(|(column, cell)| (column.name.clone(), cell.to_json()))
            .collect()
    }

    /// 表格是否与快照中的值不同
    pub fn has_changed(&self, initial: Option<&Value>) -> bool {
        self.serialize(SerializeMode::Full).as_ref() != initial
    }

    // === 行操作 ===

    /// 添加新行
    ///
    /// 哈希模式下键必须非空、不含空白且不与已有键重复（大小写不敏感），
    /// 否则不添加并返回校验错误。数组模式下其他行全部标记为已修改。
    ///
    /// # 返回
    /// 新行的标识
    pub fn add_row(&mut self, draft: RowDraft) -> Result<RowId, FormError> {
        if self.read_only {
            return Err(FormError::ReadOnlyTable(self.name()));
        }
        if !self.can_add_new_rows && !self.can_add_new_categories {
            return Err(FormError::RowsLocked(self.name()));
        }

        let key = match self.mode {
            TableMode::Hash => {
                let key = draft.key.clone().unwrap_or_default();
                self.check_new_key(&key, None)?;
                Some(key)
            }
            TableMode::Array => None,
        };

        let mut cells = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let cell = match draft.value_for(&column.name) {
                Some(value) => CellValue::from_json(column, value),
                None => CellValue::template(column),
            };
            cells.push(cell);
        }

        let category = self.draft_category(&draft, &mut cells);
        if let Some(name) = &category {
            if self.category(name).is_none() {
                self.categories.push(Category::existing(name, true));
            }
        }

        let id = self.allocate_id();
        let row = TableRow {
            id,
            index: 0,
            key,
            cells,
            category,
            is_new: true,
            non_deletable: false,
            dirty: true,
            invalid: false,
        };

        match row.category.as_ref() {
            Some(name) => {
                let insert_at = self
                    .rows
                    .iter()
                    .rposition(|r| r.category.as_ref() == Some(name))
                    .map_or(self.rows.len(), |pos| pos + 1);
                self.rows.insert(insert_at, row);
                self.sort_by_category();
            }
            None => self.rows.push(row),
        }

        if self.mode == TableMode::Array {
            for sibling in &mut self.rows {
                sibling.dirty = true;
            }
            self.empty_placeholder = false;
            self.restamp_indices();
        }

        debug!(table = %self.keypath, row = %id, "table row added");
        Ok(id)
    }

    /// 分类表格中新行所属的分类；分类列的值与分类保持一致
    fn draft_category(&self, draft: &RowDraft, cells: &mut [CellValue]) -> Option<String> {
        let category_key = self.categorize_by_key.as_ref()?;
        let column = self.column_index(category_key);

        let category = draft
            .category
            .clone()
            .or_else(|| column.map(|idx| cells[idx].as_text()))
            .filter(|name| !name.is_empty())?;

        if let Some(idx) = column {
            cells[idx] = CellValue::Text(category.clone());
        }
        Some(category)
    }

    /// 删除行
    ///
    /// # 行为
    /// - 哈希模式：已有行变为以空值提交的墓碑，新行直接移除
    /// - 数组模式：分类中的最后一行会连同分类标题一起移除；
    ///   表格中的最后一行不会移除，而是替换为空值占位输入
    ///
    /// # 参数
    /// * `initial` - 快照中该表格的值，用于重新标记其他行
    pub fn delete_row(&mut self, id: RowId, initial: Option<&Value>) -> Result<(), FormError> {
        if self.read_only {
            return Err(FormError::ReadOnlyTable(self.name()));
        }
        let row = self.row(id).ok_or(FormError::RowNotFound(id))?;
        if row.non_deletable {
            return Err(FormError::RowNotDeletable(id));
        }

        self.remove_row(id, initial)
    }

    fn remove_row(&mut self, id: RowId, initial: Option<&Value>) -> Result<(), FormError> {
        let pos = self.position(id).ok_or(FormError::RowNotFound(id))?;

        match self.mode {
            TableMode::Hash => {
                let row = self.rows.remove(pos);
                if !row.is_new {
                    if let Some(key) = row.key {
                        self.tombstones.push(key);
                    }
                }
            }
            TableMode::Array => {
                if let Some(name) = self.rows[pos].category.clone() {
                    let remaining = self
                        .rows
                        .iter()
                        .filter(|r| r.category.as_ref() == Some(&name))
                        .count();
                    if remaining <= 1 {
                        self.categories.retain(|c| c.name != name);
                    }
                }

                if self.rows.len() > 1 {
                    self.rows.remove(pos);
                    self.restamp_indices();
                    let changed = self.has_changed(initial);
                    self.stamp_rows(changed);
                } else {
                    self.rows.remove(pos);
                    self.empty_placeholder = true;
                }
            }
        }

        debug!(table = %self.keypath, row = %id, "table row deleted");
        Ok(())
    }

    /// 修改新行的键（哈希模式）
    ///
    /// 与输入时一致，不做校验；保存前的校验会检查。
    pub fn set_row_key(&mut self, id: RowId, key: &str) -> Result<(), FormError> {
        if self.mode != TableMode::Hash {
            return Err(FormError::KeyNotEditable(id));
        }
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(FormError::RowNotFound(id))?;
        if !row.is_new {
            return Err(FormError::KeyNotEditable(id));
        }

        row.key = Some(key.to_string());
        row.dirty = true;
        Ok(())
    }

    /// 修改单元格
    ///
    /// 已有行只能修改标记为 `editable` 的复选框/时间列；
    /// 数组模式下修改后其他行全部标记为已修改。
    pub fn set_cell(&mut self, id: RowId, column: &str, value: &Value) -> Result<(), FormError> {
        if self.read_only {
            return Err(FormError::ReadOnlyTable(self.name()));
        }
        let col_idx = self
            .column_index(column)
            .ok_or_else(|| FormError::UnknownColumn(column.to_string()))?;
        let pos = self.position(id).ok_or(FormError::RowNotFound(id))?;

        let description = &self.columns[col_idx];
        let editable_in_place = description.editable
            && matches!(description.column_type, SettingType::Checkbox | SettingType::Time);
        if description.readonly || (!self.rows[pos].is_new && !editable_in_place) {
            return Err(FormError::CellNotEditable(format!("{}.{}", self.keypath, column)));
        }

        let cell = CellValue::from_json(description, value);
        let row = &mut self.rows[pos];
        row.cells[col_idx] = cell;
        row.dirty = true;

        if self.mode == TableMode::Array {
            self.stamp_rows(true);
        }
        Ok(())
    }

    /// 上下移动一行（仅数组模式）
    ///
    /// 与同一分类中展示顺序上的相邻行交换，跳过其他分类的行。移动后重新编号，
    /// 并按整个表格是否与快照不同标记所有行。
    ///
    /// # 返回
    /// 是否实际发生了移动
    pub fn move_row(
        &mut self,
        id: RowId,
        direction: Direction,
        initial: Option<&Value>,
    ) -> Result<bool, FormError> {
        if self.mode != TableMode::Array || !self.can_order {
            debug!(table = %self.keypath, "reorder ignored for this table");
            return Ok(false);
        }
        if self.read_only {
            return Err(FormError::ReadOnlyTable(self.name()));
        }
        let pos = self.position(id).ok_or(FormError::RowNotFound(id))?;

        let category = &self.rows[pos].category;
        let same_category = |other: &usize| &self.rows[*other].category == category;
        let neighbour = match direction {
            Direction::Up => (0..pos).rev().find(same_category),
            Direction::Down => (pos + 1..self.rows.len()).find(same_category),
        };
        let moved = match neighbour {
            Some(other) => {
                self.rows.swap(pos, other);
                true
            }
            None => false,
        };

        self.restamp_indices();
        let changed = self.has_changed(initial);
        self.stamp_rows(changed);

        Ok(moved)
    }

    fn restamp_indices(&mut self) {
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.index = index;
        }
    }

    fn stamp_rows(&mut self, dirty: bool) {
        for row in &mut self.rows {
            row.dirty = dirty;
        }
    }

    fn sort_by_category(&mut self) {
        let order: Vec<usize> = self
            .rows
            .iter()
            .map(|row| self.category_position(row.category.as_ref()))
            .collect();
        let mut keyed: Vec<(usize, TableRow)> = order.into_iter().zip(self.rows.drain(..)).collect();
        keyed.sort_by_key(|(position, _)| *position);
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    // === 分类操作 ===

    /// 添加分类
    ///
    /// 分类名为空或已被任何行/标题使用时，输入行闪烁提示并返回 `CategoryConflict`。
    /// 表格允许添加行时立即为该分类生成一行。
    ///
    /// # 返回
    /// 生成的行（如有）
    pub fn add_category(&mut self, name: &str) -> Result<Option<RowId>, FormError> {
        self.add_category_at(name, Instant::now())
    }

    pub(crate) fn add_category_at(
        &mut self,
        name: &str,
        now: Instant,
    ) -> Result<Option<RowId>, FormError> {
        if self.read_only {
            return Err(FormError::ReadOnlyTable(self.name()));
        }
        if !self.is_categorized() || !self.can_add_new_categories {
            return Err(FormError::NotCategorized(self.name()));
        }

        let taken = self.categories.iter().any(|c| c.name == name)
            || self.rows.iter().any(|row| row.category.as_deref() == Some(name));
        if name.is_empty() || taken {
            self.category_input.flag(now);
            return Err(FormError::CategoryConflict(name.to_string()));
        }

        self.categories.push(Category {
            name: name.to_string(),
            expanded: true,
            is_new: true,
            removable: true,
            message: format!(" - {}", self.new_category_message),
        });

        if !self.can_add_new_rows {
            return Ok(None);
        }

        let id = self.add_row(RowDraft::new().in_category(name))?;
        Ok(Some(id))
    }

    /// 删除分类及其所有行
    ///
    /// 每一行都走普通的删除流程，因此表格的最后一行仍会变成占位输入。
    pub fn delete_category(&mut self, name: &str, initial: Option<&Value>) -> Result<(), FormError> {
        if self.read_only {
            return Err(FormError::ReadOnlyTable(self.name()));
        }

        let ids: Vec<RowId> = self
            .rows
            .iter()
            .filter(|row| row.category.as_deref() == Some(name))
            .map(|row| row.id)
            .collect();

        if self.category(name).is_none() && ids.is_empty() {
            return Err(FormError::UnknownCategory(name.to_string()));
        }

        self.categories.retain(|c| c.name != name);
        for id in ids {
            self.remove_row(id, initial)?;
        }

        debug!(table = %self.keypath, category = name, "table category deleted");
        Ok(())
    }

    /// 展开/折叠分类，只影响展示
    ///
    /// # 返回
    /// 折叠后是否为展开状态
    pub fn toggle_category(&mut self, name: &str) -> Result<bool, FormError> {
        let category = self
            .categories
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| FormError::UnknownCategory(name.to_string()))?;
        category.expanded = !category.expanded;
        Ok(category.expanded)
    }
}

/// 已有行的单元格；可编辑的时间列缺省为列默认值或 "00:00"
fn existing_cell(column: &ColumnDescription, value: &Value) -> CellValue {
    if column.column_type == SettingType::Time && column.editable && value.is_null() {
        let fallback = column
            .default
            .as_ref()
            .map(display_scalar)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "00:00".to_string());
        return CellValue::Text(fallback);
    }

    CellValue::from_json(column, value)
}
