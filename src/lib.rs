pub mod keypath;
pub mod schema;
pub mod table;
pub mod render;
pub mod form;
pub mod io;
pub mod utils;

// 重新导出主要结构
pub use keypath::KeyPath;
pub use schema::{PanelDescription, SettingDescription, SettingType, SettingsDocument};
pub use table::{Direction, RowDraft, RowId, SerializeMode, TableEditor, TableMode};
pub use render::{render_form, FormControl, FormGroup, FormModel, PanelForm};
pub use form::{BadgeState, FormEvent, FormObserver, SaveOutcome, SettingsFormState};
pub use io::{FileSettingsEndpoint, InMemoryEndpoint, PostResponse, SettingsEndpoint};
pub use utils::{FormError, ValidationError, SETTINGS_ERROR_MESSAGE};
