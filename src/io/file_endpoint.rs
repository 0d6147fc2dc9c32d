/// 基于文件的设置端点
///
/// 设置文档以 JSON 形式保存在磁盘上，提交时先备份再合并写回。
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use super::merge::merge_posted_values;
use super::traits::{PostResponse, SettingsEndpoint};
use crate::schema::SettingsDocument;
use crate::utils::{create_backup, FormError};

/// 默认的设置端点（基于 std::fs）
#[derive(Debug, Clone)]
pub struct FileSettingsEndpoint {
    path: PathBuf,
    backup: bool,
}

impl FileSettingsEndpoint {
    /// # 参数
    /// * `path` - 设置文档路径
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup: true,
        }
    }

    /// 提交时不创建备份文件
    pub fn without_backup(mut self) -> Self {
        self.backup = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, document: &SettingsDocument) -> Result<(), FormError> {
        // 确保父目录存在
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let text = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl SettingsEndpoint for FileSettingsEndpoint {
    fn fetch(&self) -> Result<SettingsDocument, FormError> {
        let text = std::fs::read_to_string(&self.path)?;
        let document = SettingsDocument::from_json_str(&text)?;
        debug!(path = %self.path.display(), panels = document.descriptions.len(), "settings loaded");
        Ok(document)
    }

    fn post(&self, values: &Value) -> Result<PostResponse, FormError> {
        let mut document = self.fetch()?;

        if self.backup {
            let backup_path = create_backup(&self.path)?;
            info!(backup = %backup_path.display(), "settings backup created");
        }

        merge_posted_values(&mut document.values, values, &document.descriptions);
        self.write(&document)?;

        debug!(path = %self.path.display(), "settings saved");
        Ok(PostResponse::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const DOCUMENT: &str = r#"{
        "descriptions": [
            { "name": "audio", "settings": [
                { "name": "codec" },
                { "name": "buffer", "type": "int" }
            ] }
        ],
        "values": { "audio": { "codec": "opus" } }
    }"#;

    #[test]
    fn test_fetch_and_post() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, DOCUMENT).unwrap();

        let endpoint = FileSettingsEndpoint::new(&path).without_backup();
        let document = endpoint.fetch().unwrap();
        assert_eq!(document.values, json!({ "audio": { "codec": "opus" } }));

        let response = endpoint
            .post(&json!({ "audio": { "codec": "pcm", "buffer": "128" } }))
            .unwrap();
        assert!(response.is_success());

        let saved = endpoint.fetch().unwrap();
        assert_eq!(saved.values, json!({ "audio": { "codec": "pcm", "buffer": 128 } }));
        assert_eq!(saved.descriptions, document.descriptions);

        // 未开启备份时目录中只有设置文件
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_post_creates_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, DOCUMENT).unwrap();

        let endpoint = FileSettingsEndpoint::new(&path);
        endpoint.post(&json!({ "audio": { "codec": "" } })).unwrap();

        let backups: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".bak"))
            .collect();
        assert_eq!(backups.len(), 1);

        let original = std::fs::read_to_string(backups[0].path()).unwrap();
        assert_eq!(original, DOCUMENT);
        assert_eq!(endpoint.fetch().unwrap().values, json!({}));
    }

    #[test]
    fn test_missing_file() {
        let endpoint = FileSettingsEndpoint::new("/nonexistent/settings.json");
        assert!(matches!(endpoint.fetch(), Err(FormError::IoError(_))));
    }
}
