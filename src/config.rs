//! 設定ファイル管理モジュール
//!
//! マシン構成をJSON形式で永続化

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::disk_log::{self, DiskLogLevel};
use crate::memory::AppleModel;

/// 設定ファイルのデフォルトファイル名
pub const CONFIG_FILENAME: &str = "a2core_config.json";

/// マシン設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// モデル（ソフトスイッチテーブルが変わる）
    #[serde(default = "default_model")]
    pub model: AppleModel,
    /// ロード時にディスクを書き込み禁止にする
    #[serde(default)]
    pub write_protect: bool,
    /// ディスクログのカテゴリ ("flow", "state")
    #[serde(default)]
    pub disk_log: Vec<String>,
}

fn default_model() -> AppleModel {
    AppleModel::AppleIIe
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model: default_model(),
            write_protect: false,
            disk_log: Vec::new(),
        }
    }
}

impl Config {
    /// 指定したパスから設定を読み込む
    ///
    /// ファイルがない、または壊れている場合はデフォルト。
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse config {:?}: {}, using defaults", path.as_ref(), e);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// 指定したパスに設定を保存する
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, json)
            .map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    pub fn disk_log_level(&self) -> DiskLogLevel {
        DiskLogLevel::from_names(self.disk_log.as_slice())
    }

    /// ディスクログのカテゴリを反映（プロセス全体に効く）
    pub fn apply_logging(&self) {
        disk_log::set_log_level(self.disk_log_level());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("a2core_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());

        let config: Config = serde_json::from_str(r#"{"model":"AppleIIPlus"}"#).unwrap();
        assert_eq!(config.model, AppleModel::AppleIIPlus);
        assert!(!config.write_protect);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("save_and_load");
        let config = Config {
            model: AppleModel::AppleIIPlus,
            write_protect: true,
            disk_log: vec!["flow".to_string()],
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_broken_file_falls_back() {
        let path = temp_path("broken");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
        let _ = fs::remove_file(&path);

        assert_eq!(Config::load_from(temp_path("missing")), Config::default());
    }

    #[test]
    fn test_disk_log_level() {
        let config = Config {
            disk_log: vec!["flow".into(), "state".into()],
            ..Config::default()
        };
        assert_eq!(config.disk_log_level(), DiskLogLevel::FLOW | DiskLogLevel::STATE);
    }
}
