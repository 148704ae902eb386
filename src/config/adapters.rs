// src/config/adapters.rs

use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::sdk_configuration::SdkSettings;
use crate::error::ConfigError;
use crate::model::placement::PlacementConfig;

/// 配置文件中的具名广告位
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NamedPlacement {
    pub name: String,
    #[serde(flatten)]
    pub placement: PlacementConfig,
}

pub trait ConfigAdapter: Send + Sync {
    fn get_sdk_settings(&self) -> Result<SdkSettings, ConfigError>;
    fn get_placements(&self) -> Result<Vec<NamedPlacement>, ConfigError>;
}

/// 从 JSON 文件读取 SDK 设置和广告位列表
pub struct FileConfigAdapter {
    pub settings_file: PathBuf,
    pub placements_file: PathBuf,
}

impl FileConfigAdapter {
    pub fn new(settings_file: impl AsRef<Path>, placements_file: impl AsRef<Path>) -> Self {
        Self {
            settings_file: settings_file.as_ref().to_path_buf(),
            placements_file: placements_file.as_ref().to_path_buf(),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl ConfigAdapter for FileConfigAdapter {
    fn get_sdk_settings(&self) -> Result<SdkSettings, ConfigError> {
        read_json(&self.settings_file)
    }

    fn get_placements(&self) -> Result<Vec<NamedPlacement>, ConfigError> {
        read_json(&self.placements_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::placement::TestVariant;
    use std::env;
    use uuid::Uuid;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("adsdk-config-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn reads_settings_and_placements() {
        let settings = temp_file("sdk.json", r#"{"ad_call_timeout_ms": 4000, "logging_enabled": true}"#);
        let placements = temp_file(
            "placements.json",
            r#"[
                {"name": "video_header", "site_id": 507206, "page_id": 1579908, "format_id": 15048,
                 "keyword_targeting": "header01"},
                {"name": "test_interstitial", "test_ad": "interstitial_html"}
            ]"#,
        );
        let adapter = FileConfigAdapter::new(&settings, &placements);

        let sdk = adapter.get_sdk_settings().unwrap();
        assert_eq!(sdk.ad_call_timeout_ms, 4000);
        assert!(sdk.logging_enabled);
        assert!(sdk.automatic_location_detection_allowed);

        let named = adapter.get_placements().unwrap();
        assert_eq!(named.len(), 2);
        assert_eq!(named[0].name, "video_header");
        assert_eq!(named[0].placement.keyword_targeting(), Some("header01"));
        assert_eq!(named[1].placement.test_variant(), Some(TestVariant::InterstitialHtml));
    }

    #[test]
    fn missing_file_is_io_error() {
        let adapter = FileConfigAdapter::new("/nonexistent/sdk.json", "/nonexistent/placements.json");
        assert!(matches!(adapter.get_sdk_settings(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn invalid_placement_is_parse_error() {
        let placements = temp_file("bad.json", r#"[{"name": "broken", "site_id": 1}]"#);
        let adapter = FileConfigAdapter::new("/nonexistent/sdk.json", &placements);
        assert!(matches!(adapter.get_placements(), Err(ConfigError::Parse { .. })));
    }
}
