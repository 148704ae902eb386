// src/config/config_manager.rs

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

use crate::config::adapters::{ConfigAdapter, NamedPlacement};
use crate::config::sdk_configuration::SdkConfiguration;
use crate::error::ConfigError;
use crate::model::placement::PlacementConfig;

/// **配置管理器**
/// 持有 SDK 配置句柄以及按名称索引的广告位。
#[derive(Debug)]
pub struct ConfigManager {
    sdk: SdkConfiguration,
    placements: RwLock<HashMap<String, PlacementConfig>>,
}

impl ConfigManager {
    pub fn new(sdk: SdkConfiguration) -> Self {
        ConfigManager {
            sdk,
            placements: RwLock::new(HashMap::new()),
        }
    }

    /// 通过适配器加载设置和广告位
    pub fn from_adapter(adapter: &dyn ConfigAdapter, sdk: SdkConfiguration) -> Result<Self, ConfigError> {
        sdk.apply(adapter.get_sdk_settings()?);
        let manager = ConfigManager::new(sdk);
        manager.update_placements(adapter.get_placements()?);
        Ok(manager)
    }

    pub fn sdk(&self) -> &SdkConfiguration {
        &self.sdk
    }

    /// 整体替换广告位表，重复名称以后出现的为准
    pub fn update_placements(&self, named: Vec<NamedPlacement>) {
        let mut table = HashMap::with_capacity(named.len());
        for entry in named {
            if table.insert(entry.name.clone(), entry.placement).is_some() {
                warn!(name = %entry.name, "duplicate placement name, keeping the last definition");
            }
        }
        info!(count = table.len(), "placements updated");
        *self.placements.write().unwrap_or_else(PoisonError::into_inner) = table;
    }

    /// 返回广告位的副本，会话控制器独占自己的那份
    pub fn placement(&self, name: &str) -> Option<PlacementConfig> {
        self.placements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn placement_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .placements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sdk_configuration::SdkSettings;
    use crate::model::placement::TestVariant;

    struct StaticAdapter;

    impl ConfigAdapter for StaticAdapter {
        fn get_sdk_settings(&self) -> Result<SdkSettings, ConfigError> {
            Ok(SdkSettings {
                ad_call_timeout_ms: 1500,
                ..SdkSettings::default()
            })
        }

        fn get_placements(&self) -> Result<Vec<NamedPlacement>, ConfigError> {
            Ok(vec![
                NamedPlacement { name: "home".to_string(), placement: PlacementConfig::new(1, 2, 3) },
                NamedPlacement { name: "home".to_string(), placement: PlacementConfig::new(4, 5, 6) },
                NamedPlacement {
                    name: "debug".to_string(),
                    placement: PlacementConfig::test_ad(TestVariant::BannerHtml),
                },
            ])
        }
    }

    #[test]
    fn loads_from_adapter() {
        let sdk = SdkConfiguration::new();
        let manager = ConfigManager::from_adapter(&StaticAdapter, sdk.clone()).unwrap();
        assert_eq!(sdk.ad_call_timeout().as_millis(), 1500);
        assert_eq!(manager.placement_names(), vec!["debug".to_string(), "home".to_string()]);
        assert_eq!(manager.placement("home").and_then(|p| p.site_id()), Some(4));
        assert!(manager.placement("missing").is_none());
    }

    #[test]
    fn placement_copies_are_independent() {
        let manager = ConfigManager::new(SdkConfiguration::new());
        manager.update_placements(vec![NamedPlacement {
            name: "home".to_string(),
            placement: PlacementConfig::new(1, 2, 3),
        }]);
        let mut copy = manager.placement("home").unwrap();
        copy.set_supply_chain_object_string("1.0,1!a.com,1,1").unwrap();
        assert_eq!(manager.placement("home").unwrap().supply_chain_object_string(), None);
    }
}
