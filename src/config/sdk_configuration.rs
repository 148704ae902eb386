// src/config/sdk_configuration.rs

use once_cell::sync::Lazy;
use serde::{Serialize, Deserialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::info;

use crate::model::ad_info::duration_millis;

/// 默认广告请求超时（毫秒）
pub const DEFAULT_AD_CALL_TIMEOUT_MS: u64 = 10_000;

static SHARED: Lazy<SdkConfiguration> = Lazy::new(SdkConfiguration::new);

/// 作为二级 SDK 集成时提供给广告服务器的附加信息
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SecondaryImplementationInfo {
    pub primary_sdk_name: String,
    pub primary_sdk_version: String,
    pub mediation_adapter_version: String,
}

/// **SDK 全局设置**
/// 也是配置文件中的表示方式，超时以毫秒存储。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SdkSettings {
    pub ad_call_timeout_ms: u64,
    pub logging_enabled: bool,
    pub automatic_location_detection_allowed: bool,
    pub secondary_implementation_info: Option<SecondaryImplementationInfo>,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            ad_call_timeout_ms: DEFAULT_AD_CALL_TIMEOUT_MS,
            logging_enabled: false,
            automatic_location_detection_allowed: true,
            secondary_implementation_info: None,
        }
    }
}

#[derive(Debug, Default)]
struct ConfigurationState {
    configured: bool,
    settings: SdkSettings,
}

/// **SDK 配置句柄**
///
/// `shared()` 返回进程级单例；`new()` 创建独立实例，便于测试或嵌入。
/// 句柄克隆后指向同一份状态，写入对之后启动的会话可见，已在加载中的会话
/// 使用它启动时读取的超时值。
#[derive(Clone, Debug, Default)]
pub struct SdkConfiguration {
    state: Arc<RwLock<ConfigurationState>>,
}

impl SdkConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SdkConfiguration {
        SHARED.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, ConfigurationState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConfigurationState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 配置 SDK，加载广告前必须调用。
    /// 第一次调用返回 true，之后的调用不做任何事并返回 false。
    pub fn configure(&self) -> bool {
        let mut state = self.write();
        if state.configured {
            return false;
        }
        state.configured = true;
        info!(
            ad_call_timeout_ms = state.settings.ad_call_timeout_ms,
            logging_enabled = state.settings.logging_enabled,
            location_allowed = state.settings.automatic_location_detection_allowed,
            "ad sdk configured"
        );
        true
    }

    pub fn is_configured(&self) -> bool {
        self.read().configured
    }

    pub fn ad_call_timeout(&self) -> Duration {
        Duration::from_millis(self.read().settings.ad_call_timeout_ms)
    }

    pub fn set_ad_call_timeout(&self, timeout: Duration) {
        self.write().settings.ad_call_timeout_ms = duration_millis(timeout);
    }

    pub fn logging_enabled(&self) -> bool {
        self.read().settings.logging_enabled
    }

    pub fn set_logging_enabled(&self, enabled: bool) {
        self.write().settings.logging_enabled = enabled;
    }

    pub fn automatic_location_detection_allowed(&self) -> bool {
        self.read().settings.automatic_location_detection_allowed
    }

    pub fn set_automatic_location_detection_allowed(&self, allowed: bool) {
        self.write().settings.automatic_location_detection_allowed = allowed;
    }

    pub fn secondary_implementation_info(&self) -> Option<SecondaryImplementationInfo> {
        self.read().settings.secondary_implementation_info.clone()
    }

    pub fn set_secondary_implementation_info(&self, info: Option<SecondaryImplementationInfo>) {
        self.write().settings.secondary_implementation_info = info;
    }

    /// 用配置文件中的设置覆盖当前设置（不影响 configured 标记）
    pub fn apply(&self, settings: SdkSettings) {
        self.write().settings = settings;
    }

    pub fn settings(&self) -> SdkSettings {
        self.read().settings.clone()
    }
}
