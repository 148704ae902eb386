// src/model/ad_info.rs

use serde::{Serialize, Deserialize};
use std::time::Duration;
use thiserror::Error;

/// **程序化交易信息**
/// 描述支撑本次广告的 RTB 胜出信息，全部字段可选。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgrammaticInfo {
    pub advertiser_id: Option<String>,
    pub auction_id: Option<String>,
    pub buyer_id: Option<String>,
    pub campaign_id: Option<String>,
    pub creative_id: Option<String>,
    pub deal_id: Option<String>,
    pub dsp_id: Option<String>,
    pub publisher_id: Option<String>,
    /// 以发布者币种结算的成交价（十进制字符串）
    pub cleared_price_publisher_currency: Option<String>,
    pub publisher_currency_code: Option<String>,
    pub external_deal_id: Option<String>,
}

/// **广告加载成功后的信息**
/// 每次成功加载生成一份，重新加载时整体替换。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AdInfo {
    pub insertion_id: Option<String>,
    pub aspect_ratio: Option<f32>,
    pub programmatic_info: Option<ProgrammaticInfo>,
}

impl AdInfo {
    pub fn with_insertion_id(insertion_id: &str) -> Self {
        Self {
            insertion_id: Some(insertion_id.to_string()),
            ..Self::default()
        }
    }

    /// 根据期望宽度和广告宽高比计算 banner 高度
    pub fn height_for_width(&self, width: f64) -> Option<f64> {
        self.aspect_ratio
            .filter(|ratio| *ratio > 0.0)
            .map(|ratio| width / ratio as f64)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdErrorKind {
    Load,
    Timeout,
    Show,
}

/// 加载或展示失败，只通过观察者异步送达
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdError {
    pub insertion_id: Option<String>,
    pub message: String,
    pub kind: AdErrorKind,
}

impl AdError {
    pub fn load(message: &str) -> Self {
        Self {
            insertion_id: None,
            message: message.to_string(),
            kind: AdErrorKind::Load,
        }
    }

    pub fn show(message: &str) -> Self {
        Self {
            insertion_id: None,
            message: message.to_string(),
            kind: AdErrorKind::Show,
        }
    }

    /// 加载超时由控制器合成，消息固定为 "timeout"
    pub fn timeout() -> Self {
        Self {
            insertion_id: None,
            message: "timeout".to_string(),
            kind: AdErrorKind::Timeout,
        }
    }

    pub fn with_insertion_id(mut self, insertion_id: &str) -> Self {
        self.insertion_id = Some(insertion_id.to_string());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == AdErrorKind::Timeout
    }
}

/// 毫秒数，超出 u64 范围时取 u64::MAX
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// 日志中使用的超时描述
pub fn describe_timeout(timeout: Duration) -> String {
    format!("no ad returned within {} ms", timeout.as_millis())
}
