use serde::{Serialize, Deserialize};
use chrono::Utc;
use std::time::Duration;

use crate::model::ad_info::duration_millis;
use crate::session::observer::SessionEvent;

/// **广告会话日志**
/// 一个加载周期一条，从 load 开始记录到关闭或失败。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionLog {
    pub timestamp: String,             // 记录时间
    pub log_type: String,              // 日志类型，固定为 "ad_session"
    pub session_id: String,            // 会话唯一标识
    pub placement: String,             // 广告位身份，如 "507206/1579908/15048"
    pub cycle: u64,                    // 加载周期
    pub status: String,                // "loaded" / "failed" / "timeout"
    pub insertion_id: Option<String>,  // 投放 ID
    pub error: Option<String>,         // 失败原因
    pub load_time_ms: Option<u64>,     // 加载耗时
    pub events: Vec<SessionEventLog>,  // 展示阶段事件
}

/// **展示阶段事件日志**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionEventLog {
    pub event: String,           // "shown", "clicked", "closed", "show_failed"
    pub detail: Option<String>,  // 展示失败原因
}

impl SessionLog {
    /// **创建会话日志**
    pub fn new(session_id: &str, placement: &str, cycle: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: "ad_session".to_string(),
            session_id: session_id.to_string(),
            placement: placement.to_string(),
            cycle,
            status: "failed".to_string(),  // 默认失败，后续可更新
            insertion_id: None,
            error: None,
            load_time_ms: None,
            events: Vec::new(),
        }
    }

    /// **记录加载结果或展示事件**
    pub fn record(&mut self, event: &SessionEvent, load_time: Option<Duration>) {
        match event {
            SessionEvent::Loaded(info) => {
                self.status = "loaded".to_string();
                self.insertion_id = info.insertion_id.clone();
                self.load_time_ms = load_time.map(duration_millis);
            }
            SessionEvent::Failed(error) => {
                self.status = if error.is_timeout() { "timeout" } else { "failed" }.to_string();
                self.insertion_id = error.insertion_id.clone();
                self.error = Some(error.message.clone());
                self.load_time_ms = load_time.map(duration_millis);
            }
            SessionEvent::ShowFailed(error) => self.events.push(SessionEventLog {
                event: event.name().to_string(),
                detail: Some(error.message.clone()),
            }),
            _ => self.events.push(SessionEventLog {
                event: event.name().to_string(),
                detail: None,
            }),
        }
    }

    pub fn clicks(&self) -> usize {
        self.events.iter().filter(|e| e.event == "clicked").count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ad_info::{AdError, AdInfo};

    #[test]
    fn records_load_and_presentation() {
        let mut log = SessionLog::new("s-1", "1/2/3", 1);
        assert_eq!(log.status, "failed");
        log.record(&SessionEvent::Loaded(AdInfo::with_insertion_id("abc")), Some(Duration::from_millis(1200)));
        log.record(&SessionEvent::Shown, None);
        log.record(&SessionEvent::Clicked, None);
        log.record(&SessionEvent::Clicked, None);
        log.record(&SessionEvent::Closed, None);

        assert_eq!(log.status, "loaded");
        assert_eq!(log.insertion_id.as_deref(), Some("abc"));
        assert_eq!(log.load_time_ms, Some(1200));
        assert_eq!(log.clicks(), 2);
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["log_type"], "ad_session");
        assert_eq!(json["events"].as_array().map(|e| e.len()), Some(4));
    }

    #[test]
    fn timeout_is_reported_as_its_own_status() {
        let mut log = SessionLog::new("s-2", "test:banner_html", 3);
        log.record(&SessionEvent::Failed(AdError::timeout()), Some(Duration::from_secs(5)));
        assert_eq!(log.status, "timeout");
        assert_eq!(log.error.as_deref(), Some("timeout"));
        assert_eq!(log.load_time_ms, Some(5000));
    }
}
