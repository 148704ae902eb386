// src/model/status.rs

use serde::{Serialize, Deserialize};
use std::fmt;

/// 失败发生在哪个阶段
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Load,
    Show,
}

/// **会话状态机的状态**
///
/// `Idle -> Loading -> Ready | Failed(Load)`，`Ready -> Showing -> Idle | Failed(Show)`。
/// `Failed` 状态只能通过显式调用 `load` 重试。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Showing,
    Failed(FailureStage),
}

impl SessionState {
    pub fn can_load(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Failed(_))
    }

    pub fn can_show(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Loading => f.write_str("loading"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Showing => f.write_str("showing"),
            SessionState::Failed(FailureStage::Load) => f.write_str("failed(load)"),
            SessionState::Failed(FailureStage::Show) => f.write_str("failed(show)"),
        }
    }
}

/// 对外暴露的广告状态（与 SDK 的 adStatus 一致）
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    NotAvailable,
    Loading,
    Ready,
    Showing,
}

impl From<SessionState> for AdStatus {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Idle | SessionState::Failed(_) => AdStatus::NotAvailable,
            SessionState::Loading => AdStatus::Loading,
            SessionState::Ready => AdStatus::Ready,
            SessionState::Showing => AdStatus::Showing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_allowed_from_idle_and_failed_only() {
        assert!(SessionState::Idle.can_load());
        assert!(SessionState::Failed(FailureStage::Load).can_load());
        assert!(SessionState::Failed(FailureStage::Show).can_load());
        assert!(!SessionState::Loading.can_load());
        assert!(!SessionState::Ready.can_load());
        assert!(!SessionState::Showing.can_load());
    }

    #[test]
    fn ad_status_hides_failure_stage() {
        assert_eq!(AdStatus::from(SessionState::Failed(FailureStage::Show)), AdStatus::NotAvailable);
        assert_eq!(AdStatus::from(SessionState::Idle), AdStatus::NotAvailable);
        assert_eq!(AdStatus::from(SessionState::Ready), AdStatus::Ready);
        assert_eq!(SessionState::Failed(FailureStage::Load).to_string(), "failed(load)");
    }
}
