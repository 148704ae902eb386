// src/session/observer.rs

use tokio::sync::mpsc::UnboundedSender;

use crate::model::ad_info::{AdError, AdInfo};

/// **会话回调**
///
/// `on_loaded` / `on_failed` 必须实现；其余回调默认什么都不做。
/// 回调执行期间不要在同一个控制器上调用 `set_observer` 或 `dispose`。
pub trait AdSessionObserver: Send + Sync {
    fn on_loaded(&self, info: &AdInfo);

    fn on_failed(&self, error: &AdError);

    fn on_shown(&self) {}

    fn on_show_failed(&self, _error: &AdError) {}

    fn on_clicked(&self) {}

    fn on_closed(&self) {}
}

/// 回调事件的值表示
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Loaded(AdInfo),
    Failed(AdError),
    Shown,
    ShowFailed(AdError),
    Clicked,
    Closed,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Loaded(_) => "loaded",
            SessionEvent::Failed(_) => "failed",
            SessionEvent::Shown => "shown",
            SessionEvent::ShowFailed(_) => "show_failed",
            SessionEvent::Clicked => "clicked",
            SessionEvent::Closed => "closed",
        }
    }
}

/// 把所有回调转发到 tokio 通道，接收端关闭后事件直接丢弃
pub struct ChannelObserver {
    sender: UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new(sender: UnboundedSender<SessionEvent>) -> Self {
        Self { sender }
    }

    fn forward(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}

impl AdSessionObserver for ChannelObserver {
    fn on_loaded(&self, info: &AdInfo) {
        self.forward(SessionEvent::Loaded(info.clone()));
    }

    fn on_failed(&self, error: &AdError) {
        self.forward(SessionEvent::Failed(error.clone()));
    }

    fn on_shown(&self) {
        self.forward(SessionEvent::Shown);
    }

    fn on_show_failed(&self, error: &AdError) {
        self.forward(SessionEvent::ShowFailed(error.clone()));
    }

    fn on_clicked(&self) {
        self.forward(SessionEvent::Clicked);
    }

    fn on_closed(&self) {
        self.forward(SessionEvent::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct LoadOnly;

    impl AdSessionObserver for LoadOnly {
        fn on_loaded(&self, _info: &AdInfo) {}
        fn on_failed(&self, _error: &AdError) {}
    }

    #[test]
    fn optional_callbacks_default_to_noop() {
        let observer = LoadOnly;
        observer.on_shown();
        observer.on_clicked();
        observer.on_closed();
        observer.on_show_failed(&AdError::show("x"));
    }

    #[test]
    fn channel_observer_forwards_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver::new(tx);
        observer.on_loaded(&AdInfo::with_insertion_id("abc"));
        observer.on_shown();
        observer.on_clicked();
        observer.on_closed();

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Loaded(AdInfo::with_insertion_id("abc")));
        assert_eq!(rx.try_recv().unwrap().name(), "shown");
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Clicked);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Closed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelObserver::new(tx).on_failed(&AdError::load("no fill"));
    }
}
