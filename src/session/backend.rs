// src/session/backend.rs

use futures::future::BoxFuture;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::sdk_configuration::SecondaryImplementationInfo;
use crate::model::ad_info::{duration_millis, AdError, AdInfo};
use crate::model::placement::{PlacementConfig, PlacementIdentity, SellerDefinedAudience, SellerDefinedContent};
use crate::session::controller::PresentationHandle;

/// **一次广告请求**
/// 在进入 Loading 时由广告位和当前 SDK 设置生成，交给加载器。
#[derive(Debug, Clone, Serialize)]
pub struct AdRequest {
    pub session_id: Uuid,
    pub cycle: u64,
    #[serde(serialize_with = "serialize_identity")]
    pub identity: PlacementIdentity,
    pub keyword_targeting: Option<String>,
    pub seller_defined_audiences: Option<Vec<SellerDefinedAudience>>,
    pub seller_defined_contents: Option<Vec<SellerDefinedContent>>,
    pub supply_chain_object_string: Option<String>,
    pub location_allowed: bool,
    pub secondary_implementation_info: Option<SecondaryImplementationInfo>,
    pub timeout_ms: u64,
}

fn serialize_identity<S: serde::Serializer>(identity: &PlacementIdentity, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(identity)
}

impl AdRequest {
    pub(crate) fn new(
        session_id: Uuid,
        cycle: u64,
        placement: &PlacementConfig,
        location_allowed: bool,
        secondary_implementation_info: Option<SecondaryImplementationInfo>,
        timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            cycle,
            identity: placement.identity(),
            keyword_targeting: placement.keyword_targeting().map(String::from),
            seller_defined_audiences: placement.seller_defined_audiences().map(<[_]>::to_vec),
            seller_defined_contents: placement.seller_defined_contents().map(<[_]>::to_vec),
            supply_chain_object_string: placement.supply_chain_object_string().map(String::from),
            location_allowed,
            secondary_implementation_info,
            timeout_ms: duration_millis(timeout),
        }
    }
}

/// 广告加载后端（真实网络请求不在本 crate 范围内）
pub trait AdLoader: Send + Sync {
    fn load(&self, request: AdRequest) -> BoxFuture<'static, Result<AdInfo, AdError>>;
}

/// 广告展示后端。
/// 同步返回 Err 表示立即展示失败；之后的展示事件通过 `PresentationHandle` 上报。
pub trait AdPresenter: Send + Sync {
    fn present(&self, host: HostContext, ad: &AdInfo, handle: PresentationHandle) -> Result<(), AdError>;
}

/// 宿主展示上下文，控制器只负责透传，不查看内容
#[derive(Clone)]
pub struct HostContext(Arc<dyn Any + Send + Sync>);

impl HostContext {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        HostContext(Arc::new(value))
    }

    pub fn empty() -> Self {
        HostContext::new(())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostContext(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::placement::{SegmentGroup, TestVariant};

    #[test]
    fn request_copies_targeting() {
        let mut placement = PlacementConfig::with_keywords(1, 2, 3, "kw=1");
        placement.set_seller_defined_audiences(vec![SegmentGroup::new(Some("a"), None, None)]).unwrap();
        let request = AdRequest::new(Uuid::nil(), 4, &placement, false, None, Duration::from_secs(5));
        assert_eq!(request.cycle, 4);
        assert_eq!(request.keyword_targeting.as_deref(), Some("kw=1"));
        assert_eq!(request.seller_defined_audiences.map(|a| a.len()), Some(1));
        assert!(!request.location_allowed);
        assert_eq!(request.timeout_ms, 5000);

        let unbounded = AdRequest::new(Uuid::nil(), 5, &placement, false, None, Duration::MAX);
        assert_eq!(unbounded.timeout_ms, u64::MAX);
    }

    #[test]
    fn request_serializes_identity_as_text() {
        let placement = PlacementConfig::test_ad(TestVariant::BannerVideo);
        let request = AdRequest::new(Uuid::nil(), 1, &placement, true, None, Duration::from_secs(1));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["identity"], "test:banner_video");
    }

    #[test]
    fn host_context_passes_value_through() {
        let host = HostContext::new(String::from("root-view-controller"));
        assert_eq!(host.downcast_ref::<String>().map(String::as_str), Some("root-view-controller"));
        assert!(host.downcast_ref::<u32>().is_none());
        assert!(HostContext::empty().downcast_ref::<()>().is_some());
    }
}
