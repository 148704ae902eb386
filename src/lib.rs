//! 广告会话生命周期：广告位配置、SDK 全局配置，以及驱动 load / show / close 的会话控制器。

pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod model;
pub mod session;

pub use config::{ConfigManager, SdkConfiguration, SdkSettings, SecondaryImplementationInfo};
pub use error::{ConfigError, PlacementError, SessionError};
pub use model::ad_info::{AdError, AdErrorKind, AdInfo, ProgrammaticInfo};
pub use model::parallax::ParallaxMargins;
pub use model::placement::{
    AdFormat, PlacementConfig, PlacementIdentity, Segment, SegmentGroup, SellerDefinedAudience,
    SellerDefinedContent, TestVariant,
};
pub use model::status::{AdStatus, FailureStage, SessionState};
pub use session::{
    AdLoader, AdPresenter, AdRequest, AdSessionController, AdSessionObserver, ChannelObserver,
    HostContext, PresentationHandle, SessionEvent,
};
