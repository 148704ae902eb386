// src/mock.rs

use futures::future::{BoxFuture, FutureExt};
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{sleep, Duration};
use tracing::info;
use uuid::Uuid;

use crate::model::ad_info::{duration_millis, AdError, AdInfo, ProgrammaticInfo};
use crate::model::placement::{AdFormat, PlacementIdentity, TestVariant};
use crate::session::backend::{AdLoader, AdPresenter, AdRequest, HostContext};
use crate::session::controller::PresentationHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// **模拟广告服务器**
///
/// 随机延迟后返回广告或无填充；测试广告位总是有填充。
pub struct MockAdLoader {
    pub fill_rate: f64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for MockAdLoader {
    fn default() -> Self {
        // 模拟广告服务器处理延迟（100 ~ 300 毫秒）
        Self {
            fill_rate: 0.8,
            min_delay_ms: 100,
            max_delay_ms: 300,
        }
    }
}

impl MockAdLoader {
    pub fn new(fill_rate: f64, min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            fill_rate: fill_rate.clamp(0.0, 1.0),
            min_delay_ms,
            max_delay_ms: max_delay_ms.max(min_delay_ms),
        }
    }

    fn build_ad(request: &AdRequest, rng: &mut impl Rng) -> AdInfo {
        let insertion_id = Uuid::new_v4().to_string();
        match request.identity {
            PlacementIdentity::Test(variant) => AdInfo {
                insertion_id: Some(insertion_id),
                aspect_ratio: aspect_ratio_for(variant),
                programmatic_info: None,
            },
            PlacementIdentity::Ids { site_id, .. } => {
                // 程序化成交价，两位小数
                let price = rng.gen_range(0.5..4.0);
                AdInfo {
                    insertion_id: Some(insertion_id),
                    aspect_ratio: Some(if rng.gen_bool(0.5) { 6.4 } else { 16.0 / 9.0 }),
                    programmatic_info: Some(ProgrammaticInfo {
                        advertiser_id: Some(format!("adv-{}", rng.gen_range(1000..9999))),
                        auction_id: Some(Uuid::new_v4().to_string()),
                        buyer_id: Some(format!("buyer-{}", rng.gen_range(10..99))),
                        campaign_id: Some(format!("cmp-{}", rng.gen_range(100..999))),
                        creative_id: Some(format!("crid-{}", rng.gen_range(100..999))),
                        deal_id: None,
                        dsp_id: Some(format!("dsp-{}", rng.gen_range(1..10))),
                        publisher_id: Some(site_id.to_string()),
                        cleared_price_publisher_currency: Some(format!("{:.2}", price)),
                        publisher_currency_code: Some("EUR".to_string()),
                        external_deal_id: None,
                    }),
                }
            }
        }
    }
}

fn aspect_ratio_for(variant: TestVariant) -> Option<f32> {
    match (variant.format(), variant.is_video()) {
        (AdFormat::Interstitial, _) => None,
        (AdFormat::Banner, true) => Some(16.0 / 9.0),
        (AdFormat::Banner, false) => Some(6.4),
    }
}

impl AdLoader for MockAdLoader {
    fn load(&self, request: AdRequest) -> BoxFuture<'static, Result<AdInfo, AdError>> {
        let mut rng = rand::thread_rng();
        let max_delay_ms = self.max_delay_ms.max(self.min_delay_ms);
        let delay = Duration::from_millis(rng.gen_range(self.min_delay_ms..=max_delay_ms));
        let filled = request.identity.is_test() || rng.gen_bool(self.fill_rate.clamp(0.0, 1.0));
        let outcome = if filled {
            Ok(Self::build_ad(&request, &mut rng))
        } else {
            Err(AdError::load(&format!("no ad found for placement {}", request.identity)))
        };
        info!(
            session_id = %request.session_id,
            placement = %request.identity,
            delay_ms = duration_millis(delay),
            filled,
            "mock ad server received ad call"
        );
        async move {
            sleep(delay).await;
            outcome
        }
        .boxed()
    }
}

/// 模拟展示层：展示后按配置点击若干次，停留一段时间后关闭
pub struct MockPresenter {
    pub display_duration: Duration,
    pub clicks: u32,
}

impl Default for MockPresenter {
    fn default() -> Self {
        Self {
            display_duration: Duration::from_secs(2),
            clicks: 1,
        }
    }
}

impl AdPresenter for MockPresenter {
    fn present(&self, _host: HostContext, ad: &AdInfo, handle: PresentationHandle) -> Result<(), AdError> {
        let display_duration = self.display_duration;
        let clicks = self.clicks;
        let margins = handle.parallax_margins();
        info!(
            insertion_id = ad.insertion_id.as_deref().unwrap_or(""),
            clicks,
            margin_top = margins.top,
            margin_bottom = margins.bottom,
            "mock presenter displaying ad"
        );
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            handle.shown();
            for _ in 0..clicks {
                sleep(Duration::from_millis(200)).await;
                handle.clicked();
            }
            sleep(display_duration).await;
            handle.closed();
        });
        Ok(())
    }
}

struct Script {
    delay: Duration,
    outcome: Result<AdInfo, AdError>,
    calls: usize,
    last_request: Option<AdRequest>,
}

/// 固定延迟、固定结果的加载器，克隆后共享同一份脚本
#[derive(Clone)]
pub struct ScriptedLoader {
    script: Arc<Mutex<Script>>,
}

impl ScriptedLoader {
    pub fn new(delay: Duration, outcome: Result<AdInfo, AdError>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                delay,
                outcome,
                calls: 0,
                last_request: None,
            })),
        }
    }

    pub fn succeed_after(delay: Duration, info: AdInfo) -> Self {
        Self::new(delay, Ok(info))
    }

    pub fn fail_after(delay: Duration, error: AdError) -> Self {
        Self::new(delay, Err(error))
    }

    pub fn set_outcome(&self, outcome: Result<AdInfo, AdError>) {
        lock(&self.script).outcome = outcome;
    }

    pub fn set_delay(&self, delay: Duration) {
        lock(&self.script).delay = delay;
    }

    pub fn calls(&self) -> usize {
        lock(&self.script).calls
    }

    pub fn last_request(&self) -> Option<AdRequest> {
        lock(&self.script).last_request.clone()
    }
}

impl AdLoader for ScriptedLoader {
    fn load(&self, request: AdRequest) -> BoxFuture<'static, Result<AdInfo, AdError>> {
        let (delay, outcome) = {
            let mut script = lock(&self.script);
            script.calls += 1;
            script.last_request = Some(request);
            (script.delay, script.outcome.clone())
        };
        async move {
            sleep(delay).await;
            outcome
        }
        .boxed()
    }
}

#[derive(Default)]
struct PresenterLog {
    failure: Option<AdError>,
    handles: Vec<PresentationHandle>,
    hosts: Vec<HostContext>,
}

/// 记录展示句柄的展示层，由调用方手动上报事件
#[derive(Clone, Default)]
pub struct ScriptedPresenter {
    log: Arc<Mutex<PresenterLog>>,
}

impl ScriptedPresenter {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn failing(error: AdError) -> Self {
        let presenter = Self::default();
        lock(&presenter.log).failure = Some(error);
        presenter
    }

    pub fn last_handle(&self) -> Option<PresentationHandle> {
        lock(&self.log).handles.last().cloned()
    }

    pub fn last_host(&self) -> Option<HostContext> {
        lock(&self.log).hosts.last().cloned()
    }

    pub fn presentations(&self) -> usize {
        lock(&self.log).handles.len()
    }
}

impl AdPresenter for ScriptedPresenter {
    fn present(&self, host: HostContext, _ad: &AdInfo, handle: PresentationHandle) -> Result<(), AdError> {
        let mut log = lock(&self.log);
        log.handles.push(handle);
        log.hosts.push(host);
        match &log.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
